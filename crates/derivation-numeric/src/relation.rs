// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Relation Matrix Builder
// ─────────────────────────────────────────────────────────────────────
//! Symmetric N×N relation matrix over an index set.
//!
//! Construction:
//!   1. Reject empty or duplicated index sets
//!   2. Upper triangle: cell(i, j) = relation(idx[i], idx[j], c), i < j
//!   3. Mirror into the lower triangle
//!   4. Diagonal = SELF_RELATION (never computed)
//!
//! Cost is O(N²) time and O(N²) memory with N chosen by the caller, so
//! the row loop polls a `CancelToken`. With the `parallel` feature, rows
//! are spread over rayon once N reaches `PARALLEL_THRESHOLD`; cells are
//! pure, so the result is bit-identical to the sequential path.

use std::collections::HashMap;

use derivation_types::{
    Constant, DerivationError, DerivationResult, RelationKind, RelationMatrix, SELF_RELATION,
};

use crate::cancel::CancelToken;

/// Index-set size at which rows are computed in parallel.
pub const PARALLEL_THRESHOLD: usize = 64;

/// Greatest common divisor (Euclid). `gcd(0, 0) == 0`.
pub fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Pairwise relation between indices `a` and `b` under base `c`.
/// Symmetric in `a` and `b` for every kind.
pub fn relation(kind: RelationKind, a: u64, b: u64, c: f64) -> f64 {
    let distance = a.abs_diff(b) as f64;
    match kind {
        RelationKind::GcdAffinity => {
            let (a1, b1) = (u128::from(a) + 1, u128::from(b) + 1);
            let g = gcd(a1, b1) as f64;
            // gcd/lcm = gcd² / (a'·b'), kept in f64 to avoid lcm overflow
            (g * g) / (a1 as f64 * b1 as f64) * c.powf(-distance)
        }
        RelationKind::HarmonicDecay => c.powf(-distance),
        RelationKind::Coprimality => {
            if gcd(u128::from(a) + 1, u128::from(b) + 1) == 1 {
                1.0
            } else {
                1.0 / c
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationMatrixBuilder {
    kind: RelationKind,
}

impl RelationMatrixBuilder {
    pub fn new(kind: RelationKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn build(&self, base: &Constant, index_set: &[u64]) -> DerivationResult<RelationMatrix> {
        self.build_with_cancel(base, index_set, &CancelToken::new())
    }

    /// Build, polling `cancel` before each row.
    pub fn build_with_cancel(
        &self,
        base: &Constant,
        index_set: &[u64],
        cancel: &CancelToken,
    ) -> DerivationResult<RelationMatrix> {
        let n = index_set.len();
        if n == 0 {
            return Err(DerivationError::EmptyIndex);
        }
        check_distinct(index_set)?;
        let c = base.value;
        if !c.is_finite() || c <= 0.0 {
            return Err(DerivationError::Numerical(format!(
                "relation base must be finite and > 0, got {c}"
            )));
        }

        let upper = self.upper_rows(index_set, c, cancel)?;

        let mut cells = vec![0.0; n * n];
        for (i, row) in upper.iter().enumerate() {
            cells[i * n + i] = SELF_RELATION;
            for (offset, &v) in row.iter().enumerate() {
                let j = i + 1 + offset;
                cells[i * n + j] = v;
                cells[j * n + i] = v;
            }
        }
        log::debug!("relation matrix built: N={n}, kind={}", self.kind);
        RelationMatrix::from_parts(index_set.to_vec(), self.kind, cells)
    }

    /// Strict upper triangle, one `Vec` per row (row i holds j = i+1..N).
    fn upper_row(&self, index_set: &[u64], c: f64, i: usize) -> Vec<f64> {
        let a = index_set[i];
        index_set[i + 1..]
            .iter()
            .map(|&b| relation(self.kind, a, b, c))
            .collect()
    }

    fn upper_rows(
        &self,
        index_set: &[u64],
        c: f64,
        cancel: &CancelToken,
    ) -> DerivationResult<Vec<Vec<f64>>> {
        let n = index_set.len();

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            if n >= PARALLEL_THRESHOLD {
                let rows: Vec<Option<Vec<f64>>> = (0..n)
                    .into_par_iter()
                    .map(|i| {
                        if cancel.is_cancelled() {
                            None
                        } else {
                            Some(self.upper_row(index_set, c, i))
                        }
                    })
                    .collect();
                let completed = rows.iter().filter(|r| r.is_some()).count();
                if completed < n {
                    log::warn!("relation build cancelled after {completed}/{n} rows");
                    return Err(DerivationError::Cancelled {
                        completed_rows: completed,
                        total_rows: n,
                    });
                }
                return Ok(rows.into_iter().flatten().collect());
            }
        }

        self.sequential_rows(index_set, c, cancel, |_| {})
    }

    /// Row-by-row path. `after_row` sees each finished row index before
    /// the token is polled again.
    fn sequential_rows(
        &self,
        index_set: &[u64],
        c: f64,
        cancel: &CancelToken,
        mut after_row: impl FnMut(usize),
    ) -> DerivationResult<Vec<Vec<f64>>> {
        let n = index_set.len();
        let mut rows = Vec::with_capacity(n);
        for i in 0..n {
            if cancel.is_cancelled() {
                log::warn!("relation build cancelled after {i}/{n} rows");
                return Err(DerivationError::Cancelled {
                    completed_rows: i,
                    total_rows: n,
                });
            }
            rows.push(self.upper_row(index_set, c, i));
            after_row(i);
        }
        Ok(rows)
    }
}

fn check_distinct(index_set: &[u64]) -> DerivationResult<()> {
    let mut seen: HashMap<u64, usize> = HashMap::with_capacity(index_set.len());
    for (pos, &index) in index_set.iter().enumerate() {
        if let Some(&first) = seen.get(&index) {
            return Err(DerivationError::DuplicateIndex {
                index,
                first,
                second: pos,
            });
        }
        seen.insert(index, pos);
    }
    Ok(())
}
