// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Derived Value Types
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{DerivationError, DerivationResult};
use crate::rules::{FormulaId, RecursionRule, RelationKind};

/// Most decimal digits an f64 can carry; reported when a step is exactly zero.
pub const MAX_PRECISION_DIGITS: f64 = 17.0;

/// Self-relation written on every relation matrix diagonal.
pub const SELF_RELATION: f64 = 1.0;

/// Which derivation produced a constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Converged fixed point of `rule` started from `seed`.
    FixedPoint { rule: RecursionRule, seed: f64 },
    /// Summary statistic computed over earlier stage output.
    Aggregate { source: String },
}

/// Immutable scalar with its provenance and achieved precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub value: f64,
    pub provenance: Provenance,
    /// Correct decimal digits at convergence, `-log10(|x_{n+1} - x_n|)`.
    pub precision: f64,
    /// Update steps applied before convergence (0 for aggregates).
    pub iterations: usize,
}

impl Constant {
    pub fn fixed_point(
        value: f64,
        rule: RecursionRule,
        seed: f64,
        last_step: f64,
        iterations: usize,
    ) -> Self {
        Self {
            value,
            provenance: Provenance::FixedPoint { rule, seed },
            precision: precision_digits(last_step),
            iterations,
        }
    }

    /// Aggregate constant. Precision is reported as full f64 precision.
    pub fn aggregate(value: f64, source: impl Into<String>) -> Self {
        Self {
            value,
            provenance: Provenance::Aggregate {
                source: source.into(),
            },
            precision: MAX_PRECISION_DIGITS,
            iterations: 0,
        }
    }
}

/// Digits of precision implied by a convergence step of size `step`.
pub fn precision_digits(step: f64) -> f64 {
    let step = step.abs();
    if step == 0.0 {
        return MAX_PRECISION_DIGITS;
    }
    (-step.log10()).min(MAX_PRECISION_DIGITS)
}

/// Upstream value a parameter was computed from.
///
/// Every formula in the current table reads the base constant only, so
/// `derive` emits `Constant` alone. `Parameter` is reserved for chained
/// formulas that build on an earlier entry; snapshots that carry it
/// still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    Constant(Constant),
    /// Earlier entry of the same table, by name.
    Parameter(String),
}

/// One row of the derived-parameter table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterEntry {
    pub name: String,
    pub formula_id: FormulaId,
    pub level: i64,
    pub value: f64,
    pub depends_on: Vec<Dependency>,
}

/// Symmetric N×N relation table, stored row-major.
///
/// Deserialization goes through the same checks as `from_parts`, so a
/// loaded matrix is as trustworthy as a freshly built one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRelationMatrix")]
pub struct RelationMatrix {
    n: usize,
    index_set: Vec<u64>,
    relation: RelationKind,
    cells: Vec<f64>,
}

/// Wire form of `RelationMatrix`, before validation.
#[derive(Deserialize)]
struct RawRelationMatrix {
    n: usize,
    index_set: Vec<u64>,
    relation: RelationKind,
    cells: Vec<f64>,
}

impl TryFrom<RawRelationMatrix> for RelationMatrix {
    type Error = DerivationError;

    fn try_from(raw: RawRelationMatrix) -> DerivationResult<Self> {
        if raw.n != raw.index_set.len() {
            return Err(DerivationError::Numerical(format!(
                "relation matrix size {} does not match {} indices",
                raw.n,
                raw.index_set.len()
            )));
        }
        Self::from_parts(raw.index_set, raw.relation, raw.cells)
    }
}

impl RelationMatrix {
    /// Assemble from row-major cells. Checks shape, sentinel diagonal,
    /// and symmetry.
    pub fn from_parts(
        index_set: Vec<u64>,
        relation: RelationKind,
        cells: Vec<f64>,
    ) -> DerivationResult<Self> {
        let n = index_set.len();
        if n == 0 {
            return Err(DerivationError::EmptyIndex);
        }
        if cells.len() != n * n {
            return Err(DerivationError::Numerical(format!(
                "relation matrix expects {} cells, got {}",
                n * n,
                cells.len()
            )));
        }
        let matrix = Self {
            n,
            index_set,
            relation,
            cells,
        };
        if !matrix.is_symmetric() {
            return Err(DerivationError::Numerical(
                "relation matrix is not symmetric".to_string(),
            ));
        }
        if (0..n).any(|i| matrix.cell(i, i) != SELF_RELATION) {
            return Err(DerivationError::Numerical(
                "relation matrix diagonal must equal the self-relation sentinel".to_string(),
            ));
        }
        Ok(matrix)
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn index_set(&self) -> &[u64] {
        &self.index_set
    }

    pub fn relation(&self) -> RelationKind {
        self.relation
    }

    /// Cell `[i][j]`. Panics if either index is out of range.
    pub fn cell(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.n && j < self.n, "cell ({i}, {j}) out of range for N={}", self.n);
        self.cells[i * self.n + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.cells[i * self.n..(i + 1) * self.n]
    }

    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    /// Exact (bitwise) symmetry check.
    pub fn is_symmetric(&self) -> bool {
        let n = self.n;
        (0..n).all(|i| ((i + 1)..n).all(|j| self.cells[i * n + j] == self.cells[j * n + i]))
    }

    fn off_diagonal(&self) -> impl Iterator<Item = f64> + '_ {
        let n = self.n;
        (0..n).flat_map(move |i| ((i + 1)..n).map(move |j| self.cells[i * n + j]))
    }

    /// Mean of the strict upper triangle; `SELF_RELATION` when N = 1.
    pub fn off_diagonal_mean(&self) -> f64 {
        let pairs = self.n * self.n.saturating_sub(1) / 2;
        if pairs == 0 {
            return SELF_RELATION;
        }
        self.off_diagonal().sum::<f64>() / pairs as f64
    }

    /// Largest off-diagonal cell; `SELF_RELATION` when N = 1.
    pub fn off_diagonal_max(&self) -> f64 {
        self.off_diagonal()
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
            .unwrap_or(SELF_RELATION)
    }
}

/// Anything a stage can produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StageValue {
    Constant(Constant),
    Parameter(ParameterEntry),
    Matrix(RelationMatrix),
}

impl StageValue {
    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            StageValue::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&ParameterEntry> {
        match self {
            StageValue::Parameter(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&RelationMatrix> {
        match self {
            StageValue::Matrix(m) => Some(m),
            _ => None,
        }
    }
}
