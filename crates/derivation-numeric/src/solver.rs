// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Fixed-Point Solver
// ─────────────────────────────────────────────────────────────────────
//! Scalar recursion `x_{n+1} = g(x_n)` iterated to convergence.
//!
//! For the metallic rule `g(x) = m + 1/x` every positive seed stays
//! positive and contracts towards `(m + √(m² + 4)) / 2` with rate
//! `1/x*²` per step, so ~30 iterations reach 1e-12 from any sane seed.
//! Iteration is strictly sequential.

use derivation_types::{check_seed, Constant, DerivationError, DerivationResult, RecursionRule};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedPointSolver {
    rule: RecursionRule,
}

impl FixedPointSolver {
    pub fn new(rule: RecursionRule) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> RecursionRule {
        self.rule
    }

    /// One application of the update rule.
    #[inline]
    pub fn update(&self, x: f64) -> f64 {
        match self.rule {
            RecursionRule::Metallic { order } => f64::from(order) + 1.0 / x,
        }
    }

    /// Closed-form attracting fixed point of the rule.
    pub fn fixed_point(&self) -> f64 {
        match self.rule {
            RecursionRule::Metallic { order } => {
                let m = f64::from(order);
                0.5 * (m + (m * m + 4.0).sqrt())
            }
        }
    }

    /// |g(x) - x|; zero exactly at a fixed point.
    pub fn residual(&self, x: f64) -> f64 {
        (self.update(x) - x).abs()
    }

    /// Iterate from `seed` until successive iterates differ by less than
    /// `tolerance`.
    ///
    /// Never returns an unconverged value: exhausting `max_iterations`
    /// yields `DerivationError::Convergence` with the last iterate.
    ///
    /// Seeds must be finite and at least `MIN_SEED` (the smallest normal
    /// f64); subnormal seeds would overflow on the first `1/x`.
    pub fn solve(
        &self,
        seed: f64,
        max_iterations: usize,
        tolerance: f64,
    ) -> DerivationResult<Constant> {
        check_seed(seed)?;
        if max_iterations < 1 {
            return Err(DerivationError::Config(
                "max_iterations must be >= 1".to_string(),
            ));
        }
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(DerivationError::Config(format!(
                "tolerance must be finite and > 0, got {tolerance}"
            )));
        }
        let RecursionRule::Metallic { order } = self.rule;
        if order == 0 {
            return Err(DerivationError::Config(
                "metallic recursion order must be >= 1".to_string(),
            ));
        }

        let mut x = seed;
        for n in 1..=max_iterations {
            let next = self.update(x);
            if !next.is_finite() {
                return Err(DerivationError::Numerical(format!(
                    "iterate {n} is non-finite (previous {x})"
                )));
            }
            let step = (next - x).abs();
            x = next;
            if step < tolerance {
                log::debug!(
                    "fixed point {x} reached after {n} iterations (step {step:e}, rule {})",
                    self.rule
                );
                return Ok(Constant::fixed_point(x, self.rule, seed, step, n));
            }
        }

        Err(DerivationError::Convergence {
            last_iterate: x,
            iterations: max_iterations,
        })
    }
}
