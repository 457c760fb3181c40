// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Parameter Derivation Table
// ─────────────────────────────────────────────────────────────────────
//! Closed table of scaling rules applied to a base constant:
//!
//!   value(k) = base ^ scaling_exponent(k) · structural_factor(k)
//!
//! | k  | formula           | exponent | factor   |
//! |----|-------------------|----------|----------|
//! | 0  | identity          |  1       | 1        |
//! | 1  | reciprocal        | −1       | 1        |
//! | 2  | square            |  2       | 1        |
//! | 3  | cube              |  3       | 1        |
//! | 4  | inverse_square    | −2       | 1        |
//! | 5  | square_root       |  1/2     | 1        |
//! | 6  | half_scaled       |  1       | 1/2      |
//! | 7  | tau_scaled        |  1       | 2π       |
//! | 8  | pi_over_base      | −1       | π        |
//! | 9  | fifth_power_fifth |  5       | 1/5      |
//! | 10 | spherical_fourth  |  4       | 1/(4π)   |
//! | 11 | decade_inverse    | −10      | 10       |
//!
//! Neither function looks at the base value, so the table is valid for
//! any positive base.

use std::f64::consts::{PI, TAU};

use derivation_types::{
    Constant, DerivationError, DerivationResult, Dependency, FormulaId, ParameterEntry,
    FORMULA_COUNT,
};

/// Exponent applied to the base for `formula`.
pub fn formula_exponent(formula: FormulaId) -> f64 {
    match formula {
        FormulaId::Identity => 1.0,
        FormulaId::Reciprocal => -1.0,
        FormulaId::Square => 2.0,
        FormulaId::Cube => 3.0,
        FormulaId::InverseSquare => -2.0,
        FormulaId::SquareRoot => 0.5,
        FormulaId::HalfScaled => 1.0,
        FormulaId::TauScaled => 1.0,
        FormulaId::PiOverBase => -1.0,
        FormulaId::FifthPowerFifth => 5.0,
        FormulaId::SphericalFourth => 4.0,
        FormulaId::DecadeInverse => -10.0,
    }
}

/// Constant multiplier for `formula`.
pub fn formula_factor(formula: FormulaId) -> f64 {
    match formula {
        FormulaId::Identity
        | FormulaId::Reciprocal
        | FormulaId::Square
        | FormulaId::Cube
        | FormulaId::InverseSquare
        | FormulaId::SquareRoot => 1.0,
        FormulaId::HalfScaled => 0.5,
        FormulaId::TauScaled => TAU,
        FormulaId::PiOverBase => PI,
        FormulaId::FifthPowerFifth => 0.2,
        FormulaId::SphericalFourth => 1.0 / (4.0 * PI),
        FormulaId::DecadeInverse => 10.0,
    }
}

/// `scaling_exponent(k)`; `None` outside the supported range.
pub fn scaling_exponent(level: i64) -> Option<f64> {
    FormulaId::from_level(level).map(formula_exponent)
}

/// `structural_factor(k)`; `None` outside the supported range.
pub fn structural_factor(level: i64) -> Option<f64> {
    FormulaId::from_level(level).map(formula_factor)
}

fn resolve_level(level: i64) -> DerivationResult<FormulaId> {
    if level < 0 {
        return Err(DerivationError::InvalidLevel {
            level,
            reason: "level must be non-negative".to_string(),
        });
    }
    FormulaId::from_level(level).ok_or_else(|| DerivationError::InvalidLevel {
        level,
        reason: format!("no formula for level (supported 0..={})", FORMULA_COUNT - 1),
    })
}

/// Expands a base constant into named parameters.
pub struct ParameterDerivationTable;

impl ParameterDerivationTable {
    /// One entry per level, in the order given, each depending only on
    /// `base`. All levels are checked before anything is computed, so a
    /// bad level never leaves a partial table behind.
    pub fn derive(base: &Constant, levels: &[i64]) -> DerivationResult<Vec<ParameterEntry>> {
        if levels.is_empty() {
            return Err(DerivationError::Config(
                "levels must not be empty".to_string(),
            ));
        }
        let formulas = levels
            .iter()
            .map(|&level| resolve_level(level))
            .collect::<DerivationResult<Vec<_>>>()?;

        let mut entries = Vec::with_capacity(levels.len());
        for (&level, formula) in levels.iter().zip(formulas) {
            let value = base.value.powf(formula_exponent(formula)) * formula_factor(formula);
            if !value.is_finite() {
                return Err(DerivationError::Numerical(format!(
                    "{formula} of base {} is non-finite",
                    base.value
                )));
            }
            entries.push(ParameterEntry {
                name: formula.name().to_string(),
                formula_id: formula,
                level,
                value,
                depends_on: vec![Dependency::Constant(base.clone())],
            });
        }
        log::debug!("derived {} parameters from base {}", entries.len(), base.value);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use derivation_types::RecursionRule;

    const PHI: f64 = 1.618_033_988_749_895;

    fn phi_constant() -> Constant {
        Constant::fixed_point(PHI, RecursionRule::default(), 1.0, 1e-13, 30)
    }

    #[test]
    fn test_three_levels_in_order() {
        let base = phi_constant();
        let entries = ParameterDerivationTable::derive(&base, &[0, 1, 2]).unwrap();
        assert_eq!(entries.len(), 3);
        let ids: Vec<FormulaId> = entries.iter().map(|e| e.formula_id).collect();
        assert_eq!(ids, vec![FormulaId::Identity, FormulaId::Reciprocal, FormulaId::Square]);
        for e in &entries {
            assert_eq!(e.depends_on, vec![Dependency::Constant(base.clone())]);
        }
    }

    #[test]
    fn test_golden_identities() {
        let base = phi_constant();
        let e = ParameterDerivationTable::derive(&base, &[0, 1, 2]).unwrap();
        // φ² = φ + 1, 1/φ = φ − 1
        assert!((e[2].value - (e[0].value + 1.0)).abs() < 1e-12);
        assert!((e[1].value - (e[0].value - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_order_follows_levels_with_duplicates() {
        let base = phi_constant();
        let e = ParameterDerivationTable::derive(&base, &[7, 0, 7]).unwrap();
        assert_eq!(e.len(), 3);
        assert_eq!(e[0].formula_id, FormulaId::TauScaled);
        assert_eq!(e[1].formula_id, FormulaId::Identity);
        assert_eq!(e[0].value, e[2].value);
        assert!((e[0].value - TAU * PHI).abs() < 1e-12);
    }

    #[test]
    fn test_negative_level_aborts_whole_call() {
        let err = ParameterDerivationTable::derive(&phi_constant(), &[0, 1, -1]).unwrap_err();
        assert!(matches!(err, DerivationError::InvalidLevel { level: -1, .. }));
    }

    #[test]
    fn test_out_of_range_level() {
        let err = ParameterDerivationTable::derive(&phi_constant(), &[12]).unwrap_err();
        assert!(matches!(err, DerivationError::InvalidLevel { level: 12, .. }));
    }

    #[test]
    fn test_empty_levels() {
        let err = ParameterDerivationTable::derive(&phi_constant(), &[]).unwrap_err();
        assert_eq!(err, DerivationError::Config("levels must not be empty".to_string()));
    }

    #[test]
    fn test_totality_over_supported_range() {
        for k in 0..FORMULA_COUNT as i64 {
            assert!(scaling_exponent(k).is_some());
            assert!(structural_factor(k).is_some());
        }
        assert!(scaling_exponent(-1).is_none());
        assert!(structural_factor(FORMULA_COUNT as i64).is_none());
    }

    #[test]
    fn test_full_table_for_non_phi_base() {
        let base = Constant::aggregate(2.0, "test");
        let levels: Vec<i64> = (0..FORMULA_COUNT as i64).collect();
        let e = ParameterDerivationTable::derive(&base, &levels).unwrap();
        assert_eq!(e.len(), FORMULA_COUNT);
        assert!((e[3].value - 8.0).abs() < 1e-12);
        assert!((e[9].value - 6.4).abs() < 1e-12);
        assert!((e[11].value - 10.0 / 1024.0).abs() < 1e-15);
    }

    #[test]
    fn test_overflow_is_numerical_error() {
        let base = Constant::aggregate(1e100, "huge");
        let err = ParameterDerivationTable::derive(&base, &[3, 9]).unwrap_err();
        assert!(matches!(err, DerivationError::Numerical(_)));
    }
}
