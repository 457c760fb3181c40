// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Derivation Pipeline Configuration
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{DerivationError, DerivationResult};
use crate::rules::{RecursionRule, RelationKind};

/// Smallest accepted seed. Below it `1/seed` overflows f64.
pub const MIN_SEED: f64 = f64::MIN_POSITIVE;

/// Inputs for one pipeline run.
///
/// Negative levels and duplicate indices pass validation on purpose:
/// they are reported by the stage that consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Starting iterate for the fixed-point solver. Must be finite and
    /// >= `MIN_SEED`.
    pub seed: f64,

    /// Solver iteration budget. Must be >= 1.
    pub max_iterations: usize,

    /// Convergence threshold on |x_{n+1} - x_n|. Must be > 0.
    pub tolerance: f64,

    /// Formula levels for the parameter table, evaluated in order.
    pub levels: Vec<i64>,

    /// Indices spanning the relation matrix.
    pub index_set: Vec<u64>,

    /// Fixed-point update rule.
    #[serde(default)]
    pub rule: RecursionRule,

    /// Pairwise relation used for matrix cells.
    #[serde(default)]
    pub relation: RelationKind,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: 1.0,
            max_iterations: 200,
            tolerance: 1e-12,
            levels: vec![0, 1, 2],
            index_set: vec![1, 2, 3, 5, 8],
            rule: RecursionRule::default(),
            relation: RelationKind::default(),
        }
    }
}

impl PipelineConfig {
    /// Build and validate a configuration with the default rule and relation.
    pub fn new(
        seed: f64,
        max_iterations: usize,
        tolerance: f64,
        levels: Vec<i64>,
        index_set: Vec<u64>,
    ) -> DerivationResult<Self> {
        let config = Self {
            seed,
            max_iterations,
            tolerance,
            levels,
            index_set,
            rule: RecursionRule::default(),
            relation: RelationKind::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_rule(mut self, rule: RecursionRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn with_relation(mut self, relation: RelationKind) -> Self {
        self.relation = relation;
        self
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> DerivationResult<()> {
        check_seed(self.seed)?;
        if self.max_iterations < 1 {
            return Err(DerivationError::Config(format!(
                "max_iterations must be >= 1, got {}",
                self.max_iterations
            )));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(DerivationError::Config(format!(
                "tolerance must be finite and > 0, got {}",
                self.tolerance
            )));
        }
        if self.levels.is_empty() {
            return Err(DerivationError::Config(
                "levels must not be empty".to_string(),
            ));
        }
        if self.index_set.is_empty() {
            return Err(DerivationError::Config(
                "index_set must not be empty".to_string(),
            ));
        }
        match self.rule {
            RecursionRule::Metallic { order: 0 } => {
                return Err(DerivationError::Config(
                    "metallic recursion order must be >= 1".to_string(),
                ));
            }
            RecursionRule::Metallic { .. } => {}
        }
        Ok(())
    }

    /// Load from JSON string and validate.
    pub fn from_json(json: &str) -> DerivationResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DerivationError::Config(format!("JSON parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> DerivationResult<String> {
        serde_json::to_string(self)
            .map_err(|e| DerivationError::Config(format!("JSON encode error: {e}")))
    }
}

/// Seed domain check shared by config validation and the solver.
pub fn check_seed(seed: f64) -> DerivationResult<()> {
    if !seed.is_finite() || seed < MIN_SEED {
        return Err(DerivationError::Config(format!(
            "seed must be finite and >= {MIN_SEED:e}, got {seed:e}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_negative_tolerance() {
        let err = PipelineConfig::new(1.0, 100, -1e-9, vec![0], vec![1]).unwrap_err();
        assert!(err.to_string().contains("tolerance"), "{err}");
    }

    #[test]
    fn test_rejects_zero_seed_and_nan_seed() {
        assert!(PipelineConfig::new(0.0, 100, 1e-9, vec![0], vec![1]).is_err());
        assert!(PipelineConfig::new(f64::NAN, 100, 1e-9, vec![0], vec![1]).is_err());
    }

    #[test]
    fn test_rejects_subnormal_seed() {
        let err = PipelineConfig::new(1e-310, 100, 1e-9, vec![0], vec![1]).unwrap_err();
        assert!(matches!(err, DerivationError::Config(_)));
        assert!(err.to_string().contains("seed"), "{err}");
        assert!(PipelineConfig::new(MIN_SEED, 100, 1e-9, vec![0], vec![1]).is_ok());
    }

    #[test]
    fn test_rejects_zero_iterations() {
        assert!(PipelineConfig::new(1.0, 0, 1e-9, vec![0], vec![1]).is_err());
    }

    #[test]
    fn test_rejects_empty_levels_and_index_set() {
        let levels = PipelineConfig::new(1.0, 10, 1e-9, vec![], vec![1]).unwrap_err();
        assert!(levels.to_string().contains("levels"));
        let index = PipelineConfig::new(1.0, 10, 1e-9, vec![0], vec![]).unwrap_err();
        assert!(index.to_string().contains("index_set"));
    }

    #[test]
    fn test_negative_level_passes_validation() {
        assert!(PipelineConfig::new(1.0, 10, 1e-9, vec![-1], vec![1]).is_ok());
    }

    #[test]
    fn test_rejects_order_zero_rule() {
        let config = PipelineConfig::default().with_rule(RecursionRule::Metallic { order: 0 });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_defaults_rule_and_relation() {
        let json = r#"{"seed":2.0,"max_iterations":50,"tolerance":1e-10,"levels":[0,3],"index_set":[2,4]}"#;
        let config = PipelineConfig::from_json(json).unwrap();
        assert_eq!(config.rule, RecursionRule::Metallic { order: 1 });
        assert_eq!(config.relation, RelationKind::GcdAffinity);
        assert_eq!(config.levels, vec![0, 3]);
    }

    #[test]
    fn test_from_json_missing_field() {
        let err = PipelineConfig::from_json(r#"{"seed":2.0}"#).unwrap_err();
        assert!(err.to_string().contains("JSON parse error"), "{err}");
    }

    #[test]
    fn test_from_json_validates() {
        let json = r#"{"seed":-2.0,"max_iterations":50,"tolerance":1e-10,"levels":[0],"index_set":[2]}"#;
        assert!(PipelineConfig::from_json(json).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = PipelineConfig::default().with_relation(RelationKind::Coprimality);
        let back = PipelineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
