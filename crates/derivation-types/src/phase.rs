// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Pipeline Phases
// ─────────────────────────────────────────────────────────────────────
//! Linear phase machine:
//!
//!   Void → BaseDerivation → ParameterExpansion → RelationBuilding
//!        → Aggregation → Complete
//!
//! No cycles, no skipping.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Void,
    BaseDerivation,
    ParameterExpansion,
    RelationBuilding,
    Aggregation,
    Complete,
}

impl Phase {
    /// The four phases that perform work, in execution order.
    pub const STAGES: [Phase; 4] = [
        Phase::BaseDerivation,
        Phase::ParameterExpansion,
        Phase::RelationBuilding,
        Phase::Aggregation,
    ];

    /// Successor phase; `None` once `Complete`.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Void => Some(Phase::BaseDerivation),
            Phase::BaseDerivation => Some(Phase::ParameterExpansion),
            Phase::ParameterExpansion => Some(Phase::RelationBuilding),
            Phase::RelationBuilding => Some(Phase::Aggregation),
            Phase::Aggregation => Some(Phase::Complete),
            Phase::Complete => None,
        }
    }

    /// True for the phases that produce a `StageResult`.
    pub fn is_stage(self) -> bool {
        Self::STAGES.contains(&self)
    }

    /// 1-based ordinal among working stages, 0 for `Void`/`Complete`.
    pub fn ordinal(self) -> usize {
        Self::STAGES
            .iter()
            .position(|&s| s == self)
            .map_or(0, |i| i + 1)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Void => "void",
            Phase::BaseDerivation => "base_derivation",
            Phase::ParameterExpansion => "parameter_expansion",
            Phase::RelationBuilding => "relation_building",
            Phase::Aggregation => "aggregation",
            Phase::Complete => "complete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_chain_reaches_complete() {
        let mut phase = Phase::Void;
        let mut visited = vec![phase];
        while let Some(next) = phase.next() {
            visited.push(next);
            phase = next;
        }
        assert_eq!(visited.len(), 6);
        assert_eq!(phase, Phase::Complete);
    }

    #[test]
    fn test_stage_ordinals() {
        assert_eq!(Phase::Void.ordinal(), 0);
        assert_eq!(Phase::BaseDerivation.ordinal(), 1);
        assert_eq!(Phase::Aggregation.ordinal(), 4);
        assert_eq!(Phase::Complete.ordinal(), 0);
        assert!(!Phase::Complete.is_stage());
    }
}
