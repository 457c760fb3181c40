// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Pipeline State
// ─────────────────────────────────────────────────────────────────────
//! Append-only record of completed stages plus the current phase.
//!
//! Callers only ever see clones of this struct; the live copy stays
//! inside `PipelineOrchestrator`.

use serde::{Deserialize, Serialize};

use derivation_types::{
    Constant, DerivationError, DerivationResult, ParameterEntry, Phase, ProvenanceGraph,
    RelationMatrix, StageValue,
};

use crate::audit::AuditLog;

/// Key under which the base-derivation stage stores its constant.
pub const BASE_KEY: &str = "base";
/// Key under which the relation stage stores its matrix.
pub const RELATION_KEY: &str = "relation";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedValue {
    pub key: String,
    pub value: StageValue,
}

/// Insertion-ordered map of stage outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProducedValues {
    entries: Vec<NamedValue>,
}

impl ProducedValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the previous value under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: StageValue) -> Option<StageValue> {
        let key = key.into();
        if let Some(existing) = self.entries.iter_mut().find(|e| e.key == key) {
            return Some(std::mem::replace(&mut existing.value, value));
        }
        self.entries.push(NamedValue { key, value });
        None
    }

    pub fn get(&self, key: &str) -> Option<&StageValue> {
        self.entries.iter().find(|e| e.key == key).map(|e| &e.value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StageValue)> {
        self.entries.iter().map(|e| (e.key.as_str(), &e.value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Output of one completed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: Phase,
    /// 1-based position in the stage order.
    pub ordinal: usize,
    pub produced: ProducedValues,
    /// Logical clock reading at completion.
    pub timestamp: u64,
}

impl StageResult {
    pub fn stage_name(&self) -> &'static str {
        self.stage.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub(crate) stages: Vec<StageResult>,
    pub(crate) current_phase: Phase,
    pub(crate) provenance: ProvenanceGraph,
    pub(crate) audit: AuditLog,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            stages: Vec::new(),
            current_phase: Phase::Void,
            provenance: ProvenanceGraph::new(),
            audit: AuditLog::new(),
        }
    }
}

impl PipelineState {
    pub fn stages(&self) -> &[StageResult] {
        &self.stages
    }

    /// Phases of the completed stages, in order.
    pub fn stage_phases(&self) -> Vec<Phase> {
        self.stages.iter().map(|s| s.stage).collect()
    }

    pub fn current_phase(&self) -> Phase {
        self.current_phase
    }

    pub fn is_complete(&self) -> bool {
        self.current_phase == Phase::Complete
    }

    pub fn provenance(&self) -> &ProvenanceGraph {
        &self.provenance
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn stage(&self, phase: Phase) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage == phase)
    }

    /// Value produced by `phase` under `key`.
    pub fn lookup(&self, phase: Phase, key: &str) -> Option<&StageValue> {
        self.stage(phase).and_then(|s| s.produced.get(key))
    }

    pub fn base_constant(&self) -> Option<&Constant> {
        self.lookup(Phase::BaseDerivation, BASE_KEY)
            .and_then(StageValue::as_constant)
    }

    /// Parameter table in derivation order (empty before expansion).
    pub fn parameters(&self) -> Vec<&ParameterEntry> {
        self.stage(Phase::ParameterExpansion)
            .map(|s| {
                s.produced
                    .iter()
                    .filter_map(|(_, v)| v.as_parameter())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn relation_matrix(&self) -> Option<&RelationMatrix> {
        self.lookup(Phase::RelationBuilding, RELATION_KEY)
            .and_then(StageValue::as_matrix)
    }

    /// Aggregate statistic by name, once aggregation has run.
    pub fn aggregate(&self, name: &str) -> Option<f64> {
        self.lookup(Phase::Aggregation, name)
            .and_then(StageValue::as_constant)
            .map(|c| c.value)
    }

    pub fn to_json(&self) -> DerivationResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DerivationError::Numerical(format!("snapshot encode error: {e}")))
    }

    pub fn from_json(json: &str) -> DerivationResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| DerivationError::Config(format!("snapshot parse error: {e}")))
    }
}
