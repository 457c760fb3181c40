// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Pipeline Orchestrator
// ─────────────────────────────────────────────────────────────────────
//! Four-stage derivation cycle:
//!   1. BaseDerivation      — fixed-point solve → "base"
//!   2. ParameterExpansion  — formula table over "base" → "{pos}:{name}"
//!   3. RelationBuilding    — relation matrix over "base" → "relation"
//!   4. Aggregation         — summary constants over 1–3
//!
//! Each stage reads only from the accumulated state. A stage either
//! appends exactly one `StageResult` (plus its provenance nodes) or
//! appends nothing and reports `PipelineStage { stage, cause }`; the
//! phase pointer never moves on failure. Nothing is retried here.

use derivation_numeric::{
    CancelToken, FixedPointSolver, ParameterDerivationTable, RelationMatrixBuilder,
};
use derivation_types::{
    Constant, DerivationError, DerivationResult, NodeId, NodeKind, PipelineConfig, Phase,
    StageValue,
};

use crate::audit::AuditEvent;
use crate::state::{PipelineState, ProducedValues, StageResult, BASE_KEY, RELATION_KEY};

/// Names of the constants emitted by the aggregation stage.
pub const AGGREGATE_KEYS: [&str; 5] = [
    "parameter_mean",
    "parameter_span",
    "relation_mean",
    "relation_max",
    "fixed_point_residual",
];

/// Drives one pipeline run at a time.
///
/// Not internally synchronised: share across threads only behind a lock.
/// Only the `CancelToken` is meant to be handed to other threads.
#[derive(Debug, Default)]
pub struct PipelineOrchestrator {
    config: Option<PipelineConfig>,
    state: PipelineState,
    clock: u64,
    cancel: CancelToken,
}

impl PipelineOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orchestrator with `config` loaded, ready for `step()`.
    pub fn with_config(config: PipelineConfig) -> DerivationResult<Self> {
        let mut orchestrator = Self::new();
        orchestrator.configure(config)?;
        Ok(orchestrator)
    }

    /// Validate and load `config`, discarding any current state.
    pub fn configure(&mut self, config: PipelineConfig) -> DerivationResult<()> {
        config.validate()?;
        self.reset();
        self.config = Some(config);
        Ok(())
    }

    pub fn config(&self) -> Option<&PipelineConfig> {
        self.config.as_ref()
    }

    /// Return to `Void` with an empty state. Snapshots handed out
    /// earlier are independent copies and are not affected.
    pub fn reset(&mut self) {
        self.state = PipelineState::default();
        self.clock = 0;
        self.cancel.reset();
        log::info!("pipeline reset");
    }

    /// Execute every remaining stage for `config` from a fresh state.
    pub fn run(&mut self, config: PipelineConfig) -> DerivationResult<PipelineState> {
        self.configure(config)?;
        while !self.state.is_complete() {
            self.step()?;
        }
        log::info!(
            "pipeline complete: {} stages, {} provenance nodes",
            self.state.stages.len(),
            self.state.provenance.len()
        );
        Ok(self.snapshot())
    }

    /// Advance exactly one stage and return the resulting snapshot.
    /// A no-op once the pipeline is `Complete`.
    pub fn step(&mut self) -> DerivationResult<PipelineState> {
        let config = self.config.clone().ok_or_else(|| {
            DerivationError::Config("no configuration loaded; call configure() or run()".into())
        })?;

        let stage = match self.state.current_phase.next() {
            Some(next) if next.is_stage() => next,
            _ => {
                log::debug!("step() on completed pipeline ignored");
                return Ok(self.snapshot());
            }
        };

        let started = self.tick();
        self.state
            .audit
            .record(started, stage, AuditEvent::Started, "");
        let graph_len = self.state.provenance.len();

        match self.execute(stage, &config) {
            Ok(produced) => {
                let timestamp = self.tick();
                let detail = format!("{} values", produced.len());
                self.state.stages.push(StageResult {
                    stage,
                    ordinal: stage.ordinal(),
                    produced,
                    timestamp,
                });
                self.state.current_phase = if stage == Phase::Aggregation {
                    Phase::Complete
                } else {
                    stage
                };
                self.state
                    .audit
                    .record(timestamp, stage, AuditEvent::Completed, detail);
                log::debug!("stage {stage} completed at t={timestamp}");
                Ok(self.snapshot())
            }
            Err(cause) => {
                self.state.provenance.truncate(graph_len);
                let event = if matches!(cause, DerivationError::Cancelled { .. }) {
                    AuditEvent::Cancelled
                } else {
                    AuditEvent::Failed
                };
                let at = self.tick();
                self.state.audit.record(at, stage, event, cause.to_string());
                log::warn!("stage {stage} failed: {cause}");
                Err(DerivationError::in_stage(stage, cause))
            }
        }
    }

    /// Frozen copy of the current state.
    pub fn snapshot(&self) -> PipelineState {
        self.state.clone()
    }

    /// Live read-only view of the current state.
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn current_phase(&self) -> Phase {
        self.state.current_phase
    }

    /// Token observed by the relation stage between matrix rows.
    /// Cleared by `reset()`, `configure()`, and `run()`.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn execute(&mut self, stage: Phase, config: &PipelineConfig) -> DerivationResult<ProducedValues> {
        match stage {
            Phase::BaseDerivation => self.derive_base(config),
            Phase::ParameterExpansion => self.expand_parameters(config),
            Phase::RelationBuilding => self.build_relations(config),
            Phase::Aggregation => self.aggregate(config),
            Phase::Void | Phase::Complete => Err(DerivationError::Config(format!(
                "{stage} is not an executable stage"
            ))),
        }
    }

    fn base(&self) -> DerivationResult<(Constant, NodeId)> {
        let base = self.state.base_constant().cloned().ok_or_else(|| {
            DerivationError::Numerical("base constant missing from pipeline state".into())
        })?;
        let node = self.state.provenance.find(BASE_KEY).ok_or_else(|| {
            DerivationError::Numerical("base constant missing from provenance graph".into())
        })?;
        Ok((base, node))
    }

    // ------------------------------------------------------------------
    // Stages
    // ------------------------------------------------------------------

    fn derive_base(&mut self, config: &PipelineConfig) -> DerivationResult<ProducedValues> {
        let constant = FixedPointSolver::new(config.rule).solve(
            config.seed,
            config.max_iterations,
            config.tolerance,
        )?;
        self.state
            .provenance
            .add(BASE_KEY, NodeKind::Constant, Phase::BaseDerivation, vec![])?;
        let mut produced = ProducedValues::new();
        produced.insert(BASE_KEY, StageValue::Constant(constant));
        Ok(produced)
    }

    fn expand_parameters(&mut self, config: &PipelineConfig) -> DerivationResult<ProducedValues> {
        let (base, base_node) = self.base()?;
        let entries = ParameterDerivationTable::derive(&base, &config.levels)?;
        let mut produced = ProducedValues::new();
        for (pos, entry) in entries.into_iter().enumerate() {
            let key = format!("{pos}:{}", entry.name);
            self.state.provenance.add(
                key.as_str(),
                NodeKind::Parameter,
                Phase::ParameterExpansion,
                vec![base_node],
            )?;
            produced.insert(key, StageValue::Parameter(entry));
        }
        Ok(produced)
    }

    fn build_relations(&mut self, config: &PipelineConfig) -> DerivationResult<ProducedValues> {
        let (base, base_node) = self.base()?;
        let matrix = RelationMatrixBuilder::new(config.relation).build_with_cancel(
            &base,
            &config.index_set,
            &self.cancel,
        )?;
        self.state.provenance.add(
            RELATION_KEY,
            NodeKind::Matrix,
            Phase::RelationBuilding,
            vec![base_node],
        )?;
        let mut produced = ProducedValues::new();
        produced.insert(RELATION_KEY, StageValue::Matrix(matrix));
        Ok(produced)
    }

    fn aggregate(&mut self, config: &PipelineConfig) -> DerivationResult<ProducedValues> {
        let (base, base_node) = self.base()?;

        let values: Vec<f64> = self.state.parameters().iter().map(|p| p.value).collect();
        if values.is_empty() {
            return Err(DerivationError::Numerical(
                "parameter table missing from pipeline state".into(),
            ));
        }
        let parameter_mean = values.iter().sum::<f64>() / values.len() as f64;
        let (lo, hi) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let parameter_span = hi - lo;

        let (relation_mean, relation_max) = {
            let matrix = self.state.relation_matrix().ok_or_else(|| {
                DerivationError::Numerical("relation matrix missing from pipeline state".into())
            })?;
            (matrix.off_diagonal_mean(), matrix.off_diagonal_max())
        };

        let residual = FixedPointSolver::new(config.rule).residual(base.value);

        let parameter_nodes: Vec<NodeId> = self
            .state
            .provenance
            .nodes()
            .iter()
            .filter(|n| n.kind == NodeKind::Parameter)
            .map(|n| n.id)
            .collect();
        let relation_node = self.state.provenance.find(RELATION_KEY).ok_or_else(|| {
            DerivationError::Numerical("relation matrix missing from provenance graph".into())
        })?;

        let outputs: [(f64, &str, Vec<NodeId>); 5] = [
            (parameter_mean, "mean of parameter values", parameter_nodes.clone()),
            (parameter_span, "max - min of parameter values", parameter_nodes),
            (relation_mean, "mean off-diagonal relation", vec![relation_node]),
            (relation_max, "max off-diagonal relation", vec![relation_node]),
            (residual, "|g(base) - base|", vec![base_node]),
        ];

        let mut produced = ProducedValues::new();
        for (key, (value, source, deps)) in AGGREGATE_KEYS.iter().zip(outputs) {
            if !value.is_finite() {
                return Err(DerivationError::Numerical(format!(
                    "aggregate {key} is non-finite"
                )));
            }
            self.state
                .provenance
                .add(*key, NodeKind::Constant, Phase::Aggregation, deps)?;
            produced.insert(*key, StageValue::Constant(Constant::aggregate(value, source)));
        }
        Ok(produced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use derivation_types::{Dependency, FormulaId, RecursionRule, RelationKind, SELF_RELATION};

    fn config() -> PipelineConfig {
        PipelineConfig::new(1.0, 200, 1e-12, vec![0, 1, 2], vec![1, 2, 3, 5, 8]).unwrap()
    }

    #[test]
    fn test_run_stage_order() {
        let mut orch = PipelineOrchestrator::new();
        let state = orch.run(config()).unwrap();
        assert_eq!(state.stage_phases(), Phase::STAGES.to_vec());
        assert_eq!(state.current_phase(), Phase::Complete);
        let ordinals: Vec<usize> = state.stages().iter().map(|s| s.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_stage_order_independent_of_config() {
        let configs = [
            config(),
            PipelineConfig::new(100.0, 200, 1e-9, vec![11, 5], vec![0])
                .unwrap()
                .with_relation(RelationKind::Coprimality),
            PipelineConfig::new(0.5, 200, 1e-12, vec![3], vec![9, 4, 2])
                .unwrap()
                .with_rule(RecursionRule::Metallic { order: 3 }),
        ];
        for cfg in configs {
            let state = PipelineOrchestrator::new().run(cfg).unwrap();
            assert_eq!(state.stage_phases(), Phase::STAGES.to_vec());
        }
    }

    #[test]
    fn test_run_deterministic() {
        let a = PipelineOrchestrator::new().run(config()).unwrap();
        let b = PipelineOrchestrator::new().run(config()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }

    #[test]
    fn test_timestamps_monotonic() {
        let state = PipelineOrchestrator::new().run(config()).unwrap();
        let ts: Vec<u64> = state.stages().iter().map(|s| s.timestamp).collect();
        assert!(ts.windows(2).all(|w| w[0] < w[1]), "{ts:?}");
    }

    #[test]
    fn test_produced_values() {
        let state = PipelineOrchestrator::new().run(config()).unwrap();
        let base = state.base_constant().unwrap().clone();
        assert!((base.value - 1.618_033_988_749_895).abs() < 1e-10);

        let params = state.parameters();
        assert_eq!(params.len(), 3);
        assert_eq!(params[2].formula_id, FormulaId::Square);
        assert_eq!(params[0].depends_on, vec![Dependency::Constant(base.clone())]);
        let keys: Vec<&str> = state
            .stage(Phase::ParameterExpansion)
            .unwrap()
            .produced
            .keys()
            .collect();
        assert_eq!(keys, vec!["0:identity", "1:reciprocal", "2:square"]);

        let matrix = state.relation_matrix().unwrap();
        assert_eq!(matrix.size(), 5);
        assert_eq!(matrix.cell(3, 3), SELF_RELATION);

        for key in AGGREGATE_KEYS {
            assert!(state.aggregate(key).is_some(), "missing aggregate {key}");
        }
        assert!(state.aggregate("fixed_point_residual").unwrap() < 1e-11);
        let mean = params.iter().map(|p| p.value).sum::<f64>() / 3.0;
        assert!((state.aggregate("parameter_mean").unwrap() - mean).abs() < 1e-15);
    }

    #[test]
    fn test_provenance_dag() {
        let state = PipelineOrchestrator::new().run(config()).unwrap();
        let g = state.provenance();
        // base + 3 parameters + relation + 5 aggregates
        assert_eq!(g.len(), 10);
        for node in g.nodes() {
            assert!(node.depends_on.iter().all(|&d| d < node.id));
        }
        let mean = g.find("parameter_mean").unwrap();
        assert_eq!(g.ancestors(mean), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_step_mode() {
        let mut orch = PipelineOrchestrator::with_config(config()).unwrap();
        assert_eq!(orch.current_phase(), Phase::Void);
        let expected = [
            Phase::BaseDerivation,
            Phase::ParameterExpansion,
            Phase::RelationBuilding,
            Phase::Complete,
        ];
        for (i, phase) in expected.iter().enumerate() {
            let partial = orch.step().unwrap();
            assert_eq!(partial.stages().len(), i + 1);
            assert_eq!(partial.current_phase(), *phase);
        }
        // Further steps are no-ops.
        let after = orch.step().unwrap();
        assert_eq!(after.stages().len(), 4);
        assert_eq!(after, orch.snapshot());
    }

    #[test]
    fn test_step_and_run_agree() {
        let mut stepped = PipelineOrchestrator::with_config(config()).unwrap();
        for _ in 0..4 {
            stepped.step().unwrap();
        }
        let ran = PipelineOrchestrator::new().run(config()).unwrap();
        assert_eq!(stepped.snapshot(), ran);
    }

    #[test]
    fn test_step_without_config() {
        let err = PipelineOrchestrator::new().step().unwrap_err();
        assert!(matches!(err, DerivationError::Config(_)));
    }

    #[test]
    fn test_negative_level_fails_in_expansion() {
        let cfg = PipelineConfig::new(1.0, 200, 1e-12, vec![-1], vec![1, 2]).unwrap();
        let err = PipelineOrchestrator::new().run(cfg.clone()).unwrap_err();
        match &err {
            DerivationError::PipelineStage { stage, cause } => {
                assert_eq!(*stage, Phase::ParameterExpansion);
                assert!(matches!(**cause, DerivationError::InvalidLevel { level: -1, .. }));
            }
            other => panic!("expected stage error, got {other:?}"),
        }

        let mut orch = PipelineOrchestrator::with_config(cfg).unwrap();
        orch.step().unwrap();
        assert!(orch.step().is_err());
        let partial = orch.snapshot();
        assert_eq!(partial.stage_phases(), vec![Phase::BaseDerivation]);
        assert_eq!(partial.current_phase(), Phase::BaseDerivation);
        assert_eq!(partial.provenance().len(), 1);
        assert_eq!(partial.audit().failures().count(), 1);
    }

    #[test]
    fn test_failed_run_leaves_partial_state() {
        let cfg = PipelineConfig::new(1.0, 200, 1e-12, vec![0], vec![3, 3]).unwrap();
        let mut orch = PipelineOrchestrator::new();
        let err = orch.run(cfg).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            DerivationError::DuplicateIndex { index: 3, .. }
        ));
        assert_eq!(
            orch.state().stage_phases(),
            vec![Phase::BaseDerivation, Phase::ParameterExpansion]
        );
        assert_eq!(orch.current_phase(), Phase::ParameterExpansion);
    }

    #[test]
    fn test_convergence_failure_in_base_stage() {
        let cfg = PipelineConfig::new(1.0, 2, 1e-15, vec![0], vec![1]).unwrap();
        let mut orch = PipelineOrchestrator::new();
        let err = orch.run(cfg).unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(
            err,
            DerivationError::PipelineStage {
                stage: Phase::BaseDerivation,
                ..
            }
        ));
        assert!(orch.state().stages().is_empty());
        assert_eq!(orch.current_phase(), Phase::Void);
    }

    #[test]
    fn test_invalid_config_rejected_before_stages() {
        let mut cfg = config();
        cfg.tolerance = -1.0;
        let mut orch = PipelineOrchestrator::new();
        assert!(matches!(orch.run(cfg), Err(DerivationError::Config(_))));
        assert!(orch.state().audit().is_empty());
    }

    #[test]
    fn test_reset_idempotence() {
        let mut orch = PipelineOrchestrator::new();
        let first = orch.run(config()).unwrap();
        orch.reset();
        assert_eq!(orch.current_phase(), Phase::Void);
        let again = orch.run(config()).unwrap();
        let fresh = PipelineOrchestrator::new().run(config()).unwrap();
        assert_eq!(again, fresh);
        assert_eq!(first, fresh);
    }

    #[test]
    fn test_reset_does_not_touch_snapshots() {
        let mut orch = PipelineOrchestrator::new();
        let snap = orch.run(config()).unwrap();
        orch.reset();
        assert_eq!(snap.stages().len(), 4);
        assert!(orch.state().stages().is_empty());
    }

    #[test]
    fn test_cancelled_relation_stage() {
        let mut orch = PipelineOrchestrator::with_config(config()).unwrap();
        orch.step().unwrap();
        orch.step().unwrap();
        orch.cancel_token().cancel();
        let err = orch.step().unwrap_err();
        assert!(matches!(err.root_cause(), DerivationError::Cancelled { .. }));
        assert_eq!(orch.current_phase(), Phase::ParameterExpansion);
        let last = orch.state().audit().last().unwrap();
        assert_eq!(last.event, AuditEvent::Cancelled);

        // Clearing the token lets the caller retry the same stage.
        orch.cancel_token().reset();
        orch.step().unwrap();
        assert_eq!(orch.current_phase(), Phase::RelationBuilding);
    }

    #[test]
    fn test_snapshot_json_round_trip() {
        let state = PipelineOrchestrator::new().run(config()).unwrap();
        let json = state.to_json().unwrap();
        assert!(json.contains("\"parameter_expansion\""));
        let back = PipelineState::from_json(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_snapshot_with_truncated_matrix_rejected() {
        let state = PipelineOrchestrator::new().run(config()).unwrap();
        let mut json: serde_json::Value = serde_json::from_str(&state.to_json().unwrap()).unwrap();
        let produced = json["stages"][2]["produced"].as_array_mut().unwrap();
        let relation = produced
            .iter_mut()
            .find(|e| e["key"] == RELATION_KEY)
            .unwrap();
        assert_eq!(relation["value"]["value"]["n"], 5);
        relation["value"]["value"]["cells"] = serde_json::json!([1.0]);

        let err = PipelineState::from_json(&json.to_string()).unwrap_err();
        assert!(matches!(err, DerivationError::Config(_)), "{err:?}");
        assert!(err.to_string().contains("snapshot parse error"), "{err}");
    }
}
