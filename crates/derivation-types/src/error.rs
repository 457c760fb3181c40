// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Derivation Kernel Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

use crate::phase::Phase;

/// Root error type for all derivation kernel failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DerivationError {
    /// Fixed-point recursion exhausted its iteration budget.
    #[error(
        "convergence error: no fixed point within {iterations} iterations (last iterate {last_iterate})"
    )]
    Convergence { last_iterate: f64, iterations: usize },

    /// A parameter level is negative or outside the formula table.
    #[error("invalid level {level}: {reason}")]
    InvalidLevel { level: i64, reason: String },

    /// The relation index set repeats a value.
    #[error("duplicate index {index} at positions {first} and {second}")]
    DuplicateIndex {
        index: u64,
        first: usize,
        second: usize,
    },

    /// The relation index set is empty.
    #[error("index set must contain at least one entry")]
    EmptyIndex,

    /// Cooperative cancellation observed between matrix rows.
    #[error("cancelled after {completed_rows}/{total_rows} rows")]
    Cancelled {
        completed_rows: usize,
        total_rows: usize,
    },

    /// A provenance node named a dependency that does not exist yet.
    #[error("forward reference: node {node} depends on {dependency}")]
    ForwardReference { node: usize, dependency: usize },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Numerical error (NaN/Inf in computation).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// A component error surfaced through a pipeline stage.
    #[error("stage {stage} failed: {cause}")]
    PipelineStage {
        stage: Phase,
        #[source]
        cause: Box<DerivationError>,
    },
}

impl DerivationError {
    /// Wrap a component error with the stage it occurred in.
    pub fn in_stage(stage: Phase, cause: DerivationError) -> Self {
        Self::PipelineStage {
            stage,
            cause: Box::new(cause),
        }
    }

    /// Innermost error, unwrapping any stage context.
    pub fn root_cause(&self) -> &DerivationError {
        match self {
            Self::PipelineStage { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Whether re-running with a larger budget (or without cancelling)
    /// could succeed. Configuration mistakes are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::Convergence { .. } | Self::Cancelled { .. }
        )
    }
}

pub type DerivationResult<T> = Result<T, DerivationError>;
