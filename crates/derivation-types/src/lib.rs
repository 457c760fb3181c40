// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Derivation Kernel Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Value types, configuration, provenance graph, and error hierarchy
//! for the staged derivation kernel.

pub mod config;
pub mod error;
pub mod phase;
pub mod provenance;
pub mod rules;
pub mod value;

pub use config::{check_seed, PipelineConfig, MIN_SEED};
pub use error::{DerivationError, DerivationResult};
pub use phase::Phase;
pub use provenance::{NodeId, NodeKind, ProvenanceGraph, ProvenanceNode};
pub use rules::{FormulaId, RecursionRule, RelationKind, FORMULA_COUNT};
pub use value::{
    precision_digits, Constant, Dependency, ParameterEntry, Provenance, RelationMatrix,
    StageValue, MAX_PRECISION_DIGITS, SELF_RELATION,
};
