// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Derivation Kernel Core Engine
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Staged derivation pipeline: fixed-point base constant → parameter
//! table → relation matrix → aggregate snapshot.
//!
//! # Invariants
//!
//! 1. **Fixed stage order**: completed stages are always a prefix of
//!    `[BaseDerivation, ParameterExpansion, RelationBuilding, Aggregation]`.
//!
//! 2. **Atomic transitions**: a failed stage leaves no `StageResult` and
//!    no provenance node behind; the phase pointer stays where it was.
//!
//! 3. **Deterministic snapshots**: no wall clock, no randomness, no
//!    global state. Identical configs give equal snapshots and identical
//!    JSON.
//!
//! 4. **Snapshots are copies**: `reset()` and later stages never alter a
//!    `PipelineState` already returned to a caller.

pub mod audit;
pub mod orchestrator;
pub mod state;

pub use audit::{AuditEntry, AuditEvent, AuditLog};
pub use orchestrator::{PipelineOrchestrator, AGGREGATE_KEYS};
pub use state::{NamedValue, PipelineState, ProducedValues, StageResult, BASE_KEY, RELATION_KEY};
