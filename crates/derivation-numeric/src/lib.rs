// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Derivation Numerics
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Numeric building blocks of the derivation pipeline: fixed-point
//! solver, parameter derivation table, and relation matrix builder.
//!
//! Everything here is a pure function of its inputs. No global state,
//! no randomness, no I/O.

pub mod cancel;
pub mod relation;
pub mod solver;
pub mod table;

pub use cancel::CancelToken;
pub use relation::{gcd, relation, RelationMatrixBuilder, PARALLEL_THRESHOLD};
pub use solver::FixedPointSolver;
pub use table::{
    formula_exponent, formula_factor, scaling_exponent, structural_factor,
    ParameterDerivationTable,
};
