// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Closed Formula Sets
// ─────────────────────────────────────────────────────────────────────
//! Identifiers for every rule the kernel evaluates. Each set is closed:
//! adding a variant means adding a match arm in `derivation-numeric`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed-point update rule `x ← g(x)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecursionRule {
    /// `x ← m + 1/x`; fixed point `(m + √(m² + 4)) / 2`.
    /// Order 1 gives the golden ratio, order 2 the silver ratio.
    Metallic { order: u32 },
}

impl Default for RecursionRule {
    fn default() -> Self {
        RecursionRule::Metallic { order: 1 }
    }
}

impl fmt::Display for RecursionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecursionRule::Metallic { order } => write!(f, "metallic({order}) x <- {order} + 1/x"),
        }
    }
}

/// Number of entries in the parameter formula table.
pub const FORMULA_COUNT: usize = 12;

/// Derived-parameter formula selected by an integer level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaId {
    Identity,
    Reciprocal,
    Square,
    Cube,
    InverseSquare,
    SquareRoot,
    HalfScaled,
    TauScaled,
    PiOverBase,
    FifthPowerFifth,
    SphericalFourth,
    DecadeInverse,
}

impl FormulaId {
    /// All formulas, indexed by level.
    pub const ALL: [FormulaId; FORMULA_COUNT] = [
        FormulaId::Identity,
        FormulaId::Reciprocal,
        FormulaId::Square,
        FormulaId::Cube,
        FormulaId::InverseSquare,
        FormulaId::SquareRoot,
        FormulaId::HalfScaled,
        FormulaId::TauScaled,
        FormulaId::PiOverBase,
        FormulaId::FifthPowerFifth,
        FormulaId::SphericalFourth,
        FormulaId::DecadeInverse,
    ];

    /// Formula for `level`, or `None` when negative or past the table.
    pub fn from_level(level: i64) -> Option<FormulaId> {
        usize::try_from(level)
            .ok()
            .and_then(|k| Self::ALL.get(k).copied())
    }

    pub fn level(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            FormulaId::Identity => "identity",
            FormulaId::Reciprocal => "reciprocal",
            FormulaId::Square => "square",
            FormulaId::Cube => "cube",
            FormulaId::InverseSquare => "inverse_square",
            FormulaId::SquareRoot => "square_root",
            FormulaId::HalfScaled => "half_scaled",
            FormulaId::TauScaled => "tau_scaled",
            FormulaId::PiOverBase => "pi_over_base",
            FormulaId::FifthPowerFifth => "fifth_power_fifth",
            FormulaId::SphericalFourth => "spherical_fourth",
            FormulaId::DecadeInverse => "decade_inverse",
        }
    }
}

impl fmt::Display for FormulaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pairwise relation `relation(a, b, c)`, symmetric in `a` and `b`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// `gcd(a+1, b+1) / lcm(a+1, b+1) · c^(−|a−b|)`
    #[default]
    GcdAffinity,
    /// `c^(−|a−b|)`
    HarmonicDecay,
    /// `1` when `a+1` and `b+1` are coprime, `1/c` otherwise.
    Coprimality,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelationKind::GcdAffinity => "gcd_affinity",
            RelationKind::HarmonicDecay => "harmonic_decay",
            RelationKind::Coprimality => "coprimality",
        })
    }
}
