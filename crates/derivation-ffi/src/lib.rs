// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Derivation Kernel PyO3 FFI Bindings
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
// Note: #[deny(unsafe_code)] not applied — PyO3 proc macros generate
// unsafe blocks internally. All hand-written code in this crate is safe.
//! Python-callable wrappers around the derivation pipeline, for the
//! report and visualisation layers that consume its snapshots.
//!
//! # FFI Safety
//!
//! - Long runs release the GIL (`allow_threads`), so another Python
//!   thread can call `cancel()` while `run()` is in flight.
//! - The orchestrator sits behind a `parking_lot::Mutex`; Python never
//!   holds a reference into live pipeline state, only snapshot copies.
//! - Config errors map to `ValueError`, numeric failures to `RuntimeError`.
//!
//! Install: `pip install -e crates/derivation-ffi` (requires maturin,
//! build with `--features extension-module`).
//!
//! Usage from Python:
//! ```python
//! from derivation_kernel import PipelineConfig, PipelineOrchestrator
//!
//! cfg = PipelineConfig(seed=1.0, max_iterations=200, tolerance=1e-12,
//!                      levels=[0, 1, 2], index_set=[1, 2, 3, 5, 8])
//! state = PipelineOrchestrator().run(cfg)
//! print(state.stage_names, state.aggregate("relation_mean"))
//! ```

use parking_lot::Mutex;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use derivation_core::{PipelineOrchestrator, PipelineState};
use derivation_numeric::{
    CancelToken, FixedPointSolver, ParameterDerivationTable, RelationMatrixBuilder,
};
use derivation_types::{
    Constant, DerivationError, PipelineConfig, RecursionRule, RelationKind,
};

fn to_py_err(err: DerivationError) -> PyErr {
    match err.root_cause() {
        DerivationError::Config(_)
        | DerivationError::InvalidLevel { .. }
        | DerivationError::DuplicateIndex { .. }
        | DerivationError::EmptyIndex => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

fn parse_relation(name: &str) -> PyResult<RelationKind> {
    match name {
        "gcd_affinity" => Ok(RelationKind::GcdAffinity),
        "harmonic_decay" => Ok(RelationKind::HarmonicDecay),
        "coprimality" => Ok(RelationKind::Coprimality),
        _ => Err(PyValueError::new_err(format!(
            "Unknown relation: {name}. Use 'gcd_affinity', 'harmonic_decay', or 'coprimality'"
        ))),
    }
}

// ─── PyPipelineConfig ───────────────────────────────────────────────

/// Python-visible pipeline configuration.
#[pyclass(name = "PipelineConfig")]
#[derive(Clone)]
struct PyPipelineConfig {
    inner: PipelineConfig,
}

#[pymethods]
impl PyPipelineConfig {
    #[new]
    #[pyo3(signature = (
        seed = 1.0,
        max_iterations = 200,
        tolerance = 1e-12,
        levels = vec![0, 1, 2],
        index_set = vec![1, 2, 3, 5, 8],
        metallic_order = 1,
        relation = "gcd_affinity",
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        seed: f64,
        max_iterations: usize,
        tolerance: f64,
        levels: Vec<i64>,
        index_set: Vec<u64>,
        metallic_order: u32,
        relation: &str,
    ) -> PyResult<Self> {
        let config = PipelineConfig {
            seed,
            max_iterations,
            tolerance,
            levels,
            index_set,
            rule: RecursionRule::Metallic {
                order: metallic_order,
            },
            relation: parse_relation(relation)?,
        };
        config.validate().map_err(to_py_err)?;
        Ok(Self { inner: config })
    }

    /// Construct from JSON string.
    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let config = PipelineConfig::from_json(json).map_err(to_py_err)?;
        Ok(Self { inner: config })
    }

    fn to_json(&self) -> PyResult<String> {
        self.inner.to_json().map_err(to_py_err)
    }

    #[getter]
    fn levels(&self) -> Vec<i64> {
        self.inner.levels.clone()
    }

    #[getter]
    fn index_set(&self) -> Vec<u64> {
        self.inner.index_set.clone()
    }

    fn __repr__(&self) -> String {
        format!(
            "PipelineConfig(seed={}, max_iterations={}, tolerance={:e}, levels={:?}, index_set={:?})",
            self.inner.seed,
            self.inner.max_iterations,
            self.inner.tolerance,
            self.inner.levels,
            self.inner.index_set,
        )
    }
}

// ─── PyPipelineState ────────────────────────────────────────────────

/// Frozen pipeline snapshot.
#[pyclass(name = "PipelineState")]
#[derive(Clone)]
struct PyPipelineState {
    inner: PipelineState,
}

#[pymethods]
impl PyPipelineState {
    #[getter]
    fn phase(&self) -> &'static str {
        self.inner.current_phase().as_str()
    }

    #[getter]
    fn stage_names(&self) -> Vec<&'static str> {
        self.inner.stages().iter().map(|s| s.stage_name()).collect()
    }

    #[getter]
    fn is_complete(&self) -> bool {
        self.inner.is_complete()
    }

    #[getter]
    fn base_value(&self) -> Option<f64> {
        self.inner.base_constant().map(|c| c.value)
    }

    /// `[(name, level, value), ...]` in derivation order.
    #[getter]
    fn parameters(&self) -> Vec<(String, i64, f64)> {
        self.inner
            .parameters()
            .iter()
            .map(|p| (p.name.clone(), p.level, p.value))
            .collect()
    }

    /// Relation matrix as nested lists, or None before that stage.
    #[getter]
    fn relation_matrix(&self) -> Option<Vec<Vec<f64>>> {
        self.inner
            .relation_matrix()
            .map(|m| (0..m.size()).map(|i| m.row(i).to_vec()).collect())
    }

    fn aggregate(&self, name: &str) -> Option<f64> {
        self.inner.aggregate(name)
    }

    fn audit<'py>(&self, py: Python<'py>) -> PyResult<Vec<Bound<'py, PyDict>>> {
        self.inner
            .audit()
            .entries()
            .iter()
            .map(|e| {
                let dict = PyDict::new(py);
                dict.set_item("sequence", e.sequence)?;
                dict.set_item("stage", e.stage.as_str())?;
                dict.set_item("event", format!("{:?}", e.event).to_lowercase())?;
                dict.set_item("detail", e.detail.as_str())?;
                Ok(dict)
            })
            .collect()
    }

    fn to_json(&self) -> PyResult<String> {
        self.inner.to_json().map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        format!(
            "PipelineState(phase={}, stages={})",
            self.inner.current_phase(),
            self.inner.stages().len()
        )
    }
}

// ─── PyPipelineOrchestrator ─────────────────────────────────────────

/// Staged pipeline driver exposed to Python.
#[pyclass(name = "PipelineOrchestrator")]
struct PyPipelineOrchestrator {
    inner: Mutex<PipelineOrchestrator>,
    cancel: CancelToken,
}

#[pymethods]
impl PyPipelineOrchestrator {
    #[new]
    #[pyo3(signature = (config = None))]
    fn new(config: Option<PyPipelineConfig>) -> PyResult<Self> {
        let orchestrator = match config {
            Some(cfg) => PipelineOrchestrator::with_config(cfg.inner).map_err(to_py_err)?,
            None => PipelineOrchestrator::new(),
        };
        let cancel = orchestrator.cancel_token();
        Ok(Self {
            inner: Mutex::new(orchestrator),
            cancel,
        })
    }

    /// Run all stages from scratch. Releases the GIL while running.
    fn run(&self, py: Python<'_>, config: PyPipelineConfig) -> PyResult<PyPipelineState> {
        let result = py.allow_threads(|| self.inner.lock().run(config.inner));
        result
            .map(|inner| PyPipelineState { inner })
            .map_err(to_py_err)
    }

    /// Advance one stage and return the partial snapshot.
    fn step(&self, py: Python<'_>) -> PyResult<PyPipelineState> {
        let result = py.allow_threads(|| self.inner.lock().step());
        result
            .map(|inner| PyPipelineState { inner })
            .map_err(to_py_err)
    }

    fn reset(&self) {
        self.inner.lock().reset();
    }

    /// Request cancellation of the relation stage in flight.
    fn cancel(&self) {
        self.cancel.cancel();
    }

    fn snapshot(&self) -> PyPipelineState {
        PyPipelineState {
            inner: self.inner.lock().snapshot(),
        }
    }

    #[getter]
    fn phase(&self) -> &'static str {
        self.inner.lock().current_phase().as_str()
    }
}

// ─── Stand-alone components ─────────────────────────────────────────

/// Solve `x <- m + 1/x` from `seed`; returns `(value, precision, iterations)`.
#[pyfunction]
#[pyo3(signature = (seed, max_iterations = 200, tolerance = 1e-12, metallic_order = 1))]
fn solve_fixed_point(
    seed: f64,
    max_iterations: usize,
    tolerance: f64,
    metallic_order: u32,
) -> PyResult<(f64, f64, usize)> {
    let solver = FixedPointSolver::new(RecursionRule::Metallic {
        order: metallic_order,
    });
    let c = solver
        .solve(seed, max_iterations, tolerance)
        .map_err(to_py_err)?;
    Ok((c.value, c.precision, c.iterations))
}

/// Evaluate the parameter table for `base`; returns `[(name, value), ...]`.
#[pyfunction]
fn derive_parameters(base: f64, levels: Vec<i64>) -> PyResult<Vec<(String, f64)>> {
    let base = Constant::aggregate(base, "python");
    let entries = ParameterDerivationTable::derive(&base, &levels).map_err(to_py_err)?;
    Ok(entries.into_iter().map(|e| (e.name, e.value)).collect())
}

/// Build a relation matrix over `index_set`; returns nested lists.
#[pyfunction]
#[pyo3(signature = (base, index_set, relation = "gcd_affinity"))]
fn build_relation_matrix(
    py: Python<'_>,
    base: f64,
    index_set: Vec<u64>,
    relation: &str,
) -> PyResult<Vec<Vec<f64>>> {
    let builder = RelationMatrixBuilder::new(parse_relation(relation)?);
    let base = Constant::aggregate(base, "python");
    let matrix = py
        .allow_threads(|| builder.build(&base, &index_set))
        .map_err(to_py_err)?;
    Ok((0..matrix.size()).map(|i| matrix.row(i).to_vec()).collect())
}

// ─── Module ─────────────────────────────────────────────────────────

#[pymodule]
fn derivation_kernel(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyPipelineConfig>()?;
    m.add_class::<PyPipelineState>()?;
    m.add_class::<PyPipelineOrchestrator>()?;
    m.add_function(wrap_pyfunction!(solve_fixed_point, m)?)?;
    m.add_function(wrap_pyfunction!(derive_parameters, m)?)?;
    m.add_function(wrap_pyfunction!(build_relation_matrix, m)?)?;
    Ok(())
}
