//! Python bindings for gtheory.
//!
//! This module exposes the G-study pipeline to Python using PyO3. Enable the
//! `python` feature to use this.

use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::builder::GStudyBuilder;
use crate::data::Dataset;
use crate::gcoeff::DStudyPlan;

/// Python wrapper for a completed G study.
#[pyclass(name = "GStudy")]
pub struct PyGStudy {
    inner: crate::builder::GStudy,
}

#[pymethods]
impl PyGStudy {
    /// Variance components by effect name; the mean is omitted.
    fn variance_components(&self, py: Python<'_>) -> PyResult<PyObject> {
        let dict = PyDict::new(py);
        for row in self.inner.anova().rows() {
            if let Some(v) = row.variance {
                dict.set_item(row.effect.name(), v)?;
            }
        }
        Ok(dict.into())
    }

    /// `{effect: (e_rho2, phi)}` for every differentiation effect.
    fn g_coefficients(&self, py: Python<'_>) -> PyResult<PyObject> {
        let dict = PyDict::new(py);
        for g in self.inner.g_coefficients() {
            dict.set_item(&g.effect, (g.e_rho2, g.phi))?;
        }
        Ok(dict.into())
    }

    /// Decision study: `plan` maps facet name to candidate level counts.
    /// Returns one `(levels, {effect: (e_rho2, phi)})` pair per scenario.
    fn d_study(&self, py: Python<'_>, plan: Vec<(String, Vec<usize>)>) -> PyResult<PyObject> {
        let plan = plan
            .into_iter()
            .fold(DStudyPlan::new(), |plan, (facet, counts)| plan.facet(facet, counts));
        let scenarios = self.inner.d_study(&plan).map_err(to_py_err)?;

        let out = pyo3::types::PyList::empty(py);
        for scenario in scenarios {
            let coefficients = PyDict::new(py);
            for g in &scenario.coefficients {
                coefficients.set_item(&g.effect, (g.e_rho2, g.phi))?;
            }
            out.append((scenario.levels, coefficients))?;
        }
        Ok(out.into())
    }

    /// Whether every cell the design allows was observed.
    #[getter]
    fn complete(&self) -> bool {
        self.inner.is_complete()
    }
}

fn to_py_err(e: crate::Error) -> PyErr {
    pyo3::exceptions::PyValueError::new_err(e.to_string())
}

/// Run a G study.
///
/// `rows` holds one level label per column for each response in `responses`.
#[pyfunction]
#[pyo3(signature = (design, columns, rows, responses, fixed=Vec::new()))]
fn analyze(
    design: &str,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    responses: Vec<f64>,
    fixed: Vec<String>,
) -> PyResult<PyGStudy> {
    if rows.len() != responses.len() {
        return Err(pyo3::exceptions::PyValueError::new_err(
            "rows and responses must have the same length",
        ));
    }
    let mut builder = Dataset::builder(columns);
    for (levels, y) in rows.iter().zip(responses) {
        builder.push(levels, y);
    }
    let data = builder.build().map_err(to_py_err)?;

    let study = fixed
        .into_iter()
        .fold(GStudyBuilder::new().design(design), GStudyBuilder::fixed)
        .analyze(&data)
        .map_err(to_py_err)?;
    Ok(PyGStudy { inner: study })
}

/// The gtheory Python module.
#[pymodule]
fn gtheory(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyGStudy>()?;
    m.add_function(wrap_pyfunction!(analyze, m)?)?;
    Ok(())
}
