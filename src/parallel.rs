//! Parallel T-value and coefficient computation.
//!
//! This module provides rayon versions of the two counting passes of the
//! analysis. Enable with the `parallel` feature flag; the analysis then uses
//! them whenever [`AnalysisConfig::parallel`](crate::AnalysisConfig) is set.
//!
//! # Performance
//!
//! Coefficient counting is quadratic in the number of effects and linear in
//! the number of cells, so parallelism pays off for designs with four or more
//! facets or many thousands of cells. Results are identical to the
//! sequential path.

use rayon::prelude::*;

use crate::anova::{coefficient_row, t_value, CoefficientMatrix, TValue};
use crate::data::Observations;
use crate::design::Effect;

/// T-values of every effect, one rayon task per effect.
pub(crate) fn par_t_values(obs: &Observations, effects: &[Effect]) -> Vec<TValue> {
    effects.par_iter().map(|e| t_value(obs, e)).collect()
}

/// Coefficient matrix, one rayon task per row.
pub(crate) fn par_coefficient_matrix(obs: &Observations, effects: &[Effect]) -> CoefficientMatrix {
    let rows: Vec<Vec<f64>> = (0..effects.len())
        .into_par_iter()
        .map(|a| coefficient_row(obs, effects, a))
        .collect();
    CoefficientMatrix::from_rows(effects, rows)
}
