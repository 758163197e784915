//! Henderson Method 1 ANOVA: T-values, sums of squares and variance
//! components for crossed and nested designs with any cell counts.
//!
//! ## Pipeline
//!
//! 1. T-values per effect ([`TValue`])
//! 2. Coefficients of the expected T-values ([`CoefficientMatrix`])
//! 3. Solve E[T] = T for the variance components, with μ² eliminated by
//!    differencing against the mean equation
//!
//! Negative component estimates are kept as estimated; see
//! [`EffectRow::nonnegative_variance`].

mod coefficients;
mod solve;
mod t_values;

pub use coefficients::CoefficientMatrix;
pub use solve::lu_solve;
pub use t_values::{Bound, TValue};

#[cfg(feature = "parallel")]
pub(crate) use coefficients::coefficient_row;
#[cfg(feature = "parallel")]
pub(crate) use t_values::t_value;

use ndarray::Array1;
use tracing::{debug, warn};

use crate::data::Observations;
use crate::design::{Design, Effect, EffectKind, FacetSet};
use crate::error::Result;

/// Configuration for the variance-component analysis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalysisConfig {
    /// Effect count above which a warning is logged (default: 256).
    pub max_effects: usize,
    /// Relative pivot threshold for the linear solve (default: 1e-10).
    pub singular_tolerance: f64,
    /// Compute T-values and coefficients on the rayon pool when the
    /// `parallel` feature is enabled (default: true).
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_effects: 256,
            singular_tolerance: 1e-10,
            parallel: true,
        }
    }
}

/// One line of the ANOVA table.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EffectRow {
    /// The effect.
    pub effect: Effect,
    /// Degrees of freedom from the observed group counts.
    pub degrees_of_freedom: usize,
    /// Uncorrected sum of squares.
    pub t_value: f64,
    /// Whether `t_value` is exact.
    pub bound: Bound,
    /// Sum of squares by inclusion–exclusion over T-values.
    pub sum_of_squares: f64,
    /// SS / df, zero when df is zero.
    pub mean_square: f64,
    /// Estimated variance component; `None` for the mean.
    pub variance: Option<f64>,
}

impl EffectRow {
    /// The variance component floored at zero.
    #[must_use]
    pub fn nonnegative_variance(&self) -> f64 {
        self.variance.map_or(0.0, |v| v.max(0.0))
    }
}

/// Complete ANOVA result.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnovaTable {
    rows: Vec<EffectRow>,
    coefficients: CoefficientMatrix,
    mu_squared: f64,
    grand_mean: f64,
    total_count: u64,
}

impl AnovaTable {
    /// Rows in effect order: mean, facet effects by size, then the residual
    /// when cells hold replicates.
    #[must_use]
    pub fn rows(&self) -> &[EffectRow] {
        &self.rows
    }

    /// Row of the named effect.
    #[must_use]
    pub fn row(&self, name: &str) -> Option<&EffectRow> {
        self.rows.iter().find(|r| r.effect.name() == name)
    }

    /// Variance component of the named effect.
    #[must_use]
    pub fn variance(&self, name: &str) -> Option<f64> {
        self.row(name).and_then(|r| r.variance)
    }

    /// The analysed effects, in row order.
    pub fn effects(&self) -> impl Iterator<Item = &Effect> {
        self.rows.iter().map(|r| &r.effect)
    }

    /// Effects whose variance components enter the expected mean square of
    /// the named effect: those containing it, itself and the residual
    /// included. `None` for an unknown name.
    #[must_use]
    pub fn ems_components(&self, name: &str) -> Option<Vec<&Effect>> {
        let alpha = &self.row(name)?.effect;
        Some(self.effects().filter(|beta| beta.contains(alpha)).collect())
    }

    /// Whether a within-cell residual row is present.
    #[must_use]
    pub fn has_residual(&self) -> bool {
        self.rows.iter().any(|r| r.effect.is_residual())
    }

    /// The coefficient matrix the components were solved from.
    #[must_use]
    pub fn coefficients(&self) -> &CoefficientMatrix {
        &self.coefficients
    }

    /// Estimated μ² from the mean equation.
    #[must_use]
    pub fn mu_squared(&self) -> f64 {
        self.mu_squared
    }

    /// Mean of all observations.
    #[must_use]
    pub fn grand_mean(&self) -> f64 {
        self.grand_mean
    }

    /// Number of individual observations.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.total_count
    }
}

/// Effects analysed for `obs`: the design's effects, plus the residual when
/// some cell holds replicates.
pub(crate) fn analysed_effects(design: &Design, obs: &Observations) -> Vec<Effect> {
    let mut effects = design.effects().to_vec();
    if obs.has_replicates() {
        effects.push(Effect::residual(design.all_facets()));
    }
    effects
}

/// Run the full Henderson Method 1 analysis.
pub(crate) fn analyze(
    design: &Design,
    obs: &Observations,
    config: &AnalysisConfig,
) -> Result<AnovaTable> {
    let effects = analysed_effects(design, obs);
    if effects.len() > config.max_effects {
        warn!(
            effects = effects.len(),
            max = config.max_effects,
            "design has many effects; coefficient counting may be slow"
        );
    }
    debug!(effects = effects.len(), cells = obs.cells().len(), "starting analysis");

    let (t, coefficients) = compute(obs, &effects, config);
    debug!("computed T-values and coefficients");

    let k = effects.len();
    let rhs = Array1::from_shape_fn(k - 1, |a| t[a + 1].value - t[0].value);
    let sigma = lu_solve(&coefficients.reduced(), &rhs, config.singular_tolerance)?;

    let mu_squared = (t[0].value
        - (1..k)
            .map(|b| coefficients.get(0, b) * sigma[b - 1])
            .sum::<f64>())
        / coefficients.get(0, 0);

    let rows = effects
        .iter()
        .enumerate()
        .map(|(a, effect)| {
            let degrees_of_freedom = degrees_of_freedom(obs, effect);
            let sum_of_squares = sum_of_squares(design, obs, effect, &t, &effects);
            let variance = (a > 0).then(|| sigma[a - 1]);
            if let Some(v) = variance.filter(|v| *v < 0.0) {
                debug!(effect = effect.name(), variance = v, "negative variance component");
            }
            EffectRow {
                effect: effect.clone(),
                degrees_of_freedom,
                t_value: t[a].value,
                bound: t[a].bound,
                sum_of_squares,
                mean_square: if degrees_of_freedom > 0 {
                    sum_of_squares / degrees_of_freedom as f64
                } else {
                    0.0
                },
                variance,
            }
        })
        .collect();

    let total_count = obs.total();
    let grand_mean = obs.cells().iter().map(|c| c.sum).sum::<f64>() / total_count as f64;

    Ok(AnovaTable {
        rows,
        coefficients,
        mu_squared,
        grand_mean,
        total_count,
    })
}

#[cfg(feature = "parallel")]
fn compute(
    obs: &Observations,
    effects: &[Effect],
    config: &AnalysisConfig,
) -> (Vec<TValue>, CoefficientMatrix) {
    if config.parallel {
        (
            crate::parallel::par_t_values(obs, effects),
            crate::parallel::par_coefficient_matrix(obs, effects),
        )
    } else {
        sequential(obs, effects)
    }
}

#[cfg(not(feature = "parallel"))]
fn compute(
    obs: &Observations,
    effects: &[Effect],
    _config: &AnalysisConfig,
) -> (Vec<TValue>, CoefficientMatrix) {
    sequential(obs, effects)
}

fn sequential(obs: &Observations, effects: &[Effect]) -> (Vec<TValue>, CoefficientMatrix) {
    (
        t_values::t_values(obs, effects),
        CoefficientMatrix::from_observations(obs, effects),
    )
}

fn degrees_of_freedom(obs: &Observations, effect: &Effect) -> usize {
    match effect.kind() {
        EffectKind::Mean => 0,
        EffectKind::Residual => (obs.total() as usize).saturating_sub(obs.cells().len()),
        EffectKind::Facets => {
            let df: i64 = effect
                .inclusion_exclusion()
                .into_iter()
                .map(|(set, sign)| i64::from(sign) * obs.group_count(set) as i64)
                .sum();
            usize::try_from(df).unwrap_or(0)
        }
    }
}

fn sum_of_squares(
    design: &Design,
    obs: &Observations,
    effect: &Effect,
    t: &[TValue],
    effects: &[Effect],
) -> f64 {
    let t_of = |set: FacetSet| {
        design
            .effect_index(set)
            .map_or_else(|| t_values::t_of_set(obs, set), |i| t[i].value)
    };
    match effect.kind() {
        EffectKind::Mean => t[0].value,
        EffectKind::Residual => {
            let residual = effects.len() - 1;
            t[residual].value - t_of(design.all_facets())
        }
        EffectKind::Facets => effect
            .inclusion_exclusion()
            .into_iter()
            .map(|(set, sign)| f64::from(sign) * t_of(set))
            .sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;

    fn analyze_rows(expr: &str, columns: &[&str], rows: &[(Vec<&str>, f64)]) -> AnovaTable {
        let design = Design::parse(expr).unwrap();
        let mut builder = Dataset::builder(columns.iter().copied());
        for (levels, y) in rows {
            builder.push(levels, *y);
        }
        let obs = builder.build().unwrap().bind(&design).unwrap();
        analyze(&design, &obs, &AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn test_two_by_two_crossed() {
        let table = analyze_rows(
            "p x i",
            &["p", "i"],
            &[
                (vec!["a", "x"], 1.0),
                (vec!["a", "y"], 2.0),
                (vec!["b", "x"], 3.0),
                (vec!["b", "y"], 5.0),
            ],
        );
        // T: mean 30.25, p 36.5, i 32.5, pi 39
        let p = table.row("p").unwrap();
        assert_eq!(p.degrees_of_freedom, 1);
        assert!((p.sum_of_squares - 6.25).abs() < 1e-12);
        let pi = table.row("p x i").unwrap();
        assert_eq!(pi.degrees_of_freedom, 1);
        assert!((pi.sum_of_squares - 0.25).abs() < 1e-12);

        // balanced: σ²(pi) = MS(pi), σ²(p) = (MS(p) − MS(pi)) / n_i
        assert!((table.variance("p x i").unwrap() - 0.25).abs() < 1e-10);
        assert!((table.variance("p").unwrap() - 3.0).abs() < 1e-10);
        assert!((table.variance("i").unwrap() - 1.0).abs() < 1e-10);
        assert!(table.variance("mean").is_none());
        assert!(!table.has_residual());
        assert!((table.grand_mean() - 2.75).abs() < 1e-12);
    }

    #[test]
    fn test_replicates_add_residual() {
        // one-way layout with two replicates per level
        let table = analyze_rows(
            "p",
            &["p"],
            &[
                (vec!["a"], 1.0),
                (vec!["a"], 3.0),
                (vec!["b"], 5.0),
                (vec!["b"], 7.0),
                (vec!["c"], 3.0),
                (vec!["c"], 5.0),
            ],
        );
        assert!(table.has_residual());
        let residual = table.row("residual").unwrap();
        assert_eq!(residual.degrees_of_freedom, 3);
        // within-cell squares: 2 + 2 + 2
        assert!((residual.sum_of_squares - 6.0).abs() < 1e-12);
        assert!((table.variance("residual").unwrap() - 2.0).abs() < 1e-10);
        // MS(p) = 2 · var(2, 6, 4) = 8; σ²(p) = (8 − 2) / 2
        assert!((table.variance("p").unwrap() - 3.0).abs() < 1e-10);
        assert!((table.mu_squared() - (16.0 - 3.0 / 3.0 - 2.0 / 6.0)).abs() < 1e-10);
    }

    #[test]
    fn test_ems_components() {
        let rows: Vec<(Vec<&str>, f64)> = ["a", "b"]
            .iter()
            .flat_map(|p| ["x", "y"].iter().map(move |i| (vec![*p, *i], 1.0)))
            .flat_map(|row| [row.clone(), (row.0, 2.0)])
            .collect();
        let table = analyze_rows("p x i", &["p", "i"], &rows);

        let names = |effect: &str| -> Vec<String> {
            table
                .ems_components(effect)
                .unwrap()
                .iter()
                .map(|e| e.name().to_string())
                .collect()
        };
        assert_eq!(names("p"), ["p", "p x i", "residual"]);
        assert_eq!(names("p x i"), ["p x i", "residual"]);
        assert_eq!(names("residual"), ["residual"]);
        assert_eq!(names("mean").len(), 5);
        assert!(table.ems_components("o").is_none());
    }

    #[test]
    fn test_negative_component_is_kept() {
        let table = analyze_rows(
            "p x i",
            &["p", "i"],
            &[
                (vec!["a", "x"], 1.0),
                (vec!["a", "y"], 2.0),
                (vec!["b", "x"], 2.0),
                (vec!["b", "y"], 1.0),
            ],
        );
        let p = table.row("p").unwrap();
        assert!(p.variance.unwrap() < 0.0);
        assert!(p.nonnegative_variance().abs() < 1e-15);
    }
}
