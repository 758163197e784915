//! T-values: uncorrected sums of squares per effect.

use tracing::warn;

use crate::data::Observations;
use crate::design::{Effect, EffectKind, FacetSet};

/// Whether a T-value is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Bound {
    /// Computed from the individual observations.
    #[default]
    Exact,
    /// Within-cell squares were unavailable for some aggregated rows; the
    /// value understates the true T-value.
    LowerBound,
}

/// A T-value and whether it is exact.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TValue {
    /// Σ over groups of (group sum)² / group count.
    pub value: f64,
    /// Exactness of `value`.
    pub bound: Bound,
}

/// T-value of the groups formed by `set`: Σ (Σ y)² / n.
pub(crate) fn t_of_set(obs: &Observations, set: FacetSet) -> f64 {
    obs.groups(set)
        .values()
        .map(|g| g.sum * g.sum / g.count as f64)
        .sum()
}

/// T-value of one effect.
///
/// The residual's T-value is the sum of the squared individual observations.
pub(crate) fn t_value(obs: &Observations, effect: &Effect) -> TValue {
    match effect.kind() {
        EffectKind::Residual => {
            let value = obs.cells().iter().map(|c| c.sum_sq).sum();
            let inexact = obs.cells().iter().filter(|c| !c.exact).count();
            if inexact > 0 {
                warn!(
                    cells = inexact,
                    "aggregated rows without sum of squares; residual T-value is a lower bound"
                );
                TValue {
                    value,
                    bound: Bound::LowerBound,
                }
            } else {
                TValue {
                    value,
                    bound: Bound::Exact,
                }
            }
        }
        EffectKind::Mean | EffectKind::Facets => TValue {
            value: t_of_set(obs, effect.facets()),
            bound: Bound::Exact,
        },
    }
}

/// T-values of every effect, in order.
pub(crate) fn t_values(obs: &Observations, effects: &[Effect]) -> Vec<TValue> {
    effects.iter().map(|e| t_value(obs, e)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::design::Design;

    #[test]
    fn test_t_values_crossed() {
        // 2 x 2 table: [[1, 2], [3, 4]]
        let mut builder = Dataset::builder(["p", "i"]);
        builder
            .push(&["a", "x"], 1.0)
            .push(&["a", "y"], 2.0)
            .push(&["b", "x"], 3.0)
            .push(&["b", "y"], 4.0);
        let design = Design::parse("p x i").unwrap();
        let obs = builder.build().unwrap().bind(&design).unwrap();

        let t = t_values(&obs, design.effects());
        // mean: 10² / 4
        assert!((t[0].value - 25.0).abs() < 1e-12);
        // p: (3² + 7²) / 2
        assert!((t[1].value - 29.0).abs() < 1e-12);
        // i: (4² + 6²) / 2
        assert!((t[2].value - 26.0).abs() < 1e-12);
        // pi: Σ y²
        assert!((t[3].value - 30.0).abs() < 1e-12);
        assert!(t.iter().all(|t| t.bound == Bound::Exact));
    }

    #[test]
    fn test_residual_lower_bound() {
        let design = Design::parse("p").unwrap();
        let mut builder = Dataset::builder(["p"]);
        builder
            .push_aggregate(&["a"], 6.0, 2, None)
            .push_aggregate(&["b"], 4.0, 2, Some(10.0));
        let obs = builder.build().unwrap().bind(&design).unwrap();

        let residual = Effect::residual(design.all_facets());
        let t = t_value(&obs, &residual);
        assert_eq!(t.bound, Bound::LowerBound);
        // 6² / 2 + 10
        assert!((t.value - 28.0).abs() < 1e-12);
    }
}
