//! Confidence intervals for the observed group means of differentiation
//! effects.
//!
//! The error variance of an α-group mean sums every other component divided
//! by its level divisor relative to α; the interval is the mean ± z · √variance.

use super::differentiation_effects;
use super::levels::observed_level;
use crate::anova::AnovaTable;
use crate::data::Observations;
use crate::design::Design;
use crate::error::{Error, Result};
use crate::utils::stats::normal_quantile;

/// Interval around one group mean.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LevelInterval {
    /// Level labels of the group, one per facet of the effect in declaration
    /// order.
    pub levels: Vec<String>,
    /// Lower bound.
    pub lower: f64,
    /// Observed mean of the group.
    pub mean: f64,
    /// Upper bound.
    pub upper: f64,
}

/// Intervals for every group of one differentiation effect.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FacetIntervals {
    /// Effect name, e.g. `p` or `p:d`.
    pub effect: String,
    /// Facet names the group labels refer to.
    pub facets: Vec<String>,
    /// Error variance of a group mean.
    pub variance: f64,
    /// z · √variance.
    pub half_width: f64,
    /// Group intervals ordered by level, in order of first appearance in the
    /// dataset.
    pub intervals: Vec<LevelInterval>,
}

/// Intervals at significance `alpha` for every differentiation effect.
pub(crate) fn confidence_intervals(
    design: &Design,
    obs: &Observations,
    table: &AnovaTable,
    labels: &[Vec<String>],
    alpha: f64,
) -> Result<Vec<FacetIntervals>> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(Error::invalid_params(format!(
            "significance level must be in (0, 1), got {alpha}"
        )));
    }
    let z = normal_quantile(1.0 - alpha / 2.0);

    let mut result = Vec::new();
    for effect in differentiation_effects(design, table) {
        let variance: f64 = table
            .rows()
            .iter()
            .filter(|r| !r.effect.is_mean() && r.effect != *effect)
            .map(|r| r.nonnegative_variance() / observed_level(obs, effect, &r.effect))
            .sum();
        let half_width = z * variance.sqrt();

        let facets: Vec<_> = effect.facets().iter().collect();
        let mut groups: Vec<_> = obs.groups(effect.facets()).into_iter().collect();
        groups.sort_by(|(a, _), (b, _)| a.cmp(b));

        let intervals = groups
            .into_iter()
            .map(|(key, group)| {
                let mean = group.sum / group.count as f64;
                let levels = facets
                    .iter()
                    .zip(&key)
                    .map(|(f, &l)| {
                        labels
                            .get(f.index())
                            .and_then(|col| col.get(l as usize))
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect();
                LevelInterval {
                    levels,
                    lower: mean - half_width,
                    mean,
                    upper: mean + half_width,
                }
            })
            .collect();

        result.push(FacetIntervals {
            effect: effect.name().to_string(),
            facets: design
                .facet_names(effect.facets())
                .into_iter()
                .map(str::to_string)
                .collect(),
            variance,
            half_width,
            intervals,
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anova::{analyze, AnalysisConfig};
    use crate::data::Dataset;

    #[test]
    fn test_balanced_crossed_intervals() {
        let design = Design::parse("p x i").unwrap();
        let mut builder = Dataset::builder(["p", "i"]);
        let scores = [[2.0, 3.0, 4.0], [5.0, 5.0, 8.0], [1.0, 3.0, 2.0], [6.0, 9.0, 7.0]];
        for (p, row) in scores.iter().enumerate() {
            for (i, y) in row.iter().enumerate() {
                builder.push(&[format!("p{p}"), format!("i{i}")], *y);
            }
        }
        let data = builder.build().unwrap();
        let labels = vec![
            data.levels("p").unwrap().to_vec(),
            data.levels("i").unwrap().to_vec(),
        ];
        let obs = data.bind(&design).unwrap();
        let table = analyze(&design, &obs, &AnalysisConfig::default()).unwrap();

        let ci = confidence_intervals(&design, &obs, &table, &labels, 0.05).unwrap();
        assert_eq!(ci.len(), 2);

        let persons = &ci[0];
        assert_eq!(persons.effect, "p");
        assert_eq!(persons.facets, ["p"]);
        let si = table.row("i").unwrap().nonnegative_variance();
        let spi = table.row("p x i").unwrap().nonnegative_variance();
        assert!((persons.variance - (si + spi) / 3.0).abs() < 1e-10);
        assert!((persons.half_width - 1.959_964 * persons.variance.sqrt()).abs() < 1e-5);

        let first = &persons.intervals[0];
        assert_eq!(first.levels, ["p0"]);
        assert!((first.mean - 3.0).abs() < 1e-12);
        assert!((first.upper - first.mean - persons.half_width).abs() < 1e-12);
        assert_eq!(persons.intervals[3].levels, ["p3"]);
    }

    #[test]
    fn test_nested_object_of_measurement() {
        // patients nested in doctors, crossed with items; labels repeat per doctor
        let design = Design::parse("(p:d) x i").unwrap();
        let mut builder = Dataset::builder(["p", "d", "i"]);
        for (d, patients) in [("d0", 2), ("d1", 3)] {
            for p in 0..patients {
                for i in 0..3 {
                    let y = f64::from(p * 2 + i) + if d == "d1" { 1.5 } else { 0.0 };
                    builder.push(&[p.to_string(), d.to_string(), i.to_string()], y);
                }
            }
        }
        let data = builder.build().unwrap();
        let labels = vec![
            data.levels("p").unwrap().to_vec(),
            data.levels("d").unwrap().to_vec(),
            data.levels("i").unwrap().to_vec(),
        ];
        let obs = data.bind(&design).unwrap();
        let table = analyze(&design, &obs, &AnalysisConfig::default()).unwrap();

        let ci = confidence_intervals(&design, &obs, &table, &labels, 0.05).unwrap();
        let names: Vec<&str> = ci.iter().map(|c| c.effect.as_str()).collect();
        assert!(names.contains(&"p:d"));
        assert!(!names.contains(&"(p x i):d"));

        let patients = ci.iter().find(|c| c.effect == "p:d").unwrap();
        assert_eq!(patients.facets, ["p", "d"]);
        assert_eq!(patients.intervals.len(), 5);
        assert!(patients.intervals.iter().all(|g| g.levels.len() == 2));

        // patient "1" of doctor d1: responses 3.5, 4.5, 5.5
        let group = patients
            .intervals
            .iter()
            .find(|g| g.levels == ["1", "d1"])
            .unwrap();
        assert!((group.mean - 4.5).abs() < 1e-12);
        assert!((group.upper - group.lower - 2.0 * patients.half_width).abs() < 1e-12);
    }

    #[test]
    fn test_alpha_out_of_range() {
        let design = Design::parse("p x i").unwrap();
        let data = Dataset::balanced(&design, &[3, 3], 1).unwrap();
        let obs = data.bind(&design).unwrap();
        let table = analyze(&design, &obs, &AnalysisConfig::default()).unwrap();
        for alpha in [0.0, 1.0, -0.1, f64::NAN] {
            assert!(confidence_intervals(&design, &obs, &table, &[], alpha).is_err());
        }
    }
}
