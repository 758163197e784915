//! Decision studies: coefficients for hypothetical balanced sample sizes.

use tracing::debug;

use super::{coefficient_for, differentiation_effects, levels::balanced_level, GCoefficient};
use crate::anova::{AnovaTable, EffectRow};
use crate::data::Observations;
use crate::design::{Design, FacetId};
use crate::error::{Error, Result};
use crate::utils::cartesian_product;

/// Candidate level counts per facet.
///
/// Facets left out keep the number of levels observed in the G study.
///
/// # Examples
///
/// ```rust
/// use gtheory::DStudyPlan;
///
/// let plan = DStudyPlan::new().facet("i", [5, 10, 20]).facet("o", [1, 2]);
/// assert_eq!(plan.scenario_count(), 6);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DStudyPlan {
    facets: Vec<(String, Vec<usize>)>,
}

impl DStudyPlan {
    /// An empty plan: one scenario at the G-study sizes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidate counts for a facet, per parent cell for nested facets.
    #[must_use]
    pub fn facet(mut self, name: impl Into<String>, counts: impl IntoIterator<Item = usize>) -> Self {
        self.facets.push((name.into(), counts.into_iter().collect()));
        self
    }

    /// Facets named in the plan with their candidate counts.
    #[must_use]
    pub fn facets(&self) -> &[(String, Vec<usize>)] {
        &self.facets
    }

    /// Number of scenarios the plan expands to.
    #[must_use]
    pub fn scenario_count(&self) -> usize {
        self.facets.iter().map(|(_, c)| c.len()).product()
    }
}

/// Coefficients for one combination of level counts.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DStudyScenario {
    /// Level count of every facet, in design order.
    pub levels: Vec<(String, usize)>,
    /// Observations per cell.
    pub replicates: u64,
    /// Coefficients per differentiation effect.
    pub coefficients: Vec<GCoefficient>,
}

impl DStudyScenario {
    /// Level count of the named facet.
    #[must_use]
    pub fn level(&self, facet: &str) -> Option<usize> {
        self.levels.iter().find(|(n, _)| n == facet).map(|(_, l)| *l)
    }

    /// Coefficients for the named differentiation effect.
    #[must_use]
    pub fn coefficient(&self, effect: &str) -> Option<&GCoefficient> {
        self.coefficients.iter().find(|c| c.effect == effect)
    }
}

/// Expand `plan` and compute coefficients with balanced levels, holding the
/// variance components fixed. Scenarios follow the plan order, the last
/// planned facet varying fastest.
pub(crate) fn d_study(
    design: &Design,
    obs: &Observations,
    table: &AnovaTable,
    plan: &DStudyPlan,
) -> Result<Vec<DStudyScenario>> {
    d_study_with_rows(design, obs, table, table.rows(), plan)
}

/// Copy of the table rows with the named components replaced.
///
/// Rows not named keep their estimate. The mean has no component, and
/// supplied values must be finite and non-negative.
pub(crate) fn substitute_components(
    table: &AnovaTable,
    variances: &[(&str, f64)],
) -> Result<Vec<EffectRow>> {
    let mut rows = table.rows().to_vec();
    for &(name, value) in variances {
        if !value.is_finite() || value < 0.0 {
            return Err(Error::invalid_params(format!(
                "variance component for '{name}' must be finite and non-negative, got {value}"
            )));
        }
        let row = rows
            .iter_mut()
            .find(|r| r.effect.name() == name && !r.effect.is_mean())
            .ok_or_else(|| {
                Error::invalid_params(format!("no variance component named '{name}'"))
            })?;
        row.variance = Some(value);
    }
    Ok(rows)
}

pub(crate) fn d_study_with_rows(
    design: &Design,
    obs: &Observations,
    table: &AnovaTable,
    rows: &[EffectRow],
    plan: &DStudyPlan,
) -> Result<Vec<DStudyScenario>> {
    if !obs.is_complete(design) {
        return Err(Error::incomplete_data(
            "decision studies need a G study without missing cells",
        ));
    }

    let n_facets = design.facets().len();
    let mut planned: Vec<usize> = Vec::with_capacity(plan.facets().len());
    let mut candidates: Vec<Vec<usize>> = Vec::with_capacity(plan.facets().len());
    for (name, counts) in plan.facets() {
        let id = design.facet_id(name).ok_or_else(|| {
            Error::invalid_params(format!("D-study plan names unknown facet '{name}'"))
        })?;
        if planned.contains(&id.index()) {
            return Err(Error::invalid_params(format!(
                "facet '{name}' appears twice in the D-study plan"
            )));
        }
        if counts.is_empty() || counts.contains(&0) {
            return Err(Error::invalid_params(format!(
                "facet '{name}' needs at least one positive level count"
            )));
        }
        planned.push(id.index());
        candidates.push(counts.clone());
    }

    let mut base = vec![0; n_facets];
    for (f, slot) in base.iter_mut().enumerate() {
        if planned.contains(&f) {
            continue;
        }
        *slot = obs.uniform_levels(FacetId(f)).ok_or_else(|| {
            Error::invalid_params(format!(
                "facet '{}' has unequal level counts across its parent cells; \
                 give its D-study size explicitly",
                design.facets()[f].name()
            ))
        })?;
    }
    let replicates = obs.uniform_replicates().ok_or_else(|| {
        Error::invalid_params("cells hold unequal replicate counts")
    })?;

    let alphas: Vec<_> = differentiation_effects(design, table).collect();
    let scenarios: Vec<DStudyScenario> = cartesian_product(&candidates)
        .into_iter()
        .map(|combo| {
            let mut levels = base.clone();
            for (&f, n) in planned.iter().zip(combo) {
                levels[f] = n;
            }
            let coefficients = alphas
                .iter()
                .map(|alpha| {
                    coefficient_for(design, rows, alpha, |beta| {
                        balanced_level(alpha, beta, &levels, replicates)
                    })
                })
                .collect();
            DStudyScenario {
                levels: design
                    .facets()
                    .iter()
                    .zip(&levels)
                    .map(|(facet, &n)| (facet.name().to_string(), n))
                    .collect(),
                replicates,
                coefficients,
            }
        })
        .collect();

    debug!(scenarios = scenarios.len(), "decision study");
    Ok(scenarios)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anova::{analyze, AnalysisConfig};
    use crate::data::Dataset;

    fn study(expr: &str, columns: &[&str], rows: &[(Vec<usize>, f64)]) -> (Design, Observations, AnovaTable) {
        let design = Design::parse(expr).unwrap();
        let mut builder = Dataset::builder(columns.iter().copied());
        for (levels, y) in rows {
            builder.push(levels, *y);
        }
        let obs = builder.build().unwrap().bind(&design).unwrap();
        let table = analyze(&design, &obs, &AnalysisConfig::default()).unwrap();
        (design, obs, table)
    }

    fn crossed_rows(skip: Option<(usize, usize)>) -> Vec<(Vec<usize>, f64)> {
        let mut rows = Vec::new();
        for p in 0..5 {
            for i in 0..4 {
                if Some((p, i)) != skip {
                    rows.push((vec![p, i], (p * 2 + i % 3 + (p * i) % 2) as f64));
                }
            }
        }
        rows
    }

    #[test]
    fn test_empty_plan_reproduces_g_study() {
        let (design, obs, table) = study("p x i", &["p", "i"], &crossed_rows(None));
        let scenarios = d_study(&design, &obs, &table, &DStudyPlan::new()).unwrap();
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].level("i"), Some(4));

        let g = crate::gcoeff::g_coefficients(&design, &obs, &table);
        let d = &scenarios[0].coefficients;
        for (a, b) in g.iter().zip(d) {
            assert_eq!(a.effect, b.effect);
            assert!((a.e_rho2 - b.e_rho2).abs() < 1e-10);
            assert!((a.phi - b.phi).abs() < 1e-10);
        }
    }

    #[test]
    fn test_more_items_raise_reliability() {
        let (design, obs, table) = study("p x i", &["p", "i"], &crossed_rows(None));
        let plan = DStudyPlan::new().facet("i", [2, 4, 8, 16]);
        let scenarios = d_study(&design, &obs, &table, &plan).unwrap();
        assert_eq!(scenarios.len(), 4);
        let rho: Vec<f64> = scenarios
            .iter()
            .map(|s| s.coefficient("p").unwrap().e_rho2)
            .collect();
        assert!(rho.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_missing_cells_rejected() {
        let (design, obs, table) = study("p x i", &["p", "i"], &crossed_rows(Some((2, 1))));
        let err = d_study(&design, &obs, &table, &DStudyPlan::new()).unwrap_err();
        assert!(matches!(err, Error::IncompleteData { .. }));
    }

    #[test]
    fn test_bad_plans_rejected() {
        let (design, obs, table) = study("p x i", &["p", "i"], &crossed_rows(None));
        for plan in [
            DStudyPlan::new().facet("o", [2]),
            DStudyPlan::new().facet("i", [0, 2]),
            DStudyPlan::new().facet("i", Vec::new()),
            DStudyPlan::new().facet("i", [2]).facet("i", [3]),
        ] {
            assert!(matches!(
                d_study(&design, &obs, &table, &plan),
                Err(Error::InvalidParams { .. })
            ));
        }
    }

    #[test]
    fn test_substituted_components() {
        let (_, _, table) = study("p x i", &["p", "i"], &crossed_rows(None));
        let rows = substitute_components(&table, &[("p x i", 2.0), ("p", 0.5)]).unwrap();
        assert_eq!(rows.len(), table.rows().len());
        for (new, old) in rows.iter().zip(table.rows()) {
            match new.effect.name() {
                "p" => assert_eq!(new.variance, Some(0.5)),
                "p x i" => assert_eq!(new.variance, Some(2.0)),
                _ => assert_eq!(new.variance, old.variance),
            }
        }

        for bad in [[("mean", 1.0)], [("o", 1.0)], [("i", -0.1)], [("i", f64::NAN)]] {
            assert!(matches!(
                substitute_components(&table, &bad),
                Err(Error::InvalidParams { .. })
            ));
        }
    }

    #[test]
    fn test_unequal_nesting_needs_explicit_size() {
        // h0 holds 2 items, h1 holds 3
        let mut rows = Vec::new();
        for p in 0..4 {
            for (h, items) in [(0, 2), (1, 3)] {
                for i in 0..items {
                    rows.push((vec![p, i, h], (p + i * h) as f64));
                }
            }
        }
        let (design, obs, table) = study("p x (i:h)", &["p", "i", "h"], &rows);
        assert!(d_study(&design, &obs, &table, &DStudyPlan::new()).is_err());

        let plan = DStudyPlan::new().facet("i", [3]);
        let scenarios = d_study(&design, &obs, &table, &plan).unwrap();
        assert_eq!(scenarios[0].level("h"), Some(2));
        assert_eq!(scenarios[0].level("i"), Some(3));
    }
}
