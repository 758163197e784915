//! Generalizability and dependability coefficients.
//!
//! For a differentiation effect α (the objects of measurement), every other
//! variance component falls into one of three roles:
//!
//! - **τ** (universe-score variance): components whose facets lie within α,
//!   plus components containing α whose extra facets are all fixed
//! - **δ** (relative error): components containing α with at least one
//!   random extra facet, each divided by its level divisor
//! - **Δ** (absolute error): every component outside τ that has a random
//!   facet outside α, each divided by its level divisor
//!
//! Eρ² = τ / (τ + δ) and Φ = τ / (τ + Δ). Negative components count as zero.

mod d_study;
mod interval;
mod levels;

pub use d_study::{DStudyPlan, DStudyScenario};
pub use interval::{FacetIntervals, LevelInterval};

pub(crate) use d_study::{d_study, d_study_with_rows, substitute_components};
pub(crate) use interval::confidence_intervals;

use tracing::debug;

use crate::anova::{AnovaTable, EffectRow};
use crate::data::Observations;
use crate::design::{Design, Effect};

/// Coefficients for one differentiation effect.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GCoefficient {
    /// Name of the differentiation effect.
    pub effect: String,
    /// Universe-score variance τ.
    pub tau: f64,
    /// Relative error variance δ.
    pub delta: f64,
    /// Absolute error variance Δ.
    pub big_delta: f64,
    /// Generalizability coefficient Eρ².
    pub e_rho2: f64,
    /// Dependability coefficient Φ.
    pub phi: f64,
}

/// Effects G coefficients are reported for: every facet effect except the
/// one spanning all facets.
pub(crate) fn differentiation_effects<'a>(
    design: &'a Design,
    table: &'a AnovaTable,
) -> impl Iterator<Item = &'a Effect> + 'a {
    let all = design.all_facets();
    table
        .effects()
        .filter(move |e| !e.is_mean() && !e.is_residual() && e.facets() != all)
}

/// Assign every component to τ, δ and Δ for `alpha`, dividing by `level`.
pub(crate) fn coefficient_for<F>(
    design: &Design,
    rows: &[EffectRow],
    alpha: &Effect,
    level: F,
) -> GCoefficient
where
    F: Fn(&Effect) -> f64,
{
    let fixed = design.fixed_facets();
    let (mut tau, mut delta, mut big_delta) = (0.0, 0.0, 0.0);

    for row in rows.iter().filter(|r| !r.effect.is_mean()) {
        let beta = &row.effect;
        let variance = row.nonnegative_variance();
        if !beta.is_residual() && beta.facets().is_subset(alpha.facets()) {
            tau += variance;
            continue;
        }

        let outside = beta.facets().difference(alpha.facets());
        let random_outside = beta.is_residual() || !outside.is_subset(fixed);
        let divisor = level(beta);
        let share = if divisor > 0.0 { variance / divisor } else { 0.0 };

        if beta.contains(alpha) {
            if random_outside {
                delta += share;
                big_delta += share;
            } else {
                tau += share;
            }
        } else if random_outside {
            big_delta += share;
        }
    }

    GCoefficient {
        effect: alpha.name().to_string(),
        tau,
        delta,
        big_delta,
        e_rho2: ratio(tau, delta),
        phi: ratio(tau, big_delta),
    }
}

fn ratio(tau: f64, error: f64) -> f64 {
    if tau + error > 0.0 {
        tau / (tau + error)
    } else {
        0.0
    }
}

/// Eρ² and Φ for every differentiation effect using the observed levels.
pub(crate) fn g_coefficients(
    design: &Design,
    obs: &Observations,
    table: &AnovaTable,
) -> Vec<GCoefficient> {
    differentiation_effects(design, table)
        .map(|alpha| {
            let g = coefficient_for(design, table.rows(), alpha, |beta| {
                levels::observed_level(obs, alpha, beta)
            });
            debug!(effect = %g.effect, e_rho2 = g.e_rho2, phi = g.phi, "G coefficients");
            g
        })
        .collect()
}
