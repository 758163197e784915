//! Henderson Method 1 coefficient matrix.
//!
//! The expected T-value of effect α is a linear combination of the variance
//! components: E[T(α)] = Σ_β c(α, β) σ²(β), with the grand mean's μ² in the
//! mean column. For arbitrary cell counts,
//!
//! ```text
//! c(α, β) = Σ_{α-groups g} Σ_{(α ∪ β)-cells c in g} n_c² / n_g
//! ```
//!
//! which collapses to `N / Π n_f` over the facets of β outside α when the
//! data are balanced.

use std::collections::HashMap;
use std::fmt;

use ndarray::Array2;

use crate::data::{Level, Observations};
use crate::design::{Effect, EffectKind};

/// Coefficients of the expected T-values, one row per equation effect and
/// one column per component, both in effect order with the mean first.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoefficientMatrix {
    names: Vec<String>,
    full: Array2<f64>,
}

impl CoefficientMatrix {
    /// Count the coefficients from observed cells.
    pub(crate) fn from_observations(obs: &Observations, effects: &[Effect]) -> Self {
        let rows = (0..effects.len())
            .map(|a| coefficient_row(obs, effects, a))
            .collect();
        Self::from_rows(effects, rows)
    }

    /// Assemble from precomputed rows.
    pub(crate) fn from_rows(effects: &[Effect], rows: Vec<Vec<f64>>) -> Self {
        let k = effects.len();
        let mut full = Array2::zeros((k, k));
        for (a, row) in rows.into_iter().enumerate() {
            for (b, value) in row.into_iter().enumerate() {
                full[[a, b]] = value;
            }
        }
        Self {
            names: effects.iter().map(|e| e.name().to_string()).collect(),
            full,
        }
    }

    /// Closed-form coefficients for balanced, complete data with `levels[f]`
    /// levels of facet `f` per parent cell and `replicates` observations per
    /// cell.
    ///
    /// `levels` must hold one entry per facet the effects refer to.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use gtheory::{CoefficientMatrix, Design};
    ///
    /// let design = Design::parse("p x i").unwrap();
    /// let m = CoefficientMatrix::balanced(design.effects(), &[10, 12], 1);
    /// // E[T(p)] = N μ² + N σ²(p) + n_p σ²(i) + n_p σ²(pi)
    /// assert_eq!(m.get(1, 0), 120.0);
    /// assert_eq!(m.get(1, 1), 120.0);
    /// assert_eq!(m.get(1, 2), 10.0);
    /// assert_eq!(m.get(1, 3), 10.0);
    /// ```
    #[must_use]
    pub fn balanced(effects: &[Effect], levels: &[usize], replicates: u64) -> Self {
        let n = levels.iter().map(|&l| l as f64).product::<f64>() * replicates as f64;
        let rows = effects
            .iter()
            .map(|alpha| {
                effects
                    .iter()
                    .map(|beta| {
                        if alpha.is_residual() {
                            return n;
                        }
                        let outside = beta.facets().difference(alpha.facets());
                        let mut divisor: f64 = outside.iter().map(|f| levels[f.index()] as f64).product();
                        if beta.is_residual() {
                            divisor *= replicates as f64;
                        }
                        n / divisor
                    })
                    .collect()
            })
            .collect();
        Self::from_rows(effects, rows)
    }

    /// Number of effects (rows and columns).
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the matrix is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Effect names labelling rows and columns.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Coefficient of component `beta` in the expected T-value of `alpha`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    #[must_use]
    pub fn get(&self, alpha: usize, beta: usize) -> f64 {
        self.full[[alpha, beta]]
    }

    /// The full matrix, mean row and column included.
    #[must_use]
    pub fn full(&self) -> &Array2<f64> {
        &self.full
    }

    /// The system without μ²: every equation minus the mean equation, over
    /// the non-mean components.
    #[must_use]
    pub fn reduced(&self) -> Array2<f64> {
        let k = self.len().saturating_sub(1);
        Array2::from_shape_fn((k, k), |(a, b)| {
            self.full[[a + 1, b + 1]] - self.full[[0, b + 1]]
        })
    }
}

impl fmt::Display for CoefficientMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.names.iter().map(String::len).max().unwrap_or(0).max(10);
        write!(f, "{:width$}", "")?;
        for name in &self.names {
            write!(f, " {name:>width$}")?;
        }
        writeln!(f)?;
        for (a, name) in self.names.iter().enumerate() {
            write!(f, "{name:width$}")?;
            for b in 0..self.len() {
                write!(f, " {:>width$.4}", self.full[[a, b]])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Row `a` of the coefficient matrix.
pub(crate) fn coefficient_row(obs: &Observations, effects: &[Effect], a: usize) -> Vec<f64> {
    effects
        .iter()
        .map(|beta| coefficient(obs, &effects[a], beta))
        .collect()
}

/// c(α, β) from the observed cell counts.
pub(crate) fn coefficient(obs: &Observations, alpha: &Effect, beta: &Effect) -> f64 {
    let total = obs.total() as f64;
    match (alpha.kind(), beta.kind()) {
        // every observation is its own group
        (EffectKind::Residual, _) => total,
        // every replicate is its own cell of count one
        (_, EffectKind::Residual) => obs.group_count(alpha.facets()) as f64,
        _ if beta.facets().is_subset(alpha.facets()) => total,
        _ => counted(obs, alpha, beta),
    }
}

fn counted(obs: &Observations, alpha: &Effect, beta: &Effect) -> f64 {
    let union = alpha.facets().union(beta.facets());
    let mut cells: HashMap<Vec<Level>, (Vec<Level>, u64)> = HashMap::new();
    for cell in obs.cells() {
        let entry = cells
            .entry(Observations::key(cell, union))
            .or_insert_with(|| (Observations::key(cell, alpha.facets()), 0));
        entry.1 += cell.count;
    }

    let groups = obs.groups(alpha.facets());
    cells
        .values()
        .map(|(group, n)| {
            groups.get(group).map_or(0.0, |g| {
                let n = *n as f64;
                n * n / g.count as f64
            })
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::design::Design;

    fn assert_matrices_close(a: &CoefficientMatrix, b: &CoefficientMatrix) {
        assert_eq!(a.names(), b.names());
        for (x, y) in a.full().iter().zip(b.full().iter()) {
            assert!((x - y).abs() < 1e-9, "{a}\n{b}");
        }
    }

    #[test]
    fn test_counted_matches_closed_form_on_balanced_data() {
        for (expr, levels, reps) in [
            ("p x i", vec![5, 4], 1),
            ("p x i", vec![3, 2], 3),
            ("i:p", vec![4, 6], 1),
            ("p x (i:h)", vec![4, 3, 2], 1),
            ("(p x i):h", vec![3, 2, 2], 2),
            ("i:h:p", vec![2, 3, 2], 1),
            ("p x i x o", vec![3, 2, 2], 1),
        ] {
            let design = Design::parse(expr).unwrap();
            let obs = Dataset::balanced(&design, &levels, reps)
                .unwrap()
                .bind(&design)
                .unwrap();
            let mut effects = design.effects().to_vec();
            if reps > 1 {
                effects.push(Effect::residual(design.all_facets()));
            }
            let counted = CoefficientMatrix::from_observations(&obs, &effects);
            let closed = CoefficientMatrix::balanced(&effects, &levels, reps);
            assert_matrices_close(&counted, &closed);
        }
    }

    #[test]
    fn test_unbalanced_nested_coefficients() {
        // 2 persons; h1 holds 2 items, h2 holds 4
        let design = Design::parse("p x (i:h)").unwrap();
        let mut builder = Dataset::builder(["p", "i", "h"]);
        for p in ["p1", "p2"] {
            for (h, items) in [("h1", 2), ("h2", 4)] {
                for i in 0..items {
                    builder.push(&[p.to_string(), i.to_string(), h.to_string()], 1.0);
                }
            }
        }
        let obs = builder.build().unwrap().bind(&design).unwrap();
        let m = CoefficientMatrix::from_observations(&obs, design.effects());
        let h = design.effect("h").unwrap();
        let idx = |name: &str| design.effects().iter().position(|e| e.name() == name).unwrap();

        // c(mean, h) = (4² + 8²) / 12
        assert!((m.get(0, idx("h")) - 80.0 / 12.0).abs() < 1e-12);
        // c(p, h) = per person (2² + 4²) / 6, two persons
        assert!((m.get(idx("p"), idx("h")) - 2.0 * 20.0 / 6.0).abs() < 1e-12);
        // c(h, p) = Σ_h Σ_p n_ph² / n_h = (2·4 / 4) + (2·16 / 8)
        assert!((coefficient(&obs, h, design.effect("p").unwrap()) - 6.0).abs() < 1e-12);
        // sub-effects get N
        assert!((m.get(idx("(p x i):h"), idx("i:h")) - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_reduced_system() {
        let design = Design::parse("i:p").unwrap();
        let m = CoefficientMatrix::balanced(design.effects(), &[8, 10], 1);
        let r = m.reduced();
        assert_eq!(r.dim(), (2, 2));
        // rows p, i:p minus mean row
        assert!((r[[0, 0]] - 72.0).abs() < 1e-12);
        assert!((r[[0, 1]] - 9.0).abs() < 1e-12);
        assert!((r[[1, 0]] - 72.0).abs() < 1e-12);
        assert!((r[[1, 1]] - 79.0).abs() < 1e-12);
    }
}
