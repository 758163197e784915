//! Level divisors L(α, β) for error variances.
//!
//! For each differentiation group g, the effective number of β-conditions is
//! (Σ n)² / Σ n² over the cells of α ∪ β inside g; groups are combined by
//! harmonic mean. Balanced data reduce this to the product of the level
//! counts of β's facets outside α.

use std::collections::HashMap;

use crate::data::{Level, Observations};
use crate::design::Effect;
use crate::utils::harmonic_mean;

/// Observed level divisor for component `beta` relative to `alpha`.
pub(crate) fn observed_level(obs: &Observations, alpha: &Effect, beta: &Effect) -> f64 {
    if !beta.is_residual() && beta.facets().is_subset(alpha.facets()) {
        return 1.0;
    }

    let per_group: Vec<f64> = if beta.is_residual() {
        // every replicate is a cell of one
        obs.groups(alpha.facets())
            .values()
            .map(|g| g.count as f64)
            .collect()
    } else {
        let union = alpha.facets().union(beta.facets());
        let mut cells: HashMap<Vec<Level>, (Vec<Level>, u64)> = HashMap::new();
        for cell in obs.cells() {
            let entry = cells
                .entry(Observations::key(cell, union))
                .or_insert_with(|| (Observations::key(cell, alpha.facets()), 0));
            entry.1 += cell.count;
        }

        let mut sums: HashMap<Vec<Level>, (f64, f64)> = HashMap::new();
        for (group, n) in cells.into_values() {
            let n = n as f64;
            let entry = sums.entry(group).or_default();
            entry.0 += n;
            entry.1 += n * n;
        }
        sums.into_values().map(|(s, sq)| s * s / sq).collect()
    };

    harmonic_mean(per_group).unwrap_or(1.0)
}

/// Balanced level divisor with `levels[f]` levels of facet `f` per parent
/// cell and `replicates` observations per cell.
pub(crate) fn balanced_level(alpha: &Effect, beta: &Effect, levels: &[usize], replicates: u64) -> f64 {
    let product: f64 = beta
        .facets()
        .difference(alpha.facets())
        .iter()
        .map(|f| levels[f.index()] as f64)
        .product();
    if beta.is_residual() {
        product * replicates as f64
    } else {
        product
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::design::Design;

    #[test]
    fn test_observed_matches_balanced() {
        let design = Design::parse("p x (i:h)").unwrap();
        let levels = [5, 3, 2];
        let obs = Dataset::balanced(&design, &levels, 1)
            .unwrap()
            .bind(&design)
            .unwrap();
        let p = design.effect("p").unwrap();
        for beta in &design.effects()[1..] {
            let observed = observed_level(&obs, p, beta);
            let balanced = balanced_level(p, beta, &levels, 1);
            assert!((observed - balanced).abs() < 1e-12, "{beta}");
        }
    }

    #[test]
    fn test_unequal_items_per_group() {
        // person 1 answers 2 items, person 2 answers 4
        let design = Design::parse("p x i").unwrap();
        let mut builder = Dataset::builder(["p", "i"]);
        for i in 0..2 {
            builder.push(&["a".to_string(), i.to_string()], 1.0);
        }
        for i in 0..4 {
            builder.push(&["b".to_string(), i.to_string()], 1.0);
        }
        let obs = builder.build().unwrap().bind(&design).unwrap();
        let p = design.effect("p").unwrap();
        let pi = design.effect("p x i").unwrap();

        // harmonic mean of 2 and 4
        assert!((observed_level(&obs, p, pi) - 8.0 / 3.0).abs() < 1e-12);
        assert!((observed_level(&obs, p, p) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_replicated_cells_count_conditions_once() {
        let design = Design::parse("p x i").unwrap();
        let obs = Dataset::balanced(&design, &[3, 4], 2)
            .unwrap()
            .bind(&design)
            .unwrap();
        let p = design.effect("p").unwrap();
        let residual = Effect::residual(design.all_facets());

        assert!((observed_level(&obs, p, design.effect("i").unwrap()) - 4.0).abs() < 1e-12);
        assert!((observed_level(&obs, p, &residual) - 8.0).abs() < 1e-12);
        assert!((balanced_level(p, &residual, &[3, 4], 2) - 8.0).abs() < 1e-12);
    }
}
