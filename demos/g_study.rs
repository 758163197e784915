//! G study walkthrough for a persons x (items : categories) design.
//!
//! Eight persons answer eight items grouped into three categories of 2, 4
//! and 2 items (Brennan's synthetic data set #4). The example estimates the
//! variance components, reports Eρ² and Φ for persons, plans a D study and
//! prints confidence intervals for the person means.

use gtheory::{analyze, DStudyPlan, Dataset};

fn main() {
    println!("gtheory - G study walkthrough\n");

    // (category, item, scores of persons 1..=8)
    let columns: [(usize, usize, [u8; 8]); 8] = [
        (1, 1, [4, 2, 2, 1, 3, 1, 3, 0]),
        (1, 2, [5, 1, 4, 3, 3, 2, 5, 1]),
        (2, 1, [3, 2, 4, 5, 6, 5, 6, 1]),
        (2, 2, [3, 3, 7, 4, 7, 6, 8, 2]),
        (2, 3, [5, 1, 6, 5, 5, 4, 6, 0]),
        (2, 4, [4, 4, 5, 5, 7, 4, 7, 4]),
        (3, 1, [5, 4, 8, 4, 8, 5, 7, 7]),
        (3, 2, [7, 6, 7, 5, 9, 6, 8, 8]),
    ];
    let mut builder = Dataset::builder(["p", "h", "i"]);
    for p in 0..8 {
        for &(h, i, ref scores) in &columns {
            builder.push(&[p + 1, h, i], f64::from(scores[p]));
        }
    }
    let data = builder.build().expect("Failed to build dataset");

    let study = analyze("p x (i:h)", &data).expect("G study failed");
    println!("Design: {}", study.design());
    println!("Balanced: {}", study.is_balanced());
    println!();

    // Unequal items per category make this an unbalanced analysis
    println!("{:<12} {:>4} {:>10} {:>10} {:>10}", "Effect", "df", "SS", "MS", "sigma^2");
    for row in study.anova().rows().iter().filter(|r| !r.effect.is_mean()) {
        println!(
            "{:<12} {:>4} {:>10.4} {:>10.4} {:>10.4}",
            row.effect.name(),
            row.degrees_of_freedom,
            row.sum_of_squares,
            row.mean_square,
            row.variance.unwrap_or_default(),
        );
    }
    println!();

    for g in study.g_coefficients() {
        println!(
            "{}: Erho2 = {:.3}, Phi = {:.3} (tau {:.4}, delta {:.4}, Delta {:.4})",
            g.effect, g.e_rho2, g.phi, g.tau, g.delta, g.big_delta
        );
    }
    println!();

    // Items per category in the D study; categories keep their G-study count
    println!("D study over items per category:");
    let scenarios = study
        .d_study(&DStudyPlan::new().facet("i", [2, 4, 6]))
        .expect("D study failed");
    for scenario in &scenarios {
        if let Some(g) = scenario.coefficient("p") {
            println!(
                "  n_i = {}, n_h = {}: Erho2 = {:.3}, Phi = {:.3}",
                scenario.level("i").unwrap_or_default(),
                scenario.level("h").unwrap_or_default(),
                g.e_rho2,
                g.phi
            );
        }
    }
    println!();

    println!("95% confidence intervals for person means:");
    let intervals = study.confidence_intervals(0.05).expect("Intervals failed");
    for facet in intervals.iter().filter(|f| f.effect == "p") {
        for interval in &facet.intervals {
            println!(
                "  person {}: {:.3} [{:.3}, {:.3}]",
                interval.levels.join(", "),
                interval.mean,
                interval.lower,
                interval.upper
            );
        }
    }
}
