//! # gtheory
//!
//! Variance components and reliability coefficients for Generalizability
//! Theory designs with crossed and nested facets, unbalanced cell counts and
//! missing data.
//!
//! ## Overview
//!
//! Generalizability (G) theory splits observed-score variance into components
//! attributable to each facet of measurement (persons, items, raters,
//! occasions) and their interactions. This library provides:
//! - A design grammar (`p x (i:h)`) with automatic effect enumeration
//! - Henderson's Method 1 for variance components under any cell counts
//! - Generalizability (Eρ²) and dependability (Φ) coefficients with
//!   harmonic-mean levels for unbalanced data
//! - Decision (D) studies over hypothetical balanced sample sizes
//! - Confidence intervals for facet level means
//!
//! ## Quick Start
//!
//! ```rust
//! use gtheory::{Dataset, DStudyPlan, GStudyBuilder};
//!
//! // items nested in persons: 3 persons, 2 items each
//! let mut builder = Dataset::builder(["person", "item"]);
//! for (p, scores) in [[6.0, 7.0], [2.0, 4.0], [9.0, 8.0]].iter().enumerate() {
//!     for (i, y) in scores.iter().enumerate() {
//!         builder.push(&[p, i], *y);
//!     }
//! }
//! let data = builder.build().unwrap();
//!
//! let study = GStudyBuilder::new()
//!     .design("item:person")
//!     .analyze(&data)
//!     .unwrap();
//!
//! let sigma_p = study.anova().variance("person").unwrap();
//! assert!(sigma_p > 0.0);
//!
//! let scenarios = study
//!     .d_study(&DStudyPlan::new().facet("item", [1, 2, 4]))
//!     .unwrap();
//! let rho: Vec<f64> = scenarios
//!     .iter()
//!     .map(|s| s.coefficient("person").unwrap().e_rho2)
//!     .collect();
//! assert!(rho[0] < rho[1] && rho[1] < rho[2]);
//! ```
//!
//! ## Notation
//!
//! - **T(α)**: uncorrected sum of squares, Σ over α-groups of (group sum)² / n
//! - **σ²(α)**: variance component of effect α
//! - **τ, δ, Δ**: universe-score, relative-error and absolute-error variance
//!
//! ## Features
//!
//! - `serde`: Enable serialization/deserialization of results and config
//! - `parallel`: Enable parallel T-value and coefficient computation using rayon
//! - `python`: Enable Python bindings via PyO3

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod anova;
pub mod builder;
pub mod data;
pub mod design;
pub mod error;
pub mod gcoeff;
#[cfg(feature = "python")]
pub mod python;
pub mod utils;

#[cfg(feature = "parallel")]
mod parallel;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::anova::{
        AnalysisConfig, AnovaTable, Bound, CoefficientMatrix, EffectRow, TValue,
    };
    pub use crate::builder::{analyze, GStudy, GStudyBuilder};
    pub use crate::data::{Dataset, DatasetBuilder};
    pub use crate::design::{Design, Effect, EffectKind, Facet, FacetId, FacetSet};
    pub use crate::error::{Error, Result};
    pub use crate::gcoeff::{
        DStudyPlan, DStudyScenario, FacetIntervals, GCoefficient, LevelInterval,
    };
}

// Re-export commonly used items at crate root
pub use anova::{AnalysisConfig, AnovaTable, CoefficientMatrix, EffectRow};
pub use builder::{analyze, GStudy, GStudyBuilder};
pub use data::Dataset;
pub use design::{Design, Effect};
pub use error::{Error, Result};
pub use gcoeff::{DStudyPlan, DStudyScenario, GCoefficient};
