//! Builder pattern for running a G study.
//!
//! The builder ties the pieces together: parse the design, mark fixed
//! facets, bind the dataset, estimate the variance components, and hand back
//! a [`GStudy`] that answers coefficient, decision-study and interval
//! queries.
//!
//! # Example
//!
//! ```
//! use gtheory::{Dataset, GStudyBuilder};
//!
//! let scores = [[4.0, 5.0, 3.0], [2.0, 2.0, 1.0], [5.0, 4.0, 5.0], [3.0, 4.0, 2.0]];
//! let mut builder = Dataset::builder(["person", "item"]);
//! for (p, row) in scores.iter().enumerate() {
//!     for (i, y) in row.iter().enumerate() {
//!         builder.push(&[p, i], *y);
//!     }
//! }
//! let data = builder.build().unwrap();
//!
//! let study = GStudyBuilder::new()
//!     .design("person x item")
//!     .analyze(&data)
//!     .unwrap();
//!
//! let person = &study.g_coefficients()[0];
//! assert_eq!(person.effect, "person");
//! assert!(person.e_rho2 > 0.8);
//! assert!(person.phi <= person.e_rho2);
//! ```

use tracing::info;

use crate::anova::{self, AnalysisConfig, AnovaTable};
use crate::data::{Dataset, Observations};
use crate::design::Design;
use crate::error::{Error, Result};
use crate::gcoeff::{self, DStudyPlan, DStudyScenario, FacetIntervals, GCoefficient};

/// Builder for a G study.
///
/// # Example
///
/// ```
/// use gtheory::{AnalysisConfig, Dataset, GStudyBuilder};
///
/// let mut builder = Dataset::builder(["p", "i", "o"]);
/// for p in 0..4 {
///     for i in 0..3 {
///         for o in 0..2 {
///             builder.push(&[p, i, o], f64::from(p * 2 + (i + o) % 2 + (p * o) % 3));
///         }
///     }
/// }
/// let data = builder.build().unwrap();
///
/// let study = GStudyBuilder::new()
///     .design("p x i x o")
///     .fixed("i")
///     .config(AnalysisConfig { parallel: false, ..AnalysisConfig::default() })
///     .analyze(&data)
///     .unwrap();
///
/// assert_eq!(study.anova().rows().len(), 8);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GStudyBuilder {
    design: Option<String>,
    fixed: Vec<String>,
    config: AnalysisConfig,
}

impl GStudyBuilder {
    /// Create a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the design expression, e.g. `p x (i:h)`.
    #[must_use]
    pub fn design(mut self, expression: impl Into<String>) -> Self {
        self.design = Some(expression.into());
        self
    }

    /// Mark a facet as fixed. Facets are random unless marked.
    #[must_use]
    pub fn fixed(mut self, facet: impl Into<String>) -> Self {
        self.fixed.push(facet.into());
        self
    }

    /// Replace the analysis configuration.
    #[must_use]
    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    /// Estimate the variance components of `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No design was given, or it does not parse
    /// - A fixed or design facet has no column in `data`
    /// - The coefficient system is singular
    pub fn analyze(self, data: &Dataset) -> Result<GStudy> {
        let expression = self
            .design
            .ok_or_else(|| Error::invalid_design("design expression must be specified"))?;
        let design = Design::parse(&expression)?.with_fixed(&self.fixed)?;
        GStudy::new(design, data, self.config)
    }
}

/// Run a G study with default settings.
///
/// # Errors
///
/// See [`GStudyBuilder::analyze`].
pub fn analyze(expression: &str, data: &Dataset) -> Result<GStudy> {
    GStudyBuilder::new().design(expression).analyze(data)
}

/// A completed G study: the bound data and its variance components.
#[derive(Debug, Clone)]
pub struct GStudy {
    design: Design,
    observations: Observations,
    labels: Vec<Vec<String>>,
    table: AnovaTable,
    coefficients: Vec<GCoefficient>,
}

impl GStudy {
    /// Analyse `data` under an already-parsed design.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDesign`] if a facet has no column in `data`
    /// and [`Error::SingularDesign`] if the components are not identified.
    pub fn new(design: Design, data: &Dataset, config: AnalysisConfig) -> Result<Self> {
        let observations = data.bind(&design)?;
        let labels = design
            .facets()
            .iter()
            .map(|f| data.levels(f.name()).map(<[String]>::to_vec).unwrap_or_default())
            .collect();

        let table = anova::analyze(&design, &observations, &config)?;
        let coefficients = gcoeff::g_coefficients(&design, &observations, &table);
        info!(
            design = %design,
            observations = table.total_count(),
            effects = table.rows().len(),
            "G study complete"
        );

        Ok(Self {
            design,
            observations,
            labels,
            table,
            coefficients,
        })
    }

    /// The design analysed.
    #[must_use]
    pub fn design(&self) -> &Design {
        &self.design
    }

    /// The ANOVA table with variance components.
    #[must_use]
    pub fn anova(&self) -> &AnovaTable {
        &self.table
    }

    /// Eρ² and Φ for every differentiation effect, using harmonic-mean levels
    /// of the observed data.
    #[must_use]
    pub fn g_coefficients(&self) -> &[GCoefficient] {
        &self.coefficients
    }

    /// Coefficients for the named differentiation effect.
    #[must_use]
    pub fn g_coefficient(&self, effect: &str) -> Option<&GCoefficient> {
        self.coefficients.iter().find(|c| c.effect == effect)
    }

    /// Whether every cell the design allows was observed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.observations.is_complete(&self.design)
    }

    /// Whether the data are complete with equal counts throughout.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.observations.is_balanced(&self.design)
    }

    /// Coefficients for hypothetical balanced sizes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompleteData`] when the G study has missing cells
    /// and [`Error::InvalidParams`] for an invalid plan.
    pub fn d_study(&self, plan: &DStudyPlan) -> Result<Vec<DStudyScenario>> {
        gcoeff::d_study(&self.design, &self.observations, &self.table, plan)
    }

    /// Decision study with caller-supplied variance components.
    ///
    /// Each `(effect, variance)` pair replaces the estimated component of the
    /// named effect; effects left out keep their estimate. Useful for
    /// planning from published components or from a pooled G study.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParams`] for an unknown effect name, a
    /// negative or non-finite variance, or an invalid plan, and
    /// [`Error::IncompleteData`] when the G study has missing cells.
    pub fn coefficients_with(
        &self,
        variances: &[(&str, f64)],
        plan: &DStudyPlan,
    ) -> Result<Vec<DStudyScenario>> {
        let rows = gcoeff::substitute_components(&self.table, variances)?;
        gcoeff::d_study_with_rows(&self.design, &self.observations, &self.table, &rows, plan)
    }

    /// Confidence intervals for the group means of every differentiation
    /// effect at significance `alpha`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParams`] unless `0 < alpha < 1`.
    pub fn confidence_intervals(&self, alpha: f64) -> Result<Vec<FacetIntervals>> {
        gcoeff::confidence_intervals(
            &self.design,
            &self.observations,
            &self.table,
            &self.labels,
            alpha,
        )
    }
}
