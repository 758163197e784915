//! Balanced pseudo-datasets for decision-study sizes.

use super::Dataset;
use crate::design::Design;
use crate::error::{Error, Result};
use crate::utils::cartesian_product;

impl Dataset {
    /// A complete, balanced dataset for `design` with `levels[f]` levels of
    /// facet `f` per parent cell and `replicates` observations per cell.
    ///
    /// Responses are all zero; the table only carries the count structure,
    /// which is what coefficients and levels depend on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParams`] if `levels` does not give one
    /// positive count per facet or `replicates` is zero.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use gtheory::{Dataset, Design};
    ///
    /// let design = Design::parse("p x (i:h)").unwrap();
    /// let data = Dataset::balanced(&design, &[5, 3, 2], 1).unwrap();
    /// assert_eq!(data.total_count(), 5 * 3 * 2);
    /// ```
    pub fn balanced(design: &Design, levels: &[usize], replicates: u64) -> Result<Self> {
        if levels.len() != design.facets().len() {
            return Err(Error::invalid_params(format!(
                "expected {} level counts, got {}",
                design.facets().len(),
                levels.len()
            )));
        }
        if levels.contains(&0) || replicates == 0 {
            return Err(Error::invalid_params("level and replicate counts must be positive"));
        }

        let mut builder = Self::builder(design.facets().iter().map(|f| f.name().to_string()));
        let ranges: Vec<Vec<usize>> = levels.iter().map(|&n| (0..n).collect()).collect();
        for combo in cartesian_product(&ranges) {
            builder.push_aggregate(&combo, 0.0, replicates, Some(0.0));
        }
        builder.build()
    }
}
