//! Observation tables and their binding to a design.
//!
//! A [`Dataset`] is a flat table: one column per facet holding opaque level
//! labels, plus a response. Rows may be individual observations or
//! pre-aggregated replicate groups (`sum`, `count`, optional `sum_sq`).
//! Missing cells are simply absent rows.
//!
//! ```rust
//! use gtheory::Dataset;
//!
//! let mut builder = Dataset::builder(["person", "item"]);
//! builder.push(&["p1", "i1"], 3.0).push(&["p1", "i2"], 4.0);
//! builder.push_aggregate(&["p2", "i1"], 10.0, 2, Some(52.0));
//! let data = builder.build().unwrap();
//!
//! assert_eq!(data.rows(), 3);
//! assert_eq!(data.total_count(), 4);
//! ```

mod pseudo;

use std::collections::{HashMap, HashSet};
use std::fmt::Display;

use tracing::debug;

use crate::design::{Design, FacetId, FacetSet};
use crate::error::{Error, Result};

/// Interned level identifier, dense per column.
pub type Level = u32;

#[derive(Debug, Clone, PartialEq)]
struct Row {
    levels: Vec<Level>,
    sum: f64,
    count: u64,
    sum_sq: Option<f64>,
}

/// A table of observations keyed by facet levels.
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<String>,
    labels: Vec<Vec<String>>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Start a dataset with the given facet columns.
    pub fn builder<I, S>(columns: I) -> DatasetBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DatasetBuilder::new(columns.into_iter().map(Into::into).collect())
    }

    /// Column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows as pushed (aggregated rows count once).
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of individual observations, replicates included.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.rows.iter().map(|r| r.count).sum()
    }

    /// Distinct level labels of a column, in order of first appearance.
    #[must_use]
    pub fn levels(&self, column: &str) -> Option<&[String]> {
        let idx = self.columns.iter().position(|c| c == column)?;
        Some(&self.labels[idx])
    }

    /// Collapse the rows into cells over the design's facets.
    ///
    /// Columns without a matching facet are ignored, so their rows become
    /// replicates of the remaining cells.
    pub(crate) fn bind(&self, design: &Design) -> Result<Observations> {
        let mut column_of = Vec::with_capacity(design.facets().len());
        for facet in design.facets() {
            let idx = self
                .columns
                .iter()
                .position(|c| c == facet.name())
                .ok_or_else(|| {
                    Error::invalid_design(format!(
                        "facet '{}' has no column in the dataset",
                        facet.name()
                    ))
                })?;
            column_of.push(idx);
        }
        let ignored = self.columns.len() - column_of.len();
        if ignored > 0 {
            debug!(ignored, "dataset columns outside the design are pooled into replicates");
        }

        let mut index: HashMap<Vec<Level>, usize> = HashMap::new();
        let mut cells: Vec<Cell> = Vec::new();
        for row in &self.rows {
            let key: Vec<Level> = column_of.iter().map(|&c| row.levels[c]).collect();
            let sum_sq = row
                .sum_sq
                .unwrap_or_else(|| row.sum * row.sum / row.count as f64);
            let slot = *index.entry(key.clone()).or_insert_with(|| {
                cells.push(Cell {
                    levels: key,
                    sum: 0.0,
                    count: 0,
                    sum_sq: 0.0,
                    exact: true,
                });
                cells.len() - 1
            });
            let cell = &mut cells[slot];
            cell.sum += row.sum;
            cell.count += row.count;
            cell.sum_sq += sum_sq;
            cell.exact &= row.sum_sq.is_some() || row.count == 1;
        }

        let nested_in = design
            .facets()
            .iter()
            .enumerate()
            .map(|(i, _)| design.nested_within(FacetId(i)))
            .collect();

        debug!(cells = cells.len(), rows = self.rows.len(), "bound dataset to design");
        Ok(Observations {
            n_facets: design.facets().len(),
            nested_in,
            total: cells.iter().map(|c| c.count).sum(),
            cells,
        })
    }
}

/// Row-by-row construction of a [`Dataset`].
///
/// Errors in individual pushes are reported by [`DatasetBuilder::build`].
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    columns: Vec<String>,
    labels: Vec<Vec<String>>,
    index: Vec<HashMap<String, Level>>,
    rows: Vec<Row>,
    error: Option<Error>,
}

impl DatasetBuilder {
    fn new(columns: Vec<String>) -> Self {
        let n = columns.len();
        Self {
            columns,
            labels: vec![Vec::new(); n],
            index: vec![HashMap::new(); n],
            rows: Vec::new(),
            error: None,
        }
    }

    /// Add one observation.
    pub fn push<L: Display>(&mut self, levels: &[L], value: f64) -> &mut Self {
        self.push_row(levels, value, 1, Some(value * value))
    }

    /// Add an aggregated replicate group: the sum of `count` observations
    /// and, when known, the sum of their squares.
    ///
    /// Without `sum_sq` the within-cell variation is unknown and the residual
    /// T-value becomes a lower bound.
    pub fn push_aggregate<L: Display>(
        &mut self,
        levels: &[L],
        sum: f64,
        count: u64,
        sum_sq: Option<f64>,
    ) -> &mut Self {
        self.push_row(levels, sum, count, sum_sq)
    }

    fn push_row<L: Display>(
        &mut self,
        levels: &[L],
        sum: f64,
        count: u64,
        sum_sq: Option<f64>,
    ) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        let row = self.rows.len();
        if levels.len() != self.columns.len() {
            self.error = Some(Error::invalid_data(format!(
                "row {row} has {} levels, expected {}",
                levels.len(),
                self.columns.len()
            )));
            return self;
        }
        if count == 0 {
            self.error = Some(Error::invalid_data(format!(
                "row {row} has a replicate count of zero"
            )));
            return self;
        }
        if !sum.is_finite() || sum_sq.is_some_and(|s| !s.is_finite()) {
            self.error = Some(Error::invalid_data(format!(
                "row {row} has a non-finite response"
            )));
            return self;
        }

        let levels = levels
            .iter()
            .enumerate()
            .map(|(col, label)| self.intern(col, label.to_string()))
            .collect();
        self.rows.push(Row {
            levels,
            sum,
            count,
            sum_sq,
        });
        self
    }

    fn intern(&mut self, col: usize, label: String) -> Level {
        if let Some(&id) = self.index[col].get(&label) {
            return id;
        }
        let id = self.labels[col].len() as Level;
        self.labels[col].push(label.clone());
        self.index[col].insert(label, id);
        id
    }

    /// Finish the dataset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidData`] for the first malformed row, duplicate
    /// column names, or an empty table.
    pub fn build(self) -> Result<Dataset> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(Error::invalid_data(format!("column '{dup}' appears twice")));
        }
        if self.rows.is_empty() {
            return Err(Error::invalid_data("dataset has no observations"));
        }
        Ok(Dataset {
            columns: self.columns,
            labels: self.labels,
            rows: self.rows,
        })
    }
}

/// Aggregated observations of one full-facet cell.
#[derive(Debug, Clone)]
pub(crate) struct Cell {
    pub(crate) levels: Vec<Level>,
    pub(crate) sum: f64,
    pub(crate) count: u64,
    pub(crate) sum_sq: f64,
    /// False when some replicated row had no `sum_sq`.
    pub(crate) exact: bool,
}

/// Running totals of a group of cells.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Group {
    pub(crate) sum: f64,
    pub(crate) count: u64,
}

/// A dataset collapsed onto the cells of one design.
#[derive(Debug, Clone)]
pub(crate) struct Observations {
    n_facets: usize,
    nested_in: Vec<FacetSet>,
    cells: Vec<Cell>,
    total: u64,
}

impl Observations {
    pub(crate) fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Total number of individual observations.
    pub(crate) fn total(&self) -> u64 {
        self.total
    }

    /// Whether some cell holds more than one observation.
    pub(crate) fn has_replicates(&self) -> bool {
        self.cells.iter().any(|c| c.count > 1)
    }

    pub(crate) fn key(cell: &Cell, set: FacetSet) -> Vec<Level> {
        set.iter().map(|f| cell.levels[f.0]).collect()
    }

    /// Sums and counts per distinct level combination of `set`.
    pub(crate) fn groups(&self, set: FacetSet) -> HashMap<Vec<Level>, Group> {
        let mut groups: HashMap<Vec<Level>, Group> = HashMap::new();
        for cell in &self.cells {
            let group = groups.entry(Self::key(cell, set)).or_default();
            group.sum += cell.sum;
            group.count += cell.count;
        }
        groups
    }

    /// Number of distinct level combinations of `set` observed.
    pub(crate) fn group_count(&self, set: FacetSet) -> usize {
        if set.is_empty() {
            return 1;
        }
        self.cells
            .iter()
            .map(|c| Self::key(c, set))
            .collect::<HashSet<_>>()
            .len()
    }

    /// Distinct levels of `facet` inside each cell of the facets it is
    /// nested within.
    fn levels_per_parent(&self, facet: FacetId) -> HashMap<Vec<Level>, usize> {
        let parent = self.nested_in[facet.0];
        let mut seen: HashMap<Vec<Level>, HashSet<Level>> = HashMap::new();
        for cell in &self.cells {
            seen.entry(Self::key(cell, parent))
                .or_default()
                .insert(cell.levels[facet.0]);
        }
        seen.into_iter().map(|(k, v)| (k, v.len())).collect()
    }

    /// Levels of `facet` per parent cell, when that number is the same in
    /// every parent cell.
    pub(crate) fn uniform_levels(&self, facet: FacetId) -> Option<usize> {
        uniform(self.levels_per_parent(facet).into_values())
    }

    /// Replicates per full cell, when every cell holds the same number.
    pub(crate) fn uniform_replicates(&self) -> Option<u64> {
        uniform(self.cells.iter().map(|c| c.count))
    }

    /// Whether every cell the design allows is observed.
    ///
    /// For every nest-closed facet set and each of its primary facets `f`,
    /// each group of the set without `f` must hold every level of `f` seen in
    /// its parent cell.
    pub(crate) fn is_complete(&self, design: &Design) -> bool {
        let per_parent: Vec<HashMap<Vec<Level>, usize>> = (0..self.n_facets)
            .map(|f| self.levels_per_parent(FacetId(f)))
            .collect();

        design
            .effects()
            .iter()
            .filter(|e| !e.is_mean())
            .all(|effect| {
                let observed = self.group_count(effect.facets());
                effect.primary().iter().all(|f| {
                    let rest = effect.facets().difference(FacetSet::single(f));
                    let parent = self.nested_in[f.0];
                    let expected: usize = self
                        .cells
                        .iter()
                        .map(|c| Self::key(c, rest))
                        .collect::<HashSet<_>>()
                        .iter()
                        .map(|key| {
                            let parent_key: Vec<Level> = rest
                                .iter()
                                .zip(key)
                                .filter(|(g, _)| parent.contains(*g))
                                .map(|(_, &l)| l)
                                .collect();
                            per_parent[f.0].get(&parent_key).copied().unwrap_or(0)
                        })
                        .sum();
                    observed == expected
                })
            })
    }

    /// Complete, with the same replicate count in every cell and the same
    /// number of levels of every nested facet in each parent cell.
    pub(crate) fn is_balanced(&self, design: &Design) -> bool {
        self.is_complete(design)
            && self.uniform_replicates().is_some()
            && (0..self.n_facets).all(|f| self.uniform_levels(FacetId(f)).is_some())
    }
}

fn uniform<T: PartialEq>(mut values: impl Iterator<Item = T>) -> Option<T> {
    let first = values.next()?;
    values.all(|v| v == first).then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crossed(rows: &[(&str, &str, f64)]) -> Dataset {
        let mut builder = Dataset::builder(["p", "i"]);
        for (p, i, y) in rows {
            builder.push(&[p, i], *y);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_builder_interns_levels() {
        let data = crossed(&[("a", "x1", 1.0), ("b", "x1", 2.0), ("a", "x2", 3.0)]);
        assert_eq!(data.levels("p").unwrap(), ["a", "b"]);
        assert_eq!(data.levels("i").unwrap(), ["x1", "x2"]);
        assert!(data.levels("h").is_none());
    }

    #[test]
    fn test_builder_rejects_bad_rows() {
        let mut builder = Dataset::builder(["p", "i"]);
        builder.push(&["a"], 1.0);
        assert!(matches!(builder.build(), Err(Error::InvalidData { .. })));

        let mut builder = Dataset::builder(["p", "i"]);
        builder.push(&["a", "b"], f64::NAN);
        assert!(builder.build().is_err());

        let mut builder = Dataset::builder(["p", "i"]);
        builder.push_aggregate(&["a", "b"], 3.0, 0, None);
        assert!(builder.build().is_err());

        assert!(Dataset::builder(["p", "i"]).build().is_err());

        let mut builder = Dataset::builder(["p", "p"]);
        builder.push(&["a", "b"], 1.0);
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_bind_unknown_facet() {
        let data = crossed(&[("a", "x", 1.0)]);
        let design = Design::parse("p x o").unwrap();
        assert!(matches!(data.bind(&design), Err(Error::InvalidDesign { .. })));
    }

    #[test]
    fn test_bind_merges_replicates() {
        let data = crossed(&[("a", "x", 1.0), ("a", "x", 3.0), ("b", "x", 2.0)]);
        let design = Design::parse("p x i").unwrap();
        let obs = data.bind(&design).unwrap();
        assert_eq!(obs.cells().len(), 2);
        assert_eq!(obs.total(), 3);
        assert!(obs.has_replicates());

        let cell = &obs.cells()[0];
        assert_eq!(cell.count, 2);
        assert!((cell.sum - 4.0).abs() < 1e-12);
        assert!((cell.sum_sq - 10.0).abs() < 1e-12);
        assert!(cell.exact);
    }

    #[test]
    fn test_completeness_crossed() {
        let design = Design::parse("p x i").unwrap();
        let full = crossed(&[("a", "1", 1.0), ("a", "2", 1.0), ("b", "1", 1.0), ("b", "2", 1.0)]);
        let obs = full.bind(&design).unwrap();
        assert!(obs.is_complete(&design));
        assert!(obs.is_balanced(&design));

        let holed = crossed(&[("a", "1", 1.0), ("a", "2", 1.0), ("b", "1", 1.0)]);
        let obs = holed.bind(&design).unwrap();
        assert!(!obs.is_complete(&design));
    }

    #[test]
    fn test_completeness_nested_unequal() {
        // 2 items in h1, 3 in h2, every person answers every item
        let design = Design::parse("p x (i:h)").unwrap();
        let mut builder = Dataset::builder(["p", "i", "h"]);
        for p in ["p1", "p2"] {
            for (h, items) in [("h1", 2), ("h2", 3)] {
                for i in 0..items {
                    builder.push(&[p.to_string(), i.to_string(), h.to_string()], 1.0);
                }
            }
        }
        let obs = builder.build().unwrap().bind(&design).unwrap();
        assert!(obs.is_complete(&design));
        assert!(!obs.is_balanced(&design));
        assert_eq!(obs.uniform_levels(design.facet_id("i").unwrap()), None);
        assert_eq!(obs.uniform_levels(design.facet_id("h").unwrap()), Some(2));
    }

    #[test]
    fn test_group_counts() {
        let data = crossed(&[("a", "1", 1.0), ("a", "2", 2.0), ("b", "1", 4.0)]);
        let design = Design::parse("p x i").unwrap();
        let obs = data.bind(&design).unwrap();
        let p = FacetSet::single(design.facet_id("p").unwrap());

        assert_eq!(obs.group_count(p), 2);
        assert_eq!(obs.group_count(FacetSet::empty()), 1);
        let groups = obs.groups(p);
        let a = groups.get(&vec![0]).unwrap();
        assert_eq!(a.count, 2);
        assert!((a.sum - 3.0).abs() < 1e-12);
    }
}
