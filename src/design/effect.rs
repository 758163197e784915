//! Effects and the facet-set algebra behind them.
//!
//! An effect is identified by the set of facets it spans. The set is closed
//! under nesting: an effect containing a nested facet also contains every
//! facet that facet is nested within. Those nesting facets are the effect's
//! *nesting* indices; the rest are its *primary* indices, and only primary
//! indices are removed when forming sub-effects for inclusion–exclusion.

use std::fmt;

use super::FacetId;

/// A set of facets, stored as a bitmask over [`FacetId`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FacetSet(u32);

impl FacetSet {
    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// A set holding only `facet`.
    #[must_use]
    pub const fn single(facet: FacetId) -> Self {
        Self(1 << facet.0)
    }

    /// The set of the first `n` facets.
    #[must_use]
    pub const fn first(n: usize) -> Self {
        if n >= 32 {
            Self(u32::MAX)
        } else {
            Self((1 << n) - 1)
        }
    }

    /// Whether `facet` is a member.
    #[must_use]
    pub const fn contains(self, facet: FacetId) -> bool {
        self.0 & (1 << facet.0) != 0
    }

    /// Add `facet` to the set.
    pub fn insert(&mut self, facet: FacetId) {
        self.0 |= 1 << facet.0;
    }

    /// Set union.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Members of `self` not in `other`.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Whether every member of `self` is in `other`.
    #[must_use]
    pub const fn is_subset(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    /// Number of members.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether the set is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Members in ascending [`FacetId`] order.
    pub fn iter(self) -> impl Iterator<Item = FacetId> {
        (0..32usize)
            .filter(move |&i| self.0 & (1 << i) != 0)
            .map(FacetId)
    }

    /// Every subset of `self`, the empty set included.
    pub fn subsets(self) -> impl Iterator<Item = FacetSet> {
        let members: Vec<FacetId> = self.iter().collect();
        (0u32..(1 << members.len())).map(move |mask| {
            let mut subset = FacetSet::empty();
            for (bit, &facet) in members.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    subset.insert(facet);
                }
            }
            subset
        })
    }

    /// Ordering used for effect lists: smaller sets first, then by the
    /// declaration order of their facets.
    pub(crate) fn display_cmp(self, other: Self) -> std::cmp::Ordering {
        self.len()
            .cmp(&other.len())
            .then_with(|| self.iter().cmp(other.iter()))
    }
}

impl FromIterator<FacetId> for FacetSet {
    fn from_iter<T: IntoIterator<Item = FacetId>>(iter: T) -> Self {
        let mut set = FacetSet::empty();
        for facet in iter {
            set.insert(facet);
        }
        set
    }
}

/// What an effect stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EffectKind {
    /// The grand mean; carries μ² rather than a variance.
    Mean,
    /// A facet or a crossed/nested combination of facets.
    Facets,
    /// Within-cell replication, present only when full cells hold more than
    /// one replicate.
    Residual,
}

/// A variance-component source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Effect {
    kind: EffectKind,
    facets: FacetSet,
    primary: FacetSet,
    name: String,
}

impl Effect {
    pub(crate) fn mean() -> Self {
        Self {
            kind: EffectKind::Mean,
            facets: FacetSet::empty(),
            primary: FacetSet::empty(),
            name: "mean".to_string(),
        }
    }

    pub(crate) fn residual(all: FacetSet) -> Self {
        Self {
            kind: EffectKind::Residual,
            facets: all,
            primary: all,
            name: "residual".to_string(),
        }
    }

    /// Build a facet effect; `nested_in[f]` lists the facets `f` is nested
    /// within and `names[f]` its display name.
    pub(crate) fn from_facets(facets: FacetSet, nested_in: &[FacetSet], names: &[String]) -> Self {
        // closed under nesting, so the union stays inside `facets`
        let nesting = facets
            .iter()
            .fold(FacetSet::empty(), |acc, f| acc.union(nested_in[f.0]));
        let primary = facets.difference(nesting);

        Self {
            kind: EffectKind::Facets,
            facets,
            primary,
            name: effect_name(primary, nesting, names),
        }
    }

    /// The effect kind.
    #[must_use]
    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    /// Canonical name, e.g. `p`, `i:h`, `(p x i):h`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All facets the effect spans.
    #[must_use]
    pub fn facets(&self) -> FacetSet {
        self.facets
    }

    /// Facets of the effect that no other facet of the effect is nested in.
    #[must_use]
    pub fn primary(&self) -> FacetSet {
        self.primary
    }

    /// Facets of the effect that some primary facet is nested in.
    #[must_use]
    pub fn nesting(&self) -> FacetSet {
        self.facets.difference(self.primary)
    }

    /// Whether this is the grand mean.
    #[must_use]
    pub fn is_mean(&self) -> bool {
        self.kind == EffectKind::Mean
    }

    /// Whether this is the within-cell residual.
    #[must_use]
    pub fn is_residual(&self) -> bool {
        self.kind == EffectKind::Residual
    }

    /// Whether `other`'s facets are all part of this effect.
    ///
    /// The residual contains every effect and is contained only in itself.
    #[must_use]
    pub fn contains(&self, other: &Effect) -> bool {
        match (self.kind, other.kind) {
            (EffectKind::Residual, _) => true,
            (_, EffectKind::Residual) => false,
            _ => other.facets.is_subset(self.facets),
        }
    }

    /// Facet sets reached by dropping one primary facet.
    #[must_use]
    pub fn sub_effects(&self) -> Vec<FacetSet> {
        match self.kind {
            EffectKind::Mean => Vec::new(),
            EffectKind::Residual => vec![self.facets],
            EffectKind::Facets => self
                .primary
                .iter()
                .map(|f| self.facets.difference(FacetSet::single(f)))
                .collect(),
        }
    }

    /// Signed terms of the inclusion–exclusion sum of squares: the facet set
    /// of each T-value involved and whether it is added (`+1`) or subtracted.
    ///
    /// The residual is handled by the caller, since its leading term is the
    /// T-value of the individual observations.
    #[must_use]
    pub fn inclusion_exclusion(&self) -> Vec<(FacetSet, i32)> {
        self.primary
            .subsets()
            .map(|removed| {
                let sign = if removed.len() % 2 == 0 { 1 } else { -1 };
                (self.facets.difference(removed), sign)
            })
            .collect()
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn effect_name(primary: FacetSet, nesting: FacetSet, names: &[String]) -> String {
    let join = |set: FacetSet| {
        set.iter()
            .map(|f| names[f.0].as_str())
            .collect::<Vec<_>>()
            .join(" x ")
    };
    let wrap = |set: FacetSet| {
        if set.len() > 1 {
            format!("({})", join(set))
        } else {
            join(set)
        }
    };

    if nesting.is_empty() {
        join(primary)
    } else {
        format!("{}:{}", wrap(primary), wrap(nesting))
    }
}
