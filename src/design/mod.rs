//! Design topology: facets, crossing and nesting, and the effects they imply.
//!
//! ## Overview
//!
//! - [`Design`]: a parsed design expression with its facets and effects
//! - [`Facet`]: a named measurement dimension, random or fixed
//! - [`Effect`]: a variance-component source (a facet combination, the grand
//!   mean, or within-cell replication)
//!
//! ## Grammar
//!
//! Facet names are joined by ` x ` (crossing) and `:` (nesting, the left side
//! nested within the right). Crossing and nesting cannot be combined at one
//! parenthesis level:
//!
//! ```rust
//! use gtheory::Design;
//!
//! let design = Design::parse("p x (i:h)").unwrap();
//! let names: Vec<&str> = design.effects().iter().map(|e| e.name()).collect();
//! assert_eq!(names, ["mean", "p", "h", "p x h", "i:h", "(p x i):h"]);
//!
//! assert!(Design::parse("p x i:h").is_err());
//! ```

mod effect;
mod parse;

pub use effect::{Effect, EffectKind, FacetSet};
pub use parse::Expr;

use std::fmt;

use crate::error::{Error, Result};

/// Largest number of facets effect enumeration supports.
pub const MAX_FACETS: usize = 12;

/// Index of a facet within its [`Design`], in order of first appearance in
/// the expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FacetId(pub(crate) usize);

impl FacetId {
    /// Position of the facet in [`Design::facets`].
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A named dimension of the measurement design.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Facet {
    name: String,
    fixed: bool,
}

impl Facet {
    /// Facet name as written in the expression.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the facet is fixed rather than random.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }
}

/// A parsed measurement design.
#[derive(Debug, Clone)]
pub struct Design {
    expression: Expr,
    facets: Vec<Facet>,
    nested_in: Vec<FacetSet>,
    effects: Vec<Effect>,
}

impl Design {
    /// Parse a design expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDesign`] for malformed or ambiguous
    /// expressions and [`Error::UnsupportedDesign`] when there are more than
    /// [`MAX_FACETS`] facets.
    pub fn parse(expression: &str) -> Result<Self> {
        let (expr, names) = parse::parse(expression)?;
        if names.len() > MAX_FACETS {
            return Err(Error::UnsupportedDesign {
                facets: names.len(),
                max: MAX_FACETS,
            });
        }

        let mut nested_in = vec![FacetSet::empty(); names.len()];
        collect_nesting(&expr, &mut nested_in);

        let mut sets: Vec<FacetSet> = enumerate_effects(&expr);
        sets.sort_by(|a, b| a.display_cmp(*b));
        sets.dedup();

        let mut effects = Vec::with_capacity(sets.len() + 1);
        effects.push(Effect::mean());
        effects.extend(
            sets.into_iter()
                .map(|set| Effect::from_facets(set, &nested_in, &names)),
        );

        let facets = names
            .into_iter()
            .map(|name| Facet { name, fixed: false })
            .collect();

        Ok(Self {
            expression: expr,
            facets,
            nested_in,
            effects,
        })
    }

    /// Mark the named facets as fixed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDesign`] if a name is not a facet of the
    /// design, or if every facet would be fixed.
    pub fn with_fixed<I, S>(mut self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref();
            let id = self.facet_id(name).ok_or_else(|| {
                Error::invalid_design(format!("cannot fix unknown facet '{name}'"))
            })?;
            self.facets[id.0].fixed = true;
        }
        if self.facets.iter().all(Facet::is_fixed) {
            return Err(Error::invalid_design(
                "at least one facet must remain random",
            ));
        }
        Ok(self)
    }

    /// The parsed expression tree.
    #[must_use]
    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    /// Facets in order of first appearance.
    #[must_use]
    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    /// Look up a facet by name.
    #[must_use]
    pub fn facet_id(&self, name: &str) -> Option<FacetId> {
        self.facets
            .iter()
            .position(|f| f.name == name)
            .map(FacetId)
    }

    /// The facet with the given id.
    #[must_use]
    pub fn facet(&self, id: FacetId) -> &Facet {
        &self.facets[id.0]
    }

    /// Set of every facet in the design.
    #[must_use]
    pub fn all_facets(&self) -> FacetSet {
        FacetSet::first(self.facets.len())
    }

    /// Set of fixed facets.
    #[must_use]
    pub fn fixed_facets(&self) -> FacetSet {
        self.facets
            .iter()
            .enumerate()
            .filter(|(_, f)| f.fixed)
            .map(|(i, _)| FacetId(i))
            .collect()
    }

    /// Facets that `facet` is nested within (transitively).
    #[must_use]
    pub fn nested_within(&self, facet: FacetId) -> FacetSet {
        self.nested_in[facet.0]
    }

    /// Effects implied by the design: the grand mean first, then facet
    /// combinations by size. The residual is added per dataset, see
    /// [`crate::anova::AnovaTable`].
    #[must_use]
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// Look up an effect by canonical name.
    #[must_use]
    pub fn effect(&self, name: &str) -> Option<&Effect> {
        self.effects.iter().find(|e| e.name() == name)
    }

    /// Look up the effect spanning exactly the named facets.
    #[must_use]
    pub fn effect_for(&self, facet_names: &[&str]) -> Option<&Effect> {
        let mut set = FacetSet::empty();
        for name in facet_names {
            set.insert(self.facet_id(name)?);
        }
        self.effects
            .iter()
            .find(|e| !e.is_mean() && e.facets() == set)
    }

    /// The effect spanning every facet.
    #[must_use]
    pub fn full_effect(&self) -> &Effect {
        let all = self.all_facets();
        self.effects
            .iter()
            .find(|e| e.facets() == all)
            .unwrap_or(&self.effects[0])
    }

    /// Facet names of a set, in declaration order.
    #[must_use]
    pub fn facet_names(&self, set: FacetSet) -> Vec<&str> {
        set.iter().map(|f| self.facets[f.0].name.as_str()).collect()
    }

    /// Index of the facet effect spanning exactly `set`; the empty set maps
    /// to the mean.
    pub(crate) fn effect_index(&self, set: FacetSet) -> Option<usize> {
        self.effects
            .iter()
            .position(|e| e.kind() == EffectKind::Facets && e.facets() == set)
            .or_else(|| set.is_empty().then_some(0))
    }

    /// Whether `facet` has nesting parents.
    #[must_use]
    pub fn is_nested(&self, facet: FacetId) -> bool {
        !self.nested_in[facet.0].is_empty()
    }
}

impl fmt::Display for Design {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, &self.expression, &self.facets, false)
    }
}

fn write_expr(f: &mut fmt::Formatter<'_>, expr: &Expr, facets: &[Facet], grouped: bool) -> fmt::Result {
    match expr {
        Expr::Facet(id) => f.write_str(&facets[id.0].name),
        Expr::Crossed(lhs, rhs) => {
            if grouped {
                f.write_str("(")?;
            }
            write_expr(f, lhs, facets, matches!(**lhs, Expr::Nested { .. }))?;
            f.write_str(" x ")?;
            write_expr(f, rhs, facets, matches!(**rhs, Expr::Nested { .. }))?;
            if grouped {
                f.write_str(")")?;
            }
            Ok(())
        }
        Expr::Nested { inner, outer } => {
            if grouped {
                f.write_str("(")?;
            }
            write_expr(f, inner, facets, matches!(**inner, Expr::Crossed(..)))?;
            f.write_str(":")?;
            write_expr(f, outer, facets, matches!(**outer, Expr::Crossed(..)))?;
            if grouped {
                f.write_str(")")?;
            }
            Ok(())
        }
    }
}

fn facets_of(expr: &Expr) -> FacetSet {
    match expr {
        Expr::Facet(id) => FacetSet::single(*id),
        Expr::Crossed(lhs, rhs) => facets_of(lhs).union(facets_of(rhs)),
        Expr::Nested { inner, outer } => facets_of(inner).union(facets_of(outer)),
    }
}

fn collect_nesting(expr: &Expr, nested_in: &mut [FacetSet]) {
    match expr {
        Expr::Facet(_) => {}
        Expr::Crossed(lhs, rhs) => {
            collect_nesting(lhs, nested_in);
            collect_nesting(rhs, nested_in);
        }
        Expr::Nested { inner, outer } => {
            collect_nesting(inner, nested_in);
            collect_nesting(outer, nested_in);
            let parents = facets_of(outer);
            for facet in facets_of(inner).iter() {
                nested_in[facet.0] = nested_in[facet.0].union(parents);
            }
        }
    }
}

/// One recursive pass over the expression. Crossing keeps both sides' effects
/// and adds every pairwise union; nesting keeps the outer effects and attaches
/// all outer facets to each inner effect.
fn enumerate_effects(expr: &Expr) -> Vec<FacetSet> {
    match expr {
        Expr::Facet(id) => vec![FacetSet::single(*id)],
        Expr::Crossed(lhs, rhs) => {
            let left = enumerate_effects(lhs);
            let right = enumerate_effects(rhs);
            let mut effects = Vec::with_capacity(left.len() * right.len() + left.len() + right.len());
            for &a in &left {
                for &b in &right {
                    effects.push(a.union(b));
                }
            }
            effects.extend(left);
            effects.extend(right);
            effects
        }
        Expr::Nested { inner, outer } => {
            let all_outer = facets_of(outer);
            let mut effects = enumerate_effects(outer);
            effects.extend(
                enumerate_effects(inner)
                    .into_iter()
                    .map(|set| set.union(all_outer)),
            );
            effects
        }
    }
}
