use crate::colset::ColSet;
use crate::id::ColIndex;
use std::fmt::Write;
use std::sync::Arc;

/// Unique key over output columns.
/// A weak key may contain null values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyProps {
    pub cols: ColSet,
    pub weak: bool,
}

/// Foreign key fact: every non-null `src` tuple matches exactly one
/// `dst` tuple. Columns are paired by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyProps {
    pub src: Vec<ColIndex>,
    pub dst: Vec<ColIndex>,
}

impl ForeignKeyProps {
    #[inline]
    pub fn src_set(&self) -> ColSet {
        self.src.iter().copied().collect()
    }

    #[inline]
    pub fn dst_set(&self) -> ColSet {
        self.dst.iter().copied().collect()
    }
}

/// Logical properties of a relational expression.
///
/// All alternatives of a memo group share one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelProps {
    pub output_cols: ColSet,
    /// Columns referenced but not provided by inputs.
    pub outer_cols: ColSet,
    pub not_null_cols: ColSet,
    pub keys: Vec<KeyProps>,
    pub foreign_keys: Vec<ForeignKeyProps>,
    /// Equivalence classes of columns.
    pub equivs: Vec<ColSet>,
    /// Output columns consumed by the parent.
    pub required_cols: ColSet,
    /// Sorted fingerprints of base relations and predicates
    /// that produced this relation.
    pub applied: Vec<String>,
}

impl RelProps {
    /// Key identifying logically equivalent relations.
    pub fn fingerprint(&self) -> String {
        let mut s = String::new();
        let _ = write!(s, "{}{}", self.output_cols, self.outer_cols);
        for (i, a) in self.applied.iter().enumerate() {
            s.push(if i == 0 { '[' } else { ';' });
            s.push_str(a);
        }
        if !self.applied.is_empty() {
            s.push(']');
        }
        s
    }

    #[inline]
    pub fn is_equiv(&self, a: ColIndex, b: ColIndex) -> bool {
        a == b
            || self
                .equivs
                .iter()
                .any(|eq| eq.contains(a) && eq.contains(b))
    }

    /// Merges equivalence classes of two columns.
    pub fn add_equiv(&mut self, a: ColIndex, b: ColIndex) {
        let mut merged = ColSet::single(a);
        merged.insert(b);
        let mut rest = Vec::with_capacity(self.equivs.len());
        for eq in self.equivs.drain(..) {
            if eq.intersects(&merged) {
                merged |= &eq;
            } else {
                rest.push(eq);
            }
        }
        rest.push(merged);
        self.equivs = rest;
    }

    #[inline]
    pub fn add_applied(&mut self, fp: String) {
        if let Err(idx) = self.applied.binary_search(&fp) {
            self.applied.insert(idx, fp);
        }
    }

    #[inline]
    pub fn merge_applied(&mut self, other: &RelProps) {
        for a in &other.applied {
            self.add_applied(a.clone());
        }
    }

    /// Restricts column-based properties to given output columns.
    pub fn restrict(&mut self, cols: &ColSet) {
        self.output_cols = &self.output_cols & cols;
        self.not_null_cols = &self.not_null_cols & cols;
        self.required_cols = &self.required_cols & cols;
        self.keys.retain(|k| k.cols.is_subset_of(cols));
        self.foreign_keys
            .retain(|fk| fk.src.iter().all(|c| cols.contains(*c)));
        let equivs = std::mem::take(&mut self.equivs);
        self.equivs = equivs
            .into_iter()
            .map(|eq| &eq & cols)
            .filter(|eq| eq.len() > 1)
            .collect();
    }
}

/// Logical properties of a scalar expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScalarProps {
    /// Columns referenced by the expression, including outer
    /// columns of nested subqueries.
    pub input_cols: ColSet,
    pub has_subquery: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Props {
    Rel(Arc<RelProps>),
    Scalar(Arc<ScalarProps>),
}

impl Props {
    #[inline]
    pub fn rel(&self) -> Option<&RelProps> {
        match self {
            Props::Rel(p) => Some(p),
            Props::Scalar(_) => None,
        }
    }

    #[inline]
    pub fn scalar(&self) -> Option<&ScalarProps> {
        match self {
            Props::Scalar(p) => Some(p),
            Props::Rel(_) => None,
        }
    }

    /// Columns this expression depends on from its environment.
    #[inline]
    pub fn free_cols(&self) -> &ColSet {
        match self {
            Props::Rel(p) => &p.outer_cols,
            Props::Scalar(p) => &p.input_cols,
        }
    }
}
