use crate::colset::ColSet;
use crate::id::ColIndex;
use cascade_catalog::{Key, TableID};
use semistr::SemiStr;
use std::fmt;
use std::sync::Arc;

/// Literal value carried by const nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Const {
    Null,
    Bool(bool),
    I64(i64),
    String(SemiStr),
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Const::Null => f.write_str("NULL"),
            Const::Bool(b) => write!(f, "{}", b),
            Const::I64(i) => write!(f, "{}", i),
            Const::String(s) => write!(f, "'{}'", s.as_str()),
        }
    }
}

/// One occurrence of a table in the query, with the query-wide
/// column indexes assigned to its columns in table order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub table_id: TableID,
    pub alias: SemiStr,
    pub cols: Vec<ColIndex>,
    pub keys: Vec<Key>,
}

impl TableRef {
    /// Maps table column positions to query-wide indexes.
    #[inline]
    pub fn map_cols(&self, positions: &[u32]) -> Vec<ColIndex> {
        positions.iter().map(|p| self.cols[*p as usize]).collect()
    }

    #[inline]
    pub fn primary_key(&self) -> Option<&Key> {
        self.keys.iter().find(|k| k.primary)
    }
}

/// Index access path of a table occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexDef {
    pub table: Arc<TableRef>,
    pub key: u32,
    pub primary: bool,
    /// Ordering provided by the index.
    pub ordering: Vec<ColIndex>,
    /// Columns readable from the index.
    pub cols: ColSet,
}

/// Operator-specific payload of an expression node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Private {
    None,
    Table(Arc<TableRef>),
    Index(Arc<IndexDef>),
    Column(ColIndex),
    Const(Const),
    /// Output columns of projections and aggregations,
    /// or ordering columns of sort.
    Cols(Vec<ColIndex>),
    Func(SemiStr),
}

impl Private {
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Private::None)
    }

    #[inline]
    pub fn col(&self) -> Option<ColIndex> {
        match self {
            Private::Column(c) => Some(*c),
            _ => None,
        }
    }

    #[inline]
    pub fn table(&self) -> Option<&Arc<TableRef>> {
        match self {
            Private::Table(t) => Some(t),
            _ => None,
        }
    }

    #[inline]
    pub fn cols(&self) -> &[ColIndex] {
        match self {
            Private::Cols(cs) => cs,
            _ => &[],
        }
    }
}

impl fmt::Display for Private {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Private::None => Ok(()),
            Private::Table(t) => f.write_str(t.alias.as_str()),
            Private::Index(idx) => write!(f, "{}@{}", idx.table.alias.as_str(), idx.key),
            Private::Column(c) => write!(f, "{}", c),
            Private::Const(c) => write!(f, "{}", c),
            Private::Cols(cs) => {
                f.write_str("(")?;
                for (i, c) in cs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", c.value())?;
                }
                f.write_str(")")
            }
            Private::Func(name) => f.write_str(name.as_str()),
        }
    }
}
