use crate::op::Operator;
use semistr::SemiStr;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unresolved table '{0}'")]
    UnresolvedTable(SemiStr),
    #[error("Unresolved column '{table}.{column}'")]
    UnresolvedColumn { table: SemiStr, column: SemiStr },
    #[error("Duplicated table alias '{0}'")]
    DuplicatedTableAlias(SemiStr),
    #[error("Unimplemented {0}")]
    Unimplemented(&'static str),
    #[error("Filter '{0}' not found")]
    FilterNotFound(String),
    #[error("Invalid layout of '{op}': expected {expected} children, actual {actual}")]
    InvalidLayout {
        op: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Operator '{0}' misses relational properties")]
    MissingProps(&'static str),
    #[error("Catalog error: {0}")]
    CatalogError(#[from] cascade_catalog::error::Error),
}

impl Error {
    #[inline]
    pub fn invalid_layout(op: Operator, expected: usize, actual: usize) -> Self {
        Error::InvalidLayout {
            op: op.name(),
            expected,
            actual,
        }
    }
}
