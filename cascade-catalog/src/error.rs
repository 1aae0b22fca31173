use semistr::SemiStr;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Table '{0}' already exists")]
    TableAlreadyExists(SemiStr),
    #[error("Table '{0}' not exists")]
    TableNotExists(SemiStr),
    #[error("Column name '{0}' is not unique")]
    ColumnNameNotUnique(SemiStr),
    #[error("Column '{column}' not exists in table '{table}'")]
    ColumnNotExists { table: SemiStr, column: SemiStr },
    #[error("Invalid key on table '{0}'")]
    InvalidKey(SemiStr),
}
