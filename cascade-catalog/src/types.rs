use std::fmt;

/// Logical type of a column.
///
/// The optimizer never evaluates values, so the type only travels
/// along with column metadata for display purposes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum DataType {
    I32,
    I64,
    Decimal,
    Date,
    String,
    Bool,
}

impl DataType {
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            DataType::I32 => "int",
            DataType::I64 => "bigint",
            DataType::Decimal => "decimal",
            DataType::Date => "date",
            DataType::String => "varchar",
            DataType::Bool => "bool",
        }
    }
}

impl fmt::Display for DataType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
