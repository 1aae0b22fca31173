pub mod error;
pub mod mem_impl;
pub mod types;

use crate::types::DataType;
use bitflags::bitflags;
use semistr::SemiStr;
use std::hash::Hash;
use std::marker::PhantomData;

/// Read-only view of table metadata used while building
/// and optimizing query trees.
pub trait Catalog: Send + Sync {
    fn all_tables(&self) -> Vec<Table>;

    fn exists_table(&self, table_name: &str) -> bool;

    fn find_table_by_name(&self, table_name: &str) -> Option<Table>;

    fn find_table(&self, table_id: &TableID) -> Option<Table>;

    fn all_columns_in_table(&self, table_id: &TableID) -> Vec<Column>;

    fn find_column_by_name(&self, table_id: &TableID, column_name: &str) -> Option<Column>;

    /// Primary key comes first if defined, followed by
    /// unique keys in definition order.
    fn table_keys(&self, table_id: &TableID) -> Vec<Key>;

    fn table_foreign_keys(&self, table_id: &TableID) -> Vec<ForeignKey>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectID<T> {
    id: u32,
    _marker: PhantomData<T>,
}

impl<T> ObjectID<T> {
    /// Required to create object only within the catalog module.
    pub(crate) fn new(id: u32) -> Self {
        ObjectID {
            id,
            _marker: PhantomData,
        }
    }
}

impl<T> ObjectID<T> {
    #[inline]
    pub fn value(&self) -> u32 {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct T;
pub type TableID = ObjectID<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct C;
pub type ColumnID = ObjectID<C>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Table {
    pub id: TableID,
    pub name: SemiStr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub id: ColumnID,
    pub table_id: TableID,
    pub name: SemiStr,
    pub ty: DataType,
    pub idx: u32,
    pub attr: ColumnAttr,
}

impl Column {
    #[inline]
    pub fn nullable(&self) -> bool {
        !self.attr.contains(ColumnAttr::NOT_NULL)
    }
}

bitflags! {
    pub struct ColumnAttr: u8 {
        const PK = 0x01; // primary key
        const UK = 0x02; // unique key
        const FK = 0x04; // foreign key
        const NOT_NULL = 0x08;
    }
}

/// Unique key of a table, identified by its ordinal among
/// all keys of the table.
/// Column positions are indexes into the table's column list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    pub ordinal: u32,
    pub primary: bool,
    pub cols: Vec<u32>,
}

/// Foreign key from `cols` of owning table to `ref_cols`
/// of `ref_table`, pairwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    pub cols: Vec<u32>,
    pub ref_table: TableID,
    pub ref_cols: Vec<u32>,
}
