use crate::error::{Error, Result};
use crate::types::DataType;
use crate::{Catalog, Column, ColumnAttr, ColumnID, ForeignKey, Key, Table, TableID};
use indexmap::IndexMap;
use parking_lot::RwLock;
use semistr::SemiStr;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MemCatalog {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: IndexMap<SemiStr, Table>,
    table_columns: HashMap<TableID, TableWithColumns>,
    table_id_gen: u32,
    column_id_gen: u32,
}

#[derive(Debug)]
pub struct TableWithColumns {
    table: Table,
    columns: Vec<Column>,
    keys: Vec<Key>,
    fks: Vec<ForeignKey>,
}

impl TableWithColumns {
    #[inline]
    fn col_positions(&self, names: &[&str]) -> Result<Vec<u32>> {
        names
            .iter()
            .map(|n| {
                self.columns
                    .iter()
                    .find(|c| c.name.as_str() == *n)
                    .map(|c| c.idx)
                    .ok_or_else(|| Error::ColumnNotExists {
                        table: self.table.name.clone(),
                        column: SemiStr::new(n),
                    })
            })
            .collect()
    }
}

impl Catalog for MemCatalog {
    #[inline]
    fn all_tables(&self) -> Vec<Table> {
        let inner = self.inner.read();
        inner.tables.values().cloned().collect()
    }

    #[inline]
    fn exists_table(&self, table_name: &str) -> bool {
        let inner = self.inner.read();
        inner.tables.contains_key(table_name)
    }

    #[inline]
    fn find_table_by_name(&self, table_name: &str) -> Option<Table> {
        let inner = self.inner.read();
        inner.tables.get(table_name).cloned()
    }

    #[inline]
    fn find_table(&self, table_id: &TableID) -> Option<Table> {
        let inner = self.inner.read();
        inner
            .table_columns
            .get(table_id)
            .map(|twc| twc.table.clone())
    }

    #[inline]
    fn all_columns_in_table(&self, table_id: &TableID) -> Vec<Column> {
        let inner = self.inner.read();
        inner
            .table_columns
            .get(table_id)
            .map(|twc| twc.columns.clone())
            .unwrap_or_default()
    }

    #[inline]
    fn find_column_by_name(&self, table_id: &TableID, column_name: &str) -> Option<Column> {
        let inner = self.inner.read();
        inner.table_columns.get(table_id).and_then(|twc| {
            twc.columns
                .iter()
                .find(|c| c.name.as_str() == column_name)
                .cloned()
        })
    }

    #[inline]
    fn table_keys(&self, table_id: &TableID) -> Vec<Key> {
        let inner = self.inner.read();
        inner
            .table_columns
            .get(table_id)
            .map(|twc| twc.keys.clone())
            .unwrap_or_default()
    }

    #[inline]
    fn table_foreign_keys(&self, table_id: &TableID) -> Vec<ForeignKey> {
        let inner = self.inner.read();
        inner
            .table_columns
            .get(table_id)
            .map(|twc| twc.fks.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: SemiStr,
    pub ty: DataType,
    pub attr: ColumnAttr,
}

impl ColumnSpec {
    #[inline]
    pub fn new(name: &str, ty: DataType, attr: ColumnAttr) -> Self {
        ColumnSpec {
            name: SemiStr::new(name),
            ty,
            attr,
        }
    }
}

/// Builds an immutable in-memory catalog.
///
/// Columns flagged with `ColumnAttr::PK` form the primary key of
/// their table, and are implicitly not null.
#[derive(Debug, Default)]
pub struct MemCatalogBuilder {
    inner: Inner,
}

impl MemCatalogBuilder {
    pub fn add_table(&mut self, table_name: &str, columns: &[ColumnSpec]) -> Result<TableID> {
        let inner = &mut self.inner;
        if inner.tables.contains_key(table_name) {
            return Err(Error::TableAlreadyExists(SemiStr::new(table_name)));
        }
        for (i, c) in columns.iter().enumerate() {
            if columns[..i].iter().any(|p| p.name.as_str() == c.name.as_str()) {
                return Err(Error::ColumnNameNotUnique(c.name.clone()));
            }
        }
        inner.table_id_gen += 1;
        let table_id = TableID::new(inner.table_id_gen);
        let table = Table {
            id: table_id,
            name: SemiStr::new(table_name),
        };
        let mut cols = Vec::with_capacity(columns.len());
        let mut pk = vec![];
        for (i, c) in columns.iter().enumerate() {
            inner.column_id_gen += 1;
            let mut attr = c.attr;
            if attr.contains(ColumnAttr::PK) {
                attr |= ColumnAttr::NOT_NULL;
                pk.push(i as u32);
            }
            cols.push(Column {
                id: ColumnID::new(inner.column_id_gen),
                table_id,
                name: c.name.clone(),
                ty: c.ty,
                idx: i as u32,
                attr,
            });
        }
        let keys = if pk.is_empty() {
            vec![]
        } else {
            vec![Key {
                ordinal: 0,
                primary: true,
                cols: pk,
            }]
        };
        inner.tables.insert(table.name.clone(), table.clone());
        inner.table_columns.insert(
            table_id,
            TableWithColumns {
                table,
                columns: cols,
                keys,
                fks: vec![],
            },
        );
        Ok(table_id)
    }

    /// Adds a unique key. Adding a primary key to a table which already
    /// has one is rejected.
    pub fn add_key(&mut self, table_name: &str, col_names: &[&str], primary: bool) -> Result<()> {
        let twc = self.table_mut(table_name)?;
        let cols = twc.col_positions(col_names)?;
        if cols.is_empty() || (primary && twc.keys.iter().any(|k| k.primary)) {
            return Err(Error::InvalidKey(twc.table.name.clone()));
        }
        for &c in &cols {
            let attr = &mut twc.columns[c as usize].attr;
            if primary {
                *attr |= ColumnAttr::PK | ColumnAttr::NOT_NULL;
            } else {
                *attr |= ColumnAttr::UK;
            }
        }
        let key = Key {
            ordinal: 0,
            primary,
            cols,
        };
        if primary {
            twc.keys.insert(0, key);
        } else {
            twc.keys.push(key);
        }
        for (i, k) in twc.keys.iter_mut().enumerate() {
            k.ordinal = i as u32;
        }
        Ok(())
    }

    /// Adds a foreign key referencing an existing key of `ref_table`.
    pub fn add_foreign_key(
        &mut self,
        table_name: &str,
        col_names: &[&str],
        ref_table: &str,
        ref_col_names: &[&str],
    ) -> Result<()> {
        let (ref_table_id, ref_cols) = {
            let twc = self.table_mut(ref_table)?;
            let ref_cols = twc.col_positions(ref_col_names)?;
            if !twc.keys.iter().any(|k| same_cols(&k.cols, &ref_cols)) {
                return Err(Error::InvalidKey(twc.table.name.clone()));
            }
            (twc.table.id, ref_cols)
        };
        let twc = self.table_mut(table_name)?;
        let cols = twc.col_positions(col_names)?;
        if cols.len() != ref_cols.len() {
            return Err(Error::InvalidKey(twc.table.name.clone()));
        }
        for &c in &cols {
            twc.columns[c as usize].attr |= ColumnAttr::FK;
        }
        twc.fks.push(ForeignKey {
            cols,
            ref_table: ref_table_id,
            ref_cols,
        });
        Ok(())
    }

    #[inline]
    pub fn build(self) -> MemCatalog {
        MemCatalog {
            inner: RwLock::new(self.inner),
        }
    }

    #[inline]
    fn table_mut(&mut self, table_name: &str) -> Result<&mut TableWithColumns> {
        let inner = &mut self.inner;
        let table_id = inner
            .tables
            .get(table_name)
            .map(|t| t.id)
            .ok_or_else(|| Error::TableNotExists(SemiStr::new(table_name)))?;
        inner
            .table_columns
            .get_mut(&table_id)
            .ok_or_else(|| Error::TableNotExists(SemiStr::new(table_name)))
    }
}

#[inline]
fn same_cols(a: &[u32], b: &[u32]) -> bool {
    a.len() == b.len() && a.iter().all(|c| b.contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emp_dept() -> MemCatalog {
        let mut builder = MemCatalogBuilder::default();
        builder
            .add_table(
                "departments",
                &[
                    ColumnSpec::new("dept_id", DataType::I32, ColumnAttr::PK),
                    ColumnSpec::new("name", DataType::String, ColumnAttr::empty()),
                ],
            )
            .unwrap();
        builder
            .add_table(
                "employees",
                &[
                    ColumnSpec::new("emp_id", DataType::I32, ColumnAttr::PK),
                    ColumnSpec::new("dept_id", DataType::I32, ColumnAttr::empty()),
                    ColumnSpec::new("email", DataType::String, ColumnAttr::NOT_NULL),
                ],
            )
            .unwrap();
        builder.add_key("employees", &["email"], false).unwrap();
        builder
            .add_foreign_key("employees", &["dept_id"], "departments", &["dept_id"])
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_mem_catalog_keys() {
        let cat = emp_dept();
        let emp = cat.find_table_by_name("employees").unwrap();
        let keys = cat.table_keys(&emp.id);
        assert_eq!(2, keys.len());
        assert!(keys[0].primary);
        assert_eq!(vec![0], keys[0].cols);
        assert!(!keys[1].primary);
        assert_eq!(1, keys[1].ordinal);
        assert_eq!(vec![2], keys[1].cols);
        let emp_id = cat.find_column_by_name(&emp.id, "emp_id").unwrap();
        assert!(!emp_id.nullable());
        let dept_id = cat.find_column_by_name(&emp.id, "dept_id").unwrap();
        assert!(dept_id.nullable());
        assert!(dept_id.attr.contains(ColumnAttr::FK));
    }

    #[test]
    fn test_mem_catalog_foreign_keys() {
        let cat = emp_dept();
        let emp = cat.find_table_by_name("employees").unwrap();
        let dept = cat.find_table_by_name("departments").unwrap();
        let fks = cat.table_foreign_keys(&emp.id);
        assert_eq!(1, fks.len());
        assert_eq!(dept.id, fks[0].ref_table);
        assert_eq!(vec![1], fks[0].cols);
        assert_eq!(vec![0], fks[0].ref_cols);
        assert!(cat.table_foreign_keys(&dept.id).is_empty());
    }

    #[test]
    fn test_mem_catalog_errors() {
        let mut builder = MemCatalogBuilder::default();
        builder
            .add_table("t1", &[ColumnSpec::new("c0", DataType::I32, ColumnAttr::PK)])
            .unwrap();
        assert!(matches!(
            builder.add_table("t1", &[]),
            Err(Error::TableAlreadyExists(_))
        ));
        assert!(matches!(
            builder.add_table(
                "t2",
                &[
                    ColumnSpec::new("c0", DataType::I32, ColumnAttr::empty()),
                    ColumnSpec::new("c0", DataType::I32, ColumnAttr::empty()),
                ]
            ),
            Err(Error::ColumnNameNotUnique(_))
        ));
        assert!(matches!(
            builder.add_key("t1", &["c9"], false),
            Err(Error::ColumnNotExists { .. })
        ));
        assert!(matches!(
            builder.add_key("t1", &["c0"], true),
            Err(Error::InvalidKey(_))
        ));
        assert!(matches!(
            builder.add_foreign_key("t3", &["c0"], "t1", &["c0"]),
            Err(Error::TableNotExists(_))
        ));
        let cat = builder.build();
        assert!(cat.exists_table("t1"));
        assert!(!cat.exists_table("t2"));
        assert_eq!(1, cat.all_tables().len());
    }
}
