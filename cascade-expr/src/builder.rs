use crate::colset::ColSet;
use crate::error::{Error, Result};
use crate::expr::{node_fingerprint, Expr};
use crate::id::ColIndex;
use crate::op::Operator;
use crate::private::{Private, TableRef};
use crate::props::{ForeignKeyProps, KeyProps, Props, RelProps};
use cascade_catalog::{Catalog, ForeignKey};
use indexmap::IndexMap;
use semistr::SemiStr;
use std::sync::Arc;

/// Builds query trees against a catalog.
///
/// Every table occurrence gets fresh column indexes, allocated
/// sequentially from 1. Foreign keys between occurrences are resolved
/// when the tree is finished, so tables can be scanned in any order.
pub struct TreeBuilder {
    catalog: Arc<dyn Catalog>,
    col_gen: ColIndex,
    tables: IndexMap<SemiStr, TableInstance>,
}

struct TableInstance {
    table: Arc<TableRef>,
    col_names: Vec<SemiStr>,
    fks: Vec<ForeignKey>,
}

impl TreeBuilder {
    #[inline]
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        TreeBuilder {
            catalog,
            col_gen: ColIndex::default(),
            tables: IndexMap::new(),
        }
    }

    #[inline]
    pub fn scan(&mut self, table_name: &str) -> Result<Expr> {
        self.scan_as(table_name, table_name)
    }

    pub fn scan_as(&mut self, table_name: &str, alias: &str) -> Result<Expr> {
        if self.tables.contains_key(alias) {
            return Err(Error::DuplicatedTableAlias(SemiStr::new(alias)));
        }
        let table = self
            .catalog
            .find_table_by_name(table_name)
            .ok_or_else(|| Error::UnresolvedTable(SemiStr::new(table_name)))?;
        let columns = self.catalog.all_columns_in_table(&table.id);
        let mut props = RelProps::default();
        let mut cols = Vec::with_capacity(columns.len());
        let mut col_names = Vec::with_capacity(columns.len());
        for c in &columns {
            let idx = self.new_col();
            props.output_cols.insert(idx);
            if !c.nullable() {
                props.not_null_cols.insert(idx);
            }
            cols.push(idx);
            col_names.push(c.name.clone());
        }
        let table_ref = Arc::new(TableRef {
            table_id: table.id,
            alias: SemiStr::new(alias),
            cols,
            keys: self.catalog.table_keys(&table.id),
        });
        for k in &table_ref.keys {
            let key_cols: ColSet = table_ref.map_cols(&k.cols).into_iter().collect();
            let weak = !key_cols.is_subset_of(&props.not_null_cols);
            props.keys.push(KeyProps {
                cols: key_cols,
                weak,
            });
        }
        let private = Private::Table(Arc::clone(&table_ref));
        props.add_applied(node_fingerprint(Operator::Scan, &private, &[]));
        self.tables.insert(
            SemiStr::new(alias),
            TableInstance {
                table: Arc::clone(&table_ref),
                col_names,
                fks: self.catalog.table_foreign_keys(&table.id),
            },
        );
        Ok(Expr::scan(table_ref, props))
    }

    /// Returns variable referencing column of a scanned table.
    #[inline]
    pub fn col(&self, alias: &str, column: &str) -> Result<Expr> {
        self.col_index(alias, column).map(Expr::var)
    }

    pub fn col_index(&self, alias: &str, column: &str) -> Result<ColIndex> {
        let unresolved = || Error::UnresolvedColumn {
            table: SemiStr::new(alias),
            column: SemiStr::new(column),
        };
        let inst = self.tables.get(alias).ok_or_else(unresolved)?;
        inst.col_names
            .iter()
            .position(|n| n.as_str() == column)
            .map(|i| inst.table.cols[i])
            .ok_or_else(unresolved)
    }

    /// Returns all columns of a scanned table in definition order.
    #[inline]
    pub fn table_cols(&self, alias: &str) -> Result<Vec<ColIndex>> {
        self.tables
            .get(alias)
            .map(|inst| inst.table.cols.clone())
            .ok_or_else(|| Error::UnresolvedTable(SemiStr::new(alias)))
    }

    /// Allocates a column for computed projections and aggregates.
    #[inline]
    pub fn new_col(&mut self) -> ColIndex {
        self.col_gen = self.col_gen.next();
        self.col_gen
    }

    /// Returns "alias.column" of a table column.
    pub fn col_name(&self, col: ColIndex) -> Option<String> {
        self.tables.iter().find_map(|(alias, inst)| {
            inst.table
                .cols
                .iter()
                .position(|c| *c == col)
                .map(|i| format!("{}.{}", alias.as_str(), inst.col_names[i].as_str()))
        })
    }

    /// Resolves foreign keys between scanned tables and re-derives
    /// properties of the whole tree.
    pub fn finish(&self, mut root: Expr) -> Result<Expr> {
        self.resolve(&mut root)?;
        Ok(root)
    }

    fn resolve(&self, e: &mut Expr) -> Result<()> {
        for c in e.children.iter_mut().flatten() {
            self.resolve(c)?;
        }
        if e.op != Operator::Scan {
            return e.update_props();
        }
        let fks = match e.private.table() {
            Some(t) => self.foreign_keys(t.alias.as_str()),
            None => return Err(Error::MissingProps(e.op.name())),
        };
        if let Props::Rel(p) = &mut e.props {
            Arc::make_mut(p).foreign_keys = fks;
        }
        Ok(())
    }

    /// Resolves foreign keys of a table occurrence against every
    /// occurrence of the referenced table.
    fn foreign_keys(&self, alias: &str) -> Vec<ForeignKeyProps> {
        let inst = match self.tables.get(alias) {
            Some(inst) => inst,
            None => return vec![],
        };
        let mut res = vec![];
        for fk in &inst.fks {
            for target in self.tables.values() {
                if target.table.table_id == fk.ref_table {
                    res.push(ForeignKeyProps {
                        src: inst.table.map_cols(&fk.cols),
                        dst: target.table.map_cols(&fk.ref_cols),
                    });
                }
            }
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_catalog::mem_impl::{ColumnSpec, MemCatalogBuilder};
    use cascade_catalog::types::DataType;
    use cascade_catalog::ColumnAttr;

    fn catalog() -> Arc<dyn Catalog> {
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
                ],
            )
            .unwrap();
        builder
            .add_foreign_key("employees", &["dept_id"], "departments", &["dept_id"])
            .unwrap();
        Arc::new(builder.build())
    }

    #[test]
    fn test_build_scan_props() {
        let mut b = TreeBuilder::new(catalog());
        let e = b.scan_as("employees", "e").unwrap();
        let p = e.rel_props().unwrap();
        assert_eq!("(1,2)", p.output_cols.to_string());
        assert_eq!("(1)", p.not_null_cols.to_string());
        assert_eq!(1, p.keys.len());
        assert!(!p.keys[0].weak);
        assert_eq!(vec!["scan[e]".to_string()], p.applied);
        assert_eq!(ColIndex::from(2), b.col_index("e", "dept_id").unwrap());
        assert_eq!(Some("e.dept_id".to_string()), b.col_name(ColIndex::from(2)));
        assert!(matches!(
            b.col("e", "salary"),
            Err(Error::UnresolvedColumn { .. })
        ));
        assert!(matches!(b.scan("projects"), Err(Error::UnresolvedTable(_))));
        assert!(matches!(
            b.scan_as("departments", "e"),
            Err(Error::DuplicatedTableAlias(_))
        ));
    }

    #[test]
    fn test_build_resolve_foreign_keys() {
        let mut b = TreeBuilder::new(catalog());
        // referencing table is scanned before referenced one
        let e = b.scan_as("employees", "e").unwrap();
        let d = b.scan_as("departments", "d").unwrap();
        let cond = Expr::cmp_eq(b.col("e", "dept_id").unwrap(), b.col("d", "dept_id").unwrap());
        let join = Expr::inner_join(e, d, vec![cond]).unwrap();
        assert!(join.rel_props().unwrap().foreign_keys.is_empty());
        let join = b.finish(join).unwrap();
        let p = join.rel_props().unwrap();
        assert_eq!(1, p.foreign_keys.len());
        assert_eq!(vec![ColIndex::from(2)], p.foreign_keys[0].src);
        assert_eq!(vec![ColIndex::from(3)], p.foreign_keys[0].dst);
        assert!(p.is_equiv(ColIndex::from(2), ColIndex::from(3)));
        assert_eq!("(1,2,3)", p.not_null_cols.to_string());
    }
}
