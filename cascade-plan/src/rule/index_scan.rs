//! Access path selection over table keys.
//!
//! The primary index is clustered and provides all columns of the
//! table. A secondary index provides its key columns followed by the
//! primary key columns. If a secondary index does not cover the
//! columns needed by its consumer, an index lookup fetches the missing
//! columns from the primary index by the primary key of every row
//! read from the secondary index.
use crate::error::Result;
use crate::pattern::Pattern;
use crate::rule::{Rule, RuleKind};
use cascade_catalog::Key;
use cascade_expr::{ColIndex, ColSet, Expr, IndexDef, Operator, TableRef};
use std::sync::Arc;

pub fn rules() -> Vec<Rule> {
    use Pattern::*;
    vec![
        Rule::new(
            "scan_to_index_scan",
            RuleKind::Implementation,
            Pattern::node(Operator::Scan, vec![]),
            |e| e.private.table().map_or(false, |t| t.keys.iter().any(|k| !k.primary)),
            apply_scan,
        ),
        Rule::new(
            "select_index_scan",
            RuleKind::Implementation,
            Pattern::node(
                Operator::Select,
                vec![Pattern::node(Operator::Scan, vec![]), Tree],
            ),
            |e| {
                e.input(0)
                    .and_then(|s| s.private.table())
                    .map_or(false, |t| !t.keys.is_empty())
            },
            apply_select,
        ),
    ]
}

/// Builds the access path of a table key.
pub fn index_def(table: &Arc<TableRef>, key: &Key) -> IndexDef {
    let mut ordering = table.map_cols(&key.cols);
    let cols: ColSet = if key.primary {
        table.cols.iter().copied().collect()
    } else {
        if let Some(pk) = table.primary_key() {
            for c in table.map_cols(&pk.cols) {
                if !ordering.contains(&c) {
                    ordering.push(c);
                }
            }
        }
        ordering.iter().copied().collect()
    };
    IndexDef {
        table: Arc::clone(table),
        key: key.ordinal,
        primary: key.primary,
        ordering,
        cols,
    }
}

/// Replaces a full scan by a secondary index scan covering all
/// required columns.
fn apply_scan(e: &Expr, out: &mut Vec<Expr>) -> Result<()> {
    let table = match e.private.table() {
        Some(t) => t,
        None => return Ok(()),
    };
    let props = e.expect_rel()?;
    for key in table.keys.iter().filter(|k| !k.primary) {
        let index = index_def(table, key);
        if props.required_cols.is_subset_of(&index.cols) {
            out.push(Expr::index_scan(index, props));
        }
    }
    Ok(())
}

/// Uses an index whose leading column is restricted by a comparison
/// with a value not depending on the table.
fn apply_select(e: &Expr, out: &mut Vec<Expr>) -> Result<()> {
    let scan = match e.input(0) {
        Some(scan) => scan,
        None => return Ok(()),
    };
    let table = match scan.private.table() {
        Some(t) => t,
        None => return Ok(()),
    };
    let scan_props = scan.expect_rel()?;
    let filters = e.filters();
    let mut needed = e.expect_rel()?.required_cols.clone();
    for f in &filters {
        needed |= f.free_cols();
    }
    let needed = &needed & &scan_props.output_cols;
    for key in &table.keys {
        let index = index_def(table, key);
        let leading = match index.ordering.first() {
            Some(c) => *c,
            None => continue,
        };
        if !filters
            .iter()
            .any(|f| is_sargable(f, leading, &scan_props.output_cols))
        {
            continue;
        }
        let access = if needed.is_subset_of(&index.cols) {
            Expr::index_scan(index, scan_props)
        } else {
            let pk = match table.primary_key() {
                Some(pk) => pk,
                None => continue,
            };
            let mut lookup = index_def(table, pk);
            let pk_cols: ColSet = lookup.ordering.iter().copied().collect();
            lookup.cols = &(&needed - &index.cols) | &pk_cols;
            Expr::index_lookup(Expr::index_scan(index, scan_props), lookup)?
        };
        let conds = filters.iter().map(|f| (*f).clone()).collect();
        out.push(Expr::select(access, conds)?);
    }
    Ok(())
}

/// Whether predicate compares given column with an expression
/// independent of the scanned table.
fn is_sargable(f: &Expr, col: ColIndex, table_cols: &ColSet) -> bool {
    if !matches!(
        f.op,
        Operator::Eq | Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge
    ) {
        return false;
    }
    let (lhs, rhs) = match (f.input(0), f.input(1)) {
        (Some(l), Some(r)) => (l, r),
        _ => return false,
    };
    let is_col = |e: &Expr| e.op == Operator::Variable && e.private.col() == Some(col);
    (is_col(lhs) && !rhs.free_cols().intersects(table_cols))
        || (is_col(rhs) && !lhs.free_cols().intersects(table_cols))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{apply_rule, RuleSet};
    use crate::tests::{idx_catalog, memo_of};
    use cascade_expr::builder::TreeBuilder;
    use cascade_expr::{GroupID, MemoLoc, Private};

    fn rule_set() -> RuleSet {
        RuleSet::new(rules()).unwrap()
    }

    /// select <proj> from t [where <col> = 5]
    fn query(proj: &str, filter: Option<&str>) -> Expr {
        let mut b = TreeBuilder::new(idx_catalog());
        let t = b.scan("t").unwrap();
        let input = match filter {
            Some(c) => {
                let f = Expr::cmp_eq(b.col("t", c).unwrap(), Expr::i64(5));
                Expr::select(t, vec![f]).unwrap()
            }
            None => t,
        };
        let item = b.col("t", proj).unwrap();
        let col = b.col_index("t", proj).unwrap();
        let root = Expr::project(input, vec![item], vec![col]).unwrap();
        b.finish(root).unwrap()
    }

    #[test]
    fn test_covering_index_scan() {
        let mut memo = memo_of(query("k", None));
        let rules = rule_set();
        let rule = rules.find("scan_to_index_scan").unwrap();
        let g1 = GroupID::from(1);
        let outcome = apply_rule(&mut memo, rule, MemoLoc::new(g1, 0)).unwrap();
        assert_eq!(1, outcome.added);
        let alt = &memo.group_exprs(g1).unwrap()[1];
        assert_eq!(Operator::IndexScan, alt.op);
        assert_eq!("index scan t@1", alt.fingerprint());
        // v is not in the index
        let mut memo = memo_of(query("v", None));
        let outcome = apply_rule(&mut memo, rule, MemoLoc::new(g1, 0)).unwrap();
        assert_eq!(0, outcome.candidates);
    }

    #[test]
    fn test_index_def_ordering() {
        let mut b = TreeBuilder::new(idx_catalog());
        let t = b.scan("t").unwrap();
        let table = t.private.table().unwrap();
        let secondary = index_def(table, &table.keys[1]);
        let (id, k) = (b.col_index("t", "id").unwrap(), b.col_index("t", "k").unwrap());
        assert_eq!(vec![k, id], secondary.ordering);
        assert!(!secondary.primary);
        assert_eq!(2, secondary.cols.len());
        let primary = index_def(table, &table.keys[0]);
        assert_eq!(vec![id], primary.ordering);
        assert_eq!(3, primary.cols.len());
    }

    #[test]
    fn test_select_index_scan() {
        let rules = rule_set();
        let rule = rules.find("select_index_scan").unwrap();
        let g5 = GroupID::from(5);
        // k is the leading column of secondary index, id is covered
        let mut memo = memo_of(query("id", Some("k")));
        let outcome = apply_rule(&mut memo, rule, MemoLoc::new(g5, 0)).unwrap();
        assert_eq!(1, outcome.added);
        let alt = memo.group_exprs(g5).unwrap()[1].clone();
        assert_eq!(Operator::Select, alt.op);
        let access = alt.children[0].unwrap();
        assert_eq!(Operator::IndexScan, memo.group_exprs(access).unwrap()[0].op);
        // v requires lookup into primary index
        let mut b = TreeBuilder::new(idx_catalog());
        b.scan("t").unwrap();
        let (id, k, v) = (
            b.col_index("t", "id").unwrap(),
            b.col_index("t", "k").unwrap(),
            b.col_index("t", "v").unwrap(),
        );
        let mut memo = memo_of(query("v", Some("k")));
        let outcome = apply_rule(&mut memo, rule, MemoLoc::new(g5, 0)).unwrap();
        assert_eq!(1, outcome.added);
        let alt = memo.group_exprs(g5).unwrap()[1].clone();
        let access = alt.children[0].unwrap();
        let lookup = memo.group_exprs(access).unwrap()[0].clone();
        assert_eq!(Operator::IndexLookup, lookup.op);
        let index = match &lookup.private {
            Private::Index(index) => index.clone(),
            _ => panic!("lookup without index"),
        };
        // only the missing column and the primary key are fetched
        assert!(index.primary);
        assert_eq!(vec![id], index.ordering);
        assert_eq!(ColSet::from_iter([id, v]), index.cols);
        let props = memo.group(access).unwrap().props().rel().unwrap().clone();
        assert_eq!(ColSet::from_iter([id, k, v]), props.output_cols);
        // secondary index provides the lookup key
        let input = lookup.children[0].unwrap();
        let scan = &memo.group_exprs(input).unwrap()[0];
        assert_eq!(Operator::IndexScan, scan.op);
        assert_eq!("index scan t@1", scan.fingerprint());
        let input_props = memo.group(input).unwrap().props().rel().unwrap();
        assert_eq!(ColSet::from_iter([id, k]), input_props.output_cols);
        // primary key predicate uses the clustered index
        let mut memo = memo_of(query("v", Some("id")));
        let outcome = apply_rule(&mut memo, rule, MemoLoc::new(g5, 0)).unwrap();
        assert_eq!(1, outcome.added);
        // no index on v
        let mut memo = memo_of(query("id", Some("v")));
        let outcome = apply_rule(&mut memo, rule, MemoLoc::new(g5, 0)).unwrap();
        assert_eq!(1, outcome.bindings);
        assert_eq!(0, outcome.candidates);
    }
}
