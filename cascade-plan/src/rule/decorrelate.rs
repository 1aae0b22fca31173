//! Decorrelation of subqueries.
//!
//! EXISTS and NOT EXISTS predicates become semi and anti joins. A
//! join whose right input references columns of the left one becomes
//! an apply join, which is evaluated once per left row. Apply joins
//! are then turned back into plain joins by hoisting correlated
//! predicates out of the right input.
//!
//! The same transformations are available as memo rules and as a
//! standalone tree rewrite, see [`decorrelate`].
use crate::error::{Error, Result};
use crate::pattern::Pattern;
use crate::rule::{cloned_filters, is_correlated, join_inputs, Rule, RuleKind};
use cascade_expr::{Expr, Operator};
use std::mem;

const APPLY_RULES: [(Operator, &str, &str); 4] = [
    (
        Operator::InnerJoinApply,
        "inner_apply_select_hoist",
        "inner_apply_to_join",
    ),
    (
        Operator::LeftJoinApply,
        "left_apply_select_hoist",
        "left_apply_to_join",
    ),
    (
        Operator::SemiJoinApply,
        "semi_apply_select_hoist",
        "semi_apply_to_join",
    ),
    (
        Operator::AntiJoinApply,
        "anti_apply_select_hoist",
        "anti_apply_to_join",
    ),
];

pub fn rules() -> Vec<Rule> {
    use Pattern::*;
    let mut rules = vec![
        Rule::new(
            "exists_to_semi_join",
            RuleKind::Exploration,
            Pattern::node(Operator::Select, vec![Leaf, Tree]),
            |e| e.filters().into_iter().any(|f| exists_subquery(f).is_some()),
            |e, out| {
                if let Some(c) = unnest_exists(e)? {
                    out.push(c);
                }
                Ok(())
            },
        ),
        Rule::new(
            "join_to_apply",
            RuleKind::Exploration,
            Pattern::node(Operator::InnerJoin, vec![Leaf, Leaf, Tree]),
            |e| join_inputs(e).map_or(false, |(l, r)| references_left(l, r)),
            |e, out| {
                let mut apply = e.clone();
                apply.set_op(e.op.set_apply())?;
                out.push(apply);
                Ok(())
            },
        ),
    ];
    for (op, hoist, to_join) in APPLY_RULES {
        rules.push(Rule::new(
            hoist,
            RuleKind::Exploration,
            Pattern::node(
                op,
                vec![Leaf, Pattern::node(Operator::Select, vec![Leaf, Tree]), Tree],
            ),
            |_| true,
            |e, out| {
                if let Some(c) = hoist_select(e)? {
                    out.push(c);
                }
                Ok(())
            },
        ));
        rules.push(Rule::new(
            to_join,
            RuleKind::Exploration,
            Pattern::node(op, vec![Leaf, Leaf, Tree]),
            |e| join_inputs(e).map_or(false, |(l, r)| !is_correlated(l, r)),
            |e, out| {
                let mut join = e.clone();
                join.set_op(e.op.clear_apply())?;
                out.push(join);
                Ok(())
            },
        ));
    }
    rules
}

/// Rewrites a whole tree until no subquery predicate or apply join can
/// be removed.
///
/// Fails with `UnimplementedDecorrelation` if a correlated apply join
/// remains whose right input is neither a filter referencing the left
/// side nor uncorrelated, e.g. an aggregation or projection over outer
/// columns.
pub fn decorrelate(expr: Expr) -> Result<Expr> {
    let mut e = expr;
    while let Some(next) = rewrite(&e)? {
        e = next;
    }
    let children = mem::take(&mut e.children);
    e.children = children
        .into_iter()
        .map(|c| c.map(decorrelate).transpose())
        .collect::<Result<Vec<_>>>()?;
    e.update_props()?;
    match rewrite(&e)? {
        Some(next) => decorrelate(next),
        None => Ok(e),
    }
}

fn rewrite(e: &Expr) -> Result<Option<Expr>> {
    match e.op {
        Operator::Select => unnest_exists(e),
        Operator::InnerJoin => match join_inputs(e) {
            Some((l, r)) if references_left(l, r) => {
                let mut apply = e.clone();
                apply.set_op(e.op.set_apply())?;
                Ok(Some(apply))
            }
            _ => Ok(None),
        },
        op if op.is_apply() => {
            let (left, right) = match join_inputs(e) {
                Some(inputs) => inputs,
                None => return Ok(None),
            };
            if !is_correlated(left, right) {
                let mut join = e.clone();
                join.set_op(op.clear_apply())?;
                return Ok(Some(join));
            }
            if right.op == Operator::Select {
                if let Some(join) = hoist_select(e)? {
                    return Ok(Some(join));
                }
            }
            Err(Error::UnimplementedDecorrelation(format!(
                "{} over {}",
                op, right.op
            )))
        }
        _ => Ok(None),
    }
}

#[inline]
fn references_left(left: &Expr, right: &Expr) -> bool {
    match left.rel_props() {
        Some(l) => right.free_cols().intersects(&l.output_cols),
        None => false,
    }
}

/// Returns the subquery of an EXISTS or NOT EXISTS predicate, and
/// whether it is negated.
#[inline]
fn exists_subquery(f: &Expr) -> Option<(&Expr, bool)> {
    match f.op {
        Operator::Exists => f.input(0).map(|s| (s, false)),
        Operator::Not => f
            .input(0)
            .filter(|e| e.op == Operator::Exists)
            .and_then(|e| e.input(0))
            .map(|s| (s, true)),
        _ => None,
    }
}

/// Converts the first EXISTS or NOT EXISTS conjunct of a select into
/// a semi or anti join with its input. Projections on top of the
/// subquery do not affect existence and are removed.
fn unnest_exists(select: &Expr) -> Result<Option<Expr>> {
    let input = match select.input(0) {
        Some(input) => input,
        None => return Ok(None),
    };
    let filters = select.filters();
    let (idx, mut subq, anti) = match filters
        .iter()
        .enumerate()
        .find_map(|(i, f)| exists_subquery(f).map(|(s, anti)| (i, s, anti)))
    {
        Some(found) => found,
        None => return Ok(None),
    };
    while subq.op == Operator::Project {
        match subq.input(0) {
            Some(s) => subq = s,
            None => break,
        }
    }
    let mut op = if anti {
        Operator::AntiJoin
    } else {
        Operator::SemiJoin
    };
    if references_left(input, subq) {
        op = op.set_apply();
    }
    let join = Expr::join(op, input.clone(), subq.clone(), vec![])?;
    let rest: Vec<Expr> = filters
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != idx)
        .map(|(_, f)| (*f).clone())
        .collect();
    if rest.is_empty() {
        Ok(Some(join))
    } else {
        Expr::select(join, rest).map(Some).map_err(Into::into)
    }
}

/// Moves predicates of a select on the right side of an apply join,
/// which reference the left side, into the join condition. The join
/// loses its apply flag once the right side is uncorrelated.
fn hoist_select(join: &Expr) -> Result<Option<Expr>> {
    let (left, right) = match join_inputs(join) {
        Some(inputs) => inputs,
        None => return Ok(None),
    };
    let inner = match right.input(0) {
        Some(inner) if right.op == Operator::Select => inner,
        _ => return Ok(None),
    };
    let left_cols = &left.expect_rel()?.output_cols;
    let (hoisted, kept): (Vec<Expr>, Vec<Expr>) = cloned_filters(right)
        .into_iter()
        .partition(|f| f.free_cols().intersects(left_cols));
    if hoisted.is_empty() {
        return Ok(None);
    }
    let new_right = if kept.is_empty() {
        inner.clone()
    } else {
        Expr::select(inner.clone(), kept)?
    };
    let mut filters = cloned_filters(join);
    filters.extend(hoisted);
    let op = if references_left(left, &new_right) {
        join.op
    } else {
        join.op.clear_apply()
    };
    Ok(Some(Expr::join(op, left.clone(), new_right, filters)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{apply_rule, RuleSet};
    use crate::tests::{abc_catalog, memo_of, print_memo};
    use cascade_expr::builder::TreeBuilder;
    use cascade_expr::{GroupID, MemoLoc};

    /// select * from a where [not] exists (select 1 from b where a.x = b.x)
    fn exists_query(negated: bool) -> (TreeBuilder, Expr, Expr, Expr) {
        let mut b = TreeBuilder::new(abc_catalog());
        let ta = b.scan("a").unwrap();
        let tb = b.scan("b").unwrap();
        let cond = Expr::cmp_eq(b.col("a", "x").unwrap(), b.col("b", "x").unwrap());
        let subq = Expr::select(tb.clone(), vec![cond]).unwrap();
        let one = b.new_col();
        let subq = Expr::project(subq, vec![Expr::i64(1)], vec![one]).unwrap();
        let pred = if negated {
            Expr::not_exists(subq)
        } else {
            Expr::exists(subq)
        };
        let root = Expr::select(ta.clone(), vec![pred]).unwrap();
        let root = b.finish(root).unwrap();
        (b, root, ta, tb)
    }

    fn rule_set() -> RuleSet {
        RuleSet::new(rules()).unwrap()
    }

    #[test]
    fn test_exists_to_semi_join_in_memo() {
        let (_, root, _, _) = exists_query(false);
        let mut memo = memo_of(root);
        let rules = rule_set();
        let root = memo.root().unwrap();
        let outcome = apply_rule(
            &mut memo,
            rules.find("exists_to_semi_join").unwrap(),
            MemoLoc::new(root, 0),
        )
        .unwrap();
        assert_eq!(1, outcome.added);
        let alt = &memo.group_exprs(root).unwrap()[1];
        assert_eq!(Operator::SemiJoinApply, alt.op);
        // projection of the subquery is removed
        let right = alt.children[1].unwrap();
        assert_eq!(Operator::Select, memo.group_exprs(right).unwrap()[0].op);
        let outcome = apply_rule(
            &mut memo,
            rules.find("semi_apply_select_hoist").unwrap(),
            MemoLoc::new(root, 1),
        )
        .unwrap();
        assert_eq!(1, outcome.added);
        let alt = &memo.group_exprs(root).unwrap()[2];
        assert_eq!(Operator::SemiJoin, alt.op);
        assert_eq!(Some(GroupID::from(2)), alt.children[1]);
        print_memo("exists to semi join", &memo);
    }

    #[test]
    fn test_not_exists_to_anti_join() {
        let (_, root, ta, tb) = exists_query(true);
        let cond = root.filters()[0]
            .input(0)
            .and_then(|e| e.input(0))
            .and_then(|e| e.input(0))
            .map(|e| e.filters()[0].clone())
            .unwrap();
        let actual = decorrelate(root).unwrap();
        let expected = Expr::join(Operator::AntiJoin, ta, tb, vec![cond]).unwrap();
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_decorrelate_exists() {
        let (_, root, _, _) = exists_query(false);
        let actual = decorrelate(root).unwrap();
        assert_eq!(Operator::SemiJoin, actual.op);
        assert_eq!(Operator::Scan, actual.input(1).unwrap().op);
        assert_eq!(1, actual.filters().len());
        assert!(actual.rel_props().unwrap().outer_cols.is_empty());
    }

    #[test]
    fn test_decorrelate_keeps_other_filters() {
        let mut b = TreeBuilder::new(abc_catalog());
        let ta = b.scan("a").unwrap();
        let tb = b.scan("b").unwrap();
        let cond = Expr::cmp_eq(b.col("a", "x").unwrap(), b.col("b", "x").unwrap());
        let local = Expr::cmp_eq(b.col("b", "x").unwrap(), Expr::i64(1));
        let subq = Expr::select(tb, vec![cond, local]).unwrap();
        let outer = Expr::binary(Operator::Gt, b.col("a", "x").unwrap(), Expr::i64(0));
        let root = Expr::select(ta, vec![Expr::exists(subq), outer]).unwrap();
        let root = b.finish(root).unwrap();
        let actual = decorrelate(root).unwrap();
        assert_eq!(Operator::Select, actual.op);
        assert_eq!(Operator::Gt, actual.filters()[0].op);
        let semi = actual.input(0).unwrap();
        assert_eq!(Operator::SemiJoin, semi.op);
        assert_eq!(Operator::Eq, semi.filters()[0].op);
        // uncorrelated predicate stays in the subquery
        assert_eq!(Operator::Select, semi.input(1).unwrap().op);
    }

    #[test]
    fn test_decorrelate_unsupported_shape() {
        let mut b = TreeBuilder::new(abc_catalog());
        let ta = b.scan("a").unwrap();
        let tb = b.scan("b").unwrap();
        let cond = Expr::cmp_eq(b.col("a", "x").unwrap(), b.col("b", "x").unwrap());
        let sel = Expr::select(tb, vec![cond]).unwrap();
        let agg = Expr::group_by(sel, vec![b.col("b", "x").unwrap()], vec![], vec![]).unwrap();
        let apply = Expr::join(Operator::InnerJoinApply, ta, agg, vec![]).unwrap();
        let root = b.finish(apply).unwrap();
        assert!(matches!(
            decorrelate(root),
            Err(Error::UnimplementedDecorrelation(_))
        ));
    }

    #[test]
    fn test_correlated_join_to_apply() {
        let mut b = TreeBuilder::new(abc_catalog());
        let ta = b.scan("a").unwrap();
        let tb = b.scan("b").unwrap();
        let cond = Expr::cmp_eq(b.col("a", "x").unwrap(), b.col("b", "x").unwrap());
        let sel = Expr::select(tb, vec![cond]).unwrap();
        let join = Expr::inner_join(ta, sel, vec![]).unwrap();
        let root = b.finish(join).unwrap();
        let actual = decorrelate(root.clone()).unwrap();
        assert_eq!(Operator::InnerJoin, actual.op);
        assert_eq!(Operator::Scan, actual.input(1).unwrap().op);
        let mut memo = memo_of(root);
        let rules = rule_set();
        let root = memo.root().unwrap();
        let outcome = apply_rule(
            &mut memo,
            rules.find("join_to_apply").unwrap(),
            MemoLoc::new(root, 0),
        )
        .unwrap();
        assert_eq!(1, outcome.added);
        assert_eq!(
            Operator::InnerJoinApply,
            memo.group_exprs(root).unwrap()[1].op
        );
        // still correlated, no plain join
        let outcome = apply_rule(
            &mut memo,
            rules.find("inner_apply_to_join").unwrap(),
            MemoLoc::new(root, 1),
        )
        .unwrap();
        assert_eq!(0, outcome.candidates);
    }
}
