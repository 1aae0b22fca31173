use crate::error::Result;
use crate::pattern::Pattern;
use crate::rule::{cloned_filters, is_correlated, join_inputs, Rule, RuleKind};
use cascade_expr::{Expr, Operator};

/// Rotates join(join(A, B), C) into join(join(A, C), B).
///
/// Predicates of both joins are redistributed: those covered by
/// A and C go to the new lower join, the rest stay on top.
/// Without any predicate for the new lower join the rotation would
/// introduce a cross product, and the rule produces nothing.
pub fn rule() -> Rule {
    use Pattern::*;
    Rule::new(
        "join_assoc",
        RuleKind::Exploration,
        Pattern::node(
            Operator::InnerJoin,
            vec![
                Pattern::node(Operator::InnerJoin, vec![Leaf, Leaf, Tree]),
                Leaf,
                Tree,
            ],
        ),
        check,
        apply,
    )
}

fn check(e: &Expr) -> bool {
    match join_inputs(e) {
        Some((lower, right)) => {
            !is_correlated(lower, right)
                && join_inputs(lower).map_or(false, |(ll, lr)| !is_correlated(ll, lr))
        }
        None => false,
    }
}

fn apply(e: &Expr, out: &mut Vec<Expr>) -> Result<()> {
    let (lower, right) = match join_inputs(e) {
        Some(inputs) => inputs,
        None => return Ok(()),
    };
    let (ll, lr) = match join_inputs(lower) {
        Some(inputs) => inputs,
        None => return Ok(()),
    };
    let new_lower_cols = &ll.expect_rel()?.output_cols | &right.expect_rel()?.output_cols;
    let mut filters = cloned_filters(e);
    filters.extend(cloned_filters(lower));
    let (lower_filters, upper_filters): (Vec<Expr>, Vec<Expr>) = filters
        .into_iter()
        .partition(|f| !f.free_cols().is_empty() && f.free_cols().is_subset_of(&new_lower_cols));
    if lower_filters.is_empty() {
        return Ok(());
    }
    let new_lower = Expr::inner_join(ll.clone(), right.clone(), lower_filters)?;
    out.push(Expr::inner_join(new_lower, lr.clone(), upper_filters)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::apply_rule;
    use crate::tests::{abc_catalog, memo_of, natural_join_abc, print_memo};
    use cascade_expr::builder::TreeBuilder;
    use cascade_expr::{GroupID, MemoLoc};

    #[test]
    fn test_join_assoc_rotates() {
        let (_, root) = natural_join_abc();
        let mut memo = memo_of(root);
        let g10 = GroupID::from(10);
        let groups = memo.num_groups();
        let outcome = apply_rule(&mut memo, &rule(), MemoLoc::new(g10, 0)).unwrap();
        assert_eq!(1, outcome.added);
        // join(a, c) is a new group
        assert_eq!(groups + 1, memo.num_groups());
        let new_group = GroupID::from(groups as u32 + 1);
        assert_eq!(
            "inner join [1 7 9]",
            memo.group_exprs(new_group).unwrap()[0].fingerprint()
        );
        assert_eq!(
            format!("inner join [{} 2 5]", new_group),
            memo.group_exprs(g10).unwrap()[1].fingerprint()
        );
        print_memo("join assoc", &memo);
    }

    #[test]
    fn test_join_assoc_avoids_cross_product() {
        // join(join(a, b, a.x = b.x), c, b.x = c.x): a and c share no predicate
        let mut b = TreeBuilder::new(abc_catalog());
        let ta = b.scan("a").unwrap();
        let tb = b.scan("b").unwrap();
        let tc = b.scan("c").unwrap();
        let ab = Expr::inner_join(
            ta,
            tb,
            vec![Expr::cmp_eq(b.col("a", "x").unwrap(), b.col("b", "x").unwrap())],
        )
        .unwrap();
        let abc = Expr::inner_join(
            ab,
            tc,
            vec![Expr::cmp_eq(b.col("b", "x").unwrap(), b.col("c", "x").unwrap())],
        )
        .unwrap();
        let root = b.finish(abc).unwrap();
        let mut memo = memo_of(root);
        let root = memo.root().unwrap();
        let groups = memo.num_groups();
        let outcome = apply_rule(&mut memo, &rule(), MemoLoc::new(root, 0)).unwrap();
        assert_eq!(1, outcome.bindings);
        assert_eq!(0, outcome.candidates);
        assert_eq!(groups, memo.num_groups());
        assert_eq!(1, memo.group_exprs(root).unwrap().len());
    }
}
