use crate::error::Result;
use crate::pattern::Pattern;
use crate::rule::{is_correlated, join_inputs, Rule, RuleKind};
use cascade_expr::{Expr, Operator, Private, Slot};

/// Swaps inputs of an inner join. Correlated joins keep their order.
pub fn rule() -> Rule {
    use Pattern::*;
    Rule::new(
        "join_commute",
        RuleKind::Exploration,
        Pattern::node(Operator::InnerJoin, vec![Leaf, Leaf, Tree]),
        check,
        apply,
    )
}

#[inline]
fn check(e: &Expr) -> bool {
    join_inputs(e).map_or(false, |(l, r)| !is_correlated(l, r))
}

fn apply(e: &Expr, out: &mut Vec<Expr>) -> Result<()> {
    if let Some((left, right)) = join_inputs(e) {
        let filters = e.slot(Slot::Filters).cloned();
        let swapped = Expr::new(
            Operator::InnerJoin,
            Private::None,
            vec![Some(right.clone()), Some(left.clone()), filters],
        )?;
        out.push(swapped);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::apply_rule;
    use crate::tests::{memo_of, natural_join_abc, print_memo};
    use cascade_expr::{GroupID, MemoLoc};

    #[test]
    fn test_join_commute_round_trip() {
        let (_, root) = natural_join_abc();
        let mut memo = memo_of(root);
        let rule = rule();
        let g6 = GroupID::from(6);
        let groups = memo.num_groups();
        let outcome = apply_rule(&mut memo, &rule, MemoLoc::new(g6, 0)).unwrap();
        assert_eq!(1, outcome.bindings);
        assert_eq!(1, outcome.added);
        assert_eq!(groups, memo.num_groups());
        let exprs = memo.group_exprs(g6).unwrap();
        assert_eq!(2, exprs.len());
        assert_eq!("inner join [2 1 5]", exprs[1].fingerprint());
        // swapping back reproduces the original alternative
        let outcome = apply_rule(&mut memo, &rule, MemoLoc::new(g6, 1)).unwrap();
        assert_eq!(1, outcome.candidates);
        assert_eq!(0, outcome.added);
        assert_eq!(2, memo.group_exprs(g6).unwrap().len());
        print_memo("join commute", &memo);
    }
}
