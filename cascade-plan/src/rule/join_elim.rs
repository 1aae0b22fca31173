//! Join elimination by foreign key.
//!
//! join(E, D, e.fk = d.pk) can be replaced by E alone if nothing above
//! the join reads columns of D, and every row of E matches exactly one
//! row of D. The latter holds when the foreign key of E references a
//! key of D and D is an unfiltered base table. Rows of E with null
//! foreign key have no match, so they are removed by an explicit
//! null-rejecting guard.
use crate::error::Result;
use crate::pattern::Pattern;
use crate::rule::{is_correlated, join_inputs, Rule, RuleKind};
use cascade_expr::{ColIndex, Expr, ForeignKeyProps, Operator, RelProps};

pub fn rule() -> Rule {
    use Pattern::*;
    Rule::new(
        "join_elim",
        RuleKind::Exploration,
        Pattern::node(Operator::InnerJoin, vec![Leaf, Leaf, Tree]),
        check,
        apply,
    )
}

#[inline]
fn check(e: &Expr) -> bool {
    e.rel_props().map_or(false, |p| !p.foreign_keys.is_empty())
}

fn apply(e: &Expr, out: &mut Vec<Expr>) -> Result<()> {
    if let Some((left, right)) = join_inputs(e) {
        for (keep, drop) in [(left, right), (right, left)] {
            if let Some(c) = eliminate(e, keep, drop)? {
                out.push(c);
            }
        }
    }
    Ok(())
}

fn eliminate(join: &Expr, keep: &Expr, drop: &Expr) -> Result<Option<Expr>> {
    let required = &join.expect_rel()?.required_cols;
    let kp = keep.expect_rel()?;
    let dp = drop.expect_rel()?;
    if !required.is_subset_of(&kp.output_cols) {
        return Ok(None);
    }
    // a filtered or joined relation may miss referenced rows
    if drop.op != Operator::Scan || is_correlated(keep, drop) {
        return Ok(None);
    }
    let filters = join.filters();
    for fk in &kp.foreign_keys {
        if !references_key(fk, dp) {
            continue;
        }
        let mut implied = vec![false; filters.len()];
        let paired = fk.src.iter().zip(&fk.dst).all(|(src, dst)| {
            match filters.iter().position(|f| is_col_eq(f, *src, *dst)) {
                Some(i) => {
                    implied[i] = true;
                    true
                }
                None => false,
            }
        });
        if !paired {
            continue;
        }
        let mut rest: Vec<Expr> = filters
            .iter()
            .zip(&implied)
            .filter(|(_, implied)| !**implied)
            .map(|(f, _)| (*f).clone())
            .collect();
        if rest.iter().any(|f| f.free_cols().intersects(&dp.output_cols)) {
            continue;
        }
        for src in &fk.src {
            if !kp.not_null_cols.contains(*src) {
                rest.push(Expr::is_not_null(Expr::var(*src)));
            }
        }
        log::debug!(
            "join elimination keeps {} and drops {}",
            kp.fingerprint(),
            dp.fingerprint()
        );
        let candidate = if rest.is_empty() {
            keep.clone()
        } else {
            Expr::select(keep.clone(), rest)?
        };
        return Ok(Some(candidate));
    }
    Ok(None)
}

/// Whether the foreign key targets a non-weak key fully contained
/// in the dropped relation.
#[inline]
fn references_key(fk: &ForeignKeyProps, dp: &RelProps) -> bool {
    let dst = fk.dst_set();
    dst.is_subset_of(&dp.output_cols) && dp.keys.iter().any(|k| !k.weak && k.cols == dst)
}

/// Whether predicate is "a = b" over two columns, in either order.
#[inline]
fn is_col_eq(f: &Expr, a: ColIndex, b: ColIndex) -> bool {
    if f.op != Operator::Eq {
        return false;
    }
    let col = |i: usize| {
        f.input(i)
            .filter(|e| e.op == Operator::Variable)
            .and_then(|e| e.private.col())
    };
    match (col(0), col(1)) {
        (Some(l), Some(r)) => (l == a && r == b) || (l == b && r == a),
        _ => false,
    }
}
