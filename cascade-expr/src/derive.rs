//! Bottom-up derivation of logical properties.
use crate::colset::ColSet;
use crate::error::{Error, Result};
use crate::expr::{node_fingerprint, Expr};
use crate::op::{Operator, Slot};
use crate::private::{Const, Private};
use crate::props::{KeyProps, Props, RelProps, ScalarProps};

pub(crate) fn derive_scalar(op: Operator, private: &Private, children: &[Option<Expr>]) -> ScalarProps {
    let mut props = ScalarProps::default();
    if op == Operator::Variable {
        if let Some(c) = private.col() {
            props.input_cols.insert(c);
        }
    }
    for c in children.iter().flatten() {
        match &c.props {
            Props::Scalar(p) => {
                props.input_cols |= &p.input_cols;
                props.has_subquery |= p.has_subquery;
            }
            Props::Rel(p) => {
                props.input_cols |= &p.outer_cols;
                props.has_subquery = true;
            }
        }
    }
    props
}

pub(crate) fn derive_rel(
    op: Operator,
    private: &Private,
    children: &[Option<Expr>],
) -> Result<RelProps> {
    let layout = op.layout();
    let rel = |i: usize| -> Result<&RelProps> {
        children
            .get(i)
            .and_then(|c| c.as_ref())
            .and_then(|c| c.rel_props())
            .ok_or(Error::MissingProps(op.name()))
    };
    let mut aux_cols = ColSet::new();
    for a in children.iter().skip(layout.inputs).flatten() {
        aux_cols |= a.free_cols();
    }
    let filters: Vec<&Expr> = layout
        .slot(Slot::Filters)
        .and_then(|i| children.get(i))
        .and_then(|f| f.as_ref())
        .map(|f| f.conjuncts())
        .unwrap_or_default();
    let tag = || node_fingerprint(op.clear_apply(), private, children);
    match op {
        Operator::Scan | Operator::IndexScan => Err(Error::MissingProps(op.name())),
        Operator::Select => {
            let input = rel(0)?;
            let mut p = input.clone();
            p.required_cols = ColSet::new();
            p.outer_cols = &(&input.outer_cols | &aux_cols) - &input.output_cols;
            apply_filters(&mut p, &filters);
            Ok(p)
        }
        Operator::InnerJoin | Operator::InnerJoinApply => {
            let (l, r) = (rel(0)?, rel(1)?);
            let mut p = RelProps {
                output_cols: &l.output_cols | &r.output_cols,
                not_null_cols: &l.not_null_cols | &r.not_null_cols,
                keys: combine_keys(l, r),
                foreign_keys: l
                    .foreign_keys
                    .iter()
                    .chain(r.foreign_keys.iter())
                    .cloned()
                    .collect(),
                equivs: l.equivs.clone(),
                ..Default::default()
            };
            p.outer_cols = &(&(&l.outer_cols | &r.outer_cols) | &aux_cols) - &p.output_cols;
            for eq in &r.equivs {
                merge_equiv(&mut p, eq);
            }
            p.merge_applied(l);
            p.merge_applied(r);
            apply_filters(&mut p, &filters);
            Ok(p)
        }
        Operator::LeftJoin
        | Operator::LeftJoinApply
        | Operator::RightJoin
        | Operator::RightJoinApply
        | Operator::FullJoin
        | Operator::FullJoinApply => {
            let (l, r) = (rel(0)?, rel(1)?);
            let mut p = RelProps {
                output_cols: &l.output_cols | &r.output_cols,
                ..Default::default()
            };
            p.outer_cols = &(&(&l.outer_cols | &r.outer_cols) | &aux_cols) - &p.output_cols;
            // columns of the preserved side keep their facts
            let preserved = match op.clear_apply() {
                Operator::LeftJoin => Some(l),
                Operator::RightJoin => Some(r),
                _ => None,
            };
            if let Some(side) = preserved {
                p.not_null_cols = side.not_null_cols.clone();
                p.foreign_keys = side.foreign_keys.clone();
                p.equivs = side.equivs.clone();
            }
            p.add_applied(tag());
            Ok(p)
        }
        Operator::SemiJoin | Operator::SemiJoinApply | Operator::AntiJoin | Operator::AntiJoinApply => {
            let (l, r) = (rel(0)?, rel(1)?);
            let mut p = RelProps {
                output_cols: l.output_cols.clone(),
                not_null_cols: l.not_null_cols.clone(),
                keys: l.keys.clone(),
                foreign_keys: l.foreign_keys.clone(),
                equivs: l.equivs.clone(),
                ..Default::default()
            };
            let provided = &l.output_cols | &r.output_cols;
            p.outer_cols = &(&(&l.outer_cols | &r.outer_cols) | &aux_cols) - &provided;
            if op.clear_apply() == Operator::SemiJoin {
                for f in &filters {
                    p.not_null_cols |= &(&null_rejected_cols(f) & &l.output_cols);
                }
            }
            p.add_applied(tag());
            Ok(p)
        }
        Operator::Project => {
            let input = rel(0)?;
            let items = list_items(children, layout.slot(Slot::Projections));
            let cols = private.cols();
            if items.len() != cols.len() {
                return Err(Error::invalid_layout(op, cols.len(), items.len()));
            }
            let mut p = input.clone();
            p.required_cols = ColSet::new();
            let output: ColSet = cols.iter().copied().collect();
            p.restrict(&output);
            p.output_cols = output;
            for (item, col) in items.iter().zip(cols) {
                if let Some(c) = item.private.col() {
                    if item.op == Operator::Variable && input.not_null_cols.contains(c) {
                        p.not_null_cols.insert(*col);
                    }
                }
            }
            p.outer_cols = &(&input.outer_cols | &aux_cols) - &input.output_cols;
            p.applied = vec![tag()];
            Ok(p)
        }
        Operator::GroupBy => {
            let input = rel(0)?;
            let groupings = list_items(children, layout.slot(Slot::Groupings));
            let mut group_cols = ColSet::new();
            for g in &groupings {
                match g.private.col() {
                    Some(c) if g.op == Operator::Variable => group_cols.insert(c),
                    _ => return Err(Error::Unimplemented("grouping on non-column expression")),
                }
            }
            let mut p = input.clone();
            p.required_cols = ColSet::new();
            p.restrict(&group_cols);
            p.keys = vec![KeyProps {
                cols: group_cols.clone(),
                weak: false,
            }];
            let mut output = group_cols;
            for c in private.cols() {
                output.insert(*c);
            }
            p.output_cols = output;
            p.outer_cols = &(&input.outer_cols | &aux_cols) - &input.output_cols;
            p.applied = vec![tag()];
            Ok(p)
        }
        // columns of the index are fetched by primary key of input rows
        Operator::IndexLookup => {
            let index = match private {
                Private::Index(index) => index,
                _ => return Err(Error::MissingProps(op.name())),
            };
            let mut p = rel(0)?.clone();
            p.required_cols = ColSet::new();
            p.output_cols |= &index.cols;
            p.add_applied(tag());
            Ok(p)
        }
        Operator::OrderBy => {
            let mut p = rel(0)?.clone();
            p.required_cols = ColSet::new();
            p.applied = vec![tag()];
            Ok(p)
        }
        Operator::Union | Operator::Intersect | Operator::Except => {
            let (l, r) = (rel(0)?, rel(1)?);
            let mut p = RelProps {
                output_cols: l.output_cols.clone(),
                outer_cols: &l.outer_cols | &r.outer_cols,
                ..Default::default()
            };
            if op != Operator::Union {
                p.not_null_cols = l.not_null_cols.clone();
            }
            p.add_applied(tag());
            Ok(p)
        }
        _ => Err(Error::Unimplemented("relational properties of scalar operator")),
    }
}

#[inline]
fn list_items(children: &[Option<Expr>], pos: Option<usize>) -> Vec<&Expr> {
    match pos.and_then(|i| children.get(i)).and_then(|c| c.as_ref()) {
        Some(list) if list.op == Operator::List => list.children.iter().flatten().collect(),
        Some(e) => vec![e],
        None => vec![],
    }
}

/// Records applied predicates along with the not-null columns and
/// equivalences they imply.
fn apply_filters(p: &mut RelProps, filters: &[&Expr]) {
    for f in filters {
        p.add_applied(f.fingerprint());
        let rejected = &null_rejected_cols(f) & &p.output_cols;
        p.not_null_cols |= &rejected;
        if f.op == Operator::Eq {
            if let (Some(a), Some(b)) = (var_operand(f, 0), var_operand(f, 1)) {
                if p.output_cols.contains(a) && p.output_cols.contains(b) {
                    p.add_equiv(a, b);
                }
            }
        }
    }
}

/// Columns that cannot be null in rows passing given predicate.
pub fn null_rejected_cols(f: &Expr) -> ColSet {
    let mut cols = ColSet::new();
    if f.op.rejects_null() {
        for i in 0..2 {
            if let Some(c) = var_operand(f, i) {
                cols.insert(c);
            }
        }
    } else if f.op == Operator::IsNot {
        let rhs_null = f
            .input(1)
            .map_or(false, |e| e.private == Private::Const(Const::Null));
        if let (Some(c), true) = (var_operand(f, 0), rhs_null) {
            cols.insert(c);
        }
    }
    cols
}

#[inline]
fn var_operand(f: &Expr, idx: usize) -> Option<crate::id::ColIndex> {
    f.input(idx)
        .filter(|e| e.op == Operator::Variable)
        .and_then(|e| e.private.col())
}

#[inline]
fn merge_equiv(p: &mut RelProps, eq: &ColSet) {
    if let Some(first) = eq.min() {
        for c in eq.iter().skip(1) {
            p.add_equiv(first, c);
        }
    }
}

#[inline]
fn combine_keys(l: &RelProps, r: &RelProps) -> Vec<KeyProps> {
    let mut keys = Vec::with_capacity(l.keys.len() * r.keys.len());
    for lk in &l.keys {
        for rk in &r.keys {
            keys.push(KeyProps {
                cols: &lk.cols | &rk.cols,
                weak: lk.weak || rk.weak,
            });
        }
    }
    keys
}
