use crate::colset::ColSet;
use crate::derive::{derive_rel, derive_scalar};
use crate::error::{Error, Result};
use crate::id::{ColIndex, MemoLoc};
use crate::op::{OpKind, Operator, Slot};
use crate::private::{Const, IndexDef, Private, TableRef};
use crate::props::{Props, RelProps};
use semistr::SemiStr;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

/// Node of a query tree.
///
/// Children are relational inputs followed by the aux slots of the
/// operator layout. An absent aux slot is `None`.
/// Nodes bound out of the memo carry their location, any mutation
/// through the methods below detaches the node from the memo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub op: Operator,
    pub private: Private,
    pub children: Vec<Option<Expr>>,
    pub props: Props,
    pub loc: Option<MemoLoc>,
}

impl Expr {
    /// Creates a node and derives its properties from children.
    pub fn new(op: Operator, private: Private, children: Vec<Option<Expr>>) -> Result<Self> {
        let layout = op.layout();
        if !layout.variadic && children.len() != layout.num_children() {
            return Err(Error::invalid_layout(
                op,
                layout.num_children(),
                children.len(),
            ));
        }
        let props = match op.kind() {
            OpKind::Relational => Props::Rel(Arc::new(derive_rel(op, &private, &children)?)),
            OpKind::Scalar => Props::Scalar(Arc::new(derive_scalar(op, &private, &children))),
        };
        Ok(Expr {
            op,
            private,
            children,
            props,
            loc: None,
        })
    }

    /// Creates a node with given properties, as bound from the memo.
    #[inline]
    pub fn bound(
        op: Operator,
        private: Private,
        children: Vec<Option<Expr>>,
        props: Props,
        loc: Option<MemoLoc>,
    ) -> Self {
        Expr {
            op,
            private,
            children,
            props,
            loc,
        }
    }

    #[inline]
    fn scalar(op: Operator, private: Private, children: Vec<Option<Expr>>) -> Self {
        let props = Props::Scalar(Arc::new(derive_scalar(op, &private, &children)));
        Expr {
            op,
            private,
            children,
            props,
            loc: None,
        }
    }

    #[inline]
    pub fn scan(table: Arc<TableRef>, props: RelProps) -> Self {
        Expr::bound(
            Operator::Scan,
            Private::Table(table),
            vec![],
            Props::Rel(Arc::new(props)),
            None,
        )
    }

    /// Creates an index scan reading the index columns out of the
    /// properties of the full table scan.
    pub fn index_scan(index: IndexDef, scan_props: &RelProps) -> Self {
        let mut props = scan_props.clone();
        props.restrict(&index.cols);
        props.applied = vec![format!(
            "{}[{}@{}]",
            Operator::IndexScan.name(),
            index.table.alias.as_str(),
            index.key
        )];
        Expr::bound(
            Operator::IndexScan,
            Private::Index(Arc::new(index)),
            vec![],
            Props::Rel(Arc::new(props)),
            None,
        )
    }

    /// Creates a lookup into the primary index. Input rows provide the
    /// primary key columns, given as ordering of the index, and `cols`
    /// of the index are fetched for each of them.
    #[inline]
    pub fn index_lookup(input: Expr, index: IndexDef) -> Result<Self> {
        Expr::new(
            Operator::IndexLookup,
            Private::Index(Arc::new(index)),
            vec![Some(input)],
        )
    }

    #[inline]
    pub fn select(input: Expr, filters: Vec<Expr>) -> Result<Self> {
        Expr::new(Operator::Select, Private::None, vec![Some(input), conj(filters)])
    }

    /// Creates a projection, `cols` are the output columns of items.
    #[inline]
    pub fn project(input: Expr, items: Vec<Expr>, cols: Vec<ColIndex>) -> Result<Self> {
        Expr::new(
            Operator::Project,
            Private::Cols(cols),
            vec![Some(input), Some(Expr::list(items))],
        )
    }

    #[inline]
    pub fn join(op: Operator, left: Expr, right: Expr, filters: Vec<Expr>) -> Result<Self> {
        Expr::new(op, Private::None, vec![Some(left), Some(right), conj(filters)])
    }

    #[inline]
    pub fn inner_join(left: Expr, right: Expr, filters: Vec<Expr>) -> Result<Self> {
        Expr::join(Operator::InnerJoin, left, right, filters)
    }

    /// Creates an aggregation, `agg_cols` are the output columns of
    /// aggregates.
    #[inline]
    pub fn group_by(
        input: Expr,
        groupings: Vec<Expr>,
        aggregations: Vec<Expr>,
        agg_cols: Vec<ColIndex>,
    ) -> Result<Self> {
        Expr::new(
            Operator::GroupBy,
            Private::Cols(agg_cols),
            vec![
                Some(input),
                Some(Expr::list(groupings)),
                Some(Expr::list(aggregations)),
            ],
        )
    }

    #[inline]
    pub fn order_by(input: Expr, ordering: Vec<ColIndex>) -> Result<Self> {
        Expr::new(Operator::OrderBy, Private::Cols(ordering), vec![Some(input)])
    }

    #[inline]
    pub fn var(col: ColIndex) -> Self {
        Expr::scalar(Operator::Variable, Private::Column(col), vec![])
    }

    #[inline]
    pub fn konst(c: Const) -> Self {
        Expr::scalar(Operator::Const, Private::Const(c), vec![])
    }

    #[inline]
    pub fn null() -> Self {
        Expr::konst(Const::Null)
    }

    #[inline]
    pub fn i64(i: i64) -> Self {
        Expr::konst(Const::I64(i))
    }

    #[inline]
    pub fn string(s: &str) -> Self {
        Expr::konst(Const::String(SemiStr::new(s)))
    }

    /// Creates comparison or arithmetic on two operands.
    #[inline]
    pub fn binary(op: Operator, lhs: Expr, rhs: Expr) -> Self {
        debug_assert_eq!(2, op.layout().inputs);
        Expr::scalar(op, Private::None, vec![Some(lhs), Some(rhs)])
    }

    #[inline]
    pub fn cmp_eq(lhs: Expr, rhs: Expr) -> Self {
        Expr::binary(Operator::Eq, lhs, rhs)
    }

    #[inline]
    pub fn is_not_null(e: Expr) -> Self {
        Expr::binary(Operator::IsNot, e, Expr::null())
    }

    #[inline]
    pub fn is_null(e: Expr) -> Self {
        Expr::binary(Operator::Is, e, Expr::null())
    }

    #[inline]
    pub fn not(e: Expr) -> Self {
        Expr::scalar(Operator::Not, Private::None, vec![Some(e)])
    }

    #[inline]
    pub fn exists(subq: Expr) -> Self {
        Expr::scalar(Operator::Exists, Private::None, vec![Some(subq)])
    }

    #[inline]
    pub fn not_exists(subq: Expr) -> Self {
        Expr::not(Expr::exists(subq))
    }

    #[inline]
    pub fn and(es: Vec<Expr>) -> Self {
        Expr::scalar(Operator::And, Private::None, es.into_iter().map(Some).collect())
    }

    #[inline]
    pub fn or(es: Vec<Expr>) -> Self {
        Expr::scalar(Operator::Or, Private::None, es.into_iter().map(Some).collect())
    }

    #[inline]
    pub fn list(es: Vec<Expr>) -> Self {
        Expr::scalar(Operator::List, Private::None, es.into_iter().map(Some).collect())
    }

    #[inline]
    pub fn func(name: &str, args: Vec<Expr>) -> Self {
        Expr::scalar(
            Operator::Function,
            Private::Func(SemiStr::new(name)),
            args.into_iter().map(Some).collect(),
        )
    }

    #[inline]
    pub fn rel_props(&self) -> Option<&RelProps> {
        self.props.rel()
    }

    /// Returns relational properties, failing on scalar nodes.
    #[inline]
    pub fn expect_rel(&self) -> Result<&RelProps> {
        self.props.rel().ok_or(Error::MissingProps(self.op.name()))
    }

    /// Columns referenced by a scalar node, or outer columns of a
    /// relational node.
    #[inline]
    pub fn free_cols(&self) -> &ColSet {
        self.props.free_cols()
    }

    #[inline]
    pub fn input(&self, idx: usize) -> Option<&Expr> {
        if idx < self.op.layout().inputs || self.op.layout().variadic {
            self.children.get(idx).and_then(|c| c.as_ref())
        } else {
            None
        }
    }

    #[inline]
    pub fn slot(&self, slot: Slot) -> Option<&Expr> {
        self.op
            .layout()
            .slot(slot)
            .and_then(|i| self.children.get(i))
            .and_then(|c| c.as_ref())
    }

    /// Returns items of a list slot.
    #[inline]
    pub fn slot_items(&self, slot: Slot) -> Vec<&Expr> {
        match self.slot(slot) {
            Some(list) if list.op == Operator::List => list.children.iter().flatten().collect(),
            Some(e) => vec![e],
            None => vec![],
        }
    }

    /// Returns conjuncts of the filter slot.
    #[inline]
    pub fn filters(&self) -> Vec<&Expr> {
        match self.slot(Slot::Filters) {
            Some(f) => f.conjuncts(),
            None => vec![],
        }
    }

    /// Returns conjuncts of a predicate.
    #[inline]
    pub fn conjuncts(&self) -> Vec<&Expr> {
        if self.op == Operator::And {
            self.children.iter().flatten().collect()
        } else {
            vec![self]
        }
    }

    /// Appends a filter to the filter slot.
    pub fn add_filter(&mut self, filter: Expr) -> Result<()> {
        let mut filters: Vec<Expr> = self.filters().into_iter().cloned().collect();
        filters.push(filter);
        self.set_filters(filters)
    }

    /// Replaces the filter slot with given conjuncts.
    pub fn set_filters(&mut self, filters: Vec<Expr>) -> Result<()> {
        let pos = self
            .op
            .layout()
            .slot(Slot::Filters)
            .ok_or(Error::Unimplemented("filter slot of operator"))?;
        self.children[pos] = conj(filters);
        self.update_props()
    }

    /// Removes a filter, matched by fingerprint.
    pub fn remove_filter(&mut self, filter: &Expr) -> Result<Expr> {
        let fp = filter.fingerprint();
        let mut filters: Vec<Expr> = self.filters().into_iter().cloned().collect();
        let idx = filters
            .iter()
            .position(|f| f.fingerprint() == fp)
            .ok_or(Error::FilterNotFound(fp))?;
        let removed = filters.remove(idx);
        self.set_filters(filters)?;
        Ok(removed)
    }

    /// Replaces one child and re-derives properties.
    #[inline]
    pub fn set_child(&mut self, idx: usize, child: Option<Expr>) -> Result<()> {
        let actual = self.children.len();
        match self.children.get_mut(idx) {
            Some(c) => *c = child,
            None => return Err(Error::invalid_layout(self.op, idx + 1, actual)),
        }
        self.update_props()
    }

    /// Changes operator tag keeping children, e.g. to set or
    /// clear the apply flag of a join.
    #[inline]
    pub fn set_op(&mut self, op: Operator) -> Result<()> {
        if op.layout() != self.op.layout() {
            return Err(Error::invalid_layout(
                op,
                op.layout().num_children(),
                self.children.len(),
            ));
        }
        self.op = op;
        self.update_props()
    }

    /// Re-derives properties from current children and detaches the
    /// node from the memo. Required columns are kept.
    pub fn update_props(&mut self) -> Result<()> {
        self.loc = None;
        match self.op {
            // leaf properties come from the table definition
            Operator::Scan | Operator::IndexScan => Ok(()),
            op if op.is_relational() => {
                let mut props = derive_rel(op, &self.private, &self.children)?;
                if let Props::Rel(old) = &self.props {
                    props.required_cols = &old.required_cols & &props.output_cols;
                }
                self.props = Props::Rel(Arc::new(props));
                Ok(())
            }
            op => {
                self.props = Props::Scalar(Arc::new(derive_scalar(
                    op,
                    &self.private,
                    &self.children,
                )));
                Ok(())
            }
        }
    }

    /// Structural fingerprint of the tree. Relational subtrees are
    /// represented by their property fingerprint.
    pub fn fingerprint(&self) -> String {
        match &self.props {
            Props::Rel(p) => format!("{{{}}}", p.fingerprint()),
            Props::Scalar(_) => node_fingerprint(self.op, &self.private, &self.children),
        }
    }

    /// Pushes required output columns top-down through the tree.
    pub fn require_cols(&mut self, required: &ColSet) {
        let own = match &mut self.props {
            Props::Rel(p) => {
                let req = required & &p.output_cols;
                if p.required_cols != req {
                    Arc::make_mut(p).required_cols = req.clone();
                }
                req
            }
            Props::Scalar(_) => ColSet::new(),
        };
        let layout = self.op.layout();
        let mut aux_cols = ColSet::new();
        for c in self.children.iter().skip(layout.inputs).flatten() {
            aux_cols |= c.free_cols();
        }
        match &self.private {
            Private::Cols(cs) if self.op == Operator::OrderBy => {
                for c in cs {
                    aux_cols.insert(*c);
                }
            }
            Private::Index(index) if self.op == Operator::IndexLookup => {
                for c in &index.ordering {
                    aux_cols.insert(*c);
                }
            }
            _ => (),
        }
        let op = self.op;
        for (i, child) in self.children.iter_mut().enumerate() {
            let child = match child {
                Some(c) => c,
                None => continue,
            };
            let output = match child.rel_props() {
                Some(p) => p.output_cols.clone(),
                None => {
                    child.require_cols(&ColSet::new());
                    continue;
                }
            };
            let needed = match op {
                Operator::Project | Operator::GroupBy => aux_cols.clone(),
                Operator::Union | Operator::Intersect | Operator::Except => output.clone(),
                Operator::SemiJoin
                | Operator::AntiJoin
                | Operator::SemiJoinApply
                | Operator::AntiJoinApply
                    if i == 1 =>
                {
                    aux_cols.clone()
                }
                _ if op.is_scalar() => ColSet::new(),
                _ => &own | &aux_cols,
            };
            child.require_cols(&(&needed & &output));
        }
    }

    pub fn walk<'a, V: ExprVisitor<'a>>(&'a self, visitor: &mut V) -> ControlFlow<V::Break> {
        visitor.enter(self)?;
        for c in self.children.iter().flatten() {
            c.walk(visitor)?
        }
        visitor.leave(self)
    }

    #[inline]
    pub fn contains_op(&self, op: Operator) -> bool {
        struct Contains(Operator);
        impl<'a> ExprVisitor<'a> for Contains {
            type Break = ();
            #[inline]
            fn enter(&mut self, e: &Expr) -> ControlFlow<()> {
                if e.op == self.0 {
                    return ControlFlow::Break(());
                }
                ControlFlow::Continue(())
            }
        }
        self.walk(&mut Contains(op)).is_break()
    }

    /// Collects columns of all variables in the tree.
    #[inline]
    pub fn collect_vars(&self) -> ColSet {
        struct Collect(ColSet);
        impl<'a> ExprVisitor<'a> for Collect {
            type Break = ();
            #[inline]
            fn enter(&mut self, e: &Expr) -> ControlFlow<()> {
                if let Some(c) = e.private.col() {
                    self.0.insert(c);
                }
                ControlFlow::Continue(())
            }
        }
        let mut c = Collect(ColSet::new());
        let _ = self.walk(&mut c);
        c.0
    }
}

impl fmt::Display for Expr {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

/// Combines predicates into the content of a filter slot.
#[inline]
pub fn conj(mut filters: Vec<Expr>) -> Option<Expr> {
    match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(Expr::and(filters)),
    }
}

/// Fingerprint of a single node over fingerprints of its children.
pub(crate) fn node_fingerprint(op: Operator, private: &Private, children: &[Option<Expr>]) -> String {
    let mut s = op.to_string();
    if !private.is_none() {
        s.push('[');
        s.push_str(&private.to_string());
        s.push(']');
    }
    if !children.is_empty() {
        s.push('(');
        for (i, c) in children.iter().enumerate() {
            if i > 0 {
                s.push(',');
            }
            match c {
                Some(c) => s.push_str(&c.fingerprint()),
                None => s.push('-'),
            }
        }
        s.push(')');
    }
    s
}

pub trait ExprVisitor<'a>: Sized {
    type Break;

    #[inline]
    fn enter(&mut self, _e: &'a Expr) -> ControlFlow<Self::Break> {
        ControlFlow::Continue(())
    }

    #[inline]
    fn leave(&mut self, _e: &'a Expr) -> ControlFlow<Self::Break> {
        ControlFlow::Continue(())
    }
}
