use crate::error::{Error, Result};
use cascade_expr::{ColSet, Expr, GroupID, MemoLoc, Operator, Private, Props};
use fnv::FnvHashMap;
use smallvec::SmallVec;
use std::fmt::Write;
use std::ops::Range;
use std::sync::Arc;

/// Search progress of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GroupState {
    Unexplored,
    Exploring,
    Explored,
    Implementing,
    Implemented,
    Optimizing,
    Optimized,
}

/// One alternative of a group, referencing children by group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoExpr {
    pub op: Operator,
    pub private: Private,
    pub children: SmallVec<[Option<GroupID>; 4]>,
    fingerprint: String,
}

impl MemoExpr {
    #[inline]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Equivalence class of expressions sharing logical properties.
#[derive(Debug)]
pub struct MemoGroup {
    pub id: GroupID,
    pub state: GroupState,
    exprs: Vec<MemoExpr>,
    expr_map: FnvHashMap<String, u32>,
    props: Props,
    explored: usize,
    implemented: usize,
}

impl MemoGroup {
    #[inline]
    pub fn exprs(&self) -> &[MemoExpr] {
        &self.exprs
    }

    #[inline]
    pub fn props(&self) -> &Props {
        &self.props
    }

    #[inline]
    pub fn is_relational(&self) -> bool {
        matches!(self.props, Props::Rel(_))
    }
}

/// Memo of a single query.
///
/// Group ids start from 1 and are assigned in creation order. Groups
/// are never removed and alternatives are append-only, so locations
/// remain valid for the lifetime of the memo.
#[derive(Debug, Default)]
pub struct Memo {
    groups: Vec<MemoGroup>,
    group_map: FnvHashMap<String, GroupID>,
    root: Option<GroupID>,
}

impl Memo {
    #[inline]
    pub fn new() -> Self {
        Memo::default()
    }

    #[inline]
    pub fn root(&self) -> Option<GroupID> {
        self.root
    }

    #[inline]
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Returns all group ids in creation order.
    #[inline]
    pub fn group_ids(&self) -> impl DoubleEndedIterator<Item = GroupID> {
        (1..=self.groups.len() as u32).map(GroupID::from)
    }

    #[inline]
    pub fn group(&self, id: GroupID) -> Result<&MemoGroup> {
        if !id.is_valid() {
            return Err(Error::InvalidGroup(id));
        }
        self.groups
            .get(*id as usize - 1)
            .ok_or(Error::InvalidGroup(id))
    }

    #[inline]
    fn group_mut(&mut self, id: GroupID) -> Result<&mut MemoGroup> {
        if !id.is_valid() {
            return Err(Error::InvalidGroup(id));
        }
        self.groups
            .get_mut(*id as usize - 1)
            .ok_or(Error::InvalidGroup(id))
    }

    #[inline]
    pub fn group_exprs(&self, id: GroupID) -> Result<&[MemoExpr]> {
        self.group(id).map(|g| g.exprs())
    }

    #[inline]
    pub fn expr(&self, loc: MemoLoc) -> Result<&MemoExpr> {
        self.group(loc.group)
            .ok()
            .and_then(|g| g.exprs.get(loc.expr as usize))
            .ok_or(Error::InvalidMemoLoc(loc))
    }

    /// Inserts the whole query tree and marks its group as root.
    pub fn insert_root(&mut self, mut expr: Expr) -> Result<GroupID> {
        if let Some(root) = self.root {
            return Err(Error::RootAlreadySet(root));
        }
        if let Some(p) = expr.rel_props() {
            let output = p.output_cols.clone();
            expr.require_cols(&output);
        }
        let gid = self.memoize(&expr)?;
        log::debug!("memo root set to group {}", gid);
        self.root = Some(gid);
        Ok(gid)
    }

    /// Inserts a tree without changing the root.
    #[inline]
    pub fn insert(&mut self, expr: &Expr) -> Result<GroupID> {
        self.memoize(expr)
    }

    /// Inserts an alternative into given group. Children of the
    /// alternative are memoized as usual.
    ///
    /// Returns the location of the alternative and whether it is new.
    /// A root carrying a memo location contributes the alternative
    /// found at that location.
    pub fn insert_at(&mut self, group: GroupID, mut expr: Expr) -> Result<(MemoLoc, bool)> {
        let required = match &self.group(group)?.props {
            Props::Rel(p) => p.required_cols.clone(),
            Props::Scalar(_) => ColSet::new(),
        };
        expr.require_cols(&required);
        if let Some(loc) = expr.loc {
            if loc.group == group {
                self.expr(loc)?;
                return Ok((loc, false));
            }
            let me = self.expr(loc)?.clone();
            return self.add_expr(group, me.op, me.private, me.children);
        }
        let children = self.memoize_children(&expr)?;
        self.add_expr(group, expr.op, expr.private, children)
    }

    fn memoize(&mut self, expr: &Expr) -> Result<GroupID> {
        if let Some(loc) = expr.loc {
            self.expr(loc)?;
            self.merge_required(loc.group, &expr.props)?;
            return Ok(loc.group);
        }
        let children = self.memoize_children(expr)?;
        let key = match &expr.props {
            Props::Rel(p) => format!("R{}", p.fingerprint()),
            Props::Scalar(_) => format!(
                "S{}",
                memo_fingerprint(expr.op, &expr.private, &children)
            ),
        };
        let gid = match self.group_map.get(&key) {
            Some(gid) => {
                let gid = *gid;
                self.merge_required(gid, &expr.props)?;
                gid
            }
            None => {
                let gid = GroupID::from(self.groups.len() as u32 + 1);
                self.groups.push(MemoGroup {
                    id: gid,
                    state: GroupState::Unexplored,
                    exprs: vec![],
                    expr_map: FnvHashMap::default(),
                    props: expr.props.clone(),
                    explored: 0,
                    implemented: 0,
                });
                self.group_map.insert(key, gid);
                log::debug!("memo group {} created for {}", gid, expr.op);
                gid
            }
        };
        self.add_expr(gid, expr.op, expr.private.clone(), children)?;
        Ok(gid)
    }

    /// Memoizes inputs first, then aux slots.
    #[inline]
    fn memoize_children(&mut self, expr: &Expr) -> Result<SmallVec<[Option<GroupID>; 4]>> {
        let mut children = SmallVec::with_capacity(expr.children.len());
        for c in &expr.children {
            match c {
                Some(c) => children.push(Some(self.memoize(c)?)),
                None => children.push(None),
            }
        }
        Ok(children)
    }

    fn add_expr(
        &mut self,
        group: GroupID,
        op: Operator,
        private: Private,
        children: SmallVec<[Option<GroupID>; 4]>,
    ) -> Result<(MemoLoc, bool)> {
        if children.iter().flatten().any(|c| *c == group) {
            return Err(Error::CyclicAlternative(group));
        }
        let fingerprint = memo_fingerprint(op, &private, &children);
        let g = self.group_mut(group)?;
        if let Some(idx) = g.expr_map.get(&fingerprint) {
            return Ok((MemoLoc::new(group, *idx), false));
        }
        let idx = g.exprs.len() as u32;
        log::debug!("memo group {} adds alternative {}: [{}]", group, idx, fingerprint);
        g.expr_map.insert(fingerprint.clone(), idx);
        g.exprs.push(MemoExpr {
            op,
            private,
            children,
            fingerprint,
        });
        Ok((MemoLoc::new(group, idx), true))
    }

    /// Groups may be reached from several parents, each requiring
    /// some of its columns.
    #[inline]
    fn merge_required(&mut self, group: GroupID, props: &Props) -> Result<()> {
        let g = self.group_mut(group)?;
        if let (Props::Rel(gp), Props::Rel(p)) = (&mut g.props, props) {
            if !gp.required_cols.includes(&p.required_cols) {
                Arc::make_mut(gp).required_cols |= &p.required_cols;
            }
        }
        Ok(())
    }

    /// Returns a childless node standing for the whole group.
    /// It reports the first alternative's operator.
    pub fn stub(&self, group: GroupID) -> Result<Expr> {
        let g = self.group(group)?;
        let first = g.exprs.first().ok_or(Error::InvalidGroup(group))?;
        Ok(Expr::bound(
            first.op,
            first.private.clone(),
            vec![],
            g.props.clone(),
            Some(MemoLoc::new(group, 0)),
        ))
    }

    /// Materializes the alternative at given location, expanding
    /// every child group into its first alternative.
    pub fn extract(&self, loc: MemoLoc) -> Result<Expr> {
        let me = self.expr(loc)?;
        let mut children = Vec::with_capacity(me.children.len());
        for c in &me.children {
            match c {
                Some(g) => children.push(Some(self.extract(MemoLoc::new(*g, 0))?)),
                None => children.push(None),
            }
        }
        Ok(Expr::bound(
            me.op,
            me.private.clone(),
            children,
            self.group(loc.group)?.props.clone(),
            Some(loc),
        ))
    }

    /// Advances the exploration watermark of a group and returns the
    /// alternatives not yet scheduled.
    pub(crate) fn take_unexplored(&mut self, group: GroupID) -> Result<Range<u32>> {
        let g = self.group_mut(group)?;
        let range = g.explored as u32..g.exprs.len() as u32;
        g.explored = g.exprs.len();
        if g.state < GroupState::Exploring {
            g.state = GroupState::Exploring;
        }
        Ok(range)
    }

    pub(crate) fn take_unimplemented(&mut self, group: GroupID) -> Result<Range<u32>> {
        let g = self.group_mut(group)?;
        let range = g.implemented as u32..g.exprs.len() as u32;
        g.implemented = g.exprs.len();
        if g.state < GroupState::Implementing {
            g.state = GroupState::Implementing;
        }
        Ok(range)
    }

    /// Moves group to given state if it has not gone further.
    #[inline]
    pub(crate) fn advance_state(&mut self, group: GroupID, state: GroupState) -> Result<()> {
        let g = self.group_mut(group)?;
        if g.state < state {
            g.state = state;
        }
        Ok(())
    }

    /// Returns groups in topological order, parents before children.
    /// Groups unreachable from the root follow, in descending id order.
    pub fn topo_order(&self) -> Vec<GroupID> {
        let mut visited = vec![false; self.groups.len() + 1];
        let mut post = Vec::with_capacity(self.groups.len());
        let mut starts: Vec<GroupID> = self.root.into_iter().collect();
        starts.extend(self.group_ids().rev());
        for s in starts {
            self.visit(s, &mut visited, &mut post);
        }
        post.reverse();
        post
    }

    fn visit(&self, group: GroupID, visited: &mut [bool], post: &mut Vec<GroupID>) {
        if visited[*group as usize] {
            return;
        }
        visited[*group as usize] = true;
        if let Ok(g) = self.group(group) {
            for me in &g.exprs {
                for c in me.children.iter().flatten() {
                    self.visit(*c, visited, post);
                }
            }
        }
        post.push(group);
    }
}

/// Fingerprint of a memo expression:
/// "<opname>[ (apply)][ <private>][ [<child> ...]]" with '-' for
/// absent children.
pub fn memo_fingerprint(op: Operator, private: &Private, children: &[Option<GroupID>]) -> String {
    let mut s = op.to_string();
    if !private.is_none() {
        let _ = write!(s, " {}", private);
    }
    if !children.is_empty() {
        s.push_str(" [");
        for (i, c) in children.iter().enumerate() {
            if i > 0 {
                s.push(' ');
            }
            match c {
                Some(g) => {
                    let _ = write!(s, "{}", g);
                }
                None => s.push('-'),
            }
        }
        s.push(']');
    }
    s
}
