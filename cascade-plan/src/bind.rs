//! Enumeration of all bindings of a pattern over memo alternatives.
//!
//! A binding picks one alternative for the root and for every child
//! matched by a node pattern. Bindings are enumerated like a
//! mixed-radix counter: the rightmost node child advances first, an
//! exhausted child is reset and the carry moves left, and once all
//! children are exhausted the root moves to its next matching
//! alternative.
use crate::error::{Error, Result};
use crate::memo::Memo;
use crate::pattern::Pattern;
use cascade_expr::{Expr, GroupID, MemoLoc};

/// Where a binding is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindAnchor {
    /// Any alternative of the group.
    Group(GroupID),
    /// Exactly one alternative.
    Expr(MemoLoc),
}

pub struct BindCursor<'p> {
    anchor: BindAnchor,
    pattern: &'p Pattern,
    state: Option<NodeCursor>,
    done: bool,
    expr: Option<Expr>,
}

impl<'p> BindCursor<'p> {
    #[inline]
    pub fn new(anchor: BindAnchor, pattern: &'p Pattern) -> Result<Self> {
        if pattern.op().is_none() {
            return Err(Error::InvalidPattern("bind"));
        }
        Ok(BindCursor {
            anchor,
            pattern,
            state: None,
            done: false,
            expr: None,
        })
    }

    /// Returns the next binding, or `None` once exhausted.
    ///
    /// The returned expression is only valid until the next call.
    pub fn next(&mut self, memo: &Memo) -> Result<Option<&Expr>> {
        if self.done {
            return Ok(None);
        }
        let pattern = self.pattern;
        let found = match &mut self.state {
            None => {
                let (group, from, single) = match self.anchor {
                    BindAnchor::Group(g) => {
                        memo.group(g)?;
                        (g, 0, false)
                    }
                    BindAnchor::Expr(loc) => {
                        memo.expr(loc)
                            .map_err(|_| Error::BindLocationMismatch(loc))?;
                        (loc.group, loc.expr as usize, true)
                    }
                };
                self.state = NodeCursor::first(memo, group, from, single, pattern);
                self.state.is_some()
            }
            Some(state) => state.advance(memo, pattern),
        };
        if !found {
            self.done = true;
            self.expr = None;
            return Ok(None);
        }
        let expr = match &self.state {
            Some(state) => state.build(memo, pattern)?,
            None => return Ok(None),
        };
        log::trace!("bind {} at {:?}", expr.op, expr.loc);
        self.expr = Some(expr);
        Ok(self.expr.as_ref())
    }
}

struct NodeCursor {
    group: GroupID,
    alt: usize,
    single: bool,
    children: Vec<ChildCursor>,
}

enum ChildCursor {
    Absent,
    Leaf(GroupID),
    Tree(GroupID),
    Node(NodeCursor),
}

impl NodeCursor {
    /// Finds the first binding whose root alternative is at or after
    /// `from`. A single cursor never moves away from `from`.
    fn first(
        memo: &Memo,
        group: GroupID,
        from: usize,
        single: bool,
        pattern: &Pattern,
    ) -> Option<NodeCursor> {
        let (op, child_patterns) = match pattern {
            Pattern::Node(op, children) => (*op, children),
            _ => return None,
        };
        let exprs = memo.group_exprs(group).ok()?;
        let end = if single {
            exprs.len().min(from + 1)
        } else {
            exprs.len()
        };
        for alt in from..end {
            let me = &exprs[alt];
            if me.op != op || me.children.len() != child_patterns.len() {
                continue;
            }
            if let Some(children) = first_children(memo, &me.children, child_patterns) {
                return Some(NodeCursor {
                    group,
                    alt,
                    single,
                    children,
                });
            }
        }
        None
    }

    fn advance(&mut self, memo: &Memo, pattern: &Pattern) -> bool {
        let child_patterns = match pattern {
            Pattern::Node(_, children) => children,
            _ => return false,
        };
        for (child, cp) in self.children.iter_mut().zip(child_patterns).rev() {
            if let ChildCursor::Node(nc) = child {
                if nc.advance(memo, cp) {
                    return true;
                }
                // carry: restart this child and move to the left one
                match NodeCursor::first(memo, nc.group, 0, false, cp) {
                    Some(reset) => *nc = reset,
                    None => return false,
                }
            }
        }
        if self.single {
            return false;
        }
        match NodeCursor::first(memo, self.group, self.alt + 1, false, pattern) {
            Some(next) => {
                *self = next;
                true
            }
            None => false,
        }
    }

    fn build(&self, memo: &Memo, pattern: &Pattern) -> Result<Expr> {
        let loc = MemoLoc::new(self.group, self.alt as u32);
        let me = memo.expr(loc)?;
        let child_patterns: &[Pattern] = match pattern {
            Pattern::Node(_, children) => children,
            _ => &[],
        };
        let mut children = Vec::with_capacity(self.children.len());
        for (c, cp) in self.children.iter().zip(child_patterns) {
            children.push(match c {
                ChildCursor::Absent => None,
                ChildCursor::Leaf(g) => Some(memo.stub(*g)?),
                ChildCursor::Tree(g) => Some(memo.extract(MemoLoc::new(*g, 0))?),
                ChildCursor::Node(nc) => Some(nc.build(memo, cp)?),
            });
        }
        Ok(Expr::bound(
            me.op,
            me.private.clone(),
            children,
            memo.group(self.group)?.props().clone(),
            Some(loc),
        ))
    }
}

fn first_children(
    memo: &Memo,
    children: &[Option<GroupID>],
    patterns: &[Pattern],
) -> Option<Vec<ChildCursor>> {
    let mut res = Vec::with_capacity(children.len());
    for (c, p) in children.iter().zip(patterns) {
        let cursor = match (p, c) {
            (Pattern::Leaf, Some(g)) => ChildCursor::Leaf(*g),
            (Pattern::Tree, Some(g)) => ChildCursor::Tree(*g),
            (Pattern::Leaf | Pattern::Tree, None) => ChildCursor::Absent,
            (Pattern::Node(..), Some(g)) => {
                ChildCursor::Node(NodeCursor::first(memo, *g, 0, false, p)?)
            }
            (Pattern::Node(..), None) => return None,
        };
        res.push(cursor);
    }
    Some(res)
}
