//! Transformation rules applied on memo alternatives.
//!
//! A rule consists of a pattern, a cheap check on the bound
//! expression and an apply function producing candidate
//! alternatives. Candidates are inserted into the group of the
//! bound root, so every candidate must be logically equivalent
//! to it.
use crate::bind::{BindAnchor, BindCursor};
use crate::error::{Error, Result};
use crate::memo::Memo;
use crate::pattern::Pattern;
use cascade_expr::{Expr, MemoLoc, Operator};
use static_init::dynamic;
use std::fmt;

pub mod decorrelate;
pub mod index_scan;
pub mod join_assoc;
pub mod join_commute;
pub mod join_elim;

pub use decorrelate::decorrelate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleID(u16);

impl RuleID {
    /// Placeholder of unregistered rules.
    #[inline]
    const fn default_id() -> Self {
        RuleID(u16::MAX)
    }

    #[inline]
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl From<u16> for RuleID {
    #[inline]
    fn from(src: u16) -> Self {
        RuleID(src)
    }
}

impl fmt::Display for RuleID {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Produces logically equivalent alternatives.
    Exploration,
    /// Produces alternatives choosing concrete access paths.
    Implementation,
}

pub type CheckFn = fn(&Expr) -> bool;
pub type ApplyFn = fn(&Expr, &mut Vec<Expr>) -> Result<()>;

#[derive(Clone)]
pub struct Rule {
    pub id: RuleID,
    pub name: &'static str,
    pub kind: RuleKind,
    pub pattern: Pattern,
    pub check: CheckFn,
    pub apply: ApplyFn,
}

impl Rule {
    /// Creates a rule, its id is assigned when registered.
    #[inline]
    pub fn new(
        name: &'static str,
        kind: RuleKind,
        pattern: Pattern,
        check: CheckFn,
        apply: ApplyFn,
    ) -> Self {
        Rule {
            id: RuleID::default_id(),
            name,
            kind,
            pattern,
            check,
            apply,
        }
    }

    #[inline]
    pub fn root_op(&self) -> Option<Operator> {
        self.pattern.op()
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("pattern", &self.pattern)
            .finish()
    }
}

/// Registry of rules, indexed by the root operator of their patterns.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    exploration: Vec<Vec<RuleID>>,
    implementation: Vec<Vec<RuleID>>,
}

impl RuleSet {
    /// Validates patterns and assigns ids in registration order.
    pub fn new(rules: Vec<Rule>) -> Result<Self> {
        let mut res = RuleSet {
            rules: Vec::with_capacity(rules.len()),
            exploration: vec![vec![]; Operator::COUNT],
            implementation: vec![vec![]; Operator::COUNT],
        };
        for mut rule in rules {
            rule.pattern.validate(rule.name)?;
            if res.rules.iter().any(|r| r.name == rule.name) {
                return Err(Error::DuplicatedRule(rule.name));
            }
            let op = rule.root_op().ok_or(Error::InvalidPattern(rule.name))?;
            let id = RuleID::from(res.rules.len() as u16);
            rule.id = id;
            match rule.kind {
                RuleKind::Exploration => res.exploration[op.index()].push(id),
                RuleKind::Implementation => res.implementation[op.index()].push(id),
            }
            res.rules.push(rule);
        }
        Ok(res)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[inline]
    pub fn get(&self, id: RuleID) -> Option<&Rule> {
        self.rules.get(id.0 as usize)
    }

    #[inline]
    pub fn find(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    #[inline]
    pub fn exploration_rules(&self, op: Operator) -> &[RuleID] {
        &self.exploration[op.index()]
    }

    #[inline]
    pub fn implementation_rules(&self, op: Operator) -> &[RuleID] {
        &self.implementation[op.index()]
    }
}

/// All rules shipped with the optimizer.
pub fn default_rules() -> Vec<Rule> {
    let mut rules = vec![
        join_commute::rule(),
        join_assoc::rule(),
        join_elim::rule(),
    ];
    rules.extend(decorrelate::rules());
    rules.extend(index_scan::rules());
    rules
}

#[dynamic]
pub static DEFAULT_RULES: RuleSet = RuleSet::new(default_rules()).unwrap();

/// Result of applying one rule at one location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleOutcome {
    pub bindings: usize,
    pub candidates: usize,
    pub added: usize,
}

/// Enumerates all bindings of the rule rooted at given alternative,
/// and inserts produced candidates into its group.
pub fn apply_rule(memo: &mut Memo, rule: &Rule, loc: MemoLoc) -> Result<RuleOutcome> {
    let mut outcome = RuleOutcome::default();
    let mut candidates = vec![];
    {
        let mut cursor = BindCursor::new(BindAnchor::Expr(loc), &rule.pattern)?;
        while let Some(e) = cursor.next(memo)? {
            outcome.bindings += 1;
            if (rule.check)(e) {
                (rule.apply)(e, &mut candidates)?;
            }
        }
    }
    outcome.candidates = candidates.len();
    for c in candidates {
        let (new_loc, added) = memo.insert_at(loc.group, c)?;
        if added {
            log::debug!("rule {} at {} added {}", rule.name, loc, new_loc);
            outcome.added += 1;
        }
    }
    Ok(outcome)
}

/// Inputs of a binary relational node.
#[inline]
pub(crate) fn join_inputs(e: &Expr) -> Option<(&Expr, &Expr)> {
    match (e.input(0), e.input(1)) {
        (Some(l), Some(r)) => Some((l, r)),
        _ => None,
    }
}

/// Whether either input of a binary node references columns of the
/// other one.
#[inline]
pub(crate) fn is_correlated(left: &Expr, right: &Expr) -> bool {
    match (left.rel_props(), right.rel_props()) {
        (Some(l), Some(r)) => {
            r.outer_cols.intersects(&l.output_cols) || l.outer_cols.intersects(&r.output_cols)
        }
        _ => false,
    }
}

#[inline]
pub(crate) fn cloned_filters(e: &Expr) -> Vec<Expr> {
    e.filters().into_iter().cloned().collect()
}
