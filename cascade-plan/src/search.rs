//! Exploration and implementation of the memo, driven by the task
//! scheduler.
//!
//! Exploring an alternative first explores all its child groups, then
//! applies exploration rules matching its operator. Alternatives added
//! by a rule are explored in turn. Implementation of a group waits
//! until the group is explored, and applies implementation rules on
//! every alternative after implementing its child groups.
//! Subqueries nested in scalar groups are searched as well.
use crate::error::{Error, Result};
use crate::memo::{GroupState, Memo};
use crate::rule::{apply_rule, RuleID, RuleSet};
use crate::task::{Executor, RunState, Scheduler, TaskID};
use cascade_expr::{GroupID, MemoLoc};
use fnv::FnvHashSet;

const PRIO_GROUP: u8 = 0;
const PRIO_EXPR: u8 = 1;
const PRIO_RULE: u8 = 2;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub explore: bool,
    pub implement: bool,
    /// Maximum number of executed tasks, unlimited if `None`.
    pub max_steps: Option<usize>,
    pub disabled_rules: FnvHashSet<&'static str>,
}

impl Default for SearchOptions {
    #[inline]
    fn default() -> Self {
        SearchOptions {
            explore: true,
            implement: true,
            max_steps: None,
            disabled_rules: FnvHashSet::default(),
        }
    }
}

impl SearchOptions {
    #[inline]
    pub fn explore(mut self, explore: bool) -> Self {
        self.explore = explore;
        self
    }

    #[inline]
    pub fn implement(mut self, implement: bool) -> Self {
        self.implement = implement;
        self
    }

    #[inline]
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    #[inline]
    pub fn disable_rule(mut self, name: &'static str) -> Self {
        self.disabled_rules.insert(name);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub tasks_executed: usize,
    pub rules_applied: usize,
    pub alternatives_added: usize,
    /// Whether the search stopped on step budget.
    pub exhausted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchTask {
    /// Marks group explored once its alternatives are explored.
    ExploreGroup(GroupID),
    ExploreExpr(MemoLoc),
    ImplementGroup(GroupID),
    ImplementExpr(MemoLoc),
    ApplyRule(RuleID, MemoLoc),
}

pub struct Search<'a> {
    memo: &'a mut Memo,
    rules: &'a RuleSet,
    options: SearchOptions,
    stats: SearchStats,
}

impl<'a> Search<'a> {
    #[inline]
    pub fn new(memo: &'a mut Memo, rules: &'a RuleSet, options: SearchOptions) -> Self {
        Search {
            memo,
            rules,
            options,
            stats: SearchStats::default(),
        }
    }

    /// Searches the memo starting from its root group.
    pub fn run(mut self) -> Result<SearchStats> {
        let root = self.memo.root().ok_or(Error::RootNotSet)?;
        let mut sched = Scheduler::new();
        if self.options.implement {
            self.implement_group(&mut sched, None, root)?;
        } else if self.options.explore {
            self.explore_group(&mut sched, None, root)?;
        }
        let max_steps = self.options.max_steps;
        let state = sched.run(&mut self, max_steps)?;
        self.stats.tasks_executed = sched.executed();
        self.stats.exhausted = state == RunState::Exhausted;
        log::debug!("search finished: {:?}", self.stats);
        Ok(self.stats)
    }

    fn explore_group(
        &mut self,
        sched: &mut Scheduler<SearchTask>,
        parent: Option<TaskID>,
        group: GroupID,
    ) -> Result<()> {
        let task = sched.create(parent, PRIO_GROUP, SearchTask::ExploreGroup(group))?;
        if self.options.explore {
            for idx in self.memo.take_unexplored(group)? {
                self.explore_expr(sched, Some(task), MemoLoc::new(group, idx))?;
            }
        }
        sched.submit(task)
    }

    /// Child groups are explored before the alternative itself.
    fn explore_expr(
        &mut self,
        sched: &mut Scheduler<SearchTask>,
        parent: Option<TaskID>,
        loc: MemoLoc,
    ) -> Result<()> {
        let task = sched.create(parent, PRIO_EXPR, SearchTask::ExploreExpr(loc))?;
        let children: Vec<GroupID> = self.memo.expr(loc)?.children.iter().flatten().copied().collect();
        for c in children {
            self.explore_group(sched, Some(task), c)?;
        }
        sched.submit(task)
    }

    fn implement_group(
        &mut self,
        sched: &mut Scheduler<SearchTask>,
        parent: Option<TaskID>,
        group: GroupID,
    ) -> Result<()> {
        let task = sched.create(parent, PRIO_GROUP, SearchTask::ImplementGroup(group))?;
        self.explore_group(sched, Some(task), group)?;
        sched.submit(task)
    }

    fn implement_expr(
        &mut self,
        sched: &mut Scheduler<SearchTask>,
        parent: Option<TaskID>,
        loc: MemoLoc,
    ) -> Result<()> {
        let task = sched.create(parent, PRIO_EXPR, SearchTask::ImplementExpr(loc))?;
        let children: Vec<GroupID> = self.memo.expr(loc)?.children.iter().flatten().copied().collect();
        for c in children {
            self.implement_group(sched, Some(task), c)?;
        }
        sched.submit(task)
    }

    fn spawn_rules(
        &mut self,
        sched: &mut Scheduler<SearchTask>,
        parent: TaskID,
        loc: MemoLoc,
        rules: &[RuleID],
    ) -> Result<()> {
        for id in rules {
            let disabled = self
                .rules
                .get(*id)
                .map_or(true, |r| self.options.disabled_rules.contains(r.name));
            if !disabled {
                sched.spawn(Some(parent), PRIO_RULE, SearchTask::ApplyRule(*id, loc))?;
            }
        }
        Ok(())
    }
}

impl Executor<SearchTask> for Search<'_> {
    fn execute(
        &mut self,
        sched: &mut Scheduler<SearchTask>,
        id: TaskID,
        payload: SearchTask,
    ) -> Result<()> {
        log::trace!("execute task {}: {:?}", id, payload);
        match payload {
            SearchTask::ExploreGroup(group) => {
                self.memo.advance_state(group, GroupState::Explored)
            }
            SearchTask::ExploreExpr(loc) => {
                let op = self.memo.expr(loc)?.op;
                let rules = self.rules;
                self.spawn_rules(sched, id, loc, rules.exploration_rules(op))
            }
            SearchTask::ImplementGroup(group) => {
                for idx in self.memo.take_unimplemented(group)? {
                    self.implement_expr(sched, Some(id), MemoLoc::new(group, idx))?;
                }
                self.memo.advance_state(group, GroupState::Implemented)
            }
            SearchTask::ImplementExpr(loc) => {
                let op = self.memo.expr(loc)?.op;
                let rules = self.rules;
                self.spawn_rules(sched, id, loc, rules.implementation_rules(op))
            }
            SearchTask::ApplyRule(rule_id, loc) => {
                let rules = self.rules;
                let rule = match rules.get(rule_id) {
                    Some(rule) => rule,
                    None => return Ok(()),
                };
                let outcome = apply_rule(self.memo, rule, loc)?;
                self.stats.rules_applied += 1;
                self.stats.alternatives_added += outcome.added;
                if outcome.added > 0 {
                    // new alternatives are explored, and implemented in
                    // implementation phase
                    if self.options.implement {
                        self.implement_group(sched, Some(id), loc.group)?;
                    } else {
                        self.explore_group(sched, Some(id), loc.group)?;
                    }
                }
                Ok(())
            }
        }
    }
}
