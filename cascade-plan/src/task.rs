//! Dependency-counted task scheduler.
//!
//! Every task may have a parent, which counts its pending children.
//! A task becomes ready once it is submitted and has no pending
//! children. Ready tasks are executed one at a time, ordered by
//! priority, and by creation order among equal priorities.
//!
//! A task is complete when it has executed and all children created
//! under it are complete. Completion is propagated to the parent,
//! which becomes ready if it is still waiting for execution.
use crate::error::{Error, Result};
use slab::Slab;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

pub type TaskID = usize;

/// Executes task payloads, possibly scheduling more tasks.
pub trait Executor<T> {
    fn execute(&mut self, sched: &mut Scheduler<T>, id: TaskID, payload: T) -> Result<()>;
}

#[derive(Debug)]
struct Task<T> {
    payload: Option<T>,
    parent: Option<TaskID>,
    deps: usize,
    priority: u8,
    /// Creation order, breaks ties among equal priorities.
    seq: u64,
    submitted: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct Ready {
    priority: u8,
    seq: u64,
    id: TaskID,
}

impl Ord for Ready {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Ready {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Outcome of running the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No task is ready.
    Finished,
    /// Step budget was used up with ready tasks left.
    Exhausted,
}

#[derive(Debug)]
pub struct Scheduler<T> {
    tasks: Slab<Task<T>>,
    ready: BinaryHeap<Ready>,
    seq: u64,
    executed: usize,
}

impl<T> Default for Scheduler<T> {
    #[inline]
    fn default() -> Self {
        Scheduler {
            tasks: Slab::new(),
            ready: BinaryHeap::new(),
            seq: 0,
            executed: 0,
        }
    }
}

impl<T> Scheduler<T> {
    #[inline]
    pub fn new() -> Self {
        Scheduler::default()
    }

    /// Number of tasks not yet complete.
    #[inline]
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Number of tasks executed so far.
    #[inline]
    pub fn executed(&self) -> usize {
        self.executed
    }

    /// Creates a task without making it ready. The parent will not be
    /// executed or completed before this task completes.
    pub fn create(&mut self, parent: Option<TaskID>, priority: u8, payload: T) -> Result<TaskID> {
        if let Some(p) = parent {
            self.tasks.get_mut(p).ok_or(Error::TaskNotFound(p))?.deps += 1;
        }
        self.seq += 1;
        Ok(self.tasks.insert(Task {
            payload: Some(payload),
            parent,
            deps: 0,
            priority,
            seq: self.seq,
            submitted: false,
        }))
    }

    /// Marks a created task as submitted, it is executed once all its
    /// children complete.
    pub fn submit(&mut self, id: TaskID) -> Result<()> {
        let task = self.tasks.get_mut(id).ok_or(Error::TaskNotFound(id))?;
        if task.submitted {
            return Ok(());
        }
        task.submitted = true;
        if task.deps == 0 {
            let ready = Ready {
                priority: task.priority,
                seq: task.seq,
                id,
            };
            self.ready.push(ready);
        }
        Ok(())
    }

    #[inline]
    pub fn spawn(&mut self, parent: Option<TaskID>, priority: u8, payload: T) -> Result<TaskID> {
        let id = self.create(parent, priority, payload)?;
        self.submit(id)?;
        Ok(id)
    }

    /// Executes ready tasks until none is left, or `max_steps` tasks
    /// were executed in total.
    pub fn run<E: Executor<T>>(&mut self, exec: &mut E, max_steps: Option<usize>) -> Result<RunState> {
        while let Some(ready) = self.ready.peek() {
            if max_steps.map_or(false, |max| self.executed >= max) {
                log::warn!(
                    "task budget of {} steps exhausted with {} tasks pending",
                    self.executed,
                    self.tasks.len()
                );
                return Ok(RunState::Exhausted);
            }
            let id = ready.id;
            self.ready.pop();
            let task = self.tasks.get_mut(id).ok_or(Error::TaskNotFound(id))?;
            if task.deps != 0 {
                return Err(Error::NonZeroDependency {
                    task: id,
                    deps: task.deps,
                });
            }
            if let Some(payload) = task.payload.take() {
                self.executed += 1;
                exec.execute(self, id, payload)?;
            }
            // children created during execution delay completion
            if self.tasks.get(id).map_or(false, |t| t.deps == 0) {
                self.complete(id)?;
            }
        }
        Ok(RunState::Finished)
    }

    fn complete(&mut self, id: TaskID) -> Result<()> {
        let mut curr = id;
        loop {
            if !self.tasks.contains(curr) {
                return Err(Error::TaskNotFound(curr));
            }
            let task = self.tasks.remove(curr);
            let parent = match task.parent {
                Some(p) => p,
                None => return Ok(()),
            };
            let pt = self.tasks.get_mut(parent).ok_or(Error::TaskNotFound(parent))?;
            pt.deps -= 1;
            if pt.deps > 0 {
                return Ok(());
            }
            if pt.payload.is_some() {
                if pt.submitted {
                    let ready = Ready {
                        priority: pt.priority,
                        seq: pt.seq,
                        id: parent,
                    };
                    self.ready.push(ready);
                }
                return Ok(());
            }
            curr = parent;
        }
    }
}
