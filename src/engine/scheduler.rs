use serde::Serialize;
use tracing::{debug, error, trace};

use super::allocator::TaskAllocator;
use super::channel::IoChannel;
use super::options::SchedulePolicy;
use crate::types::{EngineError, Result, TaskId};

/// Counters of an [`IoScheduler`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub registered: u64,
    pub pulled: u64,
    pub reclaimed: u64,
}

/// Queue of tasks holding fetches they could not submit themselves.
///
/// Members are kept in registration order. Each member holds one share of
/// its task; the share is dropped when the member is unregistered, which also
/// returns the task to its allocator. The scheduler belongs to a single
/// worker thread and must be emptied and [closed](IoScheduler::close) before
/// it is dropped.
#[derive(Debug)]
pub struct IoScheduler {
    members: Vec<TaskId>,
    policy: SchedulePolicy,
    stats: SchedulerStats,
    closed: bool,
}

impl IoScheduler {
    pub fn new(policy: SchedulePolicy) -> Self {
        Self {
            members: Vec::new(),
            policy,
            stats: SchedulerStats::default(),
            closed: false,
        }
    }

    pub fn policy(&self) -> SchedulePolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Current members in registration order.
    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.members.iter().copied()
    }

    /// Adds `id` unless it is already a member. Returns whether it was added.
    pub fn register_if_absent(&mut self, tasks: &mut TaskAllocator, id: TaskId) -> Result<bool> {
        let task = tasks.task_mut(id)?;
        if task.in_queue() {
            return Ok(false);
        }
        task.inc_ref();
        task.set_in_queue(true);
        self.members.push(id);
        self.closed = false;
        self.stats.registered += 1;
        trace!(task = %id, queued = task.num_queued(), "scheduler.register");
        Ok(true)
    }

    /// Removes a member and returns its task to the allocator.
    ///
    /// The membership share must be the last one left.
    pub fn unregister(&mut self, tasks: &mut TaskAllocator, id: TaskId) -> Result<()> {
        let task = tasks.get_mut(id).ok_or(EngineError::NotMember(id))?;
        if !task.in_queue() {
            return Err(EngineError::NotMember(id));
        }
        if task.ref_count() != 1 {
            return Err(EngineError::invariant(format!(
                "unregister of {id} while {} other shares are held",
                task.ref_count() - 1
            )));
        }
        let pos = self
            .members
            .iter()
            .position(|&m| m == id)
            .ok_or_else(|| {
                EngineError::invariant(format!("{id} flagged as member but not queued"))
            })?;
        self.members.remove(pos);
        task.set_in_queue(false);
        task.dec_ref()?;
        tasks.free(id)?;
        self.stats.reclaimed += 1;
        trace!(task = %id, "scheduler.unregister");
        Ok(())
    }

    /// Hands up to `capacity` queued fetches of member tasks to `channel`.
    ///
    /// Members with empty queues are skipped. Pulling stops early when the
    /// channel refuses a request; that request goes back to its task.
    pub fn pull_ready_requests(
        &mut self,
        tasks: &mut TaskAllocator,
        channel: &mut dyn IoChannel,
        capacity: usize,
    ) -> Result<usize> {
        let budget = capacity.min(channel.available());
        let mut pulled = 0;
        match self.policy {
            SchedulePolicy::RoundRobin => {
                'passes: while pulled < budget {
                    let before = pulled;
                    for &id in &self.members {
                        if pulled == budget {
                            break 'passes;
                        }
                        if !Self::pull_one(tasks, channel, id, &mut pulled)? {
                            break 'passes;
                        }
                    }
                    if pulled == before {
                        break;
                    }
                }
            }
            SchedulePolicy::FifoDrain => {
                'members: for &id in &self.members {
                    while pulled < budget && tasks.task_mut(id)?.has_pending() {
                        if !Self::pull_one(tasks, channel, id, &mut pulled)? {
                            break 'members;
                        }
                    }
                }
            }
        }
        self.stats.pulled += pulled as u64;
        if pulled > 0 {
            debug!(pulled, members = self.members.len(), "scheduler.pull_ready_requests");
        }
        Ok(pulled)
    }

    /// Pulls one request from `id` if it has any. Returns false once the
    /// channel refuses a submission.
    fn pull_one(
        tasks: &mut TaskAllocator,
        channel: &mut dyn IoChannel,
        id: TaskId,
        pulled: &mut usize,
    ) -> Result<bool> {
        let task = tasks.task_mut(id)?;
        if !task.has_pending() {
            return Ok(true);
        }
        let request = task.next_pending_request()?;
        match channel.submit(request) {
            Ok(()) => {
                *pulled += 1;
                Ok(true)
            }
            Err(request) => {
                task.requeue(request)?;
                Ok(false)
            }
        }
    }

    /// Unregisters every member whose only remaining share is its membership.
    pub fn collect_garbage(&mut self, tasks: &mut TaskAllocator) -> Result<usize> {
        let mut done = Vec::new();
        for &id in &self.members {
            let task = tasks
                .get(id)
                .ok_or_else(|| EngineError::invariant(format!("member {id} was freed")))?;
            if task.ref_count() == 1 && !task.has_pending() {
                done.push(id);
            }
        }
        for &id in &done {
            self.unregister(tasks, id)?;
        }
        if !done.is_empty() {
            debug!(
                reclaimed = done.len(),
                remaining = self.members.len(),
                "scheduler.collect_garbage"
            );
        }
        Ok(done.len())
    }

    /// Marks the scheduler as shut down. Fails while members remain.
    pub fn close(&mut self) -> Result<()> {
        if !self.members.is_empty() {
            return Err(EngineError::invariant(format!(
                "scheduler closed with {} registered tasks",
                self.members.len()
            )));
        }
        self.closed = true;
        Ok(())
    }
}

impl Drop for IoScheduler {
    fn drop(&mut self) {
        if !self.closed && !self.members.is_empty() {
            error!(
                members = self.members.len(),
                "scheduler dropped with registered tasks; their memory is leaked"
            );
        }
    }
}
