use serde::Serialize;
use tracing::trace;

use super::options::PendingOrder;
use super::task::ComputeTask;
use crate::types::{EngineError, FileId, Result, TaskId, VertexId};

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    task: Option<ComputeTask>,
}

/// Allocation counters of a [`TaskAllocator`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AllocatorStats {
    pub live: usize,
    pub capacity: usize,
    pub allocated: u64,
    pub reclaimed: u64,
}

/// Pooled storage for compute tasks, owned by one worker.
///
/// Freed slots are reused; each reuse bumps the slot's generation so stale
/// [`TaskId`]s stop resolving.
#[derive(Debug, Default)]
pub struct TaskAllocator {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    allocated: u64,
    reclaimed: u64,
}

impl TaskAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Creates a task for `vertex` holding its owner share.
    pub fn alloc(
        &mut self,
        vertex: VertexId,
        file: FileId,
        directed: bool,
        order: PendingOrder,
    ) -> TaskId {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let entry = &mut self.slots[slot as usize];
        let id = TaskId {
            slot,
            generation: entry.generation,
        };
        entry.task = Some(ComputeTask::new(id, vertex, file, directed, order));
        self.live += 1;
        self.allocated += 1;
        trace!(task = %id, %vertex, "task allocated");
        id
    }

    pub fn get(&self, id: TaskId) -> Option<&ComputeTask> {
        self.slots
            .get(id.slot as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.task.as_ref())
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut ComputeTask> {
        self.slots
            .get_mut(id.slot as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.task.as_mut())
    }

    /// Like [`TaskAllocator::get_mut`] but reports a stale handle as an error.
    pub fn task_mut(&mut self, id: TaskId) -> Result<&mut ComputeTask> {
        self.get_mut(id)
            .ok_or_else(|| EngineError::invariant(format!("{id} does not name a live task")))
    }

    /// Returns a task whose last share was dropped to the pool.
    pub fn free(&mut self, id: TaskId) -> Result<()> {
        let task = self
            .get(id)
            .ok_or_else(|| EngineError::invariant(format!("free of dead {id}")))?;
        if task.ref_count() != 0 || task.in_queue() {
            return Err(EngineError::invariant(format!(
                "free of {id} with {} shares (member: {})",
                task.ref_count(),
                task.in_queue()
            )));
        }
        let slot = &mut self.slots[id.slot as usize];
        slot.task = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.slot);
        self.live -= 1;
        self.reclaimed += 1;
        trace!(task = %id, "task freed");
        Ok(())
    }

    /// Number of tasks not yet freed.
    pub fn live(&self) -> usize {
        self.live
    }

    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            live: self.live,
            capacity: self.slots.len(),
            allocated: self.allocated,
            reclaimed: self.reclaimed,
        }
    }

    /// Live tasks in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &ComputeTask> {
        self.slots.iter().filter_map(|s| s.task.as_ref())
    }
}
