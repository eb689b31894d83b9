use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{EngineError, Result};

/// Order in which a task hands its locally queued fetches to the scheduler.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingOrder {
    /// Lowest storage offset first, so pulled requests sweep forward on disk.
    #[default]
    AscendingOffset,
    /// Insertion order.
    Fifo,
}

/// How the scheduler spreads its pull budget across registered tasks.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulePolicy {
    /// One request per task per pass until the budget runs out.
    #[default]
    RoundRobin,
    /// Drain each task in registration order before moving on.
    FifoDrain,
}

/// Order in which [`super::FileChannel`] hands back a batch of completions.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOrder {
    /// Submission order.
    #[default]
    Fifo,
    /// Reverse submission order within each batch.
    Reverse,
}

/// Configuration for a compute [`super::Worker`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineOptions {
    /// Maximum number of requests the I/O channel holds before refusing submissions.
    pub io_depth: usize,
    /// Maximum number of queued requests the scheduler pulls per round.
    pub pull_batch: usize,
    /// Number of vertices admitted concurrently.
    pub max_active_vertices: usize,
    /// Rounds between garbage-collection sweeps of the scheduler.
    pub gc_interval: u32,
    /// Ordering of each task's local pending queue.
    pub pending_order: PendingOrder,
    /// Scheduler pull policy.
    pub schedule_policy: SchedulePolicy,
    /// Completion delivery order of the file channel.
    pub delivery_order: DeliveryOrder,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            io_depth: 64,
            pull_batch: 32,
            max_active_vertices: 1024,
            gc_interval: 16,
            pending_order: PendingOrder::AscendingOffset,
            schedule_policy: SchedulePolicy::RoundRobin,
            delivery_order: DeliveryOrder::Fifo,
        }
    }
}

impl EngineOptions {
    /// Parses options from TOML; absent keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let options: Self =
            toml::from_str(text).map_err(|err| EngineError::Config(err.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Loads options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            EngineError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Rejects settings under which the worker cannot make progress.
    pub fn validate(&self) -> Result<()> {
        if self.io_depth == 0 {
            return Err(EngineError::Config("io_depth must be at least 1".into()));
        }
        if self.pull_batch == 0 {
            return Err(EngineError::Config("pull_batch must be at least 1".into()));
        }
        if self.max_active_vertices == 0 {
            return Err(EngineError::Config(
                "max_active_vertices must be at least 1".into(),
            ));
        }
        if self.gc_interval == 0 {
            return Err(EngineError::Config("gc_interval must be at least 1".into()));
        }
        Ok(())
    }

    /// Sets the channel depth.
    pub fn io_depth(mut self, depth: usize) -> Self {
        self.io_depth = depth;
        self
    }

    /// Sets the scheduler pull budget per round.
    pub fn pull_batch(mut self, batch: usize) -> Self {
        self.pull_batch = batch;
        self
    }

    /// Sets how many vertices run concurrently.
    pub fn max_active_vertices(mut self, max: usize) -> Self {
        self.max_active_vertices = max;
        self
    }

    /// Sets the garbage-collection interval in rounds.
    pub fn gc_interval(mut self, rounds: u32) -> Self {
        self.gc_interval = rounds;
        self
    }

    /// Sets the per-task pending queue order.
    pub fn pending_order(mut self, order: PendingOrder) -> Self {
        self.pending_order = order;
        self
    }

    /// Sets the scheduler policy.
    pub fn schedule_policy(mut self, policy: SchedulePolicy) -> Self {
        self.schedule_policy = policy;
        self
    }

    /// Sets the completion delivery order.
    pub fn delivery_order(mut self, order: DeliveryOrder) -> Self {
        self.delivery_order = order;
        self
    }
}
