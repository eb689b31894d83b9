use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::types::VertexId;

/// Lifecycle notifications and counters emitted by compute tasks.
///
/// `vertex_started`/`vertex_finished` bracket every vertex-program invocation;
/// `vertex_completed` fires once per task, when its last request completes.
pub trait ComputeMetrics: Send + Sync {
    /// A vertex-program invocation is about to run.
    fn vertex_started(&self, vertex: VertexId);

    /// The invocation bracketed by the matching `vertex_started` returned.
    fn vertex_finished(&self, vertex: VertexId);

    /// Every request of the vertex's task has completed.
    fn vertex_completed(&self, vertex: VertexId);

    /// A request was handed to the I/O channel (`queued == false`) or kept in
    /// the task's local queue for the scheduler (`queued == true`).
    fn request_issued(&self, queued: bool);

    /// A request ended in failure and its vertex will not see the data.
    fn request_failed(&self);

    /// The first half of a directed pair was copied out of its transient buffer.
    fn half_buffered(&self);

    /// A task's memory went back to the allocator.
    fn task_reclaimed(&self);
}

/// A no-op implementation of [`ComputeMetrics`].
#[derive(Default)]
pub struct NoopMetrics;

impl ComputeMetrics for NoopMetrics {
    fn vertex_started(&self, _vertex: VertexId) {}
    fn vertex_finished(&self, _vertex: VertexId) {}
    fn vertex_completed(&self, _vertex: VertexId) {}
    fn request_issued(&self, _queued: bool) {}
    fn request_failed(&self) {}
    fn half_buffered(&self) {}
    fn task_reclaimed(&self) {}
}

/// Atomic counter implementation of [`ComputeMetrics`].
#[derive(Default)]
pub struct CounterMetrics {
    /// Program invocations started.
    pub invocations_started: AtomicU64,
    /// Program invocations finished.
    pub invocations_finished: AtomicU64,
    /// Vertices whose task signalled completion.
    pub vertices_completed: AtomicU64,
    /// Requests submitted straight to the channel.
    pub requests_submitted: AtomicU64,
    /// Requests parked in a task's local queue.
    pub requests_queued: AtomicU64,
    /// Requests that failed.
    pub requests_failed: AtomicU64,
    /// Directed halves copied into owned buffers.
    pub halves_buffered: AtomicU64,
    /// Tasks returned to the allocator.
    pub tasks_reclaimed: AtomicU64,
}

/// Point-in-time copy of [`CounterMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub invocations_started: u64,
    pub invocations_finished: u64,
    pub vertices_completed: u64,
    pub requests_submitted: u64,
    pub requests_queued: u64,
    pub requests_failed: u64,
    pub halves_buffered: u64,
    pub tasks_reclaimed: u64,
}

impl CounterMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            invocations_started: self.invocations_started.load(Ordering::Relaxed),
            invocations_finished: self.invocations_finished.load(Ordering::Relaxed),
            vertices_completed: self.vertices_completed.load(Ordering::Relaxed),
            requests_submitted: self.requests_submitted.load(Ordering::Relaxed),
            requests_queued: self.requests_queued.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            halves_buffered: self.halves_buffered.load(Ordering::Relaxed),
            tasks_reclaimed: self.tasks_reclaimed.load(Ordering::Relaxed),
        }
    }
}

impl ComputeMetrics for CounterMetrics {
    fn vertex_started(&self, _vertex: VertexId) {
        self.invocations_started.fetch_add(1, Ordering::Relaxed);
    }

    fn vertex_finished(&self, _vertex: VertexId) {
        self.invocations_finished.fetch_add(1, Ordering::Relaxed);
    }

    fn vertex_completed(&self, _vertex: VertexId) {
        self.vertices_completed.fetch_add(1, Ordering::Relaxed);
    }

    fn request_issued(&self, queued: bool) {
        if queued {
            self.requests_queued.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_submitted.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn request_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    fn half_buffered(&self) {
        self.halves_buffered.fetch_add(1, Ordering::Relaxed);
    }

    fn task_reclaimed(&self) {
        self.tasks_reclaimed.fetch_add(1, Ordering::Relaxed);
    }
}
