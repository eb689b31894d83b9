//! Vertex-centric compute over a streamed graph image.
//!
//! A [`ComputeTask`] follows one vertex from admission to completion: it asks
//! the [`IndexResolver`] where neighbor records live, issues fetches through
//! the worker's [`IoChannel`], runs the [`VertexProgram`] as data arrives and
//! signals completion once every request it made has finished. Fetches a task
//! cannot submit itself are queued locally and pulled by the [`IoScheduler`].
//! The [`Worker`] drives all of this on a single thread.

mod allocator;
mod channel;
mod context;
mod directed;
mod index;
mod metrics;
mod options;
mod program;
mod scheduler;
mod task;
mod view;
mod worker;


pub use allocator::{AllocatorStats, TaskAllocator};
pub use channel::{FileChannel, IoChannel, IoCompletion, IoRequest};
pub use context::ComputeContext;
pub use index::{IndexReply, IndexResolver, LookupKind, VertexIndexReader};
pub use metrics::{ComputeMetrics, CounterMetrics, MetricsSnapshot, NoopMetrics};
pub use options::{DeliveryOrder, EngineOptions, PendingOrder, SchedulePolicy};
pub use program::{DirectedRequest, EdgeType, RequestSink, VertexProgram};
pub use scheduler::{IoScheduler, SchedulerStats};
pub use task::{ComputeTask, TaskCounters};
pub use view::{EdgeList, PageDirectedVertex, PageVertex, VertexHeader, VertexView};
pub use worker::{RunSummary, Worker};
