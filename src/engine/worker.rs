use std::mem;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use serde::Serialize;
use tracing::{debug, info, trace};

use super::allocator::{AllocatorStats, TaskAllocator};
use super::channel::{IoChannel, IoCompletion};
use super::context::ComputeContext;
use super::index::{IndexReply, IndexResolver};
use super::metrics::{ComputeMetrics, NoopMetrics};
use super::options::EngineOptions;
use super::program::VertexProgram;
use super::scheduler::{IoScheduler, SchedulerStats};
use super::task::ComputeTask;
use crate::storage::GraphHeader;
use crate::types::{EngineError, Result, TaskId, VertexId};

/// Outcome of [`Worker::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Vertices admitted and completed.
    pub vertices: u64,
    /// Scheduling rounds executed.
    pub rounds: u64,
    pub scheduler: SchedulerStats,
    pub allocator: AllocatorStats,
}

/// Single-thread driver for a set of vertices.
///
/// The worker owns the I/O channel, the index resolver, the vertex program,
/// the task pool and the scheduler. Each round it admits vertices, delivers
/// index replies and I/O completions to their tasks, then lets the scheduler
/// pull queued fetches into the channel.
pub struct Worker<C, R, P> {
    graph: GraphHeader,
    options: EngineOptions,
    channel: C,
    index: R,
    program: P,
    metrics: Arc<dyn ComputeMetrics>,
    tasks: TaskAllocator,
    scheduler: IoScheduler,
    owner: ThreadId,
    active: usize,
    replies: Vec<IndexReply>,
    completions: Vec<IoCompletion>,
}

impl<C, R, P> Worker<C, R, P>
where
    C: IoChannel,
    R: IndexResolver,
    P: VertexProgram,
{
    pub fn new(
        graph: GraphHeader,
        channel: C,
        index: R,
        program: P,
        options: EngineOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            graph,
            scheduler: IoScheduler::new(options.schedule_policy),
            tasks: TaskAllocator::with_capacity(options.max_active_vertices),
            options,
            channel,
            index,
            program,
            metrics: Arc::new(NoopMetrics),
            owner: thread::current().id(),
            active: 0,
            replies: Vec::new(),
            completions: Vec::new(),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn ComputeMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn into_program(self) -> P {
        self.program
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn tasks(&self) -> &TaskAllocator {
        &self.tasks
    }

    pub fn scheduler(&self) -> &IoScheduler {
        &self.scheduler
    }

    /// Runs the program over `vertices` until every one of them completes.
    pub fn run<I>(&mut self, vertices: I) -> Result<RunSummary>
    where
        I: IntoIterator<Item = VertexId>,
    {
        self.owner = thread::current().id();
        let mut queue = vertices.into_iter().peekable();
        let mut summary = RunSummary::default();
        loop {
            let mut progressed = false;
            while self.active < self.options.max_active_vertices {
                let Some(vertex) = queue.next() else { break };
                self.start_vertex(vertex)?;
                summary.vertices += 1;
                progressed = true;
            }

            let mut replies = mem::take(&mut self.replies);
            self.index.poll(&mut replies);
            progressed |= !replies.is_empty();
            for reply in replies.drain(..) {
                self.dispatch_reply(reply)?;
            }
            self.replies = replies;

            let mut completions = mem::take(&mut self.completions);
            self.channel.poll(&mut completions);
            progressed |= !completions.is_empty();
            for completion in completions.drain(..) {
                self.dispatch_completion(completion)?;
            }
            self.completions = completions;

            let pulled = self.scheduler.pull_ready_requests(
                &mut self.tasks,
                &mut self.channel,
                self.options.pull_batch,
            )?;
            progressed |= pulled > 0;

            summary.rounds += 1;
            if summary.rounds % u64::from(self.options.gc_interval) == 0 {
                self.collect_garbage()?;
            }

            if self.active == 0 && queue.peek().is_none() {
                break;
            }
            if !progressed && self.channel.in_flight() == 0 && self.index.pending() == 0 {
                return Err(EngineError::invariant(format!(
                    "worker stalled with {} active vertices and {} registered tasks",
                    self.active,
                    self.scheduler.len()
                )));
            }
        }

        self.collect_garbage()?;
        if self.tasks.live() != 0 {
            return Err(EngineError::invariant(format!(
                "{} tasks still live after every vertex completed",
                self.tasks.live()
            )));
        }
        self.scheduler.close()?;
        summary.scheduler = self.scheduler.stats();
        summary.allocator = self.tasks.stats();
        info!(
            vertices = summary.vertices,
            rounds = summary.rounds,
            pulled = summary.scheduler.pulled,
            "worker run finished"
        );
        Ok(summary)
    }

    fn collect_garbage(&mut self) -> Result<()> {
        let reclaimed = self.scheduler.collect_garbage(&mut self.tasks)?;
        for _ in 0..reclaimed {
            self.metrics.task_reclaimed();
        }
        Ok(())
    }

    fn start_vertex(&mut self, vertex: VertexId) -> Result<()> {
        let id = self.tasks.alloc(
            vertex,
            self.channel.file_id(),
            self.graph.directed,
            self.options.pending_order,
        );
        self.active += 1;
        trace!(task = %id, %vertex, "vertex admitted");
        self.with_task(id, |task, cx| task.start(cx))?;
        self.settle(id)
    }

    fn dispatch_reply(&mut self, reply: IndexReply) -> Result<()> {
        let id = reply.task();
        self.with_task(id, |task, cx| match reply {
            IndexReply::Vertex { info, .. } | IndexReply::PartialVertex { info, .. } => {
                task.issue_fetch(cx, info);
                Ok(())
            }
            IndexReply::DirectedVertex {
                in_info, out_info, ..
            } => task.issue_paired_fetch(cx, in_info, out_info),
            IndexReply::NumEdges { id, size, .. } => task.on_edge_count_arrival(cx, id, size),
            IndexReply::NumDirectedEdges {
                id,
                in_size,
                out_size,
                ..
            } => task.on_directed_edge_count_arrival(cx, id, in_size, out_size),
            IndexReply::Missing { id, kind, .. } => task.on_lookup_failed(cx, id, kind),
        })?;
        self.settle(id)
    }

    fn dispatch_completion(&mut self, completion: IoCompletion) -> Result<()> {
        if completion.request.issuer != self.owner {
            return Err(EngineError::invariant(format!(
                "completion for {} issued on {:?}, delivered on {:?}",
                completion.request.task, completion.request.issuer, self.owner
            )));
        }
        let id = completion.request.task;
        self.with_task(id, |task, cx| match completion.view() {
            Some(view) => task.on_buffer_arrival(cx, &completion.request, view),
            None => task.on_request_failed(cx, &completion.request),
        })?;
        self.tasks.task_mut(id)?.release_io_share()?;
        self.settle(id)
    }

    /// Runs `f` against a task with a context borrowed from the worker.
    fn with_task<T, F>(&mut self, id: TaskId, f: F) -> Result<T>
    where
        F: FnOnce(&mut ComputeTask, &mut ComputeContext<'_>) -> Result<T>,
    {
        let Self {
            graph,
            channel,
            index,
            program,
            metrics,
            tasks,
            ..
        } = self;
        let task = tasks.task_mut(id)?;
        let mut cx = ComputeContext::new(graph, channel, index, program, &**metrics);
        f(task, &mut cx)
    }

    /// Post-callback bookkeeping: hands leftover fetches to the scheduler,
    /// retires a completed vertex and frees a task with no shares left.
    fn settle(&mut self, id: TaskId) -> Result<()> {
        let task = self.tasks.task_mut(id)?;
        if task.has_pending() && !task.in_queue() {
            self.scheduler.register_if_absent(&mut self.tasks, id)?;
        }
        let task = self.tasks.task_mut(id)?;
        if task.is_complete() && !task.owner_released() {
            let remaining = task.release_owner()?;
            self.active -= 1;
            debug!(task = %id, vertex = %task.vertex(), remaining, "vertex retired");
        }
        let task = self.tasks.task_mut(id)?;
        if task.ref_count() == 0 {
            self.tasks.free(id)?;
            self.metrics.task_reclaimed();
        }
        Ok(())
    }
}
