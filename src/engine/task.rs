use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use tracing::{debug, warn};

use super::channel::IoRequest;
use super::context::ComputeContext;
use super::directed::CorrelationMap;
use super::index::LookupKind;
use super::options::PendingOrder;
use super::program::{DirectedRequest, EdgeType, RequestSink, VertexProgram};
use super::view::{PageVertex, VertexHeader, VertexView};
use crate::primitives::bytes::PageView;
use crate::primitives::io::{DataLoc, RequestDescriptor};
use crate::storage::{layout, VertexInfo};
use crate::types::{EngineError, FileId, Result, TaskId, VertexId};

/// A fetch waiting in a task's local queue.
#[derive(Clone, Copy, Debug)]
pub(crate) struct QueuedFetch {
    rank: u64,
    seq: u64,
    info: VertexInfo,
    paired: bool,
}

impl PartialEq for QueuedFetch {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedFetch {}

impl PartialOrd for QueuedFetch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedFetch {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.rank, self.seq).cmp(&(other.rank, other.seq))
    }
}

/// Per-task queue of fetches the task could not hand to the channel itself.
#[derive(Debug)]
pub(crate) struct PendingQueue {
    heap: BinaryHeap<Reverse<QueuedFetch>>,
    order: PendingOrder,
    seq: u64,
}

impl PendingQueue {
    pub(crate) fn new(order: PendingOrder) -> Self {
        Self {
            heap: BinaryHeap::new(),
            order,
            seq: 0,
        }
    }

    pub(crate) fn push(&mut self, info: VertexInfo, paired: bool) {
        let seq = self.seq;
        self.seq += 1;
        let rank = match self.order {
            PendingOrder::AscendingOffset => info.offset,
            PendingOrder::Fifo => seq,
        };
        self.heap.push(Reverse(QueuedFetch {
            rank,
            seq,
            info,
            paired,
        }));
    }

    pub(crate) fn pop(&mut self) -> Option<(VertexInfo, bool)> {
        self.heap.pop().map(|Reverse(f)| (f.info, f.paired))
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Request accounting of one task.
///
/// `requested` counts vertex fetches asked of the index (a directed pair is
/// one), `issued` counts descriptors handed to the channel, `completed`
/// counts vertex fetches finished. Edge-count lookups have their own stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskCounters {
    pub requested: u64,
    pub issued: u64,
    pub completed: u64,
    pub edge_requested: u64,
    pub edge_completed: u64,
}

impl TaskCounters {
    /// Requests of either stream that have not completed.
    pub fn num_pending(&self) -> u64 {
        (self.requested - self.completed) + (self.edge_requested - self.edge_completed)
    }
}

#[derive(Debug, Default)]
struct TaskFlags {
    in_queue: bool,
    running: bool,
    completion_signalled: bool,
    owner_released: bool,
}

#[derive(Debug)]
pub(crate) enum TaskKind {
    Undirected,
    Directed(CorrelationMap),
}

/// Per-vertex compute state.
///
/// Reference shares: one held by the worker that admitted the vertex until the
/// vertex completes, one per request in flight on the channel, and one while
/// the task is a member of the scheduler. The task is returned to its
/// allocator only when no share is left.
#[derive(Debug)]
pub struct ComputeTask {
    id: TaskId,
    vertex: VertexId,
    file: FileId,
    pub(crate) kind: TaskKind,
    pending: PendingQueue,
    pub(crate) counters: TaskCounters,
    refs: u32,
    flags: TaskFlags,
}

impl ComputeTask {
    pub(crate) fn new(
        id: TaskId,
        vertex: VertexId,
        file: FileId,
        directed: bool,
        order: PendingOrder,
    ) -> Self {
        Self {
            id,
            vertex,
            file,
            kind: if directed {
                TaskKind::Directed(CorrelationMap::default())
            } else {
                TaskKind::Undirected
            },
            pending: PendingQueue::new(order),
            counters: TaskCounters::default(),
            refs: 1,
            flags: TaskFlags::default(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn vertex(&self) -> VertexId {
        self.vertex
    }

    pub fn is_directed(&self) -> bool {
        matches!(self.kind, TaskKind::Directed(_))
    }

    pub fn counters(&self) -> TaskCounters {
        self.counters
    }

    pub fn ref_count(&self) -> u32 {
        self.refs
    }

    /// Whether the task is a member of a scheduler.
    pub fn in_queue(&self) -> bool {
        self.flags.in_queue
    }

    /// Whether fetches are waiting in the local queue.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn num_queued(&self) -> usize {
        self.pending.len()
    }

    /// Whether the task has signalled vertex completion.
    pub fn is_complete(&self) -> bool {
        self.flags.completion_signalled
    }

    pub(crate) fn owner_released(&self) -> bool {
        self.flags.owner_released
    }

    pub(crate) fn set_in_queue(&mut self, in_queue: bool) {
        self.flags.in_queue = in_queue;
    }

    pub(crate) fn inc_ref(&mut self) {
        self.refs += 1;
    }

    pub(crate) fn dec_ref(&mut self) -> Result<u32> {
        self.refs = self.refs.checked_sub(1).ok_or_else(|| {
            EngineError::invariant(format!("{} released more shares than it holds", self.id))
        })?;
        Ok(self.refs)
    }

    /// Drops the share carried by a request whose completion was delivered.
    pub fn release_io_share(&mut self) -> Result<u32> {
        self.dec_ref()
    }

    /// Drops the share held by the worker that admitted the vertex.
    pub fn release_owner(&mut self) -> Result<u32> {
        if self.flags.owner_released {
            return Err(EngineError::invariant(format!(
                "{} owner share released twice",
                self.id
            )));
        }
        self.flags.owner_released = true;
        self.dec_ref()
    }

    /// Runs the program's entry step for the vertex.
    pub fn start(&mut self, cx: &mut ComputeContext<'_>) -> Result<()> {
        self.invoke(cx, |program, vertex, sink| program.init(vertex, sink))?;
        self.maybe_signal_complete(cx)
    }

    /// Asks the index for the adjacency of each id.
    pub fn request_neighbors(&mut self, cx: &mut ComputeContext<'_>, ids: &[VertexId]) {
        if ids.is_empty() {
            return;
        }
        if self.is_directed() {
            let reqs: Vec<_> = ids
                .iter()
                .map(|&id| DirectedRequest::new(id, EdgeType::Both))
                .collect();
            self.request_partial_vertices(cx, &reqs);
            return;
        }
        self.counters.requested += ids.len() as u64;
        cx.index.request_vertices(self.id, ids);
    }

    /// Asks the index for selected regions of directed vertices.
    pub fn request_partial_vertices(
        &mut self,
        cx: &mut ComputeContext<'_>,
        reqs: &[DirectedRequest],
    ) {
        if reqs.is_empty() {
            return;
        }
        self.counters.requested += reqs.len() as u64;
        cx.index.request_partial_vertices(self.id, reqs);
    }

    /// Asks the index for the edge counts of each id.
    pub fn request_edge_counts(&mut self, cx: &mut ComputeContext<'_>, ids: &[VertexId]) {
        if ids.is_empty() {
            return;
        }
        self.counters.edge_requested += ids.len() as u64;
        cx.index.request_num_edges(self.id, ids);
    }

    /// Pops the next queued fetch and turns it into a request.
    ///
    /// The returned request carries one of the task's shares until its
    /// completion is delivered.
    pub fn next_pending_request(&mut self) -> Result<IoRequest> {
        let (info, paired) = self
            .pending
            .pop()
            .ok_or(EngineError::EmptyQueue(self.vertex))?;
        self.counters.issued += 1;
        self.inc_ref();
        Ok(self.make_request(info, paired))
    }

    /// Puts back a request the channel refused after `next_pending_request`.
    pub(crate) fn requeue(&mut self, request: IoRequest) -> Result<()> {
        let info = VertexInfo {
            id: request.vertex,
            offset: request.desc.offset(),
            size: request.desc.size(),
        };
        self.queue_fetch(info, request.paired);
        self.counters.issued -= 1;
        self.dec_ref().map(|_| ())
    }

    /// Submits a fetch, or keeps it locally while the scheduler owns the task's I/O.
    pub fn issue_fetch(&mut self, cx: &mut ComputeContext<'_>, info: VertexInfo) {
        self.dispatch_fetch(cx, info, false);
    }

    pub(crate) fn dispatch_fetch(
        &mut self,
        cx: &mut ComputeContext<'_>,
        info: VertexInfo,
        paired: bool,
    ) {
        if self.flags.in_queue {
            self.queue_fetch(info, paired);
            cx.metrics.request_issued(true);
            return;
        }
        match cx.channel.submit(self.make_request(info, paired)) {
            Ok(()) => {
                self.counters.issued += 1;
                self.inc_ref();
                cx.metrics.request_issued(false);
            }
            Err(_) => {
                self.queue_fetch(info, paired);
                cx.metrics.request_issued(true);
            }
        }
    }

    pub(crate) fn queue_fetch(&mut self, info: VertexInfo, paired: bool) {
        self.pending.push(info, paired);
    }

    fn make_request(&self, info: VertexInfo, paired: bool) -> IoRequest {
        IoRequest::new(
            self.id,
            info.id,
            RequestDescriptor::read(DataLoc::new(self.file, info.offset), info.size),
            paired,
        )
    }

    /// Delivers fetched bytes for `request`. The buffer is only valid for this call.
    pub fn on_buffer_arrival(
        &mut self,
        cx: &mut ComputeContext<'_>,
        request: &IoRequest,
        buffer: PageView<'_>,
    ) -> Result<()> {
        if self.is_directed() {
            return self.on_directed_arrival(cx, request, buffer);
        }
        let vertex = match PageVertex::parse(buffer) {
            Ok(v) if v.id() == request.vertex => v,
            Ok(v) => {
                warn!(
                    task = %self.id,
                    expected = %request.vertex,
                    found = %v.id(),
                    "fetched record belongs to another vertex"
                );
                return self.fail_one_request(cx);
            }
            Err(err) => {
                warn!(task = %self.id, vertex = %request.vertex, %err, "undecodable vertex record");
                return self.fail_one_request(cx);
            }
        };
        let view = VertexView::Undirected(vertex);
        self.invoke(cx, |program, owner, sink| program.run(owner, &view, sink))?;
        self.complete_one_request(cx)
    }

    /// Records a failed read: the program does not run for it.
    pub fn on_request_failed(
        &mut self,
        cx: &mut ComputeContext<'_>,
        request: &IoRequest,
    ) -> Result<()> {
        if self.is_directed() && request.paired {
            return self.on_directed_failure(cx, request.vertex);
        }
        self.fail_one_request(cx)
    }

    /// Records a lookup the index could not answer.
    pub fn on_lookup_failed(
        &mut self,
        cx: &mut ComputeContext<'_>,
        id: VertexId,
        kind: LookupKind,
    ) -> Result<()> {
        warn!(task = %self.id, %id, ?kind, "index lookup failed");
        cx.metrics.request_failed();
        match kind {
            LookupKind::Vertex => self.complete_one_request(cx),
            LookupKind::NumEdges => self.complete_edge_request(cx),
        }
    }

    /// Runs the header-only entry point for an undirected edge-count reply.
    pub fn on_edge_count_arrival(
        &mut self,
        cx: &mut ComputeContext<'_>,
        id: VertexId,
        size: u32,
    ) -> Result<()> {
        self.check_no_edge_data(cx)?;
        let header = VertexHeader::Undirected {
            id,
            num_edges: layout::num_edges(size),
        };
        self.invoke(cx, |program, owner, sink| program.run_on_num_edges(owner, &header, sink))?;
        self.complete_edge_request(cx)
    }

    /// Runs the header-only entry point for a directed edge-count reply.
    pub fn on_directed_edge_count_arrival(
        &mut self,
        cx: &mut ComputeContext<'_>,
        id: VertexId,
        in_size: u32,
        out_size: u32,
    ) -> Result<()> {
        self.check_no_edge_data(cx)?;
        let header = VertexHeader::Directed {
            id,
            num_in_edges: layout::num_edges(in_size),
            num_out_edges: layout::num_edges(out_size),
        };
        self.invoke(cx, |program, owner, sink| program.run_on_num_edges(owner, &header, sink))?;
        self.complete_edge_request(cx)
    }

    fn check_no_edge_data(&self, cx: &ComputeContext<'_>) -> Result<()> {
        if cx.graph.has_edge_data() {
            return Err(EngineError::invariant(
                "edge counts cannot be derived from sizes of records with edge data",
            ));
        }
        Ok(())
    }

    /// Brackets one program invocation and applies the requests it made.
    pub(crate) fn invoke<F>(&mut self, cx: &mut ComputeContext<'_>, f: F) -> Result<()>
    where
        F: FnOnce(&mut dyn VertexProgram, VertexId, &mut RequestSink),
    {
        if self.flags.running {
            return Err(EngineError::invariant(format!(
                "{} entered its vertex program while already running",
                self.id
            )));
        }
        self.flags.running = true;
        cx.metrics.vertex_started(self.vertex);
        let mut sink = RequestSink::default();
        f(&mut *cx.program, self.vertex, &mut sink);
        cx.metrics.vertex_finished(self.vertex);
        self.flags.running = false;
        self.apply_requests(cx, sink);
        Ok(())
    }

    fn apply_requests(&mut self, cx: &mut ComputeContext<'_>, sink: RequestSink) {
        self.request_neighbors(cx, &sink.vertices);
        self.request_partial_vertices(cx, &sink.partial);
        self.request_edge_counts(cx, &sink.num_edges);
    }

    pub(crate) fn fail_one_request(&mut self, cx: &mut ComputeContext<'_>) -> Result<()> {
        cx.metrics.request_failed();
        self.complete_one_request(cx)
    }

    /// Counts one finished vertex fetch.
    pub fn complete_one_request(&mut self, cx: &mut ComputeContext<'_>) -> Result<()> {
        self.counters.completed += 1;
        if self.counters.completed > self.counters.requested {
            return Err(EngineError::invariant(format!(
                "{} completed {} requests but requested {}",
                self.id, self.counters.completed, self.counters.requested
            )));
        }
        self.maybe_signal_complete(cx)
    }

    fn complete_edge_request(&mut self, cx: &mut ComputeContext<'_>) -> Result<()> {
        self.counters.edge_completed += 1;
        if self.counters.edge_completed > self.counters.edge_requested {
            return Err(EngineError::invariant(format!(
                "{} completed {} edge-count requests but requested {}",
                self.id, self.counters.edge_completed, self.counters.edge_requested
            )));
        }
        self.maybe_signal_complete(cx)
    }

    fn maybe_signal_complete(&mut self, cx: &mut ComputeContext<'_>) -> Result<()> {
        if self.counters.num_pending() != 0 || !self.pending.is_empty() {
            return Ok(());
        }
        if self.flags.completion_signalled {
            return Err(EngineError::invariant(format!(
                "{} signalled completion of {} twice",
                self.id, self.vertex
            )));
        }
        self.flags.completion_signalled = true;
        debug!(
            task = %self.id,
            vertex = %self.vertex,
            counters = ?self.counters,
            "vertex complete"
        );
        cx.metrics.vertex_completed(self.vertex);
        Ok(())
    }
}
