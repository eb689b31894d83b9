use graphstream::engine::{
    ComputeContext, DirectedRequest, IndexReply, IndexResolver, IoChannel, IoCompletion,
    IoRequest, IoScheduler, NoopMetrics, PendingOrder, RequestSink, SchedulePolicy, TaskAllocator,
    VertexProgram, VertexView,
};
use graphstream::storage::{GraphHeader, VertexInfo, HEADER_LEN};
use graphstream::types::{EngineError, FileId, TaskId};
use graphstream::VertexId;

/// Channel with a fixed number of free slots that records what it accepts.
struct SlotChannel {
    free: usize,
    accepted: Vec<IoRequest>,
}

impl SlotChannel {
    fn new(free: usize) -> Self {
        Self {
            free,
            accepted: Vec::new(),
        }
    }

    fn offsets(&self) -> Vec<u64> {
        self.accepted.iter().map(|r| r.desc.offset()).collect()
    }
}

impl IoChannel for SlotChannel {
    fn file_id(&self) -> FileId {
        FileId(0)
    }

    fn submit(&mut self, request: IoRequest) -> Result<(), IoRequest> {
        if self.free == 0 {
            return Err(request);
        }
        self.free -= 1;
        self.accepted.push(request);
        Ok(())
    }

    fn available(&self) -> usize {
        self.free
    }

    fn in_flight(&self) -> usize {
        self.accepted.len()
    }

    fn poll(&mut self, _out: &mut Vec<IoCompletion>) -> usize {
        0
    }
}

struct NoIndex;

impl IndexResolver for NoIndex {
    fn request_vertices(&mut self, _task: TaskId, _ids: &[VertexId]) {}
    fn request_partial_vertices(&mut self, _task: TaskId, _reqs: &[DirectedRequest]) {}
    fn request_num_edges(&mut self, _task: TaskId, _ids: &[VertexId]) {}
    fn poll(&mut self, _out: &mut Vec<IndexReply>) -> usize {
        0
    }
    fn pending(&self) -> usize {
        0
    }
}

struct Idle;

impl VertexProgram for Idle {
    fn run(&mut self, _vertex: VertexId, _view: &VertexView<'_>, _requests: &mut RequestSink) {}
}

fn graph() -> GraphHeader {
    GraphHeader {
        directed: false,
        num_vertices: 16,
        num_edges: 0,
        in_part_end: HEADER_LEN as u64,
        data_end: HEADER_LEN as u64 + 16 * 8,
    }
}

fn info(id: u32, offset: u64) -> VertexInfo {
    VertexInfo {
        id: VertexId(id),
        offset,
        size: 8,
    }
}

/// Allocates a task for `vertex` and parks one fetch per offset in its local
/// queue by offering them to a full channel.
fn task_with_queued(tasks: &mut TaskAllocator, vertex: u32, offsets: &[u64]) -> TaskId {
    let id = tasks.alloc(VertexId(vertex), FileId(0), false, PendingOrder::Fifo);
    let header = graph();
    let mut full = SlotChannel::new(0);
    let mut index = NoIndex;
    let mut program = Idle;
    let metrics = NoopMetrics;
    let mut cx = ComputeContext::new(&header, &mut full, &mut index, &mut program, &metrics);
    let task = tasks.get_mut(id).expect("fresh task");
    for (i, &offset) in offsets.iter().enumerate() {
        task.issue_fetch(&mut cx, info(vertex * 100 + i as u32, offset));
    }
    assert_eq!(task.num_queued(), offsets.len());
    id
}

#[test]
fn scheduler_cannot_close_until_last_member_is_unregistered() {
    let mut tasks = TaskAllocator::new();
    let mut sched = IoScheduler::new(SchedulePolicy::RoundRobin);
    let id = tasks.alloc(VertexId(3), FileId(0), false, PendingOrder::Fifo);
    assert!(sched.register_if_absent(&mut tasks, id).unwrap());

    let err = sched.close().unwrap_err();
    assert!(matches!(err, EngineError::InvariantViolation(_)));

    let err = sched.unregister(&mut tasks, id).unwrap_err();
    assert!(matches!(err, EngineError::InvariantViolation(_)));

    tasks.get_mut(id).unwrap().release_owner().unwrap();
    sched.unregister(&mut tasks, id).unwrap();
    assert!(tasks.get(id).is_none());
    assert_eq!(tasks.live(), 0);
    sched.close().unwrap();

    assert!(matches!(
        sched.unregister(&mut tasks, id),
        Err(EngineError::NotMember(_))
    ));
}

#[test]
fn registration_is_idempotent_and_holds_one_share() {
    let mut tasks = TaskAllocator::new();
    let mut sched = IoScheduler::new(SchedulePolicy::FifoDrain);
    let id = task_with_queued(&mut tasks, 1, &[512]);

    assert!(sched.register_if_absent(&mut tasks, id).unwrap());
    assert!(!sched.register_if_absent(&mut tasks, id).unwrap());
    assert!(!sched.register_if_absent(&mut tasks, id).unwrap());
    assert_eq!(sched.len(), 1);
    assert_eq!(tasks.get(id).unwrap().ref_count(), 2);
    assert_eq!(sched.stats().registered, 1);
}

#[test]
fn pulled_requests_keep_their_task_alive_until_completion() {
    let mut tasks = TaskAllocator::new();
    let mut sched = IoScheduler::new(SchedulePolicy::RoundRobin);
    let id = task_with_queued(&mut tasks, 2, &[256, 128]);
    sched.register_if_absent(&mut tasks, id).unwrap();
    tasks.get_mut(id).unwrap().release_owner().unwrap();

    // membership plus queued work: not collectable yet
    assert_eq!(sched.collect_garbage(&mut tasks).unwrap(), 0);

    let mut channel = SlotChannel::new(8);
    assert_eq!(sched.pull_ready_requests(&mut tasks, &mut channel, 8).unwrap(), 2);
    assert_eq!(channel.offsets(), vec![256, 128]);
    let task = tasks.get(id).unwrap();
    assert!(!task.has_pending());
    assert_eq!(task.ref_count(), 3);
    assert_eq!(task.counters().issued, 2);

    assert_eq!(sched.collect_garbage(&mut tasks).unwrap(), 0);
    tasks.get_mut(id).unwrap().release_io_share().unwrap();
    assert_eq!(sched.collect_garbage(&mut tasks).unwrap(), 0);
    tasks.get_mut(id).unwrap().release_io_share().unwrap();
    assert_eq!(sched.collect_garbage(&mut tasks).unwrap(), 1);

    assert!(sched.is_empty());
    assert!(tasks.get(id).is_none());
    assert_eq!(tasks.stats().reclaimed, 1);
    sched.close().unwrap();
}

#[test]
fn refused_pull_is_requeued_without_leaking_a_share() {
    let mut tasks = TaskAllocator::new();
    let mut sched = IoScheduler::new(SchedulePolicy::FifoDrain);
    let id = task_with_queued(&mut tasks, 4, &[64, 32, 96]);
    sched.register_if_absent(&mut tasks, id).unwrap();

    let mut channel = SlotChannel::new(1);
    assert_eq!(sched.pull_ready_requests(&mut tasks, &mut channel, 3).unwrap(), 1);
    let task = tasks.get(id).unwrap();
    assert_eq!(task.num_queued(), 2);
    assert_eq!(task.ref_count(), 3);
    assert_eq!(task.counters().issued, 1);

    // nothing is pulled into a channel with no room
    assert_eq!(sched.pull_ready_requests(&mut tasks, &mut channel, 3).unwrap(), 0);
    assert_eq!(tasks.get(id).unwrap().num_queued(), 2);
}

#[test]
fn offset_order_applies_within_a_task() {
    let mut tasks = TaskAllocator::new();
    let mut sched = IoScheduler::new(SchedulePolicy::FifoDrain);
    let id = tasks.alloc(VertexId(9), FileId(0), false, PendingOrder::AscendingOffset);
    {
        let header = graph();
        let mut full = SlotChannel::new(0);
        let mut index = NoIndex;
        let mut program = Idle;
        let metrics = NoopMetrics;
        let mut cx = ComputeContext::new(&header, &mut full, &mut index, &mut program, &metrics);
        let task = tasks.get_mut(id).unwrap();
        for (n, offset) in [(1, 900), (2, 100), (3, 500)] {
            task.issue_fetch(&mut cx, info(n, offset));
        }
    }
    let other = task_with_queued(&mut tasks, 5, &[50]);
    sched.register_if_absent(&mut tasks, id).unwrap();
    sched.register_if_absent(&mut tasks, other).unwrap();

    let mut channel = SlotChannel::new(16);
    assert_eq!(sched.pull_ready_requests(&mut tasks, &mut channel, 16).unwrap(), 4);
    assert_eq!(channel.offsets(), vec![100, 500, 900, 50]);
}
