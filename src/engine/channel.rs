use std::collections::VecDeque;
use std::thread::{self, ThreadId};

use tracing::{trace, warn};

use super::options::DeliveryOrder;
use crate::primitives::bytes::PageView;
use crate::primitives::io::{FileIo, RequestDescriptor};
use crate::types::{EngineError, FileId, Result, TaskId, VertexId};

/// A descriptor tagged with the task and vertex it was issued for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IoRequest {
    pub task: TaskId,
    pub vertex: VertexId,
    pub desc: RequestDescriptor,
    /// One half of a directed pair that must be joined with its sibling.
    pub paired: bool,
    /// Thread that issued the request; its completion must be delivered there.
    pub issuer: ThreadId,
}

impl IoRequest {
    /// Builds a request issued from the calling thread.
    pub fn new(task: TaskId, vertex: VertexId, desc: RequestDescriptor, paired: bool) -> Self {
        Self {
            task,
            vertex,
            desc,
            paired,
            issuer: thread::current().id(),
        }
    }
}

/// Outcome of one request, delivered back on the thread that issued it.
#[derive(Debug)]
pub struct IoCompletion {
    pub request: IoRequest,
    pub result: Result<Vec<u8>>,
}

impl IoCompletion {
    /// Borrowed view of the fetched bytes, if the read succeeded.
    pub fn view(&self) -> Option<PageView<'_>> {
        self.result
            .as_ref()
            .ok()
            .map(|bytes| PageView::new(self.request.desc.offset(), bytes))
    }
}

/// Submission and completion interface of one worker's I/O path.
///
/// A channel is owned by a single worker thread and delivers completions only
/// through [`IoChannel::poll`] on that thread.
pub trait IoChannel {
    /// Storage object this channel reads from.
    fn file_id(&self) -> FileId;

    /// Accepts a request, or hands it back when the channel is full.
    fn submit(&mut self, request: IoRequest) -> std::result::Result<(), IoRequest>;

    /// Number of further submissions the channel will accept right now.
    fn available(&self) -> usize;

    /// Submitted requests whose completion has not been delivered yet.
    fn in_flight(&self) -> usize;

    /// Appends finished requests to `out` and returns how many were added.
    fn poll(&mut self, out: &mut Vec<IoCompletion>) -> usize;
}

/// Channel that serves requests from a [`FileIo`] when polled.
pub struct FileChannel<F: FileIo> {
    io: F,
    file: FileId,
    depth: usize,
    order: DeliveryOrder,
    queued: VecDeque<IoRequest>,
}

impl<F: FileIo> FileChannel<F> {
    pub fn new(io: F, file: FileId, depth: usize, order: DeliveryOrder) -> Self {
        Self {
            io,
            file,
            depth: depth.max(1),
            order,
            queued: VecDeque::with_capacity(depth),
        }
    }

    pub fn io(&self) -> &F {
        &self.io
    }

    fn read(&self, desc: &RequestDescriptor) -> Result<Vec<u8>> {
        if desc.loc().file != self.file {
            return Err(EngineError::InvalidArgument(format!(
                "request for {} submitted to channel of {}",
                desc.loc().file,
                self.file
            )));
        }
        let mut buf = vec![0u8; desc.size() as usize];
        self.io.read_at(desc.offset(), &mut buf)?;
        Ok(buf)
    }
}

impl<F: FileIo> IoChannel for FileChannel<F> {
    fn file_id(&self) -> FileId {
        self.file
    }

    fn submit(&mut self, request: IoRequest) -> std::result::Result<(), IoRequest> {
        if self.queued.len() >= self.depth {
            return Err(request);
        }
        trace!(task = %request.task, desc = %request.desc, "channel.submit");
        self.queued.push_back(request);
        Ok(())
    }

    fn available(&self) -> usize {
        self.depth - self.queued.len()
    }

    fn in_flight(&self) -> usize {
        self.queued.len()
    }

    fn poll(&mut self, out: &mut Vec<IoCompletion>) -> usize {
        let start = out.len();
        while let Some(request) = self.queued.pop_front() {
            let result = self.read(&request.desc);
            if let Err(err) = &result {
                warn!(task = %request.task, desc = %request.desc, %err, "channel read failed");
            }
            out.push(IoCompletion { request, result });
        }
        if self.order == DeliveryOrder::Reverse {
            out[start..].reverse();
        }
        out.len() - start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::io::{DataLoc, MemFileIo};

    fn request(slot: u32, offset: u64, size: u32) -> IoRequest {
        IoRequest::new(
            TaskId {
                slot,
                generation: 0,
            },
            VertexId(slot),
            RequestDescriptor::read(DataLoc::new(FileId(1), offset), size),
            false,
        )
    }

    #[test]
    fn refuses_submissions_beyond_depth() {
        let io = MemFileIo::from_bytes(vec![0u8; 64]);
        let mut channel = FileChannel::new(io, FileId(1), 2, DeliveryOrder::Fifo);
        assert!(channel.submit(request(0, 0, 4)).is_ok());
        assert!(channel.submit(request(1, 4, 4)).is_ok());
        let refused = channel.submit(request(2, 8, 4)).unwrap_err();
        assert_eq!(refused.vertex, VertexId(2));
        assert_eq!(channel.available(), 0);

        let mut out = Vec::new();
        assert_eq!(channel.poll(&mut out), 2);
        assert_eq!(channel.in_flight(), 0);
        assert_eq!(channel.available(), 2);
    }

    #[test]
    fn reverse_delivery_and_short_reads() {
        let io = MemFileIo::from_bytes((0u8..16).collect());
        let mut channel = FileChannel::new(io, FileId(1), 4, DeliveryOrder::Reverse);
        channel.submit(request(0, 0, 4)).unwrap();
        channel.submit(request(1, 4, 4)).unwrap();
        channel.submit(request(2, 12, 8)).unwrap();

        let mut out = Vec::new();
        channel.poll(&mut out);
        let order: Vec<_> = out.iter().map(|c| c.request.vertex.0).collect();
        assert_eq!(order, vec![2, 1, 0]);
        assert!(out[0].result.is_err());
        let view = out[1].view().unwrap();
        assert_eq!(view.offset(), 4);
        assert_eq!(view.as_slice(), &[4, 5, 6, 7]);
    }
}
