use std::collections::VecDeque;
use std::sync::Arc;

use super::program::{DirectedRequest, EdgeType};
use crate::storage::{VertexIndex, VertexInfo};
use crate::types::{TaskId, VertexId};

/// What a failed lookup was for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LookupKind {
    Vertex,
    NumEdges,
}

/// Resolution of one lookup, delivered to the task that asked.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndexReply {
    /// Record of an undirected vertex.
    Vertex { task: TaskId, info: VertexInfo },
    /// Both records of a directed vertex.
    DirectedVertex {
        task: TaskId,
        in_info: VertexInfo,
        out_info: VertexInfo,
    },
    /// One record of a directed vertex.
    PartialVertex {
        task: TaskId,
        info: VertexInfo,
    },
    /// Record size of an undirected vertex.
    NumEdges { task: TaskId, id: VertexId, size: u32 },
    /// Record sizes of both halves of a directed vertex.
    NumDirectedEdges {
        task: TaskId,
        id: VertexId,
        in_size: u32,
        out_size: u32,
    },
    /// The id is not in the index.
    Missing {
        task: TaskId,
        id: VertexId,
        kind: LookupKind,
    },
}

impl IndexReply {
    pub fn task(&self) -> TaskId {
        match *self {
            IndexReply::Vertex { task, .. }
            | IndexReply::DirectedVertex { task, .. }
            | IndexReply::PartialVertex { task, .. }
            | IndexReply::NumEdges { task, .. }
            | IndexReply::NumDirectedEdges { task, .. }
            | IndexReply::Missing { task, .. } => task,
        }
    }
}

/// Turns vertex ids into record locations or sizes, asynchronously.
///
/// Lookups are queued by the `request_*` calls and answered by a later
/// [`IndexResolver::poll`] on the same thread.
pub trait IndexResolver {
    fn request_vertices(&mut self, task: TaskId, ids: &[VertexId]);
    fn request_partial_vertices(&mut self, task: TaskId, reqs: &[DirectedRequest]);
    fn request_num_edges(&mut self, task: TaskId, ids: &[VertexId]);
    /// Appends resolved lookups to `out` and returns how many were added.
    fn poll(&mut self, out: &mut Vec<IndexReply>) -> usize;
    /// Lookups queued but not yet answered.
    fn pending(&self) -> usize;
}

#[derive(Clone, Copy, Debug)]
enum Lookup {
    Vertex(TaskId, VertexId),
    Partial(TaskId, DirectedRequest),
    NumEdges(TaskId, VertexId),
}

/// [`IndexResolver`] backed by an in-memory [`VertexIndex`].
pub struct VertexIndexReader {
    index: Arc<VertexIndex>,
    queue: VecDeque<Lookup>,
}

impl VertexIndexReader {
    pub fn new(index: Arc<VertexIndex>) -> Self {
        Self {
            index,
            queue: VecDeque::new(),
        }
    }

    pub fn index(&self) -> &VertexIndex {
        &self.index
    }

    fn resolve(&self, lookup: Lookup) -> IndexReply {
        let missing = |task, id, kind| IndexReply::Missing { task, id, kind };
        match lookup {
            Lookup::Vertex(task, id) if self.index.is_directed() => {
                match (self.index.in_half(id), self.index.out_half(id)) {
                    (Some(in_info), Some(out_info)) => IndexReply::DirectedVertex {
                        task,
                        in_info,
                        out_info,
                    },
                    _ => missing(task, id, LookupKind::Vertex),
                }
            }
            Lookup::Vertex(task, id) => match self.index.vertex(id) {
                Some(info) => IndexReply::Vertex { task, info },
                None => missing(task, id, LookupKind::Vertex),
            },
            Lookup::Partial(task, req) => {
                if !self.index.is_directed() || req.edges == EdgeType::Both {
                    return self.resolve(Lookup::Vertex(task, req.id));
                }
                let info = match req.edges {
                    EdgeType::In => self.index.in_half(req.id),
                    _ => self.index.out_half(req.id),
                };
                match info {
                    Some(info) => IndexReply::PartialVertex { task, info },
                    None => missing(task, req.id, LookupKind::Vertex),
                }
            }
            Lookup::NumEdges(task, id) if self.index.is_directed() => {
                match (self.index.in_half(id), self.index.out_half(id)) {
                    (Some(i), Some(o)) => IndexReply::NumDirectedEdges {
                        task,
                        id,
                        in_size: i.size,
                        out_size: o.size,
                    },
                    _ => missing(task, id, LookupKind::NumEdges),
                }
            }
            Lookup::NumEdges(task, id) => match self.index.vertex(id) {
                Some(info) => IndexReply::NumEdges {
                    task,
                    id,
                    size: info.size,
                },
                None => missing(task, id, LookupKind::NumEdges),
            },
        }
    }
}

impl IndexResolver for VertexIndexReader {
    fn request_vertices(&mut self, task: TaskId, ids: &[VertexId]) {
        self.queue
            .extend(ids.iter().map(|&id| Lookup::Vertex(task, id)));
    }

    fn request_partial_vertices(&mut self, task: TaskId, reqs: &[DirectedRequest]) {
        self.queue
            .extend(reqs.iter().map(|&req| Lookup::Partial(task, req)));
    }

    fn request_num_edges(&mut self, task: TaskId, ids: &[VertexId]) {
        self.queue
            .extend(ids.iter().map(|&id| Lookup::NumEdges(task, id)));
    }

    fn poll(&mut self, out: &mut Vec<IndexReply>) -> usize {
        let count = self.queue.len();
        while let Some(lookup) = self.queue.pop_front() {
            out.push(self.resolve(lookup));
        }
        count
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::io::MemFileIo;
    use crate::storage::{EdgeListGraph, GraphWriter};

    fn task() -> TaskId {
        TaskId {
            slot: 0,
            generation: 0,
        }
    }

    #[test]
    fn directed_lookups_resolve_both_halves() {
        let graph = EdgeListGraph::new(2, true).with_edge(0, 1);
        let (_, index) = GraphWriter::write(&MemFileIo::new(), &graph).unwrap();
        let mut reader = VertexIndexReader::new(Arc::new(index));

        reader.request_vertices(task(), &[VertexId(1), VertexId(7)]);
        reader.request_partial_vertices(
            task(),
            &[DirectedRequest::new(VertexId(0), EdgeType::Out)],
        );
        reader.request_num_edges(task(), &[VertexId(0)]);
        assert_eq!(reader.pending(), 4);

        let mut out = Vec::new();
        assert_eq!(reader.poll(&mut out), 4);
        assert!(matches!(
            out[0],
            IndexReply::DirectedVertex { in_info, .. } if in_info.id == VertexId(1)
        ));
        assert!(matches!(
            out[1],
            IndexReply::Missing { kind: LookupKind::Vertex, id: VertexId(7), .. }
        ));
        assert!(matches!(out[2], IndexReply::PartialVertex { info, .. } if info.id == VertexId(0)));
        assert!(matches!(
            out[3],
            IndexReply::NumDirectedEdges { in_size: 8, out_size: 12, .. }
        ));
        assert_eq!(reader.pending(), 0);
    }
}
