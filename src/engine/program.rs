use smallvec::SmallVec;

use super::view::{VertexHeader, VertexView};
use crate::types::VertexId;

/// Which adjacency regions of a directed vertex to fetch.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EdgeType {
    In,
    Out,
    Both,
}

/// Request for some or all of a directed vertex's adjacency.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct DirectedRequest {
    pub id: VertexId,
    pub edges: EdgeType,
}

impl DirectedRequest {
    pub fn new(id: VertexId, edges: EdgeType) -> Self {
        Self { id, edges }
    }
}

/// Requests a vertex program makes during one invocation.
///
/// The task applies them once the invocation's `finish` bracket has been
/// emitted, so a program never re-enters its own task.
#[derive(Debug, Default)]
pub struct RequestSink {
    pub(crate) vertices: SmallVec<[VertexId; 8]>,
    pub(crate) num_edges: SmallVec<[VertexId; 8]>,
    pub(crate) partial: SmallVec<[DirectedRequest; 4]>,
}

impl RequestSink {
    /// Asks for the full adjacency of each id.
    pub fn request_vertices(&mut self, ids: &[VertexId]) {
        self.vertices.extend_from_slice(ids);
    }

    /// Asks for only the edge counts of each id.
    pub fn request_num_edges(&mut self, ids: &[VertexId]) {
        self.num_edges.extend_from_slice(ids);
    }

    /// Asks for selected regions of directed vertices.
    pub fn request_partial_vertices(&mut self, reqs: &[DirectedRequest]) {
        self.partial.extend_from_slice(reqs);
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.num_edges.is_empty() && self.partial.is_empty()
    }
}

/// User logic run against a vertex as its data arrives.
///
/// `vertex` is always the vertex that owns the task; the view or header
/// describes the vertex whose data was fetched, which may be a neighbor.
pub trait VertexProgram {
    /// Runs once when the vertex is admitted. The default fetches the
    /// vertex's own adjacency.
    fn init(&mut self, vertex: VertexId, requests: &mut RequestSink) {
        requests.request_vertices(&[vertex]);
    }

    /// Runs once per fetched adjacency (a directed pair counts once).
    fn run(&mut self, vertex: VertexId, view: &VertexView<'_>, requests: &mut RequestSink);

    /// Runs once per edge-count reply.
    fn run_on_num_edges(
        &mut self,
        _vertex: VertexId,
        _header: &VertexHeader,
        _requests: &mut RequestSink,
    ) {
    }
}
