use graphstream::engine::{RequestSink, VertexHeader, VertexProgram, VertexView};
use graphstream::VertexId;
use rustc_hash::FxHashMap;

/// Records every vertex's own edge count.
#[derive(Debug, Default)]
pub struct Degree {
    pub values: FxHashMap<VertexId, u64>,
}

impl VertexProgram for Degree {
    fn init(&mut self, vertex: VertexId, requests: &mut RequestSink) {
        requests.request_num_edges(&[vertex]);
    }

    fn run(&mut self, _vertex: VertexId, _view: &VertexView<'_>, _requests: &mut RequestSink) {}

    fn run_on_num_edges(
        &mut self,
        vertex: VertexId,
        header: &VertexHeader,
        _requests: &mut RequestSink,
    ) {
        self.values.insert(vertex, u64::from(header.num_edges()));
    }
}

/// Sums the edge counts of every vertex's neighbors (out-neighbors when directed).
#[derive(Debug, Default)]
pub struct NeighborDegree {
    pub values: FxHashMap<VertexId, u64>,
}

impl VertexProgram for NeighborDegree {
    fn run(&mut self, vertex: VertexId, view: &VertexView<'_>, requests: &mut RequestSink) {
        self.values.entry(vertex).or_default();
        if view.id() != vertex {
            return;
        }
        let neighbors = match view {
            VertexView::Undirected(v) => v.edges().to_vec(),
            VertexView::Directed(v) => v.out_edges().map(|e| e.to_vec()).unwrap_or_default(),
        };
        requests.request_num_edges(&neighbors);
    }

    fn run_on_num_edges(
        &mut self,
        vertex: VertexId,
        header: &VertexHeader,
        _requests: &mut RequestSink,
    ) {
        *self.values.entry(vertex).or_default() += u64::from(header.num_edges());
    }
}
