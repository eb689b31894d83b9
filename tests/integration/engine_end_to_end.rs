#![allow(clippy::type_complexity)]

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use graphstream::engine::{
    CounterMetrics, DeliveryOrder, EdgeList, EngineOptions, FileChannel, RequestSink,
    SchedulePolicy, VertexIndexReader, VertexProgram, VertexView, Worker,
};
use graphstream::primitives::io::StdFileIo;
use graphstream::storage::{EdgeListGraph, GraphHeader, GraphWriter, VertexIndex};
use graphstream::types::{EngineError, FileId};
use graphstream::VertexId;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tempfile::TempDir;

/// Fetches the full adjacency of every out-neighbor and records what it saw.
#[derive(Default)]
struct TwoHop {
    seen: BTreeMap<(u32, u32), (Vec<u32>, Vec<u32>)>,
}

impl VertexProgram for TwoHop {
    fn run(&mut self, vertex: VertexId, view: &VertexView<'_>, requests: &mut RequestSink) {
        let VertexView::Directed(v) = view else {
            panic!("undirected view on a directed image");
        };
        let ids = |e: EdgeList<'_>| e.iter().map(|n| n.0).collect::<Vec<u32>>();
        let ins = v.in_edges().map(ids).unwrap_or_default();
        let outs = v.out_edges().map(ids).unwrap_or_default();
        if v.id() == vertex {
            requests.request_vertices(&outs.iter().copied().map(VertexId).collect::<Vec<_>>());
        }
        self.seen.insert((vertex.0, v.id().0), (ins, outs));
    }
}

fn write_graph(
    dir: &Path,
    graph: &EdgeListGraph) -> (std::path::PathBuf, GraphHeader, VertexIndex,
) {
    let path = dir.join("graph.gs");
    let io = StdFileIo::create(&path).expect("create image");
    let (header, index) = GraphWriter::write(&io, graph).expect("write image");
    (path, header, index)
}

fn expected_two_hop(graph: &EdgeListGraph) -> BTreeMap<(u32, u32), (Vec<u32>, Vec<u32>)> {
    let (ins, outs) = graph.adjacency().unwrap();
    let ids = |list: &Vec<VertexId>| list.iter().map(|v| v.0).collect::<Vec<_>>();
    let mut expected = BTreeMap::new();
    for v in 0..graph.num_vertices as usize {
        expected.insert((v as u32, v as u32), (ids(&ins[v]), ids(&outs[v])));
        for n in &outs[v] {
            expected.insert((v as u32, n.0), (ids(&ins[n.index()]), ids(&outs[n.index()])));
        }
    }
    expected
}

#[test]
fn directed_two_hop_over_file_image() {
    let dir = TempDir::new().expect("tempdir");
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut graph = EdgeListGraph::random(60, 240, true, &mut rng);
    // a self loop would make the program expand its own vertex forever
    graph.edges.retain(|(src, dst)| src != dst);
    let (path, written_header, written_index) = write_graph(dir.path(), &graph);

    let io = StdFileIo::open_read(&path).expect("open image");
    let header = GraphHeader::read_from(&io).expect("header");
    assert_eq!(header, written_header);
    let index = VertexIndex::scan(&io, &header).expect("scan");
    for v in 0..60 {
        assert_eq!(index.in_half(VertexId(v)), written_index.in_half(VertexId(v)));
        assert_eq!(index.out_half(VertexId(v)), written_index.out_half(VertexId(v)));
    }

    let options = EngineOptions::from_toml_str(
        r#"
        io_depth = 4
        pull_batch = 3
        max_active_vertices = 8
        gc_interval = 3
        schedule_policy = "fifo_drain"
        delivery_order = "reverse"
        "#,
    )
    .expect("options");
    assert_eq!(options.schedule_policy, SchedulePolicy::FifoDrain);

    let metrics = Arc::new(CounterMetrics::default());
    let channel = FileChannel::new(io, FileId(0), options.io_depth, options.delivery_order);
    let mut worker = Worker::new(
        header,
        channel,
        VertexIndexReader::new(Arc::new(index)),
        TwoHop::default(),
        options,
    )
    .expect("worker")
    .with_metrics(metrics.clone());
    let summary = worker.run((0..60).map(VertexId)).expect("run");

    let seen = worker.into_program().seen;
    let expected = expected_two_hop(&graph);
    assert_eq!(seen, expected);

    let pairs = 60 + graph.edges.len() as u64;
    let snap = metrics.snapshot();
    assert_eq!(summary.vertices, 60);
    assert_eq!(snap.vertices_completed, 60);
    assert_eq!(snap.invocations_started, snap.invocations_finished);
    assert_eq!(snap.halves_buffered, pairs);
    assert_eq!(snap.requests_failed, 0);
    assert_eq!(summary.allocator.live, 0);
    assert_eq!(summary.allocator.reclaimed, 60);
}

/// Counts the vertices whose own record it managed to read.
#[derive(Default)]
struct Reached {
    vertices: Vec<u32>,
}

impl VertexProgram for Reached {
    fn run(&mut self, vertex: VertexId, view: &VertexView<'_>, _requests: &mut RequestSink) {
        assert_eq!(view.id(), vertex);
        self.vertices.push(vertex.0);
    }
}

#[test]
fn truncated_image_fails_requests_but_finishes_run() {
    let dir = TempDir::new().expect("tempdir");
    let mut graph = EdgeListGraph::new(20, false);
    for v in 0..19 {
        graph = graph.with_edge(v, v + 1);
    }
    let (path, header, index) = write_graph(dir.path(), &graph);
    let cut = index.vertex(VertexId(15)).unwrap();
    OpenOptions::new()
        .write(true)
        .open(&path)
        .and_then(|f| f.set_len(cut.offset))
        .expect("truncate");

    let io = StdFileIo::open_read(&path).expect("open image");
    assert!(matches!(
        GraphHeader::read_from(&io),
        Err(EngineError::Corruption(_))
    ));

    let metrics = Arc::new(CounterMetrics::default());
    let channel = FileChannel::new(io, FileId(0), 8, DeliveryOrder::Fifo);
    let mut worker = Worker::new(
        header,
        channel,
        VertexIndexReader::new(Arc::new(index)),
        Reached::default(),
        EngineOptions::default(),
    )
    .expect("worker")
    .with_metrics(metrics.clone());
    worker.run((0..20).map(VertexId)).expect("run completes");

    let mut reached = worker.into_program().vertices;
    reached.sort_unstable();
    assert_eq!(reached, (0..15).collect::<Vec<_>>());
    let snap = metrics.snapshot();
    assert_eq!(snap.requests_failed, 5);
    assert_eq!(snap.vertices_completed, 20);
}

#[test]
fn options_file_is_loaded_and_validated() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("engine.toml");
    std::fs::write(&path, "io_depth = 2\npending_order = \"fifo\"\n").unwrap();
    let options = EngineOptions::load(&path).expect("load");
    assert_eq!(options.io_depth, 2);
    assert_eq!(options.pull_batch, EngineOptions::default().pull_batch);

    std::fs::write(&path, "pull_batch = 0\n").unwrap();
    assert!(matches!(EngineOptions::load(&path), Err(EngineError::Config(_))));

    std::fs::write(&path, "no_such_key = 1\n").unwrap();
    assert!(matches!(EngineOptions::load(&path), Err(EngineError::Config(_))));
}
