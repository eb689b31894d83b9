use rand::Rng;
use tracing::info;

use super::header::{GraphHeader, HEADER_LEN};
use super::layout::encode_record;
use super::vertex_index::VertexIndex;
use crate::primitives::io::FileIo;
use crate::types::{EngineError, Result, VertexId};

/// Edge-list description of a graph to be laid out on storage.
#[derive(Clone, Debug, Default)]
pub struct EdgeListGraph {
    pub num_vertices: u32,
    pub directed: bool,
    pub edges: Vec<(VertexId, VertexId)>,
}

impl EdgeListGraph {
    pub fn new(num_vertices: u32, directed: bool) -> Self {
        Self {
            num_vertices,
            directed,
            edges: Vec::new(),
        }
    }

    pub fn with_edge(mut self, src: u32, dst: u32) -> Self {
        self.edges.push((VertexId(src), VertexId(dst)));
        self
    }

    /// Draws `num_edges` uniformly random edges (self loops included).
    pub fn random<R: Rng + ?Sized>(
        num_vertices: u32,
        num_edges: usize,
        directed: bool,
        rng: &mut R,
    ) -> Self {
        let mut graph = Self::new(num_vertices, directed);
        if num_vertices == 0 {
            return graph;
        }
        graph.edges = (0..num_edges)
            .map(|_| {
                (
                    VertexId(rng.gen_range(0..num_vertices)),
                    VertexId(rng.gen_range(0..num_vertices)),
                )
            })
            .collect();
        graph
    }

    /// Sorted adjacency lists: `(primary, out)`.
    ///
    /// For directed graphs `primary` holds in-neighbors; for undirected graphs
    /// it holds every neighbor and `out` is empty.
    pub fn adjacency(&self) -> Result<(Vec<Vec<VertexId>>, Vec<Vec<VertexId>>)> {
        let n = self.num_vertices as usize;
        let mut primary = vec![Vec::new(); n];
        let mut out = if self.directed {
            vec![Vec::new(); n]
        } else {
            Vec::new()
        };
        for &(src, dst) in &self.edges {
            if src.index() >= n || dst.index() >= n {
                return Err(EngineError::InvalidArgument(format!(
                    "edge {src}->{dst} references a vertex outside 0..{n}"
                )));
            }
            if self.directed {
                out[src.index()].push(dst);
                primary[dst.index()].push(src);
            } else {
                primary[src.index()].push(dst);
                if src != dst {
                    primary[dst.index()].push(src);
                }
            }
        }
        for list in primary.iter_mut().chain(out.iter_mut()) {
            list.sort_unstable();
        }
        Ok((primary, out))
    }
}

/// Lays out an [`EdgeListGraph`] as a graph image.
pub struct GraphWriter;

impl GraphWriter {
    pub fn write<F: FileIo + ?Sized>(
        io: &F,
        graph: &EdgeListGraph,
    ) -> Result<(GraphHeader, VertexIndex)> {
        let (primary, out) = graph.adjacency()?;
        let mut body = Vec::new();
        let start = GraphHeader::data_start();

        let mut primary_extents = Vec::with_capacity(primary.len());
        for (id, neighbors) in primary.iter().enumerate() {
            let offset = start + body.len() as u64;
            encode_record(VertexId(id as u32), neighbors, &mut body);
            primary_extents.push((offset, (start + body.len() as u64 - offset) as u32));
        }
        let in_part_end = start + body.len() as u64;

        let mut out_extents = Vec::with_capacity(out.len());
        for (id, neighbors) in out.iter().enumerate() {
            let offset = start + body.len() as u64;
            encode_record(VertexId(id as u32), neighbors, &mut body);
            out_extents.push((offset, (start + body.len() as u64 - offset) as u32));
        }
        let data_end = start + body.len() as u64;

        let header = GraphHeader {
            directed: graph.directed,
            num_vertices: graph.num_vertices,
            num_edges: graph.edges.len() as u64,
            in_part_end,
            data_end,
        };
        let mut head = [0u8; HEADER_LEN];
        header.encode(&mut head)?;
        io.write_at(0, &head)?;
        io.write_at(start, &body)?;
        io.sync_all()?;
        info!(
            vertices = header.num_vertices,
            edges = header.num_edges,
            directed = header.directed,
            bytes = data_end,
            "graph image written"
        );
        Ok((
            header,
            VertexIndex::from_records(graph.directed, primary_extents, out_extents),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::io::MemFileIo;
    use crate::storage::layout::split_record;

    fn read_record(io: &MemFileIo, offset: u64, size: u32) -> Vec<u8> {
        let mut buf = vec![0u8; size as usize];
        io.read_at(offset, &mut buf).unwrap();
        buf
    }

    #[test]
    fn directed_image_splits_regions() {
        let graph = EdgeListGraph::new(3, true)
            .with_edge(0, 1)
            .with_edge(0, 2)
            .with_edge(2, 1);
        let io = MemFileIo::new();
        let (header, index) = GraphWriter::write(&io, &graph).unwrap();

        assert!(header.directed);
        let in1 = index.in_half(VertexId(1)).unwrap();
        let out0 = index.out_half(VertexId(0)).unwrap();
        assert!(header.is_in_part(in1.offset));
        assert!(!header.is_in_part(out0.offset));

        let bytes = read_record(&io, in1.offset, in1.size);
        let (rec, edges) = split_record(&bytes).unwrap();
        assert_eq!(rec.id, VertexId(1));
        assert_eq!(rec.num_edges, 2);
        assert_eq!(edges.len(), 8);

        let scanned = VertexIndex::scan(&io, &GraphHeader::read_from(&io).unwrap()).unwrap();
        assert_eq!(scanned.out_half(VertexId(0)), Some(out0));
        assert_eq!(scanned.in_half(VertexId(1)), Some(in1));
    }

    #[test]
    fn undirected_image_mirrors_edges() {
        let graph = EdgeListGraph::new(2, false).with_edge(0, 1).with_edge(1, 1);
        let io = MemFileIo::new();
        let (header, index) = GraphWriter::write(&io, &graph).unwrap();
        assert_eq!(header.in_part_end, header.data_end);
        assert!(index.out_half(VertexId(0)).is_none());

        let v1 = index.vertex(VertexId(1)).unwrap();
        let bytes = read_record(&io, v1.offset, v1.size);
        let (rec, _) = split_record(&bytes).unwrap();
        assert_eq!(rec.num_edges, 2);
    }

    #[test]
    fn rejects_out_of_range_edge() {
        let graph = EdgeListGraph::new(2, true).with_edge(0, 5);
        let err = GraphWriter::write(&MemFileIo::new(), &graph).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }
}
