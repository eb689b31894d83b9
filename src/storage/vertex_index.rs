use tracing::debug;

use super::header::GraphHeader;
use super::layout::{RecordHeader, RECORD_HEADER_LEN};
use crate::primitives::io::FileIo;
use crate::types::{EngineError, Result, VertexId};

/// Location and size of one vertex record.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct VertexInfo {
    pub id: VertexId,
    pub offset: u64,
    pub size: u32,
}

impl VertexInfo {
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.size)
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Extent {
    offset: u64,
    size: u32,
}

/// In-memory map from vertex id to the record(s) holding its adjacency.
///
/// Undirected images have one record per vertex; directed images have an
/// in-edge record and an out-edge record.
#[derive(Clone, Debug)]
pub struct VertexIndex {
    directed: bool,
    primary: Vec<Extent>,
    out: Vec<Extent>,
}

impl VertexIndex {
    pub(crate) fn from_records(
        directed: bool,
        primary: Vec<(u64, u32)>,
        out: Vec<(u64, u32)>,
    ) -> Self {
        let to_extents = |v: Vec<(u64, u32)>| {
            v.into_iter()
                .map(|(offset, size)| Extent { offset, size })
                .collect::<Vec<_>>()
        };
        Self {
            directed,
            primary: to_extents(primary),
            out: to_extents(out),
        }
    }

    /// Rebuilds the index by walking the record headers of an image.
    pub fn scan<F: FileIo + ?Sized>(io: &F, header: &GraphHeader) -> Result<Self> {
        let n = header.num_vertices as usize;
        let (primary, end) = scan_region(io, GraphHeader::data_start(), n)?;
        let region_end = if header.directed {
            header.in_part_end
        } else {
            header.data_end
        };
        if end != region_end {
            return Err(EngineError::Corruption(format!(
                "records end at {end}, header expects {region_end}"
            )));
        }
        let out = if header.directed {
            let (out, end) = scan_region(io, header.in_part_end, n)?;
            if end != header.data_end {
                return Err(EngineError::Corruption(format!(
                    "out-edge records end at {end}, header expects {}",
                    header.data_end
                )));
            }
            out
        } else {
            Vec::new()
        };
        debug!(
            vertices = n,
            directed = header.directed,
            "vertex_index.scan complete"
        );
        Ok(Self {
            directed: header.directed,
            primary,
            out,
        })
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    /// Record of an undirected vertex, or the in-edge record of a directed one.
    pub fn vertex(&self, id: VertexId) -> Option<VertexInfo> {
        lookup(&self.primary, id)
    }

    /// In-edge record of a directed vertex.
    pub fn in_half(&self, id: VertexId) -> Option<VertexInfo> {
        if !self.directed {
            return None;
        }
        lookup(&self.primary, id)
    }

    /// Out-edge record of a directed vertex.
    pub fn out_half(&self, id: VertexId) -> Option<VertexInfo> {
        lookup(&self.out, id)
    }
}

fn lookup(extents: &[Extent], id: VertexId) -> Option<VertexInfo> {
    extents.get(id.index()).map(|e| VertexInfo {
        id,
        offset: e.offset,
        size: e.size,
    })
}

fn scan_region<F: FileIo + ?Sized>(io: &F, start: u64, n: usize) -> Result<(Vec<Extent>, u64)> {
    let mut extents = Vec::with_capacity(n);
    let mut off = start;
    let mut buf = [0u8; RECORD_HEADER_LEN as usize];
    for expected in 0..n {
        io.read_at(off, &mut buf)?;
        let header = RecordHeader::decode(&buf)?;
        if header.id.index() != expected {
            return Err(EngineError::Corruption(format!(
                "record at {off} belongs to {}, expected v{expected}",
                header.id
            )));
        }
        let size = header.record_size()?;
        extents.push(Extent { offset: off, size });
        off += u64::from(size);
    }
    Ok((extents, off))
}
