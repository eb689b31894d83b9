//! Program-facing views over fetched vertex records.
//!
//! Views borrow the fetch buffer they were built from and therefore cannot
//! outlive the callback that delivered it.

use std::fmt;

use crate::primitives::bytes::{le, PageView};
use crate::storage::layout::{split_record, EDGE_LEN};
use crate::types::{EngineError, Result, VertexId};

/// Neighbor ids of one record, decoded lazily.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EdgeList<'a> {
    raw: &'a [u8],
}

impl<'a> EdgeList<'a> {
    fn new(raw: &'a [u8]) -> Self {
        Self { raw }
    }

    pub fn len(&self) -> usize {
        self.raw.len() / EDGE_LEN as usize
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<VertexId> {
        let at = idx.checked_mul(EDGE_LEN as usize)?;
        le::get_u32(self.raw, at).map(VertexId)
    }

    pub fn iter(&self) -> impl Iterator<Item = VertexId> + 'a {
        self.raw
            .chunks_exact(EDGE_LEN as usize)
            .map(|c| VertexId(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
    }

    pub fn to_vec(&self) -> Vec<VertexId> {
        self.iter().collect()
    }
}

impl fmt::Debug for EdgeList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Undirected vertex decoded from a single record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageVertex<'a> {
    id: VertexId,
    edges: EdgeList<'a>,
}

impl<'a> PageVertex<'a> {
    pub fn parse(view: PageView<'a>) -> Result<Self> {
        let (header, edges) = split_record(view.as_slice())?;
        Ok(Self {
            id: header.id,
            edges: EdgeList::new(edges),
        })
    }

    pub fn id(&self) -> VertexId {
        self.id
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> EdgeList<'a> {
        self.edges
    }
}

/// Directed vertex built from its in-edge record, its out-edge record, or both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageDirectedVertex<'a> {
    id: VertexId,
    in_edges: Option<EdgeList<'a>>,
    out_edges: Option<EdgeList<'a>>,
}

impl<'a> PageDirectedVertex<'a> {
    /// Builds a one-sided view; `is_in` names the region the record came from.
    pub fn from_half(view: PageView<'a>, is_in: bool) -> Result<Self> {
        let (header, edges) = split_record(view.as_slice())?;
        let edges = Some(EdgeList::new(edges));
        Ok(Self {
            id: header.id,
            in_edges: if is_in { edges } else { None },
            out_edges: if is_in { None } else { edges },
        })
    }

    /// Joins the two halves of one vertex.
    pub fn from_pair(in_view: PageView<'a>, out_view: PageView<'a>) -> Result<Self> {
        let (in_header, in_edges) = split_record(in_view.as_slice())?;
        let (out_header, out_edges) = split_record(out_view.as_slice())?;
        if in_header.id != out_header.id {
            return Err(EngineError::Corruption(format!(
                "in-edge record of {} paired with out-edge record of {}",
                in_header.id, out_header.id
            )));
        }
        Ok(Self {
            id: in_header.id,
            in_edges: Some(EdgeList::new(in_edges)),
            out_edges: Some(EdgeList::new(out_edges)),
        })
    }

    pub fn id(&self) -> VertexId {
        self.id
    }

    pub fn in_edges(&self) -> Option<EdgeList<'a>> {
        self.in_edges
    }

    pub fn out_edges(&self) -> Option<EdgeList<'a>> {
        self.out_edges
    }

    pub fn num_in_edges(&self) -> usize {
        self.in_edges.map_or(0, |e| e.len())
    }

    pub fn num_out_edges(&self) -> usize {
        self.out_edges.map_or(0, |e| e.len())
    }
}

/// View handed to [`super::VertexProgram::run`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexView<'a> {
    Undirected(PageVertex<'a>),
    Directed(PageDirectedVertex<'a>),
}

impl VertexView<'_> {
    pub fn id(&self) -> VertexId {
        match self {
            VertexView::Undirected(v) => v.id(),
            VertexView::Directed(v) => v.id(),
        }
    }

    pub fn is_directed(&self) -> bool {
        matches!(self, VertexView::Directed(_))
    }
}

/// Header-only view handed to [`super::VertexProgram::run_on_num_edges`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexHeader {
    Undirected {
        id: VertexId,
        num_edges: u32,
    },
    Directed {
        id: VertexId,
        num_in_edges: u32,
        num_out_edges: u32,
    },
}

impl VertexHeader {
    pub fn id(&self) -> VertexId {
        match self {
            VertexHeader::Undirected { id, .. } | VertexHeader::Directed { id, .. } => *id,
        }
    }

    /// Total edges touching the vertex.
    pub fn num_edges(&self) -> u32 {
        match self {
            VertexHeader::Undirected { num_edges, .. } => *num_edges,
            VertexHeader::Directed {
                num_in_edges,
                num_out_edges,
                ..
            } => num_in_edges + num_out_edges,
        }
    }
}
