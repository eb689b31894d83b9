//! On-storage graph layout.
//!
//! Header, vertex record encoding, the id-to-record index, and a writer that
//! lays out an edge list as a graph image the engine can stream from.

mod header;
mod vertex_index;
mod writer;

/// Vertex record encoding and the edge-count formula.
pub mod layout;

pub use header::{GraphHeader, FLAG_DIRECTED, FLAG_EDGE_DATA, HEADER_LEN};
pub use vertex_index::{VertexIndex, VertexInfo};
pub use writer::{EdgeListGraph, GraphWriter};
