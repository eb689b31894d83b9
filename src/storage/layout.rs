//! Vertex record encoding.
//!
//! A record is `[id:u32][num_edges:u32][neighbor:u32 * num_edges]`, little
//! endian. Directed images hold two records per vertex, one in each region.

use crate::primitives::bytes::le;
use crate::types::{EngineError, Result, VertexId};

/// Bytes before the first neighbor id.
pub const RECORD_HEADER_LEN: u32 = 8;
/// Bytes per neighbor id.
pub const EDGE_LEN: u32 = 4;

/// Number of edges stored in a record of `size` bytes.
#[inline]
pub fn num_edges(size: u32) -> u32 {
    size.saturating_sub(RECORD_HEADER_LEN) / EDGE_LEN
}

/// Size in bytes of a record holding `num_edges` neighbors, or `None` when it
/// does not fit a `u32`.
#[inline]
pub fn record_size(num_edges: u32) -> Option<u32> {
    num_edges
        .checked_mul(EDGE_LEN)
        .and_then(|edges| edges.checked_add(RECORD_HEADER_LEN))
}

/// Fixed-size prefix of a record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RecordHeader {
    pub id: VertexId,
    pub num_edges: u32,
}

impl RecordHeader {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match (le::get_u32(bytes, 0), le::get_u32(bytes, 4)) {
            (Some(id), Some(num_edges)) => Ok(Self {
                id: VertexId(id),
                num_edges,
            }),
            _ => Err(EngineError::Corruption(format!(
                "vertex record of {} bytes is shorter than its header",
                bytes.len()
            ))),
        }
    }

    pub fn record_size(&self) -> Result<u32> {
        record_size(self.num_edges).ok_or_else(|| {
            EngineError::Corruption(format!(
                "record of {} claims {} edges, more than a record can hold",
                self.id, self.num_edges
            ))
        })
    }
}

/// Splits a full record into its header and the raw neighbor bytes.
pub fn split_record(bytes: &[u8]) -> Result<(RecordHeader, &[u8])> {
    let header = RecordHeader::decode(bytes)?;
    let expected = header.record_size()? as usize;
    if bytes.len() != expected {
        return Err(EngineError::Corruption(format!(
            "record of {} claims {} edges ({expected} bytes) but {} bytes were fetched",
            header.id,
            header.num_edges,
            bytes.len()
        )));
    }
    Ok((header, &bytes[RECORD_HEADER_LEN as usize..]))
}

/// Appends the record for `id` to `out`.
pub fn encode_record(id: VertexId, neighbors: &[VertexId], out: &mut Vec<u8>) {
    out.extend_from_slice(&id.0.to_le_bytes());
    out.extend_from_slice(&(neighbors.len() as u32).to_le_bytes());
    for n in neighbors {
        out.extend_from_slice(&n.0.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_count_formula_matches_encoding() {
        let mut buf = Vec::new();
        encode_record(VertexId(5), &[VertexId(1), VertexId(9), VertexId(3)], &mut buf);
        assert_eq!(Some(buf.len() as u32), record_size(3));
        assert_eq!(num_edges(buf.len() as u32), 3);
        assert_eq!(num_edges(RECORD_HEADER_LEN), 0);
        assert_eq!(num_edges(0), 0);

        let (header, edges) = split_record(&buf).unwrap();
        assert_eq!(header.id, VertexId(5));
        assert_eq!(edges.len(), 12);
    }

    #[test]
    fn split_rejects_truncated_record() {
        let mut buf = Vec::new();
        encode_record(VertexId(1), &[VertexId(2), VertexId(3)], &mut buf);
        buf.pop();
        assert!(matches!(
            split_record(&buf),
            Err(EngineError::Corruption(_))
        ));
        assert!(RecordHeader::decode(&buf[..6]).is_err());
    }

    #[test]
    fn oversized_edge_count_is_corruption() {
        assert_eq!(record_size(u32::MAX / EDGE_LEN), None);
        assert_eq!(record_size(0x4000_0000), None);

        let mut buf = Vec::new();
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.extend_from_slice(&0x4000_0000u32.to_le_bytes());
        assert!(matches!(
            split_record(&buf),
            Err(EngineError::Corruption(_))
        ));
        let header = RecordHeader::decode(&buf).unwrap();
        assert!(header.record_size().is_err());
    }
}
