use crate::primitives::bytes::le;
use crate::primitives::io::FileIo;
use crate::types::{header_crc32, EngineError, Result};

const MAGIC: &[u8; 8] = b"GSTREAM\0";
const VERSION_MAJOR: u16 = 1;
const VERSION_MINOR: u16 = 0;
const CRC_OFFSET: usize = 44;

/// Bytes reserved for the header at the start of every graph image.
pub const HEADER_LEN: usize = 64;

/// Header flag: adjacency is split into in-edge and out-edge regions.
pub const FLAG_DIRECTED: u32 = 1 << 0;
/// Header flag: edges carry attribute payloads (not supported by this engine).
pub const FLAG_EDGE_DATA: u32 = 1 << 1;

/// Decoded graph image header.
///
/// Directed images store every in-edge record first and every out-edge
/// record after `in_part_end`; the boundary is what the engine uses to tell
/// the two halves of a directed vertex apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphHeader {
    pub directed: bool,
    pub num_vertices: u32,
    pub num_edges: u64,
    pub in_part_end: u64,
    pub data_end: u64,
}

impl GraphHeader {
    /// Offset of the first vertex record.
    pub const fn data_start() -> u64 {
        HEADER_LEN as u64
    }

    /// Returns true if a record at `offset` belongs to the in-edge region.
    #[inline]
    pub fn is_in_part(&self, offset: u64) -> bool {
        offset < self.in_part_end
    }

    pub fn has_edge_data(&self) -> bool {
        false
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(EngineError::Corruption(
                "graph header shorter than expected".into(),
            ));
        }
        if &data[..MAGIC.len()] != MAGIC {
            return Err(EngineError::Corruption("invalid graph header magic".into()));
        }

        let major = u16::from_le_bytes([data[8], data[9]]);
        let minor = u16::from_le_bytes([data[10], data[11]]);
        if major != VERSION_MAJOR || minor != VERSION_MINOR {
            return Err(EngineError::Corruption(format!(
                "unsupported header version {major}.{minor}"
            )));
        }

        let field = |at: usize| le::get_u64(data, at).unwrap_or_default();
        let flags = le::get_u32(data, 12).unwrap_or_default();
        let num_vertices = le::get_u32(data, 16).unwrap_or_default();
        let num_edges = field(20);
        let in_part_end = field(28);
        let data_end = field(36);
        let stored_crc = le::get_u32(data, CRC_OFFSET).unwrap_or_default();
        if header_crc32(data_end, &data[..CRC_OFFSET]) != stored_crc {
            return Err(EngineError::Corruption("graph header checksum mismatch".into()));
        }
        if flags & FLAG_EDGE_DATA != 0 {
            return Err(EngineError::Corruption(
                "graph images with edge data are not supported".into(),
            ));
        }
        if in_part_end < Self::data_start() || in_part_end > data_end {
            return Err(EngineError::Corruption(format!(
                "in-part boundary {in_part_end} outside data region ..{data_end}"
            )));
        }

        Ok(Self {
            directed: flags & FLAG_DIRECTED != 0,
            num_vertices,
            num_edges,
            in_part_end,
            data_end,
        })
    }

    pub fn encode(&self, data: &mut [u8]) -> Result<()> {
        if data.len() < HEADER_LEN {
            return Err(EngineError::InvalidArgument(
                "graph header buffer shorter than expected".into(),
            ));
        }
        let flags = if self.directed { FLAG_DIRECTED } else { 0 };
        data[..HEADER_LEN].fill(0);
        data[..MAGIC.len()].copy_from_slice(MAGIC);
        data[8..10].copy_from_slice(&VERSION_MAJOR.to_le_bytes());
        data[10..12].copy_from_slice(&VERSION_MINOR.to_le_bytes());
        le::put_u32(data, 12, flags);
        le::put_u32(data, 16, self.num_vertices);
        le::put_u64(data, 20, self.num_edges);
        le::put_u64(data, 28, self.in_part_end);
        le::put_u64(data, 36, self.data_end);
        let crc = header_crc32(self.data_end, &data[..CRC_OFFSET]);
        le::put_u32(data, CRC_OFFSET, crc);
        Ok(())
    }

    /// Reads and validates the header of an image, checking it against the image length.
    pub fn read_from<F: FileIo + ?Sized>(io: &F) -> Result<Self> {
        let mut buf = [0u8; HEADER_LEN];
        io.read_at(0, &mut buf)?;
        let header = Self::decode(&buf)?;
        let len = io.len()?;
        if len < header.data_end {
            return Err(EngineError::Corruption(format!(
                "graph image truncated: {len} bytes, header expects {}",
                header.data_end
            )));
        }
        Ok(header)
    }
}
