use std::fmt;

use crate::types::FileId;

/// Position of a read inside a storage object.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct DataLoc {
    /// Storage object the bytes live in.
    pub file: FileId,
    /// Byte offset from the start of the object.
    pub offset: u64,
}

impl DataLoc {
    /// Creates a location.
    pub fn new(file: FileId, offset: u64) -> Self {
        Self { file, offset }
    }
}

/// Direction of a request. Only reads are issued by the compute engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Access {
    /// Fetch bytes from storage.
    Read,
}

/// Immutable description of one I/O ask.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct RequestDescriptor {
    loc: DataLoc,
    size: u32,
    access: Access,
}

impl RequestDescriptor {
    /// Describes a read of `size` bytes at `loc`.
    pub fn read(loc: DataLoc, size: u32) -> Self {
        Self {
            loc,
            size,
            access: Access::Read,
        }
    }

    /// Where the bytes live.
    #[inline]
    pub fn loc(&self) -> DataLoc {
        self.loc
    }

    /// Byte offset of the request.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.loc.offset
    }

    /// Number of bytes requested.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Direction of the request.
    #[inline]
    pub fn access(&self) -> Access {
        self.access
    }

    /// One past the last requested byte.
    #[inline]
    pub fn end(&self) -> u64 {
        self.loc.offset + u64::from(self.size)
    }
}

impl fmt::Display for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {}@{}+{}",
            self.access, self.loc.file, self.loc.offset, self.size
        )
    }
}
