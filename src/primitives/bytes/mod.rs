#![forbid(unsafe_code)]
//! Fetch buffers and little-endian field readers.
//!
//! A completed read is handed to its task as a [`PageView`], which borrows the
//! I/O channel's transient buffer and is only valid for the duration of the
//! delivering callback. Anything that must outlive the callback is copied into
//! an [`OwnedPage`] with [`PageView::to_owned_page`]; there is no other way to
//! construct one from fetched data, so a borrowed view can never be stashed by
//! accident.

use bytes::Bytes;

/// Borrowed view of fetched bytes together with the storage offset they came from.
#[derive(Clone, Copy, Debug)]
pub struct PageView<'a> {
    offset: u64,
    data: &'a [u8],
}

impl<'a> PageView<'a> {
    /// Wraps `data`, which was read from `offset` in the backing object.
    pub fn new(offset: u64, data: &'a [u8]) -> Self {
        Self { offset, data }
    }

    /// Storage offset of the first byte.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The fetched bytes.
    #[inline]
    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// Number of fetched bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if nothing was fetched.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copies the view into a heap-resident buffer that may be retained.
    pub fn to_owned_page(&self) -> OwnedPage {
        OwnedPage {
            offset: self.offset,
            data: Bytes::copy_from_slice(self.data),
        }
    }
}

/// Heap-resident copy of fetched bytes. Released when dropped by its holder.
#[derive(Clone, Debug)]
pub struct OwnedPage {
    offset: u64,
    data: Bytes,
}

impl OwnedPage {
    /// Storage offset of the first byte.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of retained bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the page holds no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrows the retained bytes as a view.
    pub fn as_view(&self) -> PageView<'_> {
        PageView::new(self.offset, &self.data)
    }
}

pub mod le {
    //! Bounds-checked little-endian readers and writers.

    /// Reads a `u32` at `at`, or `None` if the slice is too short.
    #[inline]
    pub fn get_u32(src: &[u8], at: usize) -> Option<u32> {
        let end = at.checked_add(4)?;
        let bytes = src.get(at..end)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a `u64` at `at`, or `None` if the slice is too short.
    #[inline]
    pub fn get_u64(src: &[u8], at: usize) -> Option<u64> {
        let end = at.checked_add(8)?;
        let bytes = src.get(at..end)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Some(u64::from_le_bytes(buf))
    }

    /// Writes a `u32` at `at`.
    ///
    /// # Panics
    ///
    /// Panics if `dst` is shorter than `at + 4`.
    #[inline]
    pub fn put_u32(dst: &mut [u8], at: usize, v: u32) {
        dst[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    /// Writes a `u64` at `at`.
    ///
    /// # Panics
    ///
    /// Panics if `dst` is shorter than `at + 8`.
    #[inline]
    pub fn put_u64(dst: &mut [u8], at: usize, v: u64) {
        dst[at..at + 8].copy_from_slice(&v.to_le_bytes());
    }
}
