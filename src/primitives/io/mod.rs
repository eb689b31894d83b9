#![forbid(unsafe_code)]

use std::{
    fs::{File, OpenOptions},
    io::{self, ErrorKind},
    path::Path,
    sync::Arc,
};

use parking_lot::RwLock;
use tracing::trace;

use crate::types::{EngineError, Result};

mod request;

pub use request::{Access, DataLoc, RequestDescriptor};

/// Trait for positioned reads and writes against one storage object.
pub trait FileIo: Send + Sync + 'static {
    /// Fills `dst` with the bytes starting at `off`. Short reads are errors.
    fn read_at(&self, off: u64, dst: &mut [u8]) -> Result<()>;
    /// Writes `src` starting at `off`, extending the object if needed.
    fn write_at(&self, off: u64, src: &[u8]) -> Result<()>;
    /// Flushes written data to durable storage.
    fn sync_all(&self) -> Result<()>;
    /// Returns the current length in bytes.
    fn len(&self) -> Result<u64>;
    /// Returns true if the object is empty.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(unix)]
mod positioned {
    use std::{fs::File, io, os::unix::fs::FileExt};

    pub fn read_at(file: &File, dst: &mut [u8], off: u64) -> io::Result<usize> {
        file.read_at(dst, off)
    }

    pub fn write_at(file: &File, src: &[u8], off: u64) -> io::Result<usize> {
        file.write_at(src, off)
    }
}

#[cfg(windows)]
mod positioned {
    use std::{fs::File, io, os::windows::fs::FileExt};

    pub fn read_at(file: &File, dst: &mut [u8], off: u64) -> io::Result<usize> {
        file.seek_read(dst, off)
    }

    pub fn write_at(file: &File, src: &[u8], off: u64) -> io::Result<usize> {
        file.seek_write(src, off)
    }
}

fn read_exact(file: &File, mut off: u64, mut dst: &mut [u8]) -> io::Result<()> {
    trace!(off, len = dst.len(), "io.read_exact");
    while !dst.is_empty() {
        let read = positioned::read_at(file, dst, off)?;
        if read == 0 {
            trace!(off, remaining = dst.len(), "io.read_exact hit eof");
            return Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                "read_at reached EOF",
            ));
        }
        let (_, tail) = dst.split_at_mut(read);
        dst = tail;
        off += read as u64;
    }
    Ok(())
}

fn write_all(file: &File, mut off: u64, mut src: &[u8]) -> io::Result<()> {
    trace!(off, len = src.len(), "io.write_all");
    while !src.is_empty() {
        let written = positioned::write_at(file, src, off)?;
        if written == 0 {
            return Err(io::Error::new(
                ErrorKind::WriteZero,
                "write_at wrote zero bytes",
            ));
        }
        src = &src[written..];
        off += written as u64;
    }
    Ok(())
}

/// File-backed I/O using `Arc<File>` so clones share one descriptor.
#[derive(Clone)]
pub struct StdFileIo {
    inner: Arc<File>,
}

impl StdFileIo {
    /// Wraps an existing file handle.
    pub fn new(file: File) -> Self {
        Self {
            inner: Arc::new(file),
        }
    }

    /// Opens or creates a file for read-write access, truncating it.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(EngineError::from)?;
        Ok(Self::new(file))
    }

    /// Opens an existing file read-only.
    pub fn open_read(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(EngineError::from)?;
        Ok(Self::new(file))
    }
}

impl FileIo for StdFileIo {
    fn read_at(&self, off: u64, dst: &mut [u8]) -> Result<()> {
        read_exact(&self.inner, off, dst).map_err(EngineError::from)
    }

    fn write_at(&self, off: u64, src: &[u8]) -> Result<()> {
        write_all(&self.inner, off, src).map_err(EngineError::from)
    }

    fn sync_all(&self) -> Result<()> {
        self.inner.sync_all().map_err(EngineError::from)
    }

    fn len(&self) -> Result<u64> {
        Ok(self.inner.metadata().map_err(EngineError::from)?.len())
    }
}

/// In-memory image with the same positioned semantics as [`StdFileIo`].
#[derive(Clone, Default)]
pub struct MemFileIo {
    inner: Arc<RwLock<Vec<u8>>>,
}

impl MemFileIo {
    /// Creates an empty image.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an image holding `bytes`.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(bytes)),
        }
    }

    /// Copies the current image out.
    pub fn snapshot(&self) -> Vec<u8> {
        self.inner.read().clone()
    }
}

impl FileIo for MemFileIo {
    fn read_at(&self, off: u64, dst: &mut [u8]) -> Result<()> {
        let image = self.inner.read();
        let start = usize::try_from(off)
            .map_err(|_| EngineError::InvalidArgument("read offset exceeds usize".into()))?;
        let end = start.checked_add(dst.len()).filter(|end| *end <= image.len());
        match end {
            Some(end) => {
                dst.copy_from_slice(&image[start..end]);
                Ok(())
            }
            None => Err(EngineError::Io(io::Error::new(
                ErrorKind::UnexpectedEof,
                "read past end of in-memory image",
            ))),
        }
    }

    fn write_at(&self, off: u64, src: &[u8]) -> Result<()> {
        let mut image = self.inner.write();
        let start = usize::try_from(off)
            .map_err(|_| EngineError::InvalidArgument("write offset exceeds usize".into()))?;
        let end = start
            .checked_add(src.len())
            .ok_or_else(|| EngineError::InvalidArgument("write offset overflow".into()))?;
        if image.len() < end {
            image.resize(end, 0);
        }
        image[start..end].copy_from_slice(src);
        Ok(())
    }

    fn sync_all(&self) -> Result<()> {
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.inner.read().len() as u64)
    }
}
