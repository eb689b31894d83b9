//! Low-level primitives for building the compute engine.
//!
//! Includes fetch-buffer types and positioned I/O abstractions.

/// Fetch buffers and byte-level helpers.
///
/// Borrowed and owned views over fetched bytes, plus little-endian field access.
pub mod bytes;

/// I/O abstractions and utilities.
///
/// Positioned reads and writes over files or in-memory images, and the
/// descriptors that name one read.
pub mod io;
