#![forbid(unsafe_code)]
//! Identifiers, the engine error type, and checksum helpers shared by every layer.

use std::fmt;
use std::io;

use thiserror::Error;

pub mod checksum;

pub use checksum::header_crc32;

/// Dense identifier of a vertex in a stored graph.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct VertexId(pub u32);

impl VertexId {
    /// Returns the identifier as a `usize` suitable for indexing.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u32> for VertexId {
    fn from(raw: u32) -> Self {
        VertexId(raw)
    }
}

/// Identifier of a storage object (one graph image) addressed by requests.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct FileId(pub u32);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

/// Generation-checked handle to a compute task held by a [`crate::engine::TaskAllocator`].
///
/// The slot index is reused after the task is reclaimed; the generation is not,
/// so a handle to a reclaimed task never resolves to its successor.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct TaskId {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

impl TaskId {
    /// Slot index inside the allocator.
    pub fn slot(self) -> u32 {
        self.slot
    }

    /// Generation of the slot when this handle was issued.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}.{}", self.slot, self.generation)
    }
}

/// Errors raised by the storage layer and the compute engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A pending request was popped from an empty task queue.
    #[error("pending request queue of {0} is empty")]
    EmptyQueue(VertexId),
    /// A task was unregistered from a scheduler it is not a member of.
    #[error("{0} is not a member of the scheduler")]
    NotMember(TaskId),
    /// A lifecycle or ownership contract was broken.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// Stored bytes do not decode into what the layout promises.
    #[error("corruption detected: {0}")]
    Corruption(String),
    /// Caller supplied an unusable argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Configuration could not be read or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        EngineError::InvariantViolation(msg.into())
    }

    /// Returns true for the contract violations that must abort a run.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            EngineError::EmptyQueue(_)
                | EngineError::NotMember(_)
                | EngineError::InvariantViolation(_)
        )
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_violations_are_classified() {
        assert!(EngineError::EmptyQueue(VertexId(3)).is_contract_violation());
        assert!(EngineError::invariant("dup").is_contract_violation());
        assert!(!EngineError::Corruption("bad".into()).is_contract_violation());
        let io = io::Error::new(io::ErrorKind::UnexpectedEof, "short");
        assert!(!EngineError::from(io).is_contract_violation());
    }

    #[test]
    fn display_includes_identifiers() {
        let id = TaskId {
            slot: 4,
            generation: 2,
        };
        assert_eq!(
            EngineError::NotMember(id).to_string(),
            "task#4.2 is not a member of the scheduler"
        );
        assert_eq!(VertexId(42).to_string(), "v42");
    }
}
