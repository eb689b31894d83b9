//! Out-of-core, vertex-centric graph computation.
//!
//! A graph image lives on storage as fixed-layout vertex records
//! ([`storage`]). The [`engine`] runs a user [`engine::VertexProgram`] against
//! every vertex, fetching the adjacency it asks for through an asynchronous
//! I/O channel and joining the two halves of directed vertices as they
//! arrive. [`primitives`] holds the fetch-buffer and positioned-I/O building
//! blocks both layers share; [`types`] holds identifiers and the error type.

pub mod engine;
pub mod primitives;
pub mod storage;
pub mod types;

pub use engine::{EngineOptions, VertexProgram, Worker};
pub use types::{EngineError, Result, VertexId};
