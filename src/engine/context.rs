use super::channel::IoChannel;
use super::index::IndexResolver;
use super::metrics::ComputeMetrics;
use super::program::VertexProgram;
use crate::storage::GraphHeader;

/// Borrowed view of the owning worker handed to a task for one callback.
///
/// Everything here belongs to the worker thread that owns the task; a task
/// never keeps any of it past the call it was passed to.
pub struct ComputeContext<'a> {
    pub(crate) graph: &'a GraphHeader,
    pub(crate) channel: &'a mut dyn IoChannel,
    pub(crate) index: &'a mut dyn IndexResolver,
    pub(crate) program: &'a mut dyn VertexProgram,
    pub(crate) metrics: &'a dyn ComputeMetrics,
}

impl<'a> ComputeContext<'a> {
    pub fn new(
        graph: &'a GraphHeader,
        channel: &'a mut dyn IoChannel,
        index: &'a mut dyn IndexResolver,
        program: &'a mut dyn VertexProgram,
        metrics: &'a dyn ComputeMetrics,
    ) -> Self {
        Self {
            graph,
            channel,
            index,
            program,
            metrics,
        }
    }

    pub fn graph(&self) -> &GraphHeader {
        self.graph
    }
}
