//! Directed vertices: joining in-edge and out-edge halves.
//!
//! A full directed fetch issues two reads, one per half. Whichever completes
//! first is copied out of its transient buffer and parked in the task's
//! [`CorrelationMap`]; the second arrival joins with it and the program runs
//! once over the merged view. Which half a buffer holds is decided by its
//! storage offset, never by arrival order.

use std::mem;

use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use super::channel::IoRequest;
use super::context::ComputeContext;
use super::task::{ComputeTask, TaskKind};
use super::view::{PageDirectedVertex, VertexView};
use crate::primitives::bytes::{OwnedPage, PageView};
use crate::storage::VertexInfo;
use crate::types::{EngineError, Result, VertexId};

#[derive(Debug)]
pub(crate) enum PairState {
    /// Neither half has arrived.
    Absent,
    /// One half arrived and was copied here.
    HalfReceived(OwnedPage),
    /// One half failed; the sibling completes the request without running the program.
    Failed,
}

#[derive(Debug)]
pub(crate) struct PairEntry {
    in_info: VertexInfo,
    out_info: VertexInfo,
    state: PairState,
    /// Further full fetches of the same id waiting for this pair to finish.
    deferred: u32,
}

/// Pairs in flight for one task, keyed by the fetched vertex.
#[derive(Debug, Default)]
pub(crate) struct CorrelationMap {
    entries: FxHashMap<VertexId, PairEntry>,
}

impl CorrelationMap {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn buffered_halves(&self) -> usize {
        self.entries
            .values()
            .filter(|e| matches!(e.state, PairState::HalfReceived(_)))
            .count()
    }
}

enum PairStep {
    Buffered,
    Join(OwnedPage),
    SiblingFailed,
}

impl ComputeTask {
    fn pairs_mut(&mut self) -> Result<&mut CorrelationMap> {
        let task = self.id();
        match &mut self.kind {
            TaskKind::Directed(map) => Ok(map),
            TaskKind::Undirected => Err(EngineError::invariant(format!(
                "{task} has no correlation map"
            ))),
        }
    }

    /// Pairs in flight, or zero for an undirected task.
    pub fn pairs_in_flight(&self) -> usize {
        match &self.kind {
            TaskKind::Directed(map) => map.len(),
            TaskKind::Undirected => 0,
        }
    }

    /// Halves copied out of their fetch buffers and waiting for a sibling.
    pub fn buffered_halves(&self) -> usize {
        match &self.kind {
            TaskKind::Directed(map) => map.buffered_halves(),
            TaskKind::Undirected => 0,
        }
    }

    /// Issues both halves of a directed vertex.
    ///
    /// A second full fetch of an id whose pair is still in flight waits until
    /// that pair finishes, so at most one half per id is ever buffered.
    pub fn issue_paired_fetch(
        &mut self,
        cx: &mut ComputeContext<'_>,
        in_info: VertexInfo,
        out_info: VertexInfo,
    ) -> Result<()> {
        if in_info.id != out_info.id {
            return Err(EngineError::InvalidArgument(format!(
                "pair halves name {} and {}",
                in_info.id, out_info.id
            )));
        }
        let id = in_info.id;
        let map = self.pairs_mut()?;
        if let Some(entry) = map.entries.get_mut(&id) {
            entry.deferred += 1;
            trace!(%id, deferred = entry.deferred, "pair already in flight");
            return Ok(());
        }
        map.entries.insert(
            id,
            PairEntry {
                in_info,
                out_info,
                state: PairState::Absent,
                deferred: 0,
            },
        );
        self.dispatch_fetch(cx, in_info, true);
        self.dispatch_fetch(cx, out_info, true);
        Ok(())
    }

    pub(crate) fn on_directed_arrival(
        &mut self,
        cx: &mut ComputeContext<'_>,
        request: &IoRequest,
        buffer: PageView<'_>,
    ) -> Result<()> {
        let is_in = cx.graph.is_in_part(buffer.offset());
        if !request.paired {
            let vertex = match PageDirectedVertex::from_half(buffer, is_in) {
                Ok(v) if v.id() == request.vertex => v,
                Ok(v) => {
                    warn!(
                        task = %self.id(),
                        expected = %request.vertex,
                        found = %v.id(),
                        "fetched half belongs to another vertex"
                    );
                    return self.fail_one_request(cx);
                }
                Err(err) => {
                    warn!(
                        task = %self.id(),
                        vertex = %request.vertex,
                        %err,
                        "undecodable half record"
                    );
                    return self.fail_one_request(cx);
                }
            };
            let view = VertexView::Directed(vertex);
            self.invoke(cx, |program, owner, sink| program.run(owner, &view, sink))?;
            return self.complete_one_request(cx);
        }

        let id = request.vertex;
        let step = {
            let entry = self.pairs_mut()?.entries.get_mut(&id).ok_or_else(|| {
                EngineError::invariant(format!("half of {id} arrived with no pair in flight"))
            })?;
            match mem::replace(&mut entry.state, PairState::Absent) {
                PairState::Absent => {
                    entry.state = PairState::HalfReceived(buffer.to_owned_page());
                    PairStep::Buffered
                }
                PairState::HalfReceived(page) => PairStep::Join(page),
                PairState::Failed => PairStep::SiblingFailed,
            }
        };

        match step {
            PairStep::Buffered => {
                trace!(task = %self.id(), %id, in_half = is_in, "first half buffered");
                cx.metrics.half_buffered();
                Ok(())
            }
            PairStep::SiblingFailed => {
                self.finish_pair(cx, id)?;
                self.fail_one_request(cx)
            }
            PairStep::Join(page) => {
                let buffered = page.as_view();
                if cx.graph.is_in_part(buffered.offset()) == is_in {
                    return Err(EngineError::invariant(format!(
                        "both halves of {id} came from the same region"
                    )));
                }
                let (in_view, out_view) = if is_in {
                    (buffer, buffered)
                } else {
                    (buffered, buffer)
                };
                let joined = match PageDirectedVertex::from_pair(in_view, out_view) {
                    Ok(v) if v.id() == id => Some(v),
                    Ok(v) => {
                        warn!(
                            task = %self.id(),
                            expected = %id,
                            found = %v.id(),
                            "joined pair belongs to another vertex"
                        );
                        None
                    }
                    Err(err) => {
                        warn!(task = %self.id(), %id, %err, "undecodable pair");
                        None
                    }
                };
                match joined {
                    Some(vertex) => {
                        let view = VertexView::Directed(vertex);
                        self.invoke(cx, |program, owner, sink| program.run(owner, &view, sink))?;
                        self.finish_pair(cx, id)?;
                        self.complete_one_request(cx)
                    }
                    None => {
                        self.finish_pair(cx, id)?;
                        self.fail_one_request(cx)
                    }
                }
            }
        }
    }

    pub(crate) fn on_directed_failure(
        &mut self,
        cx: &mut ComputeContext<'_>,
        id: VertexId,
    ) -> Result<()> {
        let sibling_done = {
            let entry = self.pairs_mut()?.entries.get_mut(&id).ok_or_else(|| {
                EngineError::invariant(format!("failed half of {id} has no pair in flight"))
            })?;
            match entry.state {
                PairState::Absent => {
                    entry.state = PairState::Failed;
                    false
                }
                PairState::HalfReceived(_) | PairState::Failed => true,
            }
        };
        if !sibling_done {
            debug!(task = %self.id(), %id, "first half failed, waiting for sibling");
            return Ok(());
        }
        self.finish_pair(cx, id)?;
        self.fail_one_request(cx)
    }

    /// Drops the finished pair of `id` and starts the next deferred one, if any.
    fn finish_pair(&mut self, cx: &mut ComputeContext<'_>, id: VertexId) -> Result<()> {
        let entry = self
            .pairs_mut()?
            .entries
            .remove(&id)
            .ok_or_else(|| EngineError::invariant(format!("pair of {id} finished twice")))?;
        if entry.deferred == 0 {
            return Ok(());
        }
        let (in_info, out_info) = (entry.in_info, entry.out_info);
        self.pairs_mut()?.entries.insert(
            id,
            PairEntry {
                in_info,
                out_info,
                state: PairState::Absent,
                deferred: entry.deferred - 1,
            },
        );
        self.dispatch_fetch(cx, in_info, true);
        self.dispatch_fetch(cx, out_info, true);
        Ok(())
    }
}
