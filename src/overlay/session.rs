use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use super::OverlayRun;

/// Receives a complete set of runs. Previously applied runs are cleared first.
pub trait RenderSink {
    fn clear(&mut self);
    fn apply(&mut self, runs: &[OverlayRun]);
}

/// In-memory text layer.
#[derive(Debug, Default, Clone)]
pub struct TextLayer {
    runs: Vec<OverlayRun>,
}

impl TextLayer {
    pub fn runs(&self) -> &[OverlayRun] {
        &self.runs
    }

    pub fn into_runs(self) -> Vec<OverlayRun> {
        self.runs
    }
}

impl RenderSink for TextLayer {
    fn clear(&mut self) {
        self.runs.clear();
    }

    fn apply(&mut self, runs: &[OverlayRun]) {
        self.runs.extend_from_slice(runs);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassTicket {
    generation: u64,
}

impl PassTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Orders layout passes triggered by decode and resize events.
///
/// Each pass takes a ticket before it starts. Only the newest ticket may commit, and a
/// commit never lands after a newer one.
#[derive(Debug, Default)]
pub struct LayoutSession {
    issued: AtomicU64,
    applied: Mutex<u64>,
}

impl LayoutSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_pass(&self) -> PassTicket {
        let generation = self.issued.fetch_add(1, Ordering::AcqRel) + 1;
        PassTicket { generation }
    }

    pub fn is_current(&self, ticket: PassTicket) -> bool {
        self.issued.load(Ordering::Acquire) == ticket.generation
    }

    /// Replaces the sink's contents with `runs` if the pass is still current.
    pub fn commit<S>(&self, ticket: PassTicket, runs: &[OverlayRun], sink: &mut S) -> bool
    where
        S: RenderSink + ?Sized,
    {
        let mut applied = match self.applied.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !self.is_current(ticket) || ticket.generation <= *applied {
            debug!(generation = ticket.generation, "discarding superseded layout pass");
            return false;
        }
        sink.clear();
        sink.apply(runs);
        *applied = ticket.generation;
        true
    }
}
