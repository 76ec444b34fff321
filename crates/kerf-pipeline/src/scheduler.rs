//! Request coalescing for the background generator.
//!
//! [`Scheduler`] is the whole state machine and does no I/O: a driver
//! (tokio task, web worker) feeds it submissions, asks it what to run and
//! reports completions. It holds at most one pending request and at most
//! one run in flight. Newer submissions overwrite the pending slot, so a
//! burst of edits collapses into a single run using the last one. A run
//! in flight is never cancelled.
//!
//! [`ResponseGate`] is the consumer half: it admits only responses whose
//! id is higher than any admitted before.

use crate::protocol::GenerateRequest;

/// What a driver should do after [`Scheduler::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Nothing is running or armed: wait out the quiescence delay, then
    /// call [`Scheduler::start`].
    Arm,
    /// A run or an armed start will pick the request up.
    Queued,
}

/// Single-slot, last-writer-wins request scheduler.
#[derive(Debug, Default)]
pub struct Scheduler {
    pending: Option<GenerateRequest>,
    in_flight: bool,
    armed: bool,
}

impl Scheduler {
    /// Create an idle scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `request` as the pending request, replacing any older one.
    pub fn submit(&mut self, request: GenerateRequest) -> Submission {
        let id = request.id;
        if let Some(superseded) = self.pending.replace(request) {
            tracing::debug!(superseded = superseded.id, by = id, "coalesced request");
        }
        if self.in_flight || self.armed {
            Submission::Queued
        } else {
            self.armed = true;
            Submission::Arm
        }
    }

    /// Begin a run after the quiescence delay.
    ///
    /// Returns the request to run, or `None` if a run is already in
    /// flight or nothing is pending.
    pub fn start(&mut self) -> Option<GenerateRequest> {
        self.armed = false;
        if self.in_flight {
            return None;
        }
        let request = self.pending.take()?;
        self.in_flight = true;
        tracing::debug!(id = request.id, "starting run");
        Some(request)
    }

    /// Finish the run in flight, successful or not.
    ///
    /// Returns the next request to run immediately, if one arrived while
    /// the previous run was busy.
    pub fn complete(&mut self) -> Option<GenerateRequest> {
        self.in_flight = false;
        let request = self.pending.take()?;
        self.in_flight = true;
        tracing::debug!(id = request.id, "starting queued run");
        Some(request)
    }

    /// Whether a run is executing.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Id of the request waiting for the next run.
    #[must_use]
    pub fn pending_id(&self) -> Option<u64> {
        self.pending.as_ref().map(|r| r.id)
    }
}

/// Admits responses in increasing id order, dropping stale ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseGate {
    latest: Option<u64>,
}

impl ResponseGate {
    /// Create a gate that has admitted nothing.
    #[must_use]
    pub const fn new() -> Self {
        Self { latest: None }
    }

    /// Whether a response with `id` should be applied.
    ///
    /// Admitting an id raises the bar for every later response.
    pub fn accept(&mut self, id: u64) -> bool {
        if self.latest.is_some_and(|latest| id <= latest) {
            tracing::debug!(id, latest = self.latest, "discarding stale response");
            return false;
        }
        self.latest = Some(id);
        true
    }

    /// Highest id admitted so far.
    #[must_use]
    pub const fn latest(&self) -> Option<u64> {
        self.latest
    }
}
