//! Background execution contexts for the kerf pipeline.
//!
//! The heavy pipeline never runs on the interactive thread. This crate
//! drives the sans-IO [`Scheduler`](kerf_pipeline::Scheduler) from a
//! background context and moves requests and responses across the
//! boundary by message passing only:
//!
//! - on native targets, a tokio task ([`spawn`]) that runs the pipeline
//!   on the blocking pool;
//! - on `wasm32`, a `DedicatedWorkerGlobalScope` entry point that
//!   exchanges versioned JSON envelopes over `postMessage`.
//!
//! Both drivers wait out a short quiescence delay before starting a run
//! so near-simultaneous submissions coalesce, and both start the next
//! pending request immediately when a run completes.

use std::time::Duration;

use kerf_pipeline::{GenerateRequest, GenerateResponse, Generator};

#[cfg(not(target_arch = "wasm32"))]
mod native;
#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(not(target_arch = "wasm32"))]
pub use native::{WorkerHandle, spawn};

/// Delay between the first submission of a burst and the start of its
/// run.
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(16);

/// The work a background context performs for each scheduled request.
pub trait RequestHandler: Send + 'static {
    /// Answer one request.
    fn handle(&mut self, request: &GenerateRequest) -> GenerateResponse;
}

impl RequestHandler for Generator {
    fn handle(&mut self, request: &GenerateRequest) -> GenerateResponse {
        self.generate(request)
    }
}
