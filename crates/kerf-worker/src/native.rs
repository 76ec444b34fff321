//! Native driver: a tokio task owning the scheduler.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use kerf_pipeline::{GenerateRequest, GenerateResponse, ResponseGate, Scheduler, Submission};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::RequestHandler;

/// Foreground side of a running background generator.
///
/// Dropping the handle closes the request channel; the task finishes any
/// run in flight and exits.
#[derive(Debug)]
pub struct WorkerHandle {
    requests: mpsc::UnboundedSender<GenerateRequest>,
    responses: mpsc::UnboundedReceiver<GenerateResponse>,
    gate: ResponseGate,
    task: JoinHandle<()>,
}

/// Start a background generator on the current tokio runtime.
///
/// Requests submitted through the returned handle are coalesced: after
/// the first submission of a burst the task waits `quiescence`, then
/// runs only the most recent request. Submissions arriving while a run
/// is executing replace the pending request and start as soon as that
/// run completes.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
#[must_use = "dropping the handle stops the worker"]
pub fn spawn(handler: impl RequestHandler, quiescence: Duration) -> WorkerHandle {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (response_tx, response_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(drive(handler, quiescence, request_rx, response_tx));
    WorkerHandle {
        requests: request_tx,
        responses: response_rx,
        gate: ResponseGate::new(),
        task,
    }
}

impl WorkerHandle {
    /// Queue a request. Returns `false` if the worker has stopped.
    pub fn submit(&self, request: GenerateRequest) -> bool {
        self.requests.send(request).is_ok()
    }

    /// Next response in completion order, stale or not.
    ///
    /// Returns `None` once the worker has stopped and every response has
    /// been delivered.
    pub async fn recv(&mut self) -> Option<GenerateResponse> {
        self.responses.recv().await
    }

    /// Next response newer than every response this method returned
    /// before. Older responses are discarded.
    pub async fn recv_latest(&mut self) -> Option<GenerateResponse> {
        loop {
            let response = self.responses.recv().await?;
            if self.gate.accept(response.id) {
                return Some(response);
            }
        }
    }

    /// Stop accepting requests and wait for the task to finish.
    pub async fn shutdown(self) {
        let Self { requests, task, .. } = self;
        drop(requests);
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "worker task ended abnormally");
        }
    }
}

async fn drive<H: RequestHandler>(
    handler: H,
    quiescence: Duration,
    mut requests: mpsc::UnboundedReceiver<GenerateRequest>,
    responses: mpsc::UnboundedSender<GenerateResponse>,
) {
    let mut scheduler = Scheduler::new();
    let mut handler = Some(handler);

    while let Some(request) = requests.recv().await {
        if scheduler.submit(request) == Submission::Queued {
            continue;
        }

        // Let near-simultaneous submissions land before choosing a run.
        tokio::task::yield_now().await;
        tokio::time::sleep(quiescence).await;
        while let Ok(request) = requests.try_recv() {
            scheduler.submit(request);
        }

        let mut next = scheduler.start();
        while let Some(request) = next {
            let Some(current) = handler.take() else {
                return;
            };
            let mut job = tokio::task::spawn_blocking(move || run_guarded(current, &request));

            let outcome = loop {
                // Fold every queued submission in before observing completion.
                tokio::select! {
                    biased;
                    Some(request) = requests.recv() => {
                        scheduler.submit(request);
                    }
                    done = &mut job => break done,
                }
            };

            match outcome {
                Ok((returned, response)) => {
                    handler = Some(returned);
                    if responses.send(response).is_err() {
                        tracing::debug!("response receiver dropped, stopping worker");
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "pipeline job did not complete");
                    return;
                }
            }

            next = scheduler.complete();
        }
    }

    tracing::debug!("request channel closed, worker exiting");
}

/// Run one request, converting a panic into an error response.
fn run_guarded<H: RequestHandler>(mut handler: H, request: &GenerateRequest) -> (H, GenerateResponse) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(request)));
    let response = result.unwrap_or_else(|_| {
        tracing::warn!(id = request.id, "pipeline panicked");
        GenerateResponse::error(request.id, "pipeline panicked")
    });
    (handler, response)
}
