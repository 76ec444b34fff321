//! Web worker driver.
//!
//! The page posts JSON-encoded [`RequestEnvelope`](kerf_pipeline::protocol::RequestEnvelope)
//! strings; the worker posts back JSON-encoded response envelopes, each
//! carrying its request id so the page can drop stale ones. Scheduler
//! and generator live in thread-local state: a worker has exactly one
//! thread and message handlers never overlap a run, so no locking is
//! needed.

use std::cell::RefCell;

use gloo_timers::future::TimeoutFuture;
use kerf_export::SvgRenderer;
use kerf_pipeline::protocol::{decode_request, encode_response};
use kerf_pipeline::{GenerateResponse, Generator, PipelineConfig, Scheduler, Submission};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::{DEFAULT_QUIESCENCE, RequestHandler};

struct WorkerState {
    scheduler: Scheduler,
    generator: Generator,
}

thread_local! {
    static STATE: RefCell<WorkerState> = RefCell::new(WorkerState {
        scheduler: Scheduler::new(),
        generator: Generator::new(PipelineConfig::default()).with_renderer(SvgRenderer::new()),
    });
}

/// Worker entry point, called when the WASM module is instantiated in
/// the worker context.
#[wasm_bindgen(start)]
pub fn worker_main() {
    console_error_panic_hook::set_once();

    let Some(global) = worker_scope() else {
        web_sys::console::error_1(&"kerf worker: not running in a DedicatedWorkerGlobalScope".into());
        return;
    };

    let onmessage =
        Closure::<dyn FnMut(web_sys::MessageEvent)>::new(move |event: web_sys::MessageEvent| {
            handle_message(&event);
        });
    global.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
    onmessage.forget(); // leak: lives for the worker lifetime
}

fn handle_message(event: &web_sys::MessageEvent) {
    let Some(json) = event.data().as_string() else {
        web_sys::console::error_1(&"kerf worker: message is not a JSON string".into());
        return;
    };
    let request = match decode_request(&json) {
        Ok(request) => request,
        Err(e) => {
            web_sys::console::error_1(&format!("kerf worker: {e}").into());
            return;
        }
    };

    if STATE.with_borrow_mut(|state| state.scheduler.submit(request)) == Submission::Arm {
        wasm_bindgen_futures::spawn_local(run_pending());
    }
}

/// Wait out the quiescence delay, then run requests until none is
/// pending.
async fn run_pending() {
    TimeoutFuture::new(0).await;
    #[allow(clippy::cast_possible_truncation)]
    TimeoutFuture::new(DEFAULT_QUIESCENCE.as_millis() as u32).await;

    let mut next = STATE.with_borrow_mut(|state| state.scheduler.start());
    while let Some(request) = next {
        let response = STATE.with_borrow_mut(|state| state.generator.handle(&request));
        post_response(&response);
        // Let submissions queued during the run reach the scheduler.
        TimeoutFuture::new(0).await;
        next = STATE.with_borrow_mut(|state| state.scheduler.complete());
    }
}

fn post_response(response: &GenerateResponse) {
    let json = match encode_response(response) {
        Ok(json) => json,
        Err(e) => {
            web_sys::console::error_1(&format!("kerf worker: {e}").into());
            return;
        }
    };
    if let Some(global) = worker_scope()
        && let Err(e) = global.post_message(&JsValue::from_str(&json))
    {
        web_sys::console::error_2(&"kerf worker: postMessage failed".into(), &e);
    }
}

fn worker_scope() -> Option<web_sys::DedicatedWorkerGlobalScope> {
    js_sys::global()
        .dyn_into::<web_sys::DedicatedWorkerGlobalScope>()
        .ok()
}
