//! The shared Tokio runtime the dispatcher's worker pool runs on.
//!
//! Mirrors the common pattern of a single, lazily-initialized multi-thread
//! runtime sized from an environment variable, rather than a runtime per
//! `EventBus` instance.

use std::sync::OnceLock;

use tokio::runtime::Builder;

use crate::config::EVENTBUS_WORKER_THREADS;

static RUNTIME: OnceLock<tokio::runtime::Runtime> = OnceLock::new();

/// 0 means Tokio picks the default (number of logical CPUs).
const DEFAULT_OS_THREADS: usize = 0;

fn initialize_runtime() -> tokio::runtime::Runtime {
    let worker_threads = std::env::var(EVENTBUS_WORKER_THREADS)
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(DEFAULT_OS_THREADS);

    let mut builder = Builder::new_multi_thread();
    let builder = if worker_threads > 0 {
        builder.worker_threads(worker_threads)
    } else {
        &mut builder
    };

    builder
        .enable_all()
        .build()
        .expect("failed to create the event bus Tokio runtime")
}

/// Returns a reference to the shared event bus runtime, initializing it on
/// first use.
pub fn get_runtime() -> &'static tokio::runtime::Runtime {
    RUNTIME.get_or_init(initialize_runtime)
}
