//! The scheduler engines: a synchronous single-worker loop and an
//! asynchronous multi-worker pool over a shared priority queue.
//!
//! Both engines drive the same pipeline: pop the lowest-priority request,
//! run it through the interceptor chain, fetch (unless short-circuited),
//! dispatch the response to the named continuation, and route every yield:
//! data to the data callbacks, new requests back onto the queue.

pub(crate) mod fetch;
pub mod hooks;
pub(crate) mod queue;
pub mod sync;
pub mod workers;

pub use hooks::{Hooks, RunStatus, StopSignal};
pub use sync::SyncEngine;
pub use workers::AsyncEngine;

/// What a worker does after finishing one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    /// Move on to the next queued request.
    Continue,
    /// Stop this worker; a recovery callback declined to continue.
    Stop,
}
