//! Stable min-priority queues for scheduled requests.
//!
//! Ordering is `(priority, insertion sequence)`: lower priority values pop
//! first, and equal priorities pop in insertion order. The sequence counter
//! is incremented inside the same critical section as the push, which is
//! what makes the FIFO tie-break reliable under concurrency.

use crate::request::Request;
use std::collections::BinaryHeap;
use tokio::sync::{Mutex, Notify};

struct Entry {
    priority: i32,
    seq: u64,
    request: Request,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so the std max-heap behaves as a min-heap
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (other.priority, other.seq).cmp(&(self.priority, self.seq))
    }
}

/// Single-threaded queue for the synchronous engine. No locking: the sync
/// engine is shared-nothing.
#[derive(Default)]
pub(crate) struct RequestHeap {
    heap: BinaryHeap<Entry>,
    seq: u64,
}

impl RequestHeap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, request: Request) {
        let entry = Entry {
            priority: request.priority,
            seq: self.seq,
            request,
        };
        self.seq += 1;
        self.heap.push(entry);
    }

    pub(crate) fn pop(&mut self) -> Option<Request> {
        self.heap.pop().map(|entry| entry.request)
    }
}

struct QueueState {
    heap: BinaryHeap<Entry>,
    seq: u64,
    /// Requests pushed but not yet marked done. Includes in-flight work, so
    /// the join loop only completes when the queue is empty *and* no worker
    /// is processing.
    unfinished: usize,
}

/// Shared queue for the asynchronous engine.
pub(crate) struct AsyncQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl AsyncQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                seq: 0,
                unfinished: 0,
            }),
            notify: Notify::new(),
        }
    }

    pub(crate) async fn push(&self, request: Request) {
        {
            let mut state = self.state.lock().await;
            let entry = Entry {
                priority: request.priority,
                seq: state.seq,
                request,
            };
            state.seq += 1;
            state.unfinished += 1;
            state.heap.push(entry);
        }
        self.notify.notify_one();
    }

    /// Pop the smallest entry, waiting until one is available. Cancelled by
    /// aborting the waiting worker on shutdown.
    pub(crate) async fn pop(&self) -> Request {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().await;
                if let Some(entry) = state.heap.pop() {
                    return entry.request;
                }
            }
            notified.await;
        }
    }

    /// Mark one previously popped request as fully processed.
    pub(crate) async fn task_done(&self) {
        let mut state = self.state.lock().await;
        state.unfinished = state.unfinished.saturating_sub(1);
    }

    pub(crate) async fn unfinished(&self) -> usize {
        self.state.lock().await.unfinished
    }

    /// Discard all queued entries so the join accounting can settle during
    /// shutdown. In-flight requests still count until their `task_done`.
    pub(crate) async fn drain(&self) {
        let mut state = self.state.lock().await;
        let dropped = state.heap.len();
        state.heap.clear();
        state.unfinished = state.unfinished.saturating_sub(dropped);
    }
}
