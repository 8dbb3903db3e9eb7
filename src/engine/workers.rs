//! The asynchronous engine: N cooperative workers over one shared queue.
//!
//! Workers suspend on queue pops and HTTP I/O. Shutdown is completion-safe:
//! the signal is observed before each pop and by the run's poll loop, queued
//! work is drained, in-flight requests run to completion, and only then are
//! idle workers cancelled.

use crate::context::StepContext;
use crate::engine::fetch::{resolve_archive_request, resolve_request};
use crate::engine::hooks::{Hooks, RunStatus, StopSignal};
use crate::engine::queue::AsyncQueue;
use crate::engine::Flow;
use crate::error::Error;
use crate::interceptor::Interceptor;
use crate::request::{Request, RequestKind, ResolveContext, DEFAULT_PRIORITY};
use crate::response::Response;
use crate::scraper::{DataItem, Scraper, Yield};
use crate::transport::AsyncTransport;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Multi-worker engine over a shared priority queue.
pub struct AsyncEngine<S: Scraper> {
    scraper: Arc<S>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    hooks: Hooks<S::Output>,
    storage_dir: PathBuf,
    stop: StopSignal,
    num_workers: usize,
    transport: AsyncTransport,
}

/// State shared by the run loop and every worker task.
struct Shared<S: Scraper> {
    scraper: Arc<S>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    hooks: Hooks<S::Output>,
    storage_dir: PathBuf,
    stop: StopSignal,
    transport: AsyncTransport,
    queue: AsyncQueue,
}

impl<S: Scraper> AsyncEngine<S> {
    /// Build an engine around a scraper with default transport, storage
    /// directory, one worker, and no interceptors or callbacks.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP clients cannot be constructed.
    pub fn new(scraper: S) -> Result<Self, Error> {
        Ok(Self {
            scraper: Arc::new(scraper),
            interceptors: Vec::new(),
            hooks: Hooks::new(),
            storage_dir: std::env::temp_dir().join("docketeer_files"),
            stop: StopSignal::new(),
            num_workers: 1,
            transport: AsyncTransport::new()?,
        })
    }

    /// Append one interceptor. Request order is the order of these calls;
    /// response order is the reverse.
    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Hooks<S::Output>) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    #[must_use]
    pub const fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: AsyncTransport) -> Self {
        self.transport = transport;
        self
    }

    /// Run the scraper to completion (or until stopped).
    ///
    /// # Errors
    ///
    /// Propagates the first worker error not recovered by a callback.
    pub async fn run(&self) -> Result<(), Error> {
        let scraper_name = self.scraper.name().to_string();
        if let Some(on_run_start) = &self.hooks.on_run_start {
            on_run_start(&scraper_name);
        }

        let result = self.run_inner().await;

        if let Some(on_run_complete) = &self.hooks.on_run_complete {
            match &result {
                Ok(()) => on_run_complete(&scraper_name, RunStatus::Completed, None),
                Err(error) => on_run_complete(&scraper_name, RunStatus::Errored, Some(error)),
            }
        }
        result
    }

    async fn run_inner(&self) -> Result<(), Error> {
        if self.stop.is_triggered() {
            return Ok(());
        }

        let shared = Arc::new(Shared {
            scraper: Arc::clone(&self.scraper),
            interceptors: self.interceptors.clone(),
            hooks: self.hooks.clone(),
            storage_dir: self.storage_dir.clone(),
            stop: self.stop.clone(),
            transport: self.transport.clone(),
            queue: AsyncQueue::new(),
        });
        shared.queue.push(self.scraper.entry()?).await;

        let mut workers: JoinSet<Result<(), Error>> = JoinSet::new();
        for worker_id in 0..self.num_workers.max(1) {
            let shared = Arc::clone(&shared);
            workers.spawn(async move { worker(&shared, worker_id).await });
        }

        let mut first_error: Option<Error> = None;

        // Join loop: poll the stop signal and the queue accounting with a
        // short timeout, reaping finished workers as we go.
        loop {
            reap_finished(&mut workers, &mut first_error);

            if self.stop.is_triggered() {
                shared.queue.drain().await;
                // Let in-flight requests run to completion before cancelling
                while shared.queue.unfinished().await > 0 && !workers.is_empty() {
                    reap_finished(&mut workers, &mut first_error);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                break;
            }
            if shared.queue.unfinished().await == 0 {
                break;
            }
            if workers.is_empty() {
                // Every worker stopped or crashed with work still queued
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        // Cancel workers idling on the queue
        workers.abort_all();
        while let Some(joined) = workers.join_next().await {
            record_outcome(joined, &mut first_error);
        }

        first_error.map_or(Ok(()), Err)
    }
}

fn reap_finished(
    workers: &mut JoinSet<Result<(), Error>>,
    first_error: &mut Option<Error>,
) {
    while let Some(joined) = workers.try_join_next() {
        record_outcome(joined, first_error);
    }
}

fn record_outcome(
    joined: Result<Result<(), Error>, tokio::task::JoinError>,
    first_error: &mut Option<Error>,
) {
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            tracing::error!(error = %error, "worker failed");
            if first_error.is_none() {
                *first_error = Some(error);
            }
        }
        Err(join_error) if join_error.is_panic() => {
            tracing::error!(error = %join_error, "worker panicked");
            if first_error.is_none() {
                *first_error = Some(Error::scheduler(format!("worker panicked: {join_error}")));
            }
        }
        // Cancellation during shutdown is expected
        Err(_) => {}
    }
}

async fn worker<S: Scraper>(shared: &Arc<Shared<S>>, worker_id: usize) -> Result<(), Error> {
    loop {
        if shared.stop.is_triggered() {
            tracing::debug!(worker_id, "worker observed stop signal");
            break;
        }

        let request = shared.queue.pop().await;
        let outcome = process(shared, request).await;
        shared.queue.task_done().await;

        match outcome {
            Ok(Flow::Continue) => {}
            Ok(Flow::Stop) => {
                tracing::debug!(worker_id, "worker stopped by recovery callback");
                break;
            }
            Err(error) => return Err(error),
        }
    }
    Ok(())
}

async fn process<S: Scraper>(shared: &Arc<Shared<S>>, request: Request) -> Result<Flow, Error> {
    let origin = Arc::new(request);

    let resolved = if origin.kind == RequestKind::Archive {
        resolve_archive_request(
            &shared.transport,
            &shared.interceptors,
            Arc::clone(&origin),
            &shared.hooks.archive_fn(),
            &shared.storage_dir,
        )
        .await
    } else {
        resolve_request(
            &shared.transport,
            &shared.interceptors,
            Arc::clone(&origin),
        )
        .await
    };

    let response = match resolved {
        Ok(response) => Arc::new(response),
        Err(Error::Transient(transient)) => {
            return match &shared.hooks.on_transient_error {
                Some(on_transient) => Ok(if on_transient(&transient) {
                    Flow::Continue
                } else {
                    Flow::Stop
                }),
                None => Err(transient.into()),
            };
        }
        Err(other) => return Err(other),
    };

    let continuation_name = origin.continuation.clone();
    let step = shared.scraper.continuation(&continuation_name)?;
    let encoding = shared
        .scraper
        .step_metadata(&continuation_name)
        .unwrap_or_default()
        .encoding;

    let stream = step(StepContext::new(Arc::clone(&response), encoding));
    for item in stream {
        match item {
            Ok(Yield::Data(data)) => handle_data(shared, data)?,
            Ok(Yield::Request(new_request)) => {
                enqueue(shared, new_request, &response, &origin).await?;
            }
            Ok(Yield::Nothing) => {}
            Err(Error::Assumption(assumption)) => {
                return match &shared.hooks.on_structural_error {
                    Some(on_structural) => Ok(if on_structural(&assumption) {
                        Flow::Continue
                    } else {
                        Flow::Stop
                    }),
                    None => Err(assumption.into()),
                };
            }
            Err(other) => return Err(other),
        }
    }
    Ok(Flow::Continue)
}

fn handle_data<S: Scraper>(shared: &Arc<Shared<S>>, data: DataItem<S::Output>) -> Result<(), Error> {
    match data {
        DataItem::Value(value) => {
            if let Some(on_data) = &shared.hooks.on_data {
                on_data(value);
            }
        }
        DataItem::Deferred(deferred) => match deferred.confirm() {
            Ok(value) => {
                if let Some(on_data) = &shared.hooks.on_data {
                    on_data(value);
                }
            }
            Err(failure) => match &shared.hooks.on_invalid_data {
                Some(on_invalid) => on_invalid(&deferred),
                None => return Err(crate::error::AssumptionError::DataFormat(failure).into()),
            },
        },
    }
    Ok(())
}

async fn enqueue<S: Scraper>(
    shared: &Arc<Shared<S>>,
    new_request: Request,
    response: &Arc<Response>,
    origin: &Arc<Request>,
) -> Result<(), Error> {
    let context = match new_request.kind {
        RequestKind::Navigating => ResolveContext::Response(response),
        RequestKind::NonNavigating | RequestKind::Archive => ResolveContext::Request(origin),
    };
    let mut resolved = new_request.resolve_from(&context)?;

    // Inherit the target step's priority when the request kept the default
    if resolved.priority == DEFAULT_PRIORITY {
        if let Some(metadata) = shared.scraper.step_metadata(&resolved.continuation) {
            resolved.priority = metadata.priority;
        }
    }

    if let Some(key) = resolved.effective_dedup_key() {
        if let Some(duplicate_check) = &shared.hooks.duplicate_check {
            if !duplicate_check(&key) {
                tracing::debug!(key, url = %resolved.http.url, "dropping duplicate request");
                return Ok(());
            }
        }
    }

    shared.queue.push(resolved).await;
    Ok(())
}
