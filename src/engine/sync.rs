//! The synchronous engine: one worker, a plain heap, shared-nothing state.

use crate::context::StepContext;
use crate::engine::fetch::{resolve_archive_request_blocking, resolve_request_blocking};
use crate::engine::hooks::{Hooks, RunStatus, StopSignal};
use crate::engine::queue::RequestHeap;
use crate::engine::Flow;
use crate::error::Error;
use crate::interceptor::BlockingInterceptor;
use crate::request::{Request, RequestKind, ResolveContext, DEFAULT_PRIORITY};
use crate::response::Response;
use crate::scraper::{DataItem, Scraper, Yield};
use crate::transport::BlockingTransport;
use std::path::PathBuf;
use std::sync::Arc;

/// Single-worker engine. The queue is a plain heap and needs no locking;
/// the shutdown signal is checked before each pop.
pub struct SyncEngine<S: Scraper> {
    scraper: Arc<S>,
    interceptors: Vec<Arc<dyn BlockingInterceptor>>,
    hooks: Hooks<S::Output>,
    storage_dir: PathBuf,
    stop: StopSignal,
    transport: BlockingTransport,
}

impl<S: Scraper> SyncEngine<S> {
    /// Build an engine around a scraper with default transport, storage
    /// directory, and no interceptors or callbacks.
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
            transport: BlockingTransport::new()?,
        })
    }

    /// Append one interceptor. Request order is the order of these calls;
    /// response order is the reverse.
    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Arc<dyn BlockingInterceptor>) -> Self {
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
    pub fn with_transport(mut self, transport: BlockingTransport) -> Self {
        self.transport = transport;
        self
    }

    /// Run the scraper to completion (or until stopped).
    ///
    /// `on_run_start` fires before the entry request is produced;
    /// `on_run_complete` always fires, carrying the final status and error.
    ///
    /// # Errors
    ///
    /// Propagates any error not recovered by a callback.
    pub fn run(&self) -> Result<(), Error> {
        let scraper_name = self.scraper.name().to_string();
        if let Some(on_run_start) = &self.hooks.on_run_start {
            on_run_start(&scraper_name);
        }

        let result = self.run_inner();

        if let Some(on_run_complete) = &self.hooks.on_run_complete {
            match &result {
                Ok(()) => on_run_complete(&scraper_name, RunStatus::Completed, None),
                Err(error) => on_run_complete(&scraper_name, RunStatus::Errored, Some(error)),
            }
        }
        result
    }

    fn run_inner(&self) -> Result<(), Error> {
        if self.stop.is_triggered() {
            return Ok(());
        }

        let mut heap = RequestHeap::new();
        heap.push(self.scraper.entry()?);

        while !self.stop.is_triggered() {
            let Some(request) = heap.pop() else { break };
            match self.process(request, &mut heap)? {
                Flow::Continue => {}
                Flow::Stop => break,
            }
        }
        Ok(())
    }

    fn process(&self, request: Request, heap: &mut RequestHeap) -> Result<Flow, Error> {
        let origin = Arc::new(request);

        let resolved = if origin.kind == RequestKind::Archive {
            resolve_archive_request_blocking(
                &self.transport,
                &self.interceptors,
                Arc::clone(&origin),
                &self.hooks.archive_fn(),
                &self.storage_dir,
            )
        } else {
            resolve_request_blocking(&self.transport, &self.interceptors, Arc::clone(&origin))
        };

        let response = match resolved {
            Ok(response) => Arc::new(response),
            Err(Error::Transient(transient)) => {
                return match &self.hooks.on_transient_error {
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
        let step = self.scraper.continuation(&continuation_name)?;
        let encoding = self
            .scraper
            .step_metadata(&continuation_name)
            .unwrap_or_default()
            .encoding;

        let stream = step(StepContext::new(Arc::clone(&response), encoding));
        for item in stream {
            match item {
                Ok(Yield::Data(data)) => self.handle_data(data)?,
                Ok(Yield::Request(new_request)) => {
                    self.enqueue(new_request, &response, &origin, heap)?;
                }
                Ok(Yield::Nothing) => {}
                Err(Error::Assumption(assumption)) => {
                    return match &self.hooks.on_structural_error {
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

    fn handle_data(&self, data: DataItem<S::Output>) -> Result<(), Error> {
        match data {
            DataItem::Value(value) => {
                if let Some(on_data) = &self.hooks.on_data {
                    on_data(value);
                }
            }
            DataItem::Deferred(deferred) => match deferred.confirm() {
                Ok(value) => {
                    if let Some(on_data) = &self.hooks.on_data {
                        on_data(value);
                    }
                }
                Err(failure) => match &self.hooks.on_invalid_data {
                    Some(on_invalid) => on_invalid(&deferred),
                    None => return Err(crate::error::AssumptionError::DataFormat(failure).into()),
                },
            },
        }
        Ok(())
    }

    fn enqueue(
        &self,
        new_request: Request,
        response: &Arc<Response>,
        origin: &Arc<Request>,
        heap: &mut RequestHeap,
    ) -> Result<(), Error> {
        let context = match new_request.kind {
            RequestKind::Navigating => ResolveContext::Response(response),
            RequestKind::NonNavigating | RequestKind::Archive => ResolveContext::Request(origin),
        };
        let mut resolved = new_request.resolve_from(&context)?;

        // Inherit the target step's priority when the request kept the default
        if resolved.priority == DEFAULT_PRIORITY {
            if let Some(metadata) = self.scraper.step_metadata(&resolved.continuation) {
                resolved.priority = metadata.priority;
            }
        }

        if let Some(key) = resolved.effective_dedup_key() {
            if let Some(duplicate_check) = &self.hooks.duplicate_check {
                if !duplicate_check(&key) {
                    tracing::debug!(key, url = %resolved.http.url, "dropping duplicate request");
                    return Ok(());
                }
            }
        }

        heap.push(resolved);
        Ok(())
    }
}
