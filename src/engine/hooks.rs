//! User callbacks and the shutdown signal.
//!
//! Every hook is optional. Hooks are plain `Arc<dyn Fn>` values invoked
//! synchronously from worker context, shared across workers, and free to
//! capture whatever state the caller wants to aggregate into.

use crate::error::{AssumptionError, Error, TransientError};
use crate::validate::{Deferred, Validate};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How a run ended, as reported to `on_run_complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Errored,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Errored => "error",
        }
    }
}

pub type OnData<T> = Arc<dyn Fn(T) + Send + Sync>;
pub type OnInvalidData<T> = Arc<dyn Fn(&Deferred<T>) + Send + Sync>;
/// Returns `true` to keep the worker alive.
pub type OnTransientError = Arc<dyn Fn(&TransientError) -> bool + Send + Sync>;
/// Returns `true` to keep scraping.
pub type OnStructuralError = Arc<dyn Fn(&AssumptionError) -> bool + Send + Sync>;
/// `(content, url, expected_type, storage_dir)` → local path.
pub type OnArchive =
    Arc<dyn Fn(&[u8], &str, Option<&str>, &Path) -> Result<PathBuf, Error> + Send + Sync>;
pub type OnRunStart = Arc<dyn Fn(&str) + Send + Sync>;
pub type OnRunComplete = Arc<dyn Fn(&str, RunStatus, Option<&Error>) + Send + Sync>;
/// Returns `true` to enqueue the request.
pub type DuplicateCheck = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// The optional callback bundle both engines accept.
pub struct Hooks<T: Validate> {
    pub(crate) on_data: Option<OnData<T>>,
    pub(crate) on_invalid_data: Option<OnInvalidData<T>>,
    pub(crate) on_transient_error: Option<OnTransientError>,
    pub(crate) on_structural_error: Option<OnStructuralError>,
    pub(crate) on_archive: Option<OnArchive>,
    pub(crate) on_run_start: Option<OnRunStart>,
    pub(crate) on_run_complete: Option<OnRunComplete>,
    pub(crate) duplicate_check: Option<DuplicateCheck>,
}

impl<T: Validate> Default for Hooks<T> {
    fn default() -> Self {
        Self {
            on_data: None,
            on_invalid_data: None,
            on_transient_error: None,
            on_structural_error: None,
            on_archive: None,
            on_run_start: None,
            on_run_complete: None,
            duplicate_check: None,
        }
    }
}

impl<T: Validate> Clone for Hooks<T> {
    fn clone(&self) -> Self {
        Self {
            on_data: self.on_data.clone(),
            on_invalid_data: self.on_invalid_data.clone(),
            on_transient_error: self.on_transient_error.clone(),
            on_structural_error: self.on_structural_error.clone(),
            on_archive: self.on_archive.clone(),
            on_run_start: self.on_run_start.clone(),
            on_run_complete: self.on_run_complete.clone(),
            duplicate_check: self.duplicate_check.clone(),
        }
    }
}

impl<T: Validate> Hooks<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive each validated data item.
    #[must_use]
    pub fn on_data(mut self, f: impl Fn(T) + Send + Sync + 'static) -> Self {
        self.on_data = Some(Arc::new(f));
        self
    }

    /// Receive each deferred value that failed validation.
    #[must_use]
    pub fn on_invalid_data(mut self, f: impl Fn(&Deferred<T>) + Send + Sync + 'static) -> Self {
        self.on_invalid_data = Some(Arc::new(f));
        self
    }

    /// Decide whether a worker survives a transient transport failure.
    #[must_use]
    pub fn on_transient_error(
        mut self,
        f: impl Fn(&TransientError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.on_transient_error = Some(Arc::new(f));
        self
    }

    /// Decide whether scraping continues after a violated assumption.
    #[must_use]
    pub fn on_structural_error(
        mut self,
        f: impl Fn(&AssumptionError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.on_structural_error = Some(Arc::new(f));
        self
    }

    /// Replace the default file-archival behavior.
    #[must_use]
    pub fn on_archive(
        mut self,
        f: impl Fn(&[u8], &str, Option<&str>, &Path) -> Result<PathBuf, Error>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.on_archive = Some(Arc::new(f));
        self
    }

    /// Observe the start of a run.
    #[must_use]
    pub fn on_run_start(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_run_start = Some(Arc::new(f));
        self
    }

    /// Observe the end of a run; fires exactly once, even on error.
    #[must_use]
    pub fn on_run_complete(
        mut self,
        f: impl Fn(&str, RunStatus, Option<&Error>) + Send + Sync + 'static,
    ) -> Self {
        self.on_run_complete = Some(Arc::new(f));
        self
    }

    /// Decide whether a deduplication key should be enqueued. Seen-key
    /// bookkeeping lives in the callback, not the engine.
    #[must_use]
    pub fn duplicate_check(mut self, f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.duplicate_check = Some(Arc::new(f));
        self
    }

    /// The archive callback to use: the configured one or the default.
    pub(crate) fn archive_fn(&self) -> OnArchive {
        self.on_archive
            .clone()
            .unwrap_or_else(|| Arc::new(crate::archive::default_archive))
    }
}

/// Completion-safe shutdown signal shared between the caller and the
/// engines.
///
/// Workers observe the signal before popping their next request and the
/// run's join loop polls it; a worker mid-request always finishes that
/// request (fetch, continuation, and enqueues) before exiting.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a graceful shutdown.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
