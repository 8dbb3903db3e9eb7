//! The scraper contract: entry point, named continuations, and yields.
//!
//! A scraper is a state machine whose states are *continuation methods*.
//! Continuations are addressed by name: requests stay plain, serializable
//! data, and dispatch goes through [`Scraper::continuation`]. Each
//! continuation consumes a [`StepContext`](crate::context::StepContext) and
//! returns a lazy stream of [`Yield`] items: parsed data, new requests, or
//! nothing.

use crate::context::StepContext;
use crate::error::Error;
use crate::request::Request;
use crate::validate::{Deferred, Validate};

/// A single item emitted by a continuation.
#[derive(Debug)]
pub enum Yield<T: Validate> {
    /// A parsed data record, routed to the data callbacks.
    Data(DataItem<T>),
    /// A new request to schedule; its kind decides the resolution context.
    Request(Request),
    /// Nothing; skipped by the engine.
    Nothing,
}

/// The payload of a data yield: already a value, or raw fields awaiting
/// validation.
#[derive(Debug)]
pub enum DataItem<T: Validate> {
    Value(T),
    Deferred(Deferred<T>),
}

impl<T: Validate> Yield<T> {
    #[must_use]
    pub fn data(value: T) -> Self {
        Self::Data(DataItem::Value(value))
    }

    #[must_use]
    pub fn deferred(deferred: Deferred<T>) -> Self {
        Self::Data(DataItem::Deferred(deferred))
    }

    #[must_use]
    pub fn request(request: Request) -> Self {
        Self::Request(request)
    }
}

/// The lazy stream a continuation returns. Items are pulled one at a time so
/// every yielded request is enqueued before the continuation resumes; a
/// mid-stream assumption failure surfaces as an `Err` item.
pub type YieldStream<T> = Box<dyn Iterator<Item = Result<Yield<T>, Error>> + Send>;

/// One continuation, ready to run against a step context.
pub type StepFn<T> = Box<dyn FnOnce(StepContext) -> YieldStream<T> + Send>;

/// Per-continuation metadata: queue priority for requests targeting it, and
/// the character encoding used by the text/HTML context accessors.
#[derive(Debug, Clone)]
pub struct StepMetadata {
    /// Priority inherited by requests that target this step and still carry
    /// the default priority.
    pub priority: i32,
    pub encoding: String,
}

impl Default for StepMetadata {
    fn default() -> Self {
        Self {
            priority: crate::request::DEFAULT_PRIORITY,
            encoding: "utf-8".to_string(),
        }
    }
}

impl StepMetadata {
    #[must_use]
    pub fn with_priority(priority: i32) -> Self {
        Self {
            priority,
            ..Self::default()
        }
    }
}

/// Registry metadata a scraper may expose. The engine never interprets any
/// of it; registry tooling does.
#[derive(Debug, Clone, Default)]
pub struct ScraperMetadata {
    pub status: Option<String>,
    pub court_ids: Vec<String>,
    pub court_url: Option<String>,
    pub data_types: Vec<String>,
    pub version: Option<String>,
    pub last_verified: Option<String>,
    pub oldest_record: Option<String>,
    pub requires_auth: bool,
    pub msec_per_request_rate_limit: Option<u64>,
}

/// A user-authored scraper.
///
/// Implementations provide the seed request and resolve continuation names
/// to step functions. Scraper state is shared read-only across workers; any
/// interior mutability must be synchronized by the author.
pub trait Scraper: Send + Sync + 'static {
    /// The consumer model this scraper emits.
    type Output: Validate + Send + 'static;

    /// Name used in lifecycle callbacks and logs.
    fn name(&self) -> &str;

    /// The seed request. Must be a navigating request with an absolute URL.
    ///
    /// # Errors
    ///
    /// Returns an error when the scraper cannot produce its seed request.
    fn entry(&self) -> Result<Request, Error>;

    /// Resolve a continuation name to its step function.
    ///
    /// # Errors
    ///
    /// Returns an error when no continuation with that name exists.
    fn continuation(&self, name: &str) -> Result<StepFn<Self::Output>, Error>;

    /// Metadata for a continuation, if the scraper declares any. The engine
    /// uses the priority for inheritance and the encoding for content
    /// decoding.
    fn step_metadata(&self, _name: &str) -> Option<StepMetadata> {
        None
    }

    /// Registry metadata; unused by the engine.
    fn metadata(&self) -> ScraperMetadata {
        ScraperMetadata::default()
    }
}
