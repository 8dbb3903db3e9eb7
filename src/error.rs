//! Error handling for the scraper engine.
//!
//! Errors fall into two data-plane families plus infrastructure passthroughs:
//!
//! 1. **Assumption errors** (`AssumptionError`): the remote site violated a
//!    structural assumption made by scraper code: unexpected markup, a wrong
//!    status code, unparseable content, or data that fails validation.
//! 2. **Transient errors** (`TransientError`): the transport layer failed in a
//!    way that may succeed on retry: timeouts and network resets.
//!
//! The engine routes each family to a dedicated callback (see the engine
//! module); everything else propagates and terminates the run.

use serde::Serialize;
use std::borrow::Cow;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Essential external errors that can't be consolidated
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A structural assumption about the remote site was violated.
    #[error(transparent)]
    Assumption(#[from] AssumptionError),

    /// A transport-level failure that may succeed on retry.
    #[error(transparent)]
    Transient(#[from] TransientError),

    // Consolidated internal error variant
    #[error("{kind}: {message}")]
    Internal {
        kind: ErrorKind,
        message: Cow<'static, str>,
    },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Categories for consolidated internal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Scraper contract violations (missing continuation, bad entry request)
    Scraper,
    /// Scheduler and worker-loop failures
    Scheduler,
    /// Rate limiter configuration or acquisition failures
    RateLimit,
    /// WARC reading or writing failures
    Warc,
    /// File archival failures
    Archive,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Scraper => "Scraper error",
            Self::Scheduler => "Scheduler error",
            Self::RateLimit => "Rate limit error",
            Self::Warc => "WARC error",
            Self::Archive => "Archive error",
        };
        write!(f, "{name}")
    }
}

impl Error {
    pub fn scraper(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal {
            kind: ErrorKind::Scraper,
            message: message.into(),
        }
    }

    pub fn scheduler(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal {
            kind: ErrorKind::Scheduler,
            message: message.into(),
        }
    }

    pub fn rate_limit(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal {
            kind: ErrorKind::RateLimit,
            message: message.into(),
        }
    }

    pub fn warc(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal {
            kind: ErrorKind::Warc,
            message: message.into(),
        }
    }

    pub fn archive(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal {
            kind: ErrorKind::Archive,
            message: message.into(),
        }
    }
}

/// A structural assumption about the remote site was violated.
///
/// These are raised by continuation code (or by the content-parsing accessors
/// on `StepContext`) and routed to the `on_structural_error` callback, with
/// the exception of `DataFormat`, which has its own routing through
/// `on_invalid_data`.
#[derive(Error, Debug)]
pub enum AssumptionError {
    /// The page structure did not match what the scraper expected.
    #[error("structural assumption violated at {url}: {message}")]
    HtmlStructural {
        message: String,
        url: String,
        /// Optional structured context (matched selector, element counts, …)
        context: Option<serde_json::Value>,
    },

    /// The server answered with a status code outside the expected set.
    #[error("unexpected status {status} from {url} (expected {expected:?})")]
    HtmlResponse {
        status: u16,
        expected: Vec<u16>,
        url: String,
    },

    /// Response content could not be parsed as the requested representation.
    #[error("content parse failed at {url}: {message}")]
    Content { message: String, url: String },

    /// Scraped data failed validation against its consumer model.
    #[error(transparent)]
    DataFormat(#[from] Box<DataFormatFailure>),
}

impl AssumptionError {
    pub fn structural(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::HtmlStructural {
            message: message.into(),
            url: url.into(),
            context: None,
        }
    }

    pub fn content(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::Content {
            message: message.into(),
            url: url.into(),
        }
    }
}

/// A transport-level failure that may succeed on retry.
///
/// Routed to the `on_transient_error` callback; without one, the failure
/// propagates and stops the worker.
#[derive(Error, Debug)]
pub enum TransientError {
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: f64 },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },
}

/// One field-level validation error.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    /// Location of the failing field (name or dotted path)
    pub location: String,
    /// Human-readable failure message
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Full context for a validation failure: which model, which fields, the
/// document that failed, and the URL it was scraped from.
#[derive(Error, Debug)]
#[error("validation failed for model '{model_name}': {} field error(s)", errors.len())]
pub struct DataFormatFailure {
    pub model_name: String,
    pub errors: Vec<FieldError>,
    pub failed_doc: serde_json::Value,
    pub request_url: String,
}
