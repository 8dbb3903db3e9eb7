//! Deferred validation of scraped data against consumer models.
//!
//! Scrapers can yield raw field maps wrapped in [`Deferred`] instead of
//! already-validated values. The engine confirms each deferred value exactly
//! once, immediately before the data callback fires: success routes to
//! `on_data`, failure to `on_invalid_data`.
//!
//! The validation library itself is a black box behind the [`Validate`]
//! trait: `validate(raw)` either produces a value or a list of field
//! errors. Most implementations delegate to serde via
//! [`validate_with_serde`].

use crate::error::{DataFormatFailure, FieldError};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// The consumer-model constraint: a data shape scraped values validate into.
pub trait Validate: Sized {
    /// Model name used in validation failure reports.
    const MODEL_NAME: &'static str;

    /// Validate a raw document into this model, or report every field that
    /// failed.
    ///
    /// # Errors
    ///
    /// Returns the field-level errors when the document does not conform.
    fn validate(raw: serde_json::Value) -> Result<Self, Vec<FieldError>>;
}

/// Serde-backed validation for models that derive `Deserialize`.
///
/// # Errors
///
/// Maps the deserialization failure into a single field error located at the
/// document root.
pub fn validate_with_serde<T: DeserializeOwned>(
    raw: serde_json::Value,
) -> Result<T, Vec<FieldError>> {
    serde_json::from_value(raw).map_err(|err| vec![FieldError::new("__root__", err.to_string())])
}

/// A raw, not-yet-validated document targeted at model `T`.
#[derive(Debug, Clone)]
pub struct Deferred<T: Validate> {
    raw: serde_json::Value,
    request_url: String,
    _model: PhantomData<fn() -> T>,
}

impl<T: Validate> Deferred<T> {
    #[must_use]
    pub fn new(raw: serde_json::Value, request_url: impl Into<String>) -> Self {
        Self {
            raw,
            request_url: request_url.into(),
            _model: PhantomData,
        }
    }

    /// The raw document awaiting validation.
    #[must_use]
    pub const fn raw(&self) -> &serde_json::Value {
        &self.raw
    }

    #[must_use]
    pub fn request_url(&self) -> &str {
        &self.request_url
    }

    /// Validate the raw document against `T`.
    ///
    /// # Errors
    ///
    /// Returns the full failure context (model name, field errors, failed
    /// document, request URL) when validation fails.
    pub fn confirm(&self) -> Result<T, Box<DataFormatFailure>> {
        T::validate(self.raw.clone()).map_err(|errors| {
            Box::new(DataFormatFailure {
                model_name: T::MODEL_NAME.to_string(),
                errors,
                failed_doc: self.raw.clone(),
                request_url: self.request_url.clone(),
            })
        })
    }
}

/// Default invalid-data callback: logs one error line summarising the model,
/// the error count, and each field-level failure.
pub fn log_invalid_data<T: Validate>(deferred: &Deferred<T>) {
    if let Err(failure) = deferred.confirm() {
        let summary = failure
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.location, e.message))
            .collect::<Vec<_>>()
            .join(", ");
        tracing::error!(
            model_name = failure.model_name,
            request_url = failure.request_url,
            error_count = failure.errors.len(),
            "data validation failed: {summary}"
        );
    }
}
