//! The step context: everything a continuation can ask for about the
//! response it is consuming.
//!
//! Instead of positional arguments, continuations pull what they need from
//! accessors: the response itself, the originating request and its chain,
//! per-branch scratch data, or the body parsed as JSON, HTML, or text.
//! Content accessors parse lazily and report failures as assumption errors,
//! so a malformed page routes through the structural-error callback like any
//! other violated assumption.

use crate::error::{AssumptionError, Error};
use crate::request::{DataMap, Request};
use crate::response::Response;
use std::path::Path;
use std::sync::Arc;

/// Context handed to one continuation invocation.
#[derive(Debug, Clone)]
pub struct StepContext {
    response: Arc<Response>,
    encoding: String,
}

impl StepContext {
    #[must_use]
    pub fn new(response: Arc<Response>, encoding: impl Into<String>) -> Self {
        Self {
            response,
            encoding: encoding.into(),
        }
    }

    #[must_use]
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// The request this response answers.
    #[must_use]
    pub fn request(&self) -> &Arc<Request> {
        &self.response.request
    }

    /// The immediate ancestor in the request chain, if any.
    #[must_use]
    pub fn previous_request(&self) -> Option<&Arc<Request>> {
        self.response.request.previous_requests.last()
    }

    #[must_use]
    pub fn accumulated_data(&self) -> &DataMap {
        &self.response.request.accumulated_data
    }

    #[must_use]
    pub fn aux_data(&self) -> &DataMap {
        &self.response.request.aux_data
    }

    /// Response body parsed as JSON.
    ///
    /// # Errors
    ///
    /// Returns a content assumption error when the body is not valid JSON.
    pub fn json_content(&self) -> Result<serde_json::Value, Error> {
        serde_json::from_slice(&self.response.content).map_err(|err| {
            AssumptionError::content(format!("failed to parse JSON: {err}"), &self.response.url)
                .into()
        })
    }

    /// Response body parsed as an HTML document.
    ///
    /// The body is decoded with the step's declared encoding first; when the
    /// declared encoding does not fit the bytes, decoding falls back to a
    /// lossy read so documents with mismatched XML declarations still parse.
    ///
    /// # Errors
    ///
    /// Returns a content assumption error when the body is empty.
    pub fn html_tree(&self) -> Result<scraper::Html, Error> {
        if self.response.content.is_empty() {
            return Err(AssumptionError::content(
                "cannot parse HTML from an empty body",
                &self.response.url,
            )
            .into());
        }
        Ok(scraper::Html::parse_document(&self.decoded_text()))
    }

    /// Response body as text in the step's declared encoding.
    ///
    /// # Errors
    ///
    /// Infallible today; kept fallible so stricter decoders can slot in.
    pub fn text(&self) -> Result<String, Error> {
        Ok(self.decoded_text())
    }

    /// Local file path, present when the response came from an archive
    /// request.
    #[must_use]
    pub fn local_filepath(&self) -> Option<&Path> {
        self.response.file_path()
    }

    fn decoded_text(&self) -> String {
        match self.encoding.to_ascii_lowercase().as_str() {
            "latin-1" | "latin1" | "iso-8859-1" => self
                .response
                .content
                .iter()
                .map(|&b| b as char)
                .collect(),
            _ => self.response.text.clone(),
        }
    }
}
