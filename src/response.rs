//! The response record handed to continuations.

use crate::request::Request;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An HTTP response, tied back to the request that produced it.
///
/// Archive responses additionally carry `file_path`, the local storage
/// location the body was written to.
#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: u16,
    pub headers: IndexMap<String, String>,
    /// Raw body bytes.
    pub content: Vec<u8>,
    /// Body decoded as text (UTF-8, with a latin-1 fallback).
    pub text: String,
    /// Final URL after redirects.
    pub url: String,
    /// The request that produced this response. Identity is preserved through
    /// the interceptor chain unless an interceptor replaces it.
    pub request: Arc<Request>,
    /// Local storage path, present only on archive responses.
    pub file_path: Option<PathBuf>,
}

impl Response {
    #[must_use]
    pub fn new(
        status_code: u16,
        headers: IndexMap<String, String>,
        content: Vec<u8>,
        url: impl Into<String>,
        request: Arc<Request>,
    ) -> Self {
        let text = decode_text(&content);
        Self {
            status_code,
            headers,
            content,
            text,
            url: url.into(),
            request,
            file_path: None,
        }
    }

    /// Attach the archived file location, turning this into an archive
    /// response.
    #[must_use]
    pub fn into_archived(mut self, file_path: PathBuf) -> Self {
        self.file_path = Some(file_path);
        self
    }

    /// The archived file location, if this is an archive response.
    #[must_use]
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }
}

/// Decode body bytes as UTF-8, falling back to latin-1 when the body is not
/// valid UTF-8.
#[must_use]
pub fn decode_text(content: &[u8]) -> String {
    std::str::from_utf8(content).map_or_else(
        |_| content.iter().map(|&b| b as char).collect(),
        str::to_string,
    )
}
