//! WARC capture and replay interceptors.
//!
//! Capture writes one WARC `response` record per response flowing through
//! the chain; replay loads a WARC file at startup and short-circuits
//! matching requests with the stored response, so a recorded run can be
//! replayed deterministically without network access.
//!
//! Replay keys are SHA-256 digests of `method|url|` plus the canonical body
//! serialization. Records on disk carry no request body, so lookups also
//! probe the body-less key and WARCs written by older captures keep working.

use crate::dedup;
use crate::error::Error;
use crate::interceptor::{BlockingInterceptor, Interceptor, RequestFlow};
use crate::request::Request;
use crate::response::Response;
use crate::warc::{read_records, ResponseRecord, WarcWriter};
use async_trait::async_trait;
use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Records every response to a WARC file.
///
/// The file stream opens lazily on the first response and must be released
/// with [`close`](Self::close) (or by dropping the interceptor). The writer
/// is a single-writer critical section; concurrent workers serialize on an
/// internal mutex.
pub struct WarcCaptureInterceptor {
    path: PathBuf,
    writer: Mutex<Option<WarcWriter>>,
}

impl WarcCaptureInterceptor {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(None),
        }
    }

    fn record(&self, response: &Response, original: &Arc<Request>) -> Result<(), Error> {
        let mut guard = self.writer.lock().expect("WARC writer poisoned");
        if guard.is_none() {
            *guard = Some(WarcWriter::create(&self.path)?);
            tracing::info!(path = %self.path.display(), "opened WARC file for capture");
        }
        let writer = guard.as_mut().expect("writer just initialized");
        writer.write_record(&ResponseRecord {
            target_uri: response.url.clone(),
            http_method: Some(original.http.method.as_str().to_string()),
            status_code: response.status_code,
            body: response.content.clone(),
        })?;
        tracing::debug!(url = %response.url, "recorded response to WARC");
        Ok(())
    }

    /// Flush and close the WARC stream.
    ///
    /// # Errors
    ///
    /// Returns an error when the final flush fails.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn close(&self) -> Result<(), Error> {
        if let Some(mut writer) = self.writer.lock().expect("WARC writer poisoned").take() {
            writer.finish()?;
            tracing::info!(path = %self.path.display(), "closed WARC file");
        }
        Ok(())
    }
}

impl Drop for WarcCaptureInterceptor {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl BlockingInterceptor for WarcCaptureInterceptor {
    fn modify_response(
        &self,
        response: Response,
        original: &Arc<Request>,
    ) -> Result<Response, Error> {
        self.record(&response, original)?;
        Ok(response)
    }
}

#[async_trait]
impl Interceptor for WarcCaptureInterceptor {
    async fn modify_response(
        &self,
        response: Response,
        original: &Arc<Request>,
    ) -> Result<Response, Error> {
        self.record(&response, original)?;
        Ok(response)
    }
}

/// Replays responses from a previously captured WARC file.
///
/// A missing file is tolerated: the cache starts empty with a warning, and
/// every request falls through to the network.
pub struct WarcReplayInterceptor {
    cache: HashMap<String, ResponseRecord>,
}

impl WarcReplayInterceptor {
    /// Load the replay cache from a WARC file.
    ///
    /// # Errors
    ///
    /// Returns an error when an existing file cannot be parsed. A missing
    /// file is not an error.
    pub fn new(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "WARC file not found, replay cache will be empty");
            return Ok(Self {
                cache: HashMap::new(),
            });
        }

        let mut cache = HashMap::new();
        for record in read_records(path)? {
            let method = record.http_method.as_deref().unwrap_or("GET");
            cache.insert(stored_key(method, &record.target_uri), record);
        }
        tracing::info!(
            path = %path.display(),
            responses = cache.len(),
            "loaded WARC replay cache"
        );
        Ok(Self { cache })
    }

    /// Number of cached responses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn lookup(&self, request: &Arc<Request>) -> Option<Response> {
        let record = self
            .cache
            .get(&live_key(request))
            .or_else(|| self.cache.get(&stored_key(request.http.method.as_str(), &request.http.url)));

        match record {
            Some(record) => {
                tracing::debug!(url = %request.http.url, "WARC cache hit");
                // Re-attach the live request so downstream interceptors and
                // the continuation see real provenance.
                Some(Response::new(
                    record.status_code,
                    IndexMap::new(),
                    record.body.clone(),
                    record.target_uri.clone(),
                    Arc::clone(request),
                ))
            }
            None => {
                tracing::debug!(url = %request.http.url, "WARC cache miss");
                None
            }
        }
    }
}

/// Key for a record loaded from disk: method and URL only (stored records
/// carry no request body).
fn stored_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"|");
    hasher.update(url.as_bytes());
    hasher.update(b"|");
    format!("{:x}", hasher.finalize())
}

/// Key for a live request: method, URL, and canonical body serialization.
fn live_key(request: &Arc<Request>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.http.method.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(request.http.url.as_bytes());
    hasher.update(b"|");
    dedup::body_component(request.http.body.as_ref(), &mut hasher);
    format!("{:x}", hasher.finalize())
}

impl BlockingInterceptor for WarcReplayInterceptor {
    fn modify_request(&self, request: Arc<Request>) -> Result<RequestFlow, Error> {
        Ok(self.lookup(&request).map_or(
            RequestFlow::Forward(request),
            RequestFlow::ShortCircuit,
        ))
    }
}

#[async_trait]
impl Interceptor for WarcReplayInterceptor {
    async fn modify_request(&self, request: Arc<Request>) -> Result<RequestFlow, Error> {
        Ok(self.lookup(&request).map_or(
            RequestFlow::Forward(request),
            RequestFlow::ShortCircuit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request_for(url: &str) -> Arc<Request> {
        Arc::new(Request::navigating(url, "parse"))
    }

    fn response_for(request: &Arc<Request>, body: &[u8]) -> Response {
        Response::new(
            200,
            IndexMap::new(),
            body.to_vec(),
            request.http.url.clone(),
            Arc::clone(request),
        )
    }

    #[test]
    fn capture_then_replay_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("traffic.warc");

        let capture = WarcCaptureInterceptor::new(&path);
        let request = request_for("https://court.example/cases");
        capture
            .record(&response_for(&request, b"<html>cases</html>"), &request)
            .unwrap();
        capture.close().unwrap();

        let replay = WarcReplayInterceptor::new(&path).unwrap();
        assert_eq!(replay.len(), 1);

        let live = request_for("https://court.example/cases");
        let hit = replay.lookup(&live).unwrap();
        assert_eq!(hit.content, b"<html>cases</html>");
        assert_eq!(hit.status_code, 200);
        assert!(Arc::ptr_eq(&hit.request, &live));
    }

    #[test]
    fn gzip_extension_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("traffic.warc.gz");

        let capture = WarcCaptureInterceptor::new(&path);
        let request = request_for("https://court.example/cases/1");
        capture
            .record(&response_for(&request, b"detail page"), &request)
            .unwrap();
        capture.close().unwrap();

        let replay = WarcReplayInterceptor::new(&path).unwrap();
        let hit = replay.lookup(&request_for("https://court.example/cases/1")).unwrap();
        assert_eq!(hit.content, b"detail page");
    }

    #[test]
    fn missing_file_yields_empty_cache() {
        let dir = TempDir::new().unwrap();
        let replay = WarcReplayInterceptor::new(&dir.path().join("absent.warc")).unwrap();
        assert!(replay.is_empty());
        assert!(replay.lookup(&request_for("https://court.example/")).is_none());
    }

    #[test]
    fn method_distinguishes_cache_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("traffic.warc");

        let capture = WarcCaptureInterceptor::new(&path);
        let get = request_for("https://court.example/search");
        capture.record(&response_for(&get, b"get result"), &get).unwrap();
        capture.close().unwrap();

        let replay = WarcReplayInterceptor::new(&path).unwrap();
        let post = Arc::new(Request::navigating(
            crate::http::HttpParams::post("https://court.example/search"),
            "parse",
        ));
        assert!(replay.lookup(&post).is_none());
        assert!(replay.lookup(&get).is_some());
    }

    #[test]
    fn body_bearing_request_falls_back_to_stored_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("traffic.warc");

        let capture = WarcCaptureInterceptor::new(&path);
        let posted = Arc::new(Request::navigating(
            crate::http::HttpParams::post("https://court.example/search")
                .with_body(crate::http::Body::Bytes(b"page=2".to_vec())),
            "parse",
        ));
        capture
            .record(&response_for(&posted, b"page two"), &posted)
            .unwrap();
        capture.close().unwrap();

        let replay = WarcReplayInterceptor::new(&path).unwrap();
        // Same method+URL+body finds the record through the legacy key
        let hit = replay.lookup(&posted).unwrap();
        assert_eq!(hit.content, b"page two");
    }
}
