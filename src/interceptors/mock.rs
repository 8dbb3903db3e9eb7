//! Canned-response interceptor for tests.

use crate::error::Error;
use crate::interceptor::{BlockingInterceptor, Interceptor, RequestFlow};
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A response template served for a matching URL.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status_code: u16,
    pub headers: IndexMap<String, String>,
    pub body: Vec<u8>,
}

impl CannedResponse {
    /// A 200 response with the given body.
    #[must_use]
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code: 200,
            headers: IndexMap::new(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }
}

/// Short-circuits requests whose URL has a canned response, counting hits
/// and misses for test assertions.
#[derive(Default)]
pub struct MockInterceptor {
    responses: HashMap<String, CannedResponse>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl MockInterceptor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_response(mut self, url: impl Into<String>, response: CannedResponse) -> Self {
        self.responses.insert(url.into(), response);
        self
    }

    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::SeqCst)
    }

    fn lookup(&self, request: &Arc<Request>) -> RequestFlow {
        match self.responses.get(&request.http.url) {
            Some(canned) => {
                self.hits.fetch_add(1, Ordering::SeqCst);
                RequestFlow::ShortCircuit(Response::new(
                    canned.status_code,
                    canned.headers.clone(),
                    canned.body.clone(),
                    request.http.url.clone(),
                    Arc::clone(request),
                ))
            }
            None => {
                self.misses.fetch_add(1, Ordering::SeqCst);
                RequestFlow::Forward(Arc::clone(request))
            }
        }
    }
}

impl BlockingInterceptor for MockInterceptor {
    fn modify_request(&self, request: Arc<Request>) -> Result<RequestFlow, Error> {
        Ok(self.lookup(&request))
    }
}

#[async_trait]
impl Interceptor for MockInterceptor {
    async fn modify_request(&self, request: Arc<Request>) -> Result<RequestFlow, Error> {
        Ok(self.lookup(&request))
    }
}
