//! Traffic-logging interceptor.

use crate::error::Error;
use crate::interceptor::{BlockingInterceptor, Interceptor, RequestFlow};
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Logs every request and response without modifying either.
#[derive(Default)]
pub struct LoggingInterceptor {
    prefix: String,
    request_count: AtomicU64,
    response_count: AtomicU64,
}

impl LoggingInterceptor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn response_count(&self) -> u64 {
        self.response_count.load(Ordering::SeqCst)
    }

    fn log_request(&self, request: &Arc<Request>) {
        let n = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            "{}request #{n}: {} {}",
            self.prefix,
            request.http.method,
            request.http.url
        );
    }

    fn log_response(&self, response: &Response) {
        let n = self.response_count.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            "{}response #{n}: {} from {}",
            self.prefix,
            response.status_code,
            response.url
        );
    }
}

impl BlockingInterceptor for LoggingInterceptor {
    fn modify_request(&self, request: Arc<Request>) -> Result<RequestFlow, Error> {
        self.log_request(&request);
        Ok(RequestFlow::Forward(request))
    }

    fn modify_response(
        &self,
        response: Response,
        _original: &Arc<Request>,
    ) -> Result<Response, Error> {
        self.log_response(&response);
        Ok(response)
    }
}

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn modify_request(&self, request: Arc<Request>) -> Result<RequestFlow, Error> {
        self.log_request(&request);
        Ok(RequestFlow::Forward(request))
    }

    async fn modify_response(
        &self,
        response: Response,
        _original: &Arc<Request>,
    ) -> Result<Response, Error> {
        self.log_response(&response);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_both_sides() {
        let logger = LoggingInterceptor::with_prefix("[test] ");
        let request = Arc::new(Request::navigating("https://court.example/", "parse"));
        logger.log_request(&request);
        logger.log_request(&request);
        assert_eq!(logger.request_count(), 2);
        assert_eq!(logger.response_count(), 0);
    }
}
