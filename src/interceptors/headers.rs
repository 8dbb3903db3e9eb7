//! Header-injecting interceptor.

use crate::error::Error;
use crate::interceptor::{BlockingInterceptor, Interceptor, RequestFlow};
use crate::request::Request;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;

/// Adds a fixed set of headers to every request, overriding existing values
/// on conflict.
pub struct HeaderInterceptor {
    headers: IndexMap<String, String>,
}

impl HeaderInterceptor {
    #[must_use]
    pub fn new(headers: IndexMap<String, String>) -> Self {
        Self { headers }
    }

    fn apply(&self, request: &Arc<Request>) -> Arc<Request> {
        if self.headers.is_empty() {
            return Arc::clone(request);
        }
        let mut updated = (**request).clone();
        for (name, value) in &self.headers {
            updated.http.headers.insert(name.clone(), value.clone());
        }
        Arc::new(updated)
    }
}

impl BlockingInterceptor for HeaderInterceptor {
    fn modify_request(&self, request: Arc<Request>) -> Result<RequestFlow, Error> {
        Ok(RequestFlow::Forward(self.apply(&request)))
    }
}

#[async_trait]
impl Interceptor for HeaderInterceptor {
    async fn modify_request(&self, request: Arc<Request>) -> Result<RequestFlow, Error> {
        Ok(RequestFlow::Forward(self.apply(&request)))
    }
}
