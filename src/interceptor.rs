//! The interceptor protocol: middleware around request execution.
//!
//! Interceptors form a chain of responsibility. The request side runs
//! *forward* through the list and may short-circuit by producing a response
//! (a cache hit, a canned test response); the response side always runs in
//! *reverse* over whatever came out, whether a real response or a short-circuited
//! one. If interceptor `k` short-circuits, request interceptors `k+1..n` are
//! skipped entirely while the full response chain still runs, so a logger
//! late in the list observes cache hits produced by an earlier cache.
//!
//! Ordering matters: place caches before the rate limiter so replayed hits
//! are not rate-limited.
//!
//! Two traits mirror the two engines: [`Interceptor`] for the async engine,
//! [`BlockingInterceptor`] for the sync one. Built-in interceptors implement
//! both.

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use std::sync::Arc;

/// Outcome of the request side of an interceptor.
#[derive(Debug)]
pub enum RequestFlow {
    /// Continue down the chain with this (possibly replaced) request.
    Forward(Arc<Request>),
    /// Skip HTTP and the remaining request interceptors; the response chain
    /// still runs over this response.
    ShortCircuit(Response),
}

/// Asynchronous interceptor. Both methods default to pass-through, so an
/// implementation only overrides the side it cares about.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Observe or transform a request before it is sent, or short-circuit
    /// with a ready response.
    ///
    /// # Errors
    ///
    /// Errors propagate to the worker loop and follow the error-routing
    /// rules for their kind.
    async fn modify_request(&self, request: Arc<Request>) -> Result<RequestFlow, Error> {
        Ok(RequestFlow::Forward(request))
    }

    /// Observe or transform a response. Runs for short-circuited responses
    /// too; `original` is the request as it entered the chain.
    ///
    /// # Errors
    ///
    /// Errors propagate to the worker loop.
    async fn modify_response(
        &self,
        response: Response,
        original: &Arc<Request>,
    ) -> Result<Response, Error> {
        let _ = original;
        Ok(response)
    }
}

/// Blocking interceptor for the synchronous engine.
pub trait BlockingInterceptor: Send + Sync {
    /// See [`Interceptor::modify_request`].
    ///
    /// # Errors
    ///
    /// Errors propagate to the worker loop.
    fn modify_request(&self, request: Arc<Request>) -> Result<RequestFlow, Error> {
        Ok(RequestFlow::Forward(request))
    }

    /// See [`Interceptor::modify_response`].
    ///
    /// # Errors
    ///
    /// Errors propagate to the worker loop.
    fn modify_response(
        &self,
        response: Response,
        original: &Arc<Request>,
    ) -> Result<Response, Error> {
        let _ = original;
        Ok(response)
    }
}
