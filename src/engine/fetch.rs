//! Request execution: the interceptor walks around the transport.
//!
//! The request side runs forward through the interceptor list and may
//! short-circuit; the response side always runs in reverse over whatever
//! came out, receiving the request as it entered the chain.

use crate::engine::hooks::OnArchive;
use crate::error::Error;
use crate::interceptor::{BlockingInterceptor, Interceptor, RequestFlow};
use crate::request::Request;
use crate::response::Response;
use crate::transport::{AsyncTransport, BlockingTransport};
use std::path::Path;
use std::sync::Arc;

/// Fetch one request through the async interceptor chain.
pub(crate) async fn resolve_request(
    transport: &AsyncTransport,
    interceptors: &[Arc<dyn Interceptor>],
    request: Arc<Request>,
) -> Result<Response, Error> {
    let original = Arc::clone(&request);

    let mut current = request;
    let mut short_circuit = None;
    for interceptor in interceptors {
        match interceptor.modify_request(current.clone()).await? {
            RequestFlow::Forward(next) => current = next,
            RequestFlow::ShortCircuit(response) => {
                short_circuit = Some(response);
                break;
            }
        }
    }

    let mut response = match short_circuit {
        Some(response) => response,
        None => transport.send(&current).await?,
    };

    for interceptor in interceptors.iter().rev() {
        response = interceptor.modify_response(response, &original).await?;
    }

    Ok(response)
}

/// Fetch one archive request: resolve it, then hand the body to the archive
/// callback and attach the resulting local path.
pub(crate) async fn resolve_archive_request(
    transport: &AsyncTransport,
    interceptors: &[Arc<dyn Interceptor>],
    request: Arc<Request>,
    archive: &OnArchive,
    storage_dir: &Path,
) -> Result<Response, Error> {
    let response = resolve_request(transport, interceptors, Arc::clone(&request)).await?;
    let path = archive(
        &response.content,
        &request.http.url,
        request.expected_type.as_deref(),
        storage_dir,
    )?;
    Ok(response.into_archived(path))
}

/// Blocking twin of [`resolve_request`].
pub(crate) fn resolve_request_blocking(
    transport: &BlockingTransport,
    interceptors: &[Arc<dyn BlockingInterceptor>],
    request: Arc<Request>,
) -> Result<Response, Error> {
    let original = Arc::clone(&request);

    let mut current = request;
    let mut short_circuit = None;
    for interceptor in interceptors {
        match interceptor.modify_request(current.clone())? {
            RequestFlow::Forward(next) => current = next,
            RequestFlow::ShortCircuit(response) => {
                short_circuit = Some(response);
                break;
            }
        }
    }

    let mut response = match short_circuit {
        Some(response) => response,
        None => transport.send(&current)?,
    };

    for interceptor in interceptors.iter().rev() {
        response = interceptor.modify_response(response, &original)?;
    }

    Ok(response)
}

/// Blocking twin of [`resolve_archive_request`].
pub(crate) fn resolve_archive_request_blocking(
    transport: &BlockingTransport,
    interceptors: &[Arc<dyn BlockingInterceptor>],
    request: Arc<Request>,
    archive: &OnArchive,
    storage_dir: &Path,
) -> Result<Response, Error> {
    let response = resolve_request_blocking(transport, interceptors, Arc::clone(&request))?;
    let path = archive(
        &response.content,
        &request.http.url,
        request.expected_type.as_deref(),
        storage_dir,
    )?;
    Ok(response.into_archived(path))
}
