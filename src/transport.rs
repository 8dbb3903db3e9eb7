//! The HTTP transport: mapping `HttpParams` onto the wire client.
//!
//! Both engines share the same mapping rules; only the client differs
//! (async vs blocking). Error mapping follows the data-plane taxonomy:
//! timeouts become `TransientError::Timeout`, other wire failures become
//! `TransientError::Network`, and a 5xx status is an
//! `AssumptionError::HtmlResponse`. A 429 is *not* an error here; the rate
//! limit interceptor watches for it on the response side.
//!
//! Redirect-following is a per-request flag but a per-client policy in the
//! underlying client, so each transport holds two clients and picks by flag.

use crate::error::{AssumptionError, Error, TransientError};
use crate::http::{Body, HttpParams};
use crate::request::Request;
use crate::response::Response;
use indexmap::IndexMap;
use std::sync::Arc;
use std::time::Duration;

/// Fallback request budget when a request does not set its own timeout.
pub const DEFAULT_TIMEOUT_SECS: f64 = 30.0;

/// Async transport used by the multi-worker engine.
#[derive(Debug, Clone)]
pub struct AsyncTransport {
    follow: reqwest::Client,
    no_follow: reqwest::Client,
}

impl AsyncTransport {
    /// Build a transport with default clients (cookie store enabled).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying clients cannot be constructed.
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            follow: reqwest::Client::builder().cookie_store(true).build()?,
            no_follow: reqwest::Client::builder()
                .cookie_store(true)
                .redirect(reqwest::redirect::Policy::none())
                .build()?,
        })
    }

    /// Use pre-built clients, e.g. to configure proxies, TLS verification,
    /// or client certificates.
    #[must_use]
    pub const fn from_clients(follow: reqwest::Client, no_follow: reqwest::Client) -> Self {
        Self { follow, no_follow }
    }

    /// Send one request and map the outcome into the engine's taxonomy.
    ///
    /// # Errors
    ///
    /// Transient wire failures, or an assumption error for 5xx statuses.
    pub async fn send(&self, request: &Arc<Request>) -> Result<Response, Error> {
        let params = &request.http;
        let client = if params.follow_redirects {
            &self.follow
        } else {
            &self.no_follow
        };

        let mut builder = client.request(wire_method(params.method), &params.url);
        builder = apply_common(builder, params);
        builder = apply_body_async(builder, params)?;

        let wire_response = builder.send().await.map_err(|err| map_send_error(&err, params))?;

        let status = wire_response.status().as_u16();
        if status >= 500 {
            return Err(AssumptionError::HtmlResponse {
                status,
                expected: vec![200],
                url: params.url.clone(),
            }
            .into());
        }

        let final_url = wire_response.url().to_string();
        let headers = collect_headers(wire_response.headers());
        let content = wire_response
            .bytes()
            .await
            .map_err(|err| map_send_error(&err, params))?
            .to_vec();

        Ok(Response::new(
            status,
            headers,
            content,
            final_url,
            Arc::clone(request),
        ))
    }
}

/// Blocking transport used by the single-worker engine.
#[derive(Debug)]
pub struct BlockingTransport {
    follow: reqwest::blocking::Client,
    no_follow: reqwest::blocking::Client,
}

impl BlockingTransport {
    /// Build a transport with default clients (cookie store enabled).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying clients cannot be constructed.
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            follow: reqwest::blocking::Client::builder()
                .cookie_store(true)
                .build()?,
            no_follow: reqwest::blocking::Client::builder()
                .cookie_store(true)
                .redirect(reqwest::redirect::Policy::none())
                .build()?,
        })
    }

    /// Use pre-built clients.
    #[must_use]
    pub const fn from_clients(
        follow: reqwest::blocking::Client,
        no_follow: reqwest::blocking::Client,
    ) -> Self {
        Self { follow, no_follow }
    }

    /// Send one request and map the outcome into the engine's taxonomy.
    ///
    /// # Errors
    ///
    /// Transient wire failures, or an assumption error for 5xx statuses.
    pub fn send(&self, request: &Arc<Request>) -> Result<Response, Error> {
        let params = &request.http;
        let client = if params.follow_redirects {
            &self.follow
        } else {
            &self.no_follow
        };

        let mut builder = client.request(wire_method(params.method), &params.url);
        builder = apply_common_blocking(builder, params);
        builder = apply_body_blocking(builder, params)?;

        let wire_response = builder.send().map_err(|err| map_send_error(&err, params))?;

        let status = wire_response.status().as_u16();
        if status >= 500 {
            return Err(AssumptionError::HtmlResponse {
                status,
                expected: vec![200],
                url: params.url.clone(),
            }
            .into());
        }

        let final_url = wire_response.url().to_string();
        let headers = collect_headers(wire_response.headers());
        let content = wire_response
            .bytes()
            .map_err(|err| map_send_error(&err, params))?
            .to_vec();

        Ok(Response::new(
            status,
            headers,
            content,
            final_url,
            Arc::clone(request),
        ))
    }
}

fn wire_method(method: crate::http::Method) -> reqwest::Method {
    use crate::http::Method;
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

fn request_timeout(params: &HttpParams) -> Duration {
    let secs = params
        .timeout
        .map_or(DEFAULT_TIMEOUT_SECS, |t| t.total_secs());
    Duration::from_secs_f64(secs)
}

fn cookie_header(cookies: &IndexMap<String, String>) -> String {
    cookies
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> IndexMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

fn map_send_error(err: &reqwest::Error, params: &HttpParams) -> Error {
    if err.is_timeout() {
        TransientError::Timeout {
            url: params.url.clone(),
            timeout_secs: params
                .timeout
                .map_or(DEFAULT_TIMEOUT_SECS, |t| t.total_secs()),
        }
        .into()
    } else {
        TransientError::Network {
            url: params.url.clone(),
            message: err.to_string(),
        }
        .into()
    }
}

fn apply_common(
    mut builder: reqwest::RequestBuilder,
    params: &HttpParams,
) -> reqwest::RequestBuilder {
    if let Some(query) = &params.query {
        builder = builder.query(&query.pairs());
    }
    for (name, value) in &params.headers {
        builder = builder.header(name, value);
    }
    if !params.cookies.is_empty() {
        builder = builder.header(reqwest::header::COOKIE, cookie_header(&params.cookies));
    }
    if let Some((username, password)) = &params.auth {
        builder = builder.basic_auth(username, Some(password));
    }
    builder.timeout(request_timeout(params))
}

fn apply_common_blocking(
    mut builder: reqwest::blocking::RequestBuilder,
    params: &HttpParams,
) -> reqwest::blocking::RequestBuilder {
    if let Some(query) = &params.query {
        builder = builder.query(&query.pairs());
    }
    for (name, value) in &params.headers {
        builder = builder.header(name, value);
    }
    if !params.cookies.is_empty() {
        builder = builder.header(reqwest::header::COOKIE, cookie_header(&params.cookies));
    }
    if let Some((username, password)) = &params.auth {
        builder = builder.basic_auth(username, Some(password));
    }
    builder.timeout(request_timeout(params))
}

fn apply_body_async(
    builder: reqwest::RequestBuilder,
    params: &HttpParams,
) -> Result<reqwest::RequestBuilder, Error> {
    if !params.files.is_empty() {
        let mut form = reqwest::multipart::Form::new();
        if let Some(Body::Form(fields)) = &params.body {
            for (name, value) in fields {
                form = form.text(name.clone(), value.clone());
            }
        }
        for part in &params.files {
            let mut mp = reqwest::multipart::Part::bytes(part.data.clone());
            if let Some(filename) = &part.filename {
                mp = mp.file_name(filename.clone());
            }
            if let Some(content_type) = &part.content_type {
                mp = mp.mime_str(content_type)?;
            }
            form = form.part(part.name.clone(), mp);
        }
        return Ok(builder.multipart(form));
    }

    Ok(match &params.body {
        None => builder,
        Some(Body::Bytes(bytes)) => builder.body(bytes.clone()),
        Some(Body::Form(fields)) => builder.form(fields),
        Some(Body::Json(value)) => builder.json(value),
    })
}

fn apply_body_blocking(
    builder: reqwest::blocking::RequestBuilder,
    params: &HttpParams,
) -> Result<reqwest::blocking::RequestBuilder, Error> {
    if !params.files.is_empty() {
        let mut form = reqwest::blocking::multipart::Form::new();
        if let Some(Body::Form(fields)) = &params.body {
            for (name, value) in fields {
                form = form.text(name.clone(), value.clone());
            }
        }
        for part in &params.files {
            let mut mp = reqwest::blocking::multipart::Part::bytes(part.data.clone());
            if let Some(filename) = &part.filename {
                mp = mp.file_name(filename.clone());
            }
            if let Some(content_type) = &part.content_type {
                mp = mp.mime_str(content_type)?;
            }
            form = form.part(part.name.clone(), mp);
        }
        return Ok(builder.multipart(form));
    }

    Ok(match &params.body {
        None => builder,
        Some(Body::Bytes(bytes)) => builder.body(bytes.clone()),
        Some(Body::Form(fields)) => builder.form(fields),
        Some(Body::Json(value)) => builder.json(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Timeout;

    #[test]
    fn cookie_header_joins_pairs() {
        let mut cookies = IndexMap::new();
        cookies.insert("session".to_string(), "abc".to_string());
        cookies.insert("csrf".to_string(), "xyz".to_string());
        assert_eq!(cookie_header(&cookies), "session=abc; csrf=xyz");
    }

    #[test]
    fn request_timeout_defaults_to_thirty_seconds() {
        let params = HttpParams::get("https://example.com");
        assert_eq!(request_timeout(&params), Duration::from_secs(30));

        let with_timeout =
            HttpParams::get("https://example.com").with_timeout(Timeout::Total(5.0));
        assert_eq!(request_timeout(&with_timeout), Duration::from_secs(5));
    }
}
