//! HTTP request parameters: the immutable record describing one wire request.
//!
//! `HttpParams` carries everything the transport needs to send a request.
//! It is plain data: construction goes through the `Method` shorthands
//! (`HttpParams::get`, `::post`, …) and `with_*` builder methods that consume
//! `self`, so a finished value is never mutated in place.

use indexmap::IndexMap;
use std::path::PathBuf;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    /// The uppercase wire token for this method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query parameters: either explicitly ordered pairs or a mapping.
///
/// The distinction matters for deduplication keys: pair lists and mappings
/// are both sorted before hashing, but the original ordering is preserved on
/// the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParams {
    Pairs(Vec<(String, String)>),
    Map(IndexMap<String, String>),
}

impl QueryParams {
    /// All pairs in wire order.
    #[must_use]
    pub fn pairs(&self) -> Vec<(String, String)> {
        match self {
            Self::Pairs(pairs) => pairs.clone(),
            Self::Map(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    /// All pairs sorted by key then value, for stable hashing.
    #[must_use]
    pub fn sorted_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = self.pairs();
        pairs.sort();
        pairs
    }
}

/// Request body representations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Raw bytes, sent as-is
    Bytes(Vec<u8>),
    /// Form fields, sent urlencoded
    Form(IndexMap<String, String>),
    /// Structured JSON
    Json(serde_json::Value),
}

/// One part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Request timeout: a single total budget, or a connect/read pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timeout {
    Total(f64),
    ConnectRead { connect: f64, read: f64 },
}

impl Timeout {
    /// The budget that bounds the whole request, in seconds.
    #[must_use]
    pub const fn total_secs(self) -> f64 {
        match self {
            Self::Total(secs) => secs,
            Self::ConnectRead { connect, read } => connect + read,
        }
    }
}

/// TLS verification policy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TlsVerify {
    #[default]
    Enabled,
    Disabled,
    /// Verify against a specific CA bundle
    CaBundle(PathBuf),
}

/// The immutable parameter record for one HTTP request.
#[derive(Debug, Clone)]
pub struct HttpParams {
    pub method: Method,
    /// Absolute or relative URL; relative URLs are resolved against the
    /// request's navigation context before fetching.
    pub url: String,
    pub query: Option<QueryParams>,
    pub body: Option<Body>,
    pub headers: IndexMap<String, String>,
    pub cookies: IndexMap<String, String>,
    pub files: Vec<FilePart>,
    /// Basic auth (username, password)
    pub auth: Option<(String, String)>,
    pub timeout: Option<Timeout>,
    pub follow_redirects: bool,
    pub proxies: IndexMap<String, String>,
    pub verify: TlsVerify,
    pub stream: bool,
    pub client_cert: Option<PathBuf>,
}

impl HttpParams {
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: None,
            body: None,
            headers: IndexMap::new(),
            cookies: IndexMap::new(),
            files: Vec::new(),
            auth: None,
            timeout: None,
            follow_redirects: true,
            proxies: IndexMap::new(),
            verify: TlsVerify::Enabled,
            stream: false,
            client_cert: None,
        }
    }

    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    #[must_use]
    pub fn with_query_pairs(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query = Some(QueryParams::Pairs(pairs));
        self
    }

    #[must_use]
    pub fn with_query_map(mut self, map: IndexMap<String, String>) -> Self {
        self.query = Some(QueryParams::Map(map));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_form(self, form: IndexMap<String, String>) -> Self {
        self.with_body(Body::Form(form))
    }

    #[must_use]
    pub fn with_json(self, value: serde_json::Value) -> Self {
        self.with_body(Body::Json(value))
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some((username.into(), password.into()));
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn without_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }
}

impl From<&str> for HttpParams {
    fn from(url: &str) -> Self {
        Self::get(url)
    }
}

impl From<String> for HttpParams {
    fn from(url: String) -> Self {
        Self::get(url)
    }
}
