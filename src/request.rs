//! The request data model: navigation-aware, provenance-carrying requests.
//!
//! A `Request` pairs wire-level `HttpParams` with the scraping state machine's
//! bookkeeping: which continuation handles the response, where in the site the
//! request chain currently "is" (`current_location`), the ancestor chain,
//! per-branch scratch data, and chain-propagated permanent headers/cookies.
//!
//! Requests are immutable after construction: builder methods consume `self`
//! and `resolve_from` produces a *new* request. Per-branch maps
//! (`accumulated_data`, `aux_data`, `permanent`) are owned values, so sibling
//! requests yielded from the same continuation can never observe each other's
//! mutations.

use crate::dedup;
use crate::error::Error;
use crate::http::HttpParams;
use crate::response::Response;
use indexmap::IndexMap;
use std::sync::Arc;
use url::Url;

/// Scratch data passed between steps of one scraping branch.
pub type DataMap = serde_json::Map<String, serde_json::Value>;

/// How the response to a request affects the navigation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// The response becomes the new current location for descendants.
    Navigating,
    /// A side-call; descendants keep the parent's current location.
    NonNavigating,
    /// A side-call whose body is archived to local storage.
    Archive,
}

/// Deduplication-key policy for one request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DedupKey {
    /// Derive the default key from method, URL, and body at enqueue time.
    #[default]
    Auto,
    /// Never deduplicate this request.
    Skip,
    /// Use an explicit key.
    Key(String),
}

/// Headers and cookies that propagate to every descendant request.
///
/// On construction each request merges its permanent values into its own
/// `HttpParams`; on resolution the parent's permanent values are merged
/// underneath the child's (child wins on key conflicts).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permanent {
    pub headers: IndexMap<String, String>,
    pub cookies: IndexMap<String, String>,
}

impl Permanent {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.cookies.is_empty()
    }

    /// Parent-then-child merge: child entries win on conflict.
    fn merged_under(&self, parent: &Self) -> Self {
        let mut merged = parent.clone();
        merged.headers.extend(self.headers.clone());
        merged.cookies.extend(self.cookies.clone());
        merged
    }
}

/// Default priority for navigating and non-navigating requests.
pub const DEFAULT_PRIORITY: i32 = 9;
/// Default priority for archive requests; file downloads preempt page fetches.
pub const ARCHIVE_PRIORITY: i32 = 1;

/// One unit of scheduled work: an HTTP request plus the state-machine
/// bookkeeping needed to route its response.
#[derive(Debug, Clone)]
pub struct Request {
    pub kind: RequestKind,
    pub http: HttpParams,
    /// Name of the scraper method that consumes the response.
    pub continuation: String,
    /// URL context for resolving this request's relative descendants.
    pub current_location: Option<String>,
    /// Append-only chain of ancestor requests, oldest first.
    pub previous_requests: Vec<Arc<Request>>,
    /// Partial data the scraper threads through this branch.
    pub accumulated_data: DataMap,
    /// Navigation metadata (session tokens, CSRF values, cursors).
    pub aux_data: DataMap,
    pub permanent: Permanent,
    /// Lower values pop first.
    pub priority: i32,
    pub deduplication_key: DedupKey,
    /// File-type hint for archive requests (`"pdf"`, `"audio"`, …).
    pub expected_type: Option<String>,
}

impl Request {
    fn new(kind: RequestKind, http: impl Into<HttpParams>, continuation: impl Into<String>) -> Self {
        let priority = match kind {
            RequestKind::Archive => ARCHIVE_PRIORITY,
            _ => DEFAULT_PRIORITY,
        };
        Self {
            kind,
            http: http.into(),
            continuation: continuation.into(),
            current_location: None,
            previous_requests: Vec::new(),
            accumulated_data: DataMap::new(),
            aux_data: DataMap::new(),
            permanent: Permanent::default(),
            priority,
            deduplication_key: DedupKey::Auto,
            expected_type: None,
        }
    }

    /// A request whose response becomes the new navigation context.
    #[must_use]
    pub fn navigating(http: impl Into<HttpParams>, continuation: impl Into<String>) -> Self {
        Self::new(RequestKind::Navigating, http, continuation)
    }

    /// A side-call that keeps the parent's navigation context.
    #[must_use]
    pub fn non_navigating(http: impl Into<HttpParams>, continuation: impl Into<String>) -> Self {
        Self::new(RequestKind::NonNavigating, http, continuation)
    }

    /// A side-call whose response body is written to local storage.
    #[must_use]
    pub fn archive(http: impl Into<HttpParams>, continuation: impl Into<String>) -> Self {
        Self::new(RequestKind::Archive, http, continuation)
    }

    #[must_use]
    pub fn with_accumulated_data(mut self, data: DataMap) -> Self {
        self.accumulated_data = data;
        self
    }

    #[must_use]
    pub fn with_aux_data(mut self, data: DataMap) -> Self {
        self.aux_data = data;
        self
    }

    /// Set permanent headers/cookies; they are merged into this request's
    /// `HttpParams` immediately and propagate to descendants.
    #[must_use]
    pub fn with_permanent(mut self, permanent: Permanent) -> Self {
        self.permanent = permanent;
        self.apply_permanent();
        self
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_dedup_key(mut self, key: impl Into<String>) -> Self {
        self.deduplication_key = DedupKey::Key(key.into());
        self
    }

    /// Exclude this request from deduplication checks.
    #[must_use]
    pub fn skip_dedup(mut self) -> Self {
        self.deduplication_key = DedupKey::Skip;
        self
    }

    #[must_use]
    pub fn with_expected_type(mut self, expected: impl Into<String>) -> Self {
        self.expected_type = Some(expected.into());
        self
    }

    /// Merge permanent headers/cookies into the HTTP parameters. Explicit
    /// per-request values win over permanent ones.
    fn apply_permanent(&mut self) {
        for (name, value) in &self.permanent.headers {
            self.http
                .headers
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        for (name, value) in &self.permanent.cookies {
            self.http
                .cookies
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// The key used for duplicate checks: `None` when deduplication is
    /// skipped, the explicit key when set, otherwise the derived default.
    #[must_use]
    pub fn effective_dedup_key(&self) -> Option<String> {
        match &self.deduplication_key {
            DedupKey::Skip => None,
            DedupKey::Key(key) => Some(key.clone()),
            DedupKey::Auto => Some(dedup::default_key(&self.http)),
        }
    }

    /// Resolve this request against the context that yielded it, producing
    /// the request that actually gets scheduled.
    ///
    /// - The URL is joined RFC-3986-style against the context location and
    ///   normalized (percent-decoded, then re-encoded with `/` kept safe in
    ///   the path and `=`/`&` kept safe in the query).
    /// - Navigating requests take the resolved target as their new
    ///   `current_location`; side-calls inherit the context location.
    /// - The parent is appended to the provenance chain, and the parent's
    ///   permanent values are merged underneath this request's.
    ///
    /// # Errors
    ///
    /// Returns an error if the context location or the joined URL cannot be
    /// parsed.
    pub fn resolve_from(mut self, context: &ResolveContext<'_>) -> Result<Self, Error> {
        let (location, parent) = match context {
            ResolveContext::Response(response) => {
                (response.url.clone(), Arc::clone(&response.request))
            }
            ResolveContext::Request(request) => {
                let location = request
                    .current_location
                    .clone()
                    .unwrap_or_else(|| request.http.url.clone());
                (location, Arc::clone(request))
            }
        };

        let base = Url::parse(&location)?;
        let resolved = normalize_url(&base.join(&self.http.url)?);

        self.http.url = resolved.clone();
        self.current_location = Some(match self.kind {
            RequestKind::Navigating => resolved,
            RequestKind::NonNavigating | RequestKind::Archive => location,
        });

        let mut chain = parent.previous_requests.clone();
        chain.push(parent.clone());
        self.previous_requests = chain;

        self.permanent = self.permanent.merged_under(&parent.permanent);
        self.apply_permanent();

        Ok(self)
    }
}

/// The context a yielded request is resolved against: the triggering response
/// for navigating requests, the originating request for side-calls.
#[derive(Debug)]
pub enum ResolveContext<'a> {
    Response(&'a Response),
    Request(&'a Arc<Request>),
}

/// Normalize a URL by percent-decoding the path and query, then re-encoding
/// with `/` safe in the path and `=`/`&` safe in the query.
#[must_use]
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();

    let path = url
        .path()
        .split('/')
        .map(recode_component)
        .collect::<Vec<_>>()
        .join("/");
    normalized.set_path(&path);

    if let Some(query) = url.query() {
        let recoded = query
            .split('&')
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => {
                    format!("{}={}", recode_component(key), recode_component(value))
                }
                None => recode_component(pair),
            })
            .collect::<Vec<_>>()
            .join("&");
        normalized.set_query(Some(&recoded));
    }

    normalized.to_string()
}

/// Percent-decode one component and re-encode it. Components holding invalid
/// percent sequences are kept verbatim.
fn recode_component(component: &str) -> String {
    urlencoding::decode(component).map_or_else(
        |_| component.to_string(),
        |decoded| urlencoding::encode(&decoded).into_owned(),
    )
}
