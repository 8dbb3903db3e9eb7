//! # docketeer
//!
//! A scraper execution engine: user-authored scrapers expressed as named
//! *continuation methods* run against remote HTTP servers through a
//! priority-queue scheduler, an interceptor middleware chain, and a set of
//! lifecycle callbacks.
//!
//! A scraper provides a seed request ([`Scraper::entry`]) and a method per
//! continuation name. Each continuation consumes a [`StepContext`] and lazily
//! yields parsed data, new requests, or nothing. The engine schedules yielded
//! requests by priority (FIFO within equal priority), fetches them through
//! the interceptor chain (where rate limiting, WARC capture/replay, and
//! mocking plug in), and routes every outcome to the right callback:
//! validated data, validation failures, transient transport errors,
//! structural assumption violations, and run lifecycle events.
//!
//! Two engines share the same semantics: [`SyncEngine`] (one worker, plain
//! heap, blocking I/O) and [`AsyncEngine`] (N cooperative workers over a
//! shared queue).
//!
//! ```no_run
//! use docketeer::{AsyncEngine, Hooks, Request, Scraper, StepFn, Yield, YieldStream};
//! use docketeer::{validate_with_serde, Error, FieldError, Validate};
//!
//! #[derive(serde::Deserialize)]
//! struct CaseData {
//!     docket: String,
//! }
//!
//! impl Validate for CaseData {
//!     const MODEL_NAME: &'static str = "CaseData";
//!     fn validate(raw: serde_json::Value) -> Result<Self, Vec<FieldError>> {
//!         validate_with_serde(raw)
//!     }
//! }
//!
//! struct BugCourt;
//!
//! impl Scraper for BugCourt {
//!     type Output = CaseData;
//!
//!     fn name(&self) -> &str {
//!         "bug_court"
//!     }
//!
//!     fn entry(&self) -> Result<Request, Error> {
//!         Ok(Request::navigating("https://bugcourt.example/cases", "parse_list"))
//!     }
//!
//!     fn continuation(&self, name: &str) -> Result<StepFn<CaseData>, Error> {
//!         match name {
//!             "parse_list" => Ok(Box::new(|_ctx| {
//!                 let detail = Request::navigating("/cases/BCC-2024-001", "parse_detail");
//!                 Box::new(std::iter::once(Ok(Yield::request(detail))))
//!                     as YieldStream<CaseData>
//!             })),
//!             "parse_detail" => Ok(Box::new(|_ctx| {
//!                 Box::new(std::iter::once(Ok(Yield::data(CaseData {
//!                     docket: "BCC-2024-001".into(),
//!                 })))) as YieldStream<CaseData>
//!             })),
//!             other => Err(Error::scraper(format!("unknown continuation: {other}"))),
//!         }
//!     }
//! }
//!
//! # async fn run() -> Result<(), Error> {
//! let engine = AsyncEngine::new(BugCourt)?
//!     .with_num_workers(4)
//!     .with_hooks(Hooks::new().on_data(|case: CaseData| println!("{}", case.docket)));
//! engine.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod context;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod http;
pub mod interceptor;
pub mod interceptors;
pub mod request;
pub mod response;
pub mod scraper;
pub mod transport;
pub mod validate;
pub mod warc;

pub use context::StepContext;
pub use engine::{AsyncEngine, Hooks, RunStatus, StopSignal, SyncEngine};
pub use error::{AssumptionError, DataFormatFailure, Error, FieldError, TransientError};
pub use http::{Body, HttpParams, Method, QueryParams, Timeout};
pub use interceptor::{BlockingInterceptor, Interceptor, RequestFlow};
pub use request::{DedupKey, Permanent, Request, RequestKind, ResolveContext};
pub use response::Response;
pub use scraper::{DataItem, Scraper, ScraperMetadata, StepFn, StepMetadata, Yield, YieldStream};
pub use validate::{validate_with_serde, Deferred, Validate};
