//! Built-in interceptors: rate limiting, WARC capture/replay, mocking,
//! header injection, and logging.

pub mod headers;
pub mod logger;
pub mod mock;
pub mod rate_limit;
pub mod warc;

pub use headers::HeaderInterceptor;
pub use logger::LoggingInterceptor;
pub use mock::{CannedResponse, MockInterceptor};
pub use rate_limit::{RateLimitInterceptor, RateLimitStats};
pub use warc::{WarcCaptureInterceptor, WarcReplayInterceptor};
