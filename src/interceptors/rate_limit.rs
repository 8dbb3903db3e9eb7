//! Request rate limiting with adaptive slow-down on 429 responses.
//!
//! The limiter delays requests on the way out to hold a configured rate.
//! In adaptive mode (the default) every 429 response divides the rate by
//! `1 + adaptive_increase`, so with the default 10% increase the rate drops
//! to roughly 91% of its previous value. There is no recovery path; the
//! rate only goes down within one run.
//!
//! Place caches *before* this interceptor so replayed hits are not
//! rate-limited.

use crate::error::Error;
use crate::interceptor::{BlockingInterceptor, Interceptor, RequestFlow};
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Unit the configured rate is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RateUnit {
    PerSecond,
    PerMinute,
}

impl RateUnit {
    const fn unit_secs(self) -> f64 {
        match self {
            Self::PerSecond => 1.0,
            Self::PerMinute => 60.0,
        }
    }
}

struct LimiterState {
    limiter: Arc<DefaultDirectRateLimiter>,
    current_rate: f64,
    total_requests: u64,
    total_wait: Duration,
    adaptive_reductions: u64,
}

/// Snapshot of limiter activity.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitStats {
    pub total_requests: u64,
    pub total_wait_time: Duration,
    pub average_wait_time: Duration,
    /// Current rate in the configured unit (per second or per minute).
    pub current_rate: f64,
    pub adaptive_reductions: u64,
}

/// Interceptor that paces requests and slows down on 429 responses.
pub struct RateLimitInterceptor {
    state: Mutex<LimiterState>,
    unit: RateUnit,
    adaptive: bool,
    adaptive_increase: f64,
    max_delay: Duration,
    clock: DefaultClock,
}

impl RateLimitInterceptor {
    /// Limit to `rate` requests per second.
    ///
    /// # Errors
    ///
    /// Returns an error when the rate is not positive.
    pub fn per_second(rate: f64) -> Result<Self, Error> {
        Self::with_unit(rate, RateUnit::PerSecond)
    }

    /// Limit to `rate` requests per minute.
    ///
    /// # Errors
    ///
    /// Returns an error when the rate is not positive.
    pub fn per_minute(rate: f64) -> Result<Self, Error> {
        Self::with_unit(rate, RateUnit::PerMinute)
    }

    fn with_unit(rate: f64, unit: RateUnit) -> Result<Self, Error> {
        let limiter = build_limiter(rate, unit)?;
        Ok(Self {
            state: Mutex::new(LimiterState {
                limiter,
                current_rate: rate,
                total_requests: 0,
                total_wait: Duration::ZERO,
                adaptive_reductions: 0,
            }),
            unit,
            adaptive: true,
            adaptive_increase: 0.10,
            max_delay: Duration::from_secs(3600),
            clock: DefaultClock::default(),
        })
    }

    /// Enable or disable adaptive slow-down on 429 responses.
    #[must_use]
    pub fn adaptive(mut self, adaptive: bool) -> Self {
        self.adaptive = adaptive;
        self
    }

    /// Interval growth factor applied per 429 (0.10 = 10% slower).
    #[must_use]
    pub fn adaptive_increase(mut self, increase: f64) -> Self {
        self.adaptive_increase = increase;
        self
    }

    /// Upper bound on how long one acquisition may block.
    #[must_use]
    pub const fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Current activity snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn stats(&self) -> RateLimitStats {
        let state = self.state.lock().expect("rate limiter state poisoned");
        let average = if state.total_requests > 0 {
            state.total_wait / u32::try_from(state.total_requests).unwrap_or(u32::MAX)
        } else {
            Duration::ZERO
        };
        RateLimitStats {
            total_requests: state.total_requests,
            total_wait_time: state.total_wait,
            average_wait_time: average,
            current_rate: state.current_rate,
            adaptive_reductions: state.adaptive_reductions,
        }
    }

    fn current_limiter(&self) -> Arc<DefaultDirectRateLimiter> {
        Arc::clone(
            &self
                .state
                .lock()
                .expect("rate limiter state poisoned")
                .limiter,
        )
    }

    fn record_acquisition(&self, waited: Duration) {
        let mut state = self.state.lock().expect("rate limiter state poisoned");
        state.total_requests += 1;
        state.total_wait += waited;
    }

    fn acquire_blocking(&self) -> Result<(), Error> {
        let started = Instant::now();
        loop {
            let limiter = self.current_limiter();
            match limiter.check() {
                Ok(()) => break,
                Err(not_until) => {
                    let wait = not_until.wait_time_from(self.clock.now());
                    if started.elapsed() + wait > self.max_delay {
                        return Err(Error::rate_limit(format!(
                            "acquisition would exceed max delay of {:?}",
                            self.max_delay
                        )));
                    }
                    std::thread::sleep(wait.max(Duration::from_millis(1)));
                }
            }
        }
        self.record_acquisition(started.elapsed());
        Ok(())
    }

    async fn acquire(&self) -> Result<(), Error> {
        let started = Instant::now();
        let limiter = self.current_limiter();
        tokio::time::timeout(self.max_delay, limiter.until_ready())
            .await
            .map_err(|_| {
                Error::rate_limit(format!(
                    "acquisition would exceed max delay of {:?}",
                    self.max_delay
                ))
            })?;
        self.record_acquisition(started.elapsed());
        Ok(())
    }

    fn reduce_rate(&self) {
        let mut state = self.state.lock().expect("rate limiter state poisoned");
        let old_rate = state.current_rate;
        state.current_rate /= 1.0 + self.adaptive_increase;
        match build_limiter(state.current_rate, self.unit) {
            Ok(limiter) => {
                state.limiter = limiter;
                state.adaptive_reductions += 1;
                tracing::info!(
                    old_rate,
                    new_rate = state.current_rate,
                    "reduced request rate after 429"
                );
            }
            Err(err) => {
                state.current_rate = old_rate;
                tracing::warn!(error = %err, "could not rebuild rate limiter; keeping rate");
            }
        }
    }

    fn observe_response(&self, response: &Response) {
        if self.adaptive && response.status_code == 429 {
            self.reduce_rate();
        }
    }
}

fn build_limiter(rate: f64, unit: RateUnit) -> Result<Arc<DefaultDirectRateLimiter>, Error> {
    if rate <= 0.0 {
        return Err(Error::rate_limit(format!("rate must be positive, got {rate}")));
    }
    let period = Duration::from_secs_f64(unit.unit_secs() / rate);
    let quota = Quota::with_period(period)
        .ok_or_else(|| Error::rate_limit("rate produces a zero-length period"))?
        .allow_burst(NonZeroU32::MIN);
    Ok(Arc::new(RateLimiter::direct(quota)))
}

impl BlockingInterceptor for RateLimitInterceptor {
    fn modify_request(&self, request: Arc<Request>) -> Result<RequestFlow, Error> {
        self.acquire_blocking()?;
        Ok(RequestFlow::Forward(request))
    }

    fn modify_response(
        &self,
        response: Response,
        _original: &Arc<Request>,
    ) -> Result<Response, Error> {
        self.observe_response(&response);
        Ok(response)
    }
}

#[async_trait]
impl Interceptor for RateLimitInterceptor {
    async fn modify_request(&self, request: Arc<Request>) -> Result<RequestFlow, Error> {
        self.acquire().await?;
        Ok(RequestFlow::Forward(request))
    }

    async fn modify_response(
        &self,
        response: Response,
        _original: &Arc<Request>,
    ) -> Result<Response, Error> {
        self.observe_response(&response);
        Ok(response)
    }
}
