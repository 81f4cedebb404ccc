/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Retry policy.
//!
//! A [`Retryer`] decides whether a failed attempt is sent again and how long to wait first.
//! [`DefaultRetryer`] implements exponential backoff with full-range jitter, separate bounds for
//! throttled responses, and honors `Retry-After` on 429 and 503 responses. A `Retry-After` longer
//! than the maximum throttle delay is capped to it.

use crate::request::Request;
use smithy_http::header;
use smithy_types::rand::{RandomSource, SharedRandomSource};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

pub trait Retryer: Send + Sync + Debug {
    /// Maximum number of retries after the initial attempt
    fn max_retries(&self) -> u32;

    /// Whether the failed attempt recorded on `request` should be retried
    fn should_retry(&self, request: &Request) -> bool;

    /// Delay before the next attempt
    fn retry_rules(&self, request: &Request) -> Duration;
}

#[derive(Clone, Debug)]
pub struct SharedRetryer(Arc<dyn Retryer>);

impl SharedRetryer {
    pub fn new(retryer: impl Retryer + 'static) -> Self {
        SharedRetryer(Arc::new(retryer))
    }
}

impl Retryer for SharedRetryer {
    fn max_retries(&self) -> u32 {
        self.0.max_retries()
    }

    fn should_retry(&self, request: &Request) -> bool {
        self.0.should_retry(request)
    }

    fn retry_rules(&self, request: &Request) -> Duration {
        self.0.retry_rules(request)
    }
}

/// Never retries
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpRetryer;

impl Retryer for NoOpRetryer {
    fn max_retries(&self) -> u32 {
        0
    }

    fn should_retry(&self, _: &Request) -> bool {
        false
    }

    fn retry_rules(&self, _: &Request) -> Duration {
        Duration::ZERO
    }
}

/// Delegates to another retryer with a different retry limit
#[derive(Clone, Debug)]
pub struct MaxRetries {
    inner: SharedRetryer,
    max_retries: u32,
}

impl MaxRetries {
    pub fn new(inner: SharedRetryer, max_retries: u32) -> Self {
        MaxRetries { inner, max_retries }
    }
}

impl Retryer for MaxRetries {
    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn should_retry(&self, request: &Request) -> bool {
        self.inner.should_retry(request)
    }

    fn retry_rules(&self, request: &Request) -> Duration {
        self.inner.retry_rules(request)
    }
}

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_MIN_RETRY_DELAY: Duration = Duration::from_millis(30);
pub const DEFAULT_MIN_THROTTLE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(300);
pub const DEFAULT_MAX_THROTTLE_DELAY: Duration = Duration::from_secs(300);

const THROTTLE_STATUS_CODES: &[u16] = &[429, 502, 503, 504];
const RETRY_AFTER_STATUS_CODES: &[u16] = &[429, 503];

/// Exponential backoff with jitter.
///
/// The delay before retry `n` (counting from zero) is `2^n * jitter(min)` where `jitter(d)` is
/// uniformly distributed over `[d, 2d)`. A delay that would exceed the maximum, or whose
/// computation would overflow, is replaced by `jitter(max / 2)`.
#[derive(Clone, Debug)]
pub struct DefaultRetryer {
    num_max_retries: u32,
    min_retry_delay: Duration,
    min_throttle_delay: Duration,
    max_retry_delay: Duration,
    max_throttle_delay: Duration,
    random: SharedRandomSource,
}

impl Default for DefaultRetryer {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DefaultRetryer {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// A retryer with default delays and `num_max_retries` retries
    pub fn new(num_max_retries: u32) -> Self {
        Self::builder().num_max_retries(num_max_retries).build()
    }

    /// Whether the failed attempt is a throttling failure, either by status or error code
    pub fn should_throttle(&self, request: &Request) -> bool {
        if let Some(status) = request.status() {
            if THROTTLE_STATUS_CODES.contains(&status.as_u16()) {
                return true;
            }
        }
        request.is_error_throttle()
    }

    fn retry_after(request: &Request) -> Option<Duration> {
        let response = request.http_response.as_ref()?;
        if !RETRY_AFTER_STATUS_CODES.contains(&response.status().as_u16()) {
            return None;
        }
        header::retry_after(response.headers())
    }

    fn backoff(&self, retry_count: u32, min: Duration, max: Duration) -> Duration {
        let min_nanos = min.as_nanos().max(1) as f64;
        let guard = min_nanos.log2().floor() as i64 + 1;
        if guard < 63 - i64::from(retry_count) {
            let seeded = self.random.seed_duration(min).as_nanos();
            let delay = Duration::from_nanos((seeded << retry_count) as u64);
            if delay <= max {
                return delay;
            }
        }
        self.random.seed_duration(max / 2)
    }
}

impl Retryer for DefaultRetryer {
    fn max_retries(&self) -> u32 {
        self.num_max_retries
    }

    fn should_retry(&self, request: &Request) -> bool {
        if let Some(retryable) = request.retryable {
            return retryable;
        }
        if matches!(request.status(), Some(status) if status.is_server_error()) {
            return true;
        }
        request.is_error_retryable() || self.should_throttle(request)
    }

    fn retry_rules(&self, request: &Request) -> Duration {
        let (min, max, initial) = if self.should_throttle(request) {
            (
                self.min_throttle_delay,
                self.max_throttle_delay,
                Self::retry_after(request)
                    .map(|delay| delay.min(self.max_throttle_delay))
                    .unwrap_or_default(),
            )
        } else {
            (self.min_retry_delay, self.max_retry_delay, Duration::ZERO)
        };
        self.backoff(request.retry_count, min, max)
            .saturating_add(initial)
    }
}

#[derive(Debug)]
pub struct Builder {
    num_max_retries: u32,
    min_retry_delay: Duration,
    min_throttle_delay: Duration,
    max_retry_delay: Duration,
    max_throttle_delay: Duration,
    random: Option<SharedRandomSource>,
}

impl Default for Builder {
    fn default() -> Self {
        Builder {
            num_max_retries: DEFAULT_MAX_RETRIES,
            min_retry_delay: DEFAULT_MIN_RETRY_DELAY,
            min_throttle_delay: DEFAULT_MIN_THROTTLE_DELAY,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
            max_throttle_delay: DEFAULT_MAX_THROTTLE_DELAY,
            random: None,
        }
    }
}

impl Builder {
    pub fn num_max_retries(mut self, retries: u32) -> Self {
        self.num_max_retries = retries;
        self
    }

    pub fn min_retry_delay(mut self, delay: Duration) -> Self {
        self.min_retry_delay = delay;
        self
    }

    pub fn min_throttle_delay(mut self, delay: Duration) -> Self {
        self.min_throttle_delay = delay;
        self
    }

    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    pub fn max_throttle_delay(mut self, delay: Duration) -> Self {
        self.max_throttle_delay = delay;
        self
    }

    /// Source of jitter. Defaults to a thread-safe `fastrand` generator.
    pub fn random_source(mut self, random: impl RandomSource + 'static) -> Self {
        self.random = Some(SharedRandomSource::new(random));
        self
    }

    pub fn build(self) -> DefaultRetryer {
        DefaultRetryer {
            num_max_retries: self.num_max_retries,
            min_retry_delay: self.min_retry_delay,
            min_throttle_delay: self.min_throttle_delay,
            max_retry_delay: self.max_retry_delay,
            max_throttle_delay: self.max_throttle_delay,
            random: self.random.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::config::Config;
    use crate::error::{SdkError, ServiceError};
    use crate::handlers::Handlers;
    use crate::operation::{Operation, ServiceMetadata};
    use crate::request::Request;
    use crate::retry::{DefaultRetryer, MaxRetries, NoOpRetryer, Retryer, SharedRetryer};
    use proptest::prelude::*;
    use smithy_http::body::SdkBody;
    use smithy_types::rand::StaticRandomSource;
    use std::time::Duration;

    fn request() -> Request {
        Request::new(
            Config::builder().build(),
            ServiceMetadata::new("mock"),
            Handlers::new(),
            SharedRetryer::new(NoOpRetryer),
            Operation::new("MockOperation"),
            serde_json::Value::Null,
        )
    }

    fn failed(status: u16, code: &str, headers: &[(&'static str, &str)]) -> Request {
        let mut request = request();
        let mut response = http::Response::builder().status(status);
        for (name, value) in headers {
            response = response.header(*name, *value);
        }
        request.http_response = Some(response.body(SdkBody::empty()).unwrap());
        request.error = Some(SdkError::service(ServiceError::new(status, code)));
        request
    }

    fn retryer(jitter: f64) -> DefaultRetryer {
        DefaultRetryer::builder()
            .random_source(StaticRandomSource::new(jitter))
            .build()
    }

    #[test]
    fn server_errors_are_retried() {
        let retryer = DefaultRetryer::default();
        assert!(retryer.should_retry(&failed(500, "InternalFailure", &[])));
        assert!(retryer.should_retry(&failed(501, "NotImplemented", &[])));
        assert!(!retryer.should_retry(&failed(400, "ValidationException", &[])));
        assert!(!retryer.should_retry(&failed(403, "AccessDenied", &[])));
    }

    #[test]
    fn explicit_decision_wins() {
        let retryer = DefaultRetryer::default();
        let mut request = failed(500, "InternalFailure", &[]);
        request.retryable = Some(false);
        assert!(!retryer.should_retry(&request));

        let mut request = failed(400, "ValidationException", &[]);
        request.retryable = Some(true);
        assert!(retryer.should_retry(&request));
    }

    #[test]
    fn throttling_by_status_or_code() {
        let retryer = DefaultRetryer::default();
        for status in &[429, 502, 503, 504] {
            assert!(retryer.should_throttle(&failed(*status, "UnknownError", &[])));
        }
        assert!(retryer.should_throttle(&failed(400, "Throttling", &[])));
        assert!(retryer.should_retry(&failed(400, "ThrottlingException", &[])));
        assert!(!retryer.should_throttle(&failed(500, "InternalFailure", &[])));
    }

    #[test]
    fn retryable_code_without_server_status() {
        let retryer = DefaultRetryer::default();
        assert!(retryer.should_retry(&failed(400, "RequestTimeout", &[])));
    }

    #[test]
    fn backoff_doubles_from_the_minimum() {
        let retryer = retryer(0.0);
        let mut request = failed(500, "InternalFailure", &[]);
        for (count, expected) in [30, 60, 120, 240].iter().enumerate() {
            request.retry_count = count as u32;
            assert_eq!(
                Duration::from_millis(*expected),
                retryer.retry_rules(&request)
            );
        }
    }

    #[test]
    fn throttled_backoff_uses_throttle_minimum() {
        let retryer = retryer(0.0);
        let mut request = failed(400, "Throttling", &[]);
        assert_eq!(Duration::from_millis(500), retryer.retry_rules(&request));
        request.retry_count = 2;
        assert_eq!(Duration::from_millis(2000), retryer.retry_rules(&request));
    }

    #[test]
    fn retry_after_is_added_for_429_and_503() {
        let retryer = retryer(0.0);
        let request = failed(429, "TooManyRequestsException", &[("retry-after", "3")]);
        assert_eq!(
            Duration::from_millis(3500),
            retryer.retry_rules(&request)
        );
        let request = failed(503, "SlowDown", &[("retry-after", "1")]);
        assert_eq!(
            Duration::from_millis(1500),
            retryer.retry_rules(&request)
        );
    }

    #[test]
    fn retry_after_applies_to_every_throttled_retry() {
        let retryer = retryer(0.0);
        let mut request = failed(429, "TooManyRequestsException", &[("retry-after", "1")]);
        let delays: Vec<_> = (0..3)
            .map(|count| {
                request.retry_count = count;
                retryer.retry_rules(&request)
            })
            .collect();
        assert_eq!(
            vec![
                Duration::from_millis(1500),
                Duration::from_millis(2000),
                Duration::from_millis(3000)
            ],
            delays
        );
    }

    #[test]
    fn zero_retry_after_adds_nothing() {
        let retryer = retryer(0.0);
        let request = failed(503, "SlowDown", &[("retry-after", "0")]);
        assert_eq!(Duration::from_millis(500), retryer.retry_rules(&request));
    }

    #[test]
    fn huge_retry_after_is_capped() {
        let retryer = retryer(0.0);
        let mut request = failed(
            429,
            "TooManyRequestsException",
            &[("retry-after", "18446744073709551615")],
        );
        request.retry_count = 1;
        assert_eq!(
            Duration::from_millis(1000) + Duration::from_secs(300),
            retryer.retry_rules(&request)
        );

        let retryer = DefaultRetryer::builder()
            .max_throttle_delay(Duration::MAX)
            .random_source(StaticRandomSource::new(0.0))
            .build();
        assert_eq!(Duration::MAX, retryer.retry_rules(&request));
    }

    #[test]
    fn retry_after_is_ignored_on_other_server_errors() {
        let retryer = retryer(0.0);
        let request = failed(500, "InternalFailure", &[("retry-after", "3")]);
        assert!(retryer.should_retry(&request));
        assert_eq!(Duration::from_millis(30), retryer.retry_rules(&request));
    }

    #[test]
    fn retry_after_is_ignored_elsewhere() {
        let retryer = retryer(0.0);
        let request = failed(502, "BadGateway", &[("retry-after", "3")]);
        assert_eq!(Duration::from_millis(500), retryer.retry_rules(&request));
        let request = failed(429, "TooManyRequestsException", &[("retry-after", "soon")]);
        assert_eq!(Duration::from_millis(500), retryer.retry_rules(&request));
    }

    #[test]
    fn delays_past_the_maximum_are_reseeded() {
        let retryer = DefaultRetryer::builder()
            .max_retry_delay(Duration::from_millis(100))
            .random_source(StaticRandomSource::new(0.0))
            .build();
        let mut request = failed(500, "InternalFailure", &[]);
        request.retry_count = 2;
        assert_eq!(Duration::from_millis(50), retryer.retry_rules(&request));
    }

    #[test]
    fn huge_retry_counts_do_not_overflow() {
        let retryer = retryer(0.0);
        let mut request = failed(500, "InternalFailure", &[]);
        request.retry_count = 200;
        assert_eq!(Duration::from_secs(150), retryer.retry_rules(&request));
    }

    #[test]
    fn max_retries_override() {
        let inner = SharedRetryer::new(DefaultRetryer::default());
        let limited = MaxRetries::new(inner, 7);
        assert_eq!(7, limited.max_retries());
        assert!(limited.should_retry(&failed(500, "InternalFailure", &[])));
        assert_eq!(0, NoOpRetryer.max_retries());
    }

    proptest! {
        #[test]
        fn delay_stays_within_jitter_bounds(jitter in 0.0f64..1.0, count in 0u32..3) {
            let retryer = retryer(jitter);
            let mut request = failed(500, "InternalFailure", &[]);
            request.retry_count = count;
            let delay = retryer.retry_rules(&request);
            let low = Duration::from_millis(30) * 2u32.pow(count);
            prop_assert!(delay >= low, "{:?} < {:?}", delay, low);
            prop_assert!(delay < low * 2, "{:?} >= {:?}", delay, low * 2);
        }
    }
}
