/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use aws_types::credential::{self, future, ProvideCredentials, SharedCredentialsProvider};
use aws_types::Credentials;
use smithy_async::time::{SharedTimeSource, TimeSource};
use smithy_types::rand::{RandomSource, SharedRandomSource};
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, trace_span, Instrument};

/// `CredentialsCache` implements [`ProvideCredentials`] by caching the credentials it loads from
/// a wrapped [`ProvideCredentials`] implementation.
///
/// Credentials are loaded lazily: nothing happens until the first call to `provide_credentials`,
/// and a refresh only happens when a caller observes that the cached value expired. Concurrent
/// callers that observe an empty or expired cache wait on a single provider call and all receive
/// its result.
///
/// An expiry window makes the cache treat credentials as expired before their real expiry.
/// A jitter fraction randomizes how much of that window is applied, so that many caches created
/// at the same moment do not all refresh at the same moment.
///
/// ```
/// use aws_auth::CredentialsCache;
/// use aws_types::credential::provide_credentials_fn;
/// use aws_types::Credentials;
/// use std::time::Duration;
///
/// let cache = CredentialsCache::builder()
///     .expiry_window(Duration::from_secs(5 * 60))
///     .expiry_window_jitter_fraction(0.2)
///     .build(provide_credentials_fn(|| async {
///         // An async process to retrieve credentials would go here:
///         Ok(Credentials::from_keys("example", "example", None))
///     }));
/// ```
#[derive(Clone)]
pub struct CredentialsCache {
    inner: Arc<Inner>,
}

impl Debug for CredentialsCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsCache")
            .field("provider", &self.inner.provider)
            .field("expiry_window", &self.inner.expiry_window)
            .field("jitter_fraction", &self.inner.jitter_fraction)
            .finish()
    }
}

impl CredentialsCache {
    /// Returns a new `Builder` that can be used to construct the `CredentialsCache`.
    pub fn builder() -> builder::Builder {
        builder::Builder::new()
    }

    /// Wraps `provider` with the default configuration: no expiry window, no jitter.
    pub fn new(provider: impl ProvideCredentials + 'static) -> Self {
        Self::builder().build(provider)
    }

    /// Loads credentials, from the cache when possible
    pub async fn retrieve(&self) -> credential::Result {
        self.inner.retrieve().await
    }

    /// Forces the next retrieval to call the wrapped provider.
    ///
    /// The wrapped provider is told to invalidate its own state as well.
    pub fn invalidate(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.provider.invalidate();
    }
}

impl ProvideCredentials for CredentialsCache {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.retrieve())
    }

    fn invalidate(&self) {
        CredentialsCache::invalidate(self)
    }
}

pub mod builder {
    use crate::cache::{Cache, CredentialsCache, Inner};
    use aws_types::credential::{ProvideCredentials, SharedCredentialsProvider};
    use smithy_async::time::{SharedTimeSource, TimeSource};
    use smithy_types::rand::{RandomSource, SharedRandomSource};
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;
    use std::time::Duration;

    /// Builder for constructing a [`CredentialsCache`].
    #[derive(Default)]
    pub struct Builder {
        expiry_window: Option<Duration>,
        jitter_fraction: Option<f64>,
        time_source: Option<SharedTimeSource>,
        random_source: Option<SharedRandomSource>,
    }

    impl Builder {
        pub fn new() -> Self {
            Default::default()
        }

        /// (Optional) Refresh credentials this long before they actually expire.
        /// Defaults to zero.
        pub fn expiry_window(mut self, window: Duration) -> Self {
            self.expiry_window = Some(window);
            self
        }

        /// (Optional) Fraction of the expiry window, in `[0, 1]`, that is randomly given back.
        ///
        /// With a 5 minute window and a fraction of 0.5, credentials are refreshed between
        /// 2.5 and 5 minutes before they expire. Defaults to zero.
        pub fn expiry_window_jitter_fraction(mut self, fraction: f64) -> Self {
            self.jitter_fraction = Some(fraction);
            self
        }

        /// (Optional) Clock used to decide whether the cached credentials expired
        pub fn time_source(mut self, time_source: impl TimeSource + 'static) -> Self {
            self.time_source = Some(SharedTimeSource::new(time_source));
            self
        }

        /// (Optional) Random source used to jitter the expiry window
        pub fn random_source(mut self, random_source: impl RandomSource + 'static) -> Self {
            self.random_source = Some(SharedRandomSource::new(random_source));
            self
        }

        /// Creates the [`CredentialsCache`] around `provider`.
        pub fn build(self, provider: impl ProvideCredentials + 'static) -> CredentialsCache {
            let jitter_fraction = self.jitter_fraction.unwrap_or_default();
            let jitter_fraction = if jitter_fraction.is_nan() {
                0.0
            } else {
                jitter_fraction.max(0.0).min(1.0)
            };
            CredentialsCache {
                inner: Arc::new(Inner {
                    provider: SharedCredentialsProvider::new(provider),
                    cache: Cache::new(),
                    time_source: self.time_source.unwrap_or_default(),
                    random_source: self.random_source.unwrap_or_default(),
                    expiry_window: self.expiry_window.unwrap_or_default(),
                    jitter_fraction,
                    generation: AtomicU64::new(0),
                }),
            }
        }
    }
}

struct Inner {
    provider: SharedCredentialsProvider,
    cache: Cache,
    time_source: SharedTimeSource,
    random_source: SharedRandomSource,
    expiry_window: Duration,
    jitter_fraction: f64,
    /// Bumped by `invalidate`; cached values from an older generation are stale.
    /// Values from a newer generation than a caller observed are still fresh to it.
    generation: AtomicU64,
}

impl Inner {
    async fn retrieve(&self) -> credential::Result {
        let now = self.time_source.now();
        let generation = self.generation.load(Ordering::SeqCst);
        if let Some(cached) = self.cache.get().await {
            if !cached.is_stale(now, generation) {
                return Ok(cached.credentials);
            }
            self.cache.clear_if_stale(now, generation).await;
        }
        self.refresh(generation)
            .instrument(trace_span!("lazy_refresh_credentials"))
            .await
    }

    async fn refresh(&self, generation: u64) -> credential::Result {
        self.cache
            .refresh(|| async move {
                let credentials = self.provider.provide_credentials().await?;
                let credentials = self.apply_expiry_window(credentials);
                debug!(credentials = ?credentials, "loaded credentials");
                Ok(Cached {
                    credentials,
                    generation,
                })
            })
            .await
    }

    /// Moves the expiry of `credentials` earlier by the (jittered) expiry window
    fn apply_expiry_window(&self, credentials: Credentials) -> Credentials {
        match credentials.expiry() {
            Some(expiry) if self.expiry_window > Duration::ZERO => {
                let jitter = self
                    .expiry_window
                    .mul_f64(self.jitter_fraction * self.random_source.next_f64());
                let early = self.expiry_window.saturating_sub(jitter);
                let adjusted = expiry.checked_sub(early).unwrap_or(SystemTime::UNIX_EPOCH);
                credentials.with_expiry(adjusted)
            }
            _ => credentials,
        }
    }
}

#[derive(Clone, Debug)]
struct Cached {
    credentials: Credentials,
    generation: u64,
}

impl Cached {
    fn is_stale(&self, now: SystemTime, generation: u64) -> bool {
        self.generation < generation || self.credentials.is_expired_at(now)
    }
}

struct Cache {
    value: RwLock<OnceCell<Cached>>,
}

impl Cache {
    fn new() -> Cache {
        Cache {
            value: RwLock::new(OnceCell::new()),
        }
    }

    async fn get(&self) -> Option<Cached> {
        self.value.read().await.get().cloned()
    }

    /// Fills the cell with `f` unless another caller already did. Callers that arrive while `f`
    /// is running wait for it instead of starting their own.
    async fn refresh<F, Fut>(&self, f: F) -> credential::Result
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Cached, credential::CredentialsError>>,
    {
        let lock = self.value.read().await;
        let future = lock.get_or_try_init(f);
        future.await.map(|cached| cached.credentials.clone())
    }

    /// Returns true if the cache was cleared
    async fn clear_if_stale(&self, now: SystemTime, generation: u64) -> bool {
        let mut lock = self.value.write().await;

        // Only clear the cache if it hasn't been cleared by another task. If it was already
        // cleared, then another task is initializing the empty cell.
        let should_clear = lock
            .get()
            .map(|cached| cached.is_stale(now, generation))
            .unwrap_or(false);
        if should_clear {
            *lock = OnceCell::new();
        }
        should_clear
    }
}
