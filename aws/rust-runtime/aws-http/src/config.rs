/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Client configuration shared by every request a client creates.

use crate::endpoint::{ResolveEndpoint, SharedEndpointResolver, StaticEndpoint};
use crate::retry::{Retryer, SharedRetryer};
use crate::signing::{SharedSigner, SignRequest};
use aws_auth::CredentialsCache;
use aws_types::credential::ProvideCredentials;
use aws_types::Region;
use smithy_async::rt::sleep::{default_async_sleep, SharedAsyncSleep};
use smithy_async::time::{SharedTimeSource, TimeSource};
use smithy_http::connector::{HttpConnector, SharedConnector};
use std::time::Duration;

/// How much of each request is written to the debug log
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off,
    /// Lifecycle events: stages, retries, response status
    Debug,
    /// Everything `Debug` logs, plus request and response bodies
    DebugWithHttpBody,
}

impl LogLevel {
    pub fn matches(self, level: LogLevel) -> bool {
        self >= level
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Off
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    region: Option<Region>,
    credentials: Option<CredentialsCache>,
    endpoint_resolver: Option<SharedEndpointResolver>,
    connector: Option<SharedConnector>,
    signer: Option<SharedSigner>,
    retryer: Option<SharedRetryer>,
    sleep_impl: Option<SharedAsyncSleep>,
    time_source: SharedTimeSource,
    log_level: LogLevel,
    enforce_should_retry_check: bool,
    response_timeout: Option<Duration>,
}

impl Config {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    /// Credentials used to sign requests. `None` sends requests anonymously.
    pub fn credentials(&self) -> Option<&CredentialsCache> {
        self.credentials.as_ref()
    }

    pub fn endpoint_resolver(&self) -> Option<&SharedEndpointResolver> {
        self.endpoint_resolver.as_ref()
    }

    pub fn connector(&self) -> Option<&SharedConnector> {
        self.connector.as_ref()
    }

    pub fn signer(&self) -> Option<&SharedSigner> {
        self.signer.as_ref()
    }

    pub fn retryer(&self) -> Option<&SharedRetryer> {
        self.retryer.as_ref()
    }

    pub fn sleep_impl(&self) -> Option<&SharedAsyncSleep> {
        self.sleep_impl.as_ref()
    }

    pub fn time_source(&self) -> &SharedTimeSource {
        &self.time_source
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    /// When set, a retry decision made by a handler is re-evaluated by the retryer
    pub fn enforce_should_retry_check(&self) -> bool {
        self.enforce_should_retry_check
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout
    }

    /// Returns a builder seeded with this configuration
    pub fn to_builder(&self) -> Builder {
        Builder {
            region: self.region.clone(),
            credentials: self.credentials.clone(),
            endpoint_resolver: self.endpoint_resolver.clone(),
            connector: self.connector.clone(),
            signer: self.signer.clone(),
            retryer: self.retryer.clone(),
            sleep_impl: self.sleep_impl.clone(),
            time_source: Some(self.time_source.clone()),
            log_level: self.log_level,
            enforce_should_retry_check: self.enforce_should_retry_check,
            response_timeout: self.response_timeout,
        }
    }
}

#[derive(Default, Debug)]
pub struct Builder {
    region: Option<Region>,
    credentials: Option<CredentialsCache>,
    endpoint_resolver: Option<SharedEndpointResolver>,
    connector: Option<SharedConnector>,
    signer: Option<SharedSigner>,
    retryer: Option<SharedRetryer>,
    sleep_impl: Option<SharedAsyncSleep>,
    time_source: Option<SharedTimeSource>,
    log_level: LogLevel,
    enforce_should_retry_check: bool,
    response_timeout: Option<Duration>,
}

impl Builder {
    pub fn region(mut self, region: impl Into<Option<Region>>) -> Self {
        self.region = region.into();
        self
    }

    /// Loads credentials from `provider`, caching them until they expire
    pub fn credentials_provider(mut self, provider: impl ProvideCredentials + 'static) -> Self {
        self.credentials = Some(CredentialsCache::new(provider));
        self
    }

    /// Uses an already configured cache, eg. one with a custom expiry window
    pub fn credentials_cache(mut self, cache: CredentialsCache) -> Self {
        self.credentials = Some(cache);
        self
    }

    /// Sends requests unsigned
    pub fn anonymous_credentials(mut self) -> Self {
        self.credentials = None;
        self
    }

    pub fn endpoint_resolver(mut self, resolver: impl ResolveEndpoint + 'static) -> Self {
        self.endpoint_resolver = Some(SharedEndpointResolver::new(resolver));
        self
    }

    /// Sends every request to `url`
    pub fn endpoint_url(self, url: impl Into<String>) -> Self {
        self.endpoint_resolver(StaticEndpoint::url(url))
    }

    pub fn connector(mut self, connector: impl HttpConnector + 'static) -> Self {
        self.connector = Some(SharedConnector::new(connector));
        self
    }

    pub fn signer(mut self, signer: impl SignRequest + 'static) -> Self {
        self.signer = Some(SharedSigner::new(signer));
        self
    }

    pub fn retryer(mut self, retryer: impl Retryer + 'static) -> Self {
        self.retryer = Some(SharedRetryer::new(retryer));
        self
    }

    pub fn sleep_impl(mut self, sleep_impl: SharedAsyncSleep) -> Self {
        self.sleep_impl = Some(sleep_impl);
        self
    }

    pub fn time_source(mut self, time_source: impl TimeSource + 'static) -> Self {
        self.time_source = Some(SharedTimeSource::new(time_source));
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn enforce_should_retry_check(mut self, enforce: bool) -> Self {
        self.enforce_should_retry_check = enforce;
        self
    }

    /// Fails an attempt with a retryable error when no response arrives within `timeout`
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Config {
        Config {
            region: self.region,
            credentials: self.credentials,
            endpoint_resolver: self.endpoint_resolver,
            connector: self.connector,
            signer: self.signer,
            retryer: self.retryer,
            sleep_impl: self.sleep_impl.or_else(default_async_sleep),
            time_source: self.time_source.unwrap_or_default(),
            log_level: self.log_level,
            enforce_should_retry_check: self.enforce_should_retry_check,
            response_timeout: self.response_timeout,
        }
    }
}
