/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Per-request customizations.
//!
//! A [`RequestOption`] mutates a request before it is sent. Options are reusable: waiters apply
//! the same set to every request they create.

use crate::config::LogLevel;
use crate::handlers::Handlers;
use crate::request::Request;
use crate::retry::{MaxRetries, Retryer, SharedRetryer};
use http::HeaderMap;
use smithy_http::handler::handler_fn;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct RequestOption(Arc<dyn Fn(&mut Request) + Send + Sync>);

impl fmt::Debug for RequestOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RequestOption")
    }
}

impl RequestOption {
    pub fn new(f: impl Fn(&mut Request) + Send + Sync + 'static) -> Self {
        RequestOption(Arc::new(f))
    }

    pub fn apply(&self, request: &mut Request) {
        (self.0)(request)
    }
}

/// A value captured from a response after a request completes
#[derive(Debug)]
pub struct Captured<T>(Arc<Mutex<Option<T>>>);

impl<T> Clone for Captured<T> {
    fn clone(&self) -> Self {
        Captured(self.0.clone())
    }
}

impl<T> Default for Captured<T> {
    fn default() -> Self {
        Captured(Arc::new(Mutex::new(None)))
    }
}

impl<T: Clone> Captured<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently captured value
    pub fn get(&self) -> Option<T> {
        self.0.lock().ok().and_then(|value| value.clone())
    }

    fn set(&self, value: Option<T>) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = value;
        }
    }
}

const GET_RESPONSE_HEADER: &str = "core.GetResponseHeader";
const GET_RESPONSE_HEADERS: &str = "core.GetResponseHeaders";

/// Captures the value of response header `name` once the request completes
pub fn with_get_response_header(name: impl Into<String>, into: Captured<String>) -> RequestOption {
    let name = name.into();
    RequestOption::new(move |request| {
        let name = name.clone();
        let into = into.clone();
        request.handlers.complete.push_back_named(
            GET_RESPONSE_HEADER,
            handler_fn(move |request: &mut Request| {
                let value = request
                    .http_response
                    .as_ref()
                    .and_then(|response| response.headers().get(name.as_str()))
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                into.set(value);
            }),
        );
    })
}

/// Captures every response header once the request completes
pub fn with_get_response_headers(into: Captured<HeaderMap>) -> RequestOption {
    RequestOption::new(move |request| {
        let into = into.clone();
        request.handlers.complete.push_back_named(
            GET_RESPONSE_HEADERS,
            handler_fn(move |request: &mut Request| {
                into.set(
                    request
                        .http_response
                        .as_ref()
                        .map(|response| response.headers().clone()),
                );
            }),
        );
    })
}

pub fn with_log_level(level: LogLevel) -> RequestOption {
    RequestOption::new(move |request| request.log_level = level)
}

/// Limits retries for this request, keeping the client's retry policy otherwise
pub fn with_max_retries(max_retries: u32) -> RequestOption {
    RequestOption::new(move |request| {
        let inner = request.retryer.clone();
        request.retryer = SharedRetryer::new(MaxRetries::new(inner, max_retries));
    })
}

pub fn with_retryer(retryer: impl Retryer + 'static) -> RequestOption {
    let retryer = SharedRetryer::new(retryer);
    RequestOption::new(move |request| request.retryer = retryer.clone())
}

pub fn with_cancellation(token: CancellationToken) -> RequestOption {
    RequestOption::new(move |request| request.set_cancellation(token.clone()))
}

/// Fails an attempt that receives no response within `timeout`
pub fn with_response_read_timeout(timeout: Duration) -> RequestOption {
    RequestOption::new(move |request| request.response_timeout = Some(timeout))
}

pub fn with_handlers(f: impl Fn(&mut Handlers) + Send + Sync + 'static) -> RequestOption {
    RequestOption::new(move |request| f(&mut request.handlers))
}
