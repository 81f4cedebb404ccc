/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Connectors useful for testing.

use http::header::HeaderName;
use smithy_async::future::never::Never;
use smithy_http::body::SdkBody;
use smithy_http::connector::{ConnectorError, ConnectorFuture, HttpConnector};
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};

type ConnectEvent = (
    http::Request<SdkBody>,
    Result<http::Response<SdkBody>, ConnectorError>,
);

/// A request received by a [`TestConnection`] alongside the request the test expected
#[derive(Debug)]
pub struct ValidateRequest {
    pub expected: http::Request<SdkBody>,
    pub actual: http::Request<SdkBody>,
}

impl ValidateRequest {
    pub fn assert_matches(&self, ignore_headers: &[HeaderName]) {
        let (actual, expected) = (&self.actual, &self.expected);
        for (name, value) in expected.headers() {
            if !ignore_headers.contains(name) {
                let actual_header = actual
                    .headers()
                    .get(name)
                    .unwrap_or_else(|| panic!("Header {:?} missing", name));
                assert_eq!(actual_header, value, "Header mismatch for {:?}", name);
            }
        }
        let actual_str = std::str::from_utf8(actual.body().bytes().unwrap_or(&[]));
        let expected_str = std::str::from_utf8(expected.body().bytes().unwrap_or(&[]));
        match (actual_str, expected_str) {
            (Ok(actual), Ok(expected)) => assert_eq!(actual, expected),
            _ => assert_eq!(actual.body().bytes(), expected.body().bytes()),
        };
        assert_eq!(actual.uri(), expected.uri());
        assert_eq!(actual.method(), expected.method());
    }
}

/// Connection that replies with a preloaded series of responses.
///
/// Every request it receives is recorded for later inspection. Once the responses run out,
/// further requests fail with a non-retryable connector error.
///
/// ```rust
/// use aws_client::test_connection::TestConnection;
/// use smithy_http::body::SdkBody;
/// let events = vec![(
///    http::Request::new(SdkBody::from("request body")),
///    http::Response::builder()
///        .status(200)
///        .body(SdkBody::from("response body"))
///        .unwrap(),
/// )];
/// let conn = TestConnection::new(events);
/// ```
#[derive(Debug, Clone)]
pub struct TestConnection {
    data: Arc<Mutex<Vec<ConnectEvent>>>,
    requests: Arc<Mutex<Vec<ValidateRequest>>>,
}

impl TestConnection {
    pub fn new(data: Vec<(http::Request<SdkBody>, http::Response<SdkBody>)>) -> Self {
        Self::from_events(
            data.into_iter()
                .map(|(request, response)| (request, Ok(response)))
                .collect(),
        )
    }

    /// Replays responses and transport failures without checking the requests sent
    pub fn from_results(results: Vec<Result<http::Response<SdkBody>, ConnectorError>>) -> Self {
        Self::from_events(
            results
                .into_iter()
                .map(|result| (http::Request::new(SdkBody::empty()), result))
                .collect(),
        )
    }

    /// Replies to every request with an empty-bodied response of the given statuses, in order
    pub fn from_statuses(statuses: &[u16]) -> Self {
        Self::from_results(
            statuses
                .iter()
                .map(|status| {
                    Ok(http::Response::builder()
                        .status(*status)
                        .body(SdkBody::empty())
                        .expect("valid status"))
                })
                .collect(),
        )
    }

    fn from_events(mut data: Vec<ConnectEvent>) -> Self {
        data.reverse();
        TestConnection {
            data: Arc::new(Mutex::new(data)),
            requests: Default::default(),
        }
    }

    pub fn requests(&self) -> impl Deref<Target = Vec<ValidateRequest>> + '_ {
        lock(&self.requests)
    }

    /// Number of scripted replies not yet consumed
    pub fn remaining(&self) -> usize {
        lock(&self.data).len()
    }

    pub fn assert_requests_match(&self, ignore_headers: &[HeaderName]) {
        for request in self.requests().iter() {
            request.assert_matches(ignore_headers);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl HttpConnector for TestConnection {
    fn call(&self, actual: http::Request<SdkBody>) -> ConnectorFuture {
        let result = match lock(&self.data).pop() {
            Some((expected, result)) => {
                lock(&self.requests).push(ValidateRequest { expected, actual });
                result
            }
            None => Err(ConnectorError::user("No more data".into())),
        };
        Box::pin(std::future::ready(result))
    }
}

/// A connection that never returns a response
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct NeverConnection;

impl NeverConnection {
    pub fn new() -> Self {
        NeverConnection
    }
}

impl HttpConnector for NeverConnection {
    fn call(&self, _: http::Request<SdkBody>) -> ConnectorFuture {
        Box::pin(async {
            Never::new().await;
            Err(ConnectorError::other("a never connection replied".into(), None))
        })
    }
}
