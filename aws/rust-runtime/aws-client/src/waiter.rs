/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Polling a resource until it reaches a desired state.
//!
//! A [`Waiter`] repeatedly sends a request and evaluates its [`WaiterAcceptor`]s against the
//! outcome. The first acceptor whose matcher fires decides what happens next: `success` ends the
//! wait, `failure` fails it, and `retry` polls again after a delay.
//!
//! Acceptors can be deserialized from the declarative form used by service models:
//!
//! ```rust
//! use aws_client::waiter::{Matcher, WaiterAcceptor, WaiterState};
//!
//! let acceptor: WaiterAcceptor = serde_json::from_str(
//!     r#"{"state": "success", "matcher": "pathAll", "argument": "Table.TableStatus", "expected": "ACTIVE"}"#,
//! ).unwrap();
//! assert_eq!(WaiterState::Success, acceptor.state);
//! ```

use aws_http::error::{SdkError, SharedError};
use aws_http::options::RequestOption;
use aws_http::request::Request;
use serde::Deserialize;
use smithy_async::future::cancellable::cancellable;
use smithy_async::rt::sleep::{default_async_sleep, AsyncSleep, SharedAsyncSleep};
use smithy_types::Document;
use std::borrow::Cow;
use std::convert::TryFrom;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, Instrument};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(15);

const FAILURE_MESSAGE: &str = "failed waiting for successful resource state";
const EXCEEDED_MESSAGE: &str = "exceeded wait attempts";
const CANCELED_MESSAGE: &str = "waiter context canceled";

/// What a matching acceptor does to the wait
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaiterState {
    Success,
    Failure,
    Retry,
}

impl fmt::Display for WaiterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaiterState::Success => write!(f, "success"),
            WaiterState::Failure => write!(f, "failure"),
            WaiterState::Retry => write!(f, "retry"),
        }
    }
}

/// Condition an acceptor tests against the outcome of one attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Matcher {
    /// The response has this HTTP status
    Status(u16),
    /// Every value selected by `argument` equals `expected`
    Path { argument: String, expected: String },
    /// Same as [`Matcher::Path`]
    PathAll { argument: String, expected: String },
    /// At least one value selected by `argument` equals `expected`
    PathAny { argument: String, expected: String },
    /// The attempt failed with this error code
    Error(String),
}

impl Matcher {
    pub fn matches(&self, request: &Request, error: Option<&SdkError>) -> bool {
        match self {
            Matcher::Status(expected) => request
                .status()
                .map(|status| status.as_u16() == *expected)
                .unwrap_or(false),
            Matcher::Path { argument, expected } | Matcher::PathAll { argument, expected } => {
                let values = output_values(request, argument);
                !values.is_empty() && values.iter().all(|value| scalar_eq(value, expected))
            }
            Matcher::PathAny { argument, expected } => output_values(request, argument)
                .iter()
                .any(|value| scalar_eq(value, expected)),
            Matcher::Error(code) => error.map(|err| err.code() == code).unwrap_or(false),
        }
    }
}

fn output_values<'a>(request: &'a Request, argument: &str) -> Vec<&'a Document> {
    match &request.output {
        Some(output) => values_at_path(output, argument),
        None => Vec::new(),
    }
}

fn scalar_eq(value: &Document, expected: &str) -> bool {
    match value {
        Document::String(value) => value == expected,
        Document::Bool(value) => value.to_string() == expected,
        Document::Number(value) => value.to_string() == expected,
        _ => false,
    }
}

/// Selects the values of `document` at `path`.
///
/// Paths are dot separated field names. A field may be followed by `[]` to project every element
/// of an array, or `[n]` to select a single element. `[-n]` counts from the end of the array.
/// Missing fields and `null` values are skipped.
pub fn values_at_path<'a>(document: &'a Document, path: &str) -> Vec<&'a Document> {
    let mut current = vec![document];
    if path.is_empty() {
        return current;
    }
    for segment in path.split('.') {
        let (field, mut selectors) = match segment.find('[') {
            Some(index) => segment.split_at(index),
            None => (segment, ""),
        };
        if !field.is_empty() {
            current = current
                .into_iter()
                .filter_map(|value| value.get(field))
                .collect();
        }
        while !selectors.is_empty() {
            let end = match selectors.find(']') {
                Some(end) if selectors.starts_with('[') => end,
                _ => return Vec::new(),
            };
            let selector = &selectors[1..end];
            current = if selector.is_empty() {
                current
                    .into_iter()
                    .filter_map(Document::as_array)
                    .flatten()
                    .collect()
            } else {
                let (from_end, digits) = match selector.strip_prefix('-') {
                    Some(digits) => (true, digits),
                    None => (false, selector),
                };
                let index = match digits.parse::<usize>() {
                    Ok(index) => index,
                    Err(_) => return Vec::new(),
                };
                current
                    .into_iter()
                    .filter_map(Document::as_array)
                    .filter_map(|items| {
                        if from_end {
                            items.len().checked_sub(index).and_then(|i| items.get(i))
                        } else {
                            items.get(index)
                        }
                    })
                    .collect()
            };
            selectors = &selectors[end + 1..];
        }
        current.retain(|value| !value.is_null());
    }
    current
}

/// A matcher and what to do when it fires
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "AcceptorDefinition")]
pub struct WaiterAcceptor {
    pub state: WaiterState,
    pub matcher: Matcher,
}

impl WaiterAcceptor {
    pub fn new(state: WaiterState, matcher: Matcher) -> Self {
        WaiterAcceptor { state, matcher }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
enum MatcherKind {
    Status,
    Path,
    PathAll,
    PathAny,
    Error,
}

#[derive(Deserialize)]
struct AcceptorDefinition {
    state: WaiterState,
    matcher: MatcherKind,
    #[serde(default)]
    argument: Option<String>,
    expected: Document,
}

#[derive(Debug, thiserror::Error)]
pub enum InvalidAcceptor {
    #[error("expected value `{0}` must be an HTTP status code")]
    InvalidStatus(Document),
    #[error("expected value `{0}` must be a string, number or boolean")]
    InvalidExpected(Document),
    #[error("path matchers require an argument")]
    MissingArgument,
}

impl TryFrom<AcceptorDefinition> for WaiterAcceptor {
    type Error = InvalidAcceptor;

    fn try_from(definition: AcceptorDefinition) -> Result<Self, Self::Error> {
        let AcceptorDefinition {
            state,
            matcher,
            argument,
            expected,
        } = definition;
        let expected_value = &expected;
        let argument = &argument;
        let expected = || match expected_value {
            Document::String(value) => Ok(value.clone()),
            Document::Bool(value) => Ok(value.to_string()),
            Document::Number(value) => Ok(value.to_string()),
            other => Err(InvalidAcceptor::InvalidExpected(other.clone())),
        };
        let argument = || match argument {
            Some(argument) if !argument.is_empty() => Ok(argument.clone()),
            _ => Err(InvalidAcceptor::MissingArgument),
        };
        let matcher = match matcher {
            MatcherKind::Status => Matcher::Status(
                expected_value
                    .as_u64()
                    .and_then(|status| u16::try_from(status).ok())
                    .ok_or_else(|| InvalidAcceptor::InvalidStatus(expected_value.clone()))?,
            ),
            MatcherKind::Path => Matcher::Path {
                argument: argument()?,
                expected: expected()?,
            },
            MatcherKind::PathAll => Matcher::PathAll {
                argument: argument()?,
                expected: expected()?,
            },
            MatcherKind::PathAny => Matcher::PathAny {
                argument: argument()?,
                expected: expected()?,
            },
            MatcherKind::Error => Matcher::Error(expected()?),
        };
        Ok(WaiterAcceptor { state, matcher })
    }
}

type NewRequest = Arc<dyn Fn(&[RequestOption]) -> Result<Request, SdkError> + Send + Sync>;
type WaiterDelay = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// A delay function that always waits `delay`
pub fn constant_delay(delay: Duration) -> impl Fn(u32) -> Duration + Send + Sync + 'static {
    move |_| delay
}

/// Polls a resource until an acceptor ends the wait or the attempts run out
#[derive(Clone)]
pub struct Waiter {
    name: Cow<'static, str>,
    max_attempts: u32,
    delay: WaiterDelay,
    acceptors: Vec<WaiterAcceptor>,
    new_request: NewRequest,
    request_options: Vec<RequestOption>,
    sleep_impl: Option<SharedAsyncSleep>,
    cancellation: Option<CancellationToken>,
}

impl fmt::Debug for Waiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter")
            .field("name", &self.name)
            .field("max_attempts", &self.max_attempts)
            .field("acceptors", &self.acceptors)
            .finish()
    }
}

impl Waiter {
    /// Creates a waiter that builds each attempt's request with `new_request`.
    ///
    /// `new_request` receives the waiter's request options and is expected to apply them.
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        new_request: impl Fn(&[RequestOption]) -> Result<Request, SdkError> + Send + Sync + 'static,
    ) -> Self {
        Waiter {
            name: name.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Arc::new(constant_delay(DEFAULT_DELAY)),
            acceptors: Vec::new(),
            new_request: Arc::new(new_request),
            request_options: Vec::new(),
            sleep_impl: default_async_sleep(),
            cancellation: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the delay before the attempt following attempt `n` (counting from zero)
    pub fn with_delay(mut self, delay: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Arc::new(delay);
        self
    }

    pub fn with_acceptor(mut self, acceptor: WaiterAcceptor) -> Self {
        self.acceptors.push(acceptor);
        self
    }

    pub fn with_acceptors(mut self, acceptors: impl IntoIterator<Item = WaiterAcceptor>) -> Self {
        self.acceptors.extend(acceptors);
        self
    }

    /// Options applied to every request the waiter sends
    pub fn with_request_options(
        mut self,
        options: impl IntoIterator<Item = RequestOption>,
    ) -> Self {
        self.request_options.extend(options);
        self
    }

    /// Stops waiting, and cancels in-flight requests, once `token` fires
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_sleep_impl(mut self, sleep_impl: Option<SharedAsyncSleep>) -> Self {
        self.sleep_impl = sleep_impl;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        (self.delay)(attempt)
    }

    pub fn acceptors(&self) -> &[WaiterAcceptor] {
        &self.acceptors
    }

    pub async fn wait(&self) -> Result<(), SdkError> {
        let span = debug_span!("wait", waiter = %self.name);
        self.wait_inner().instrument(span).await
    }

    async fn wait_inner(&self) -> Result<(), SdkError> {
        let token = self.cancellation.clone().unwrap_or_default();
        for attempt in 0..self.max_attempts {
            let mut request = (self.new_request)(self.request_options.as_slice())?;
            if let Some(token) = &self.cancellation {
                request.set_cancellation(token.clone());
            }
            request
                .handlers
                .build
                .push_back(crate::defaults::add_to_user_agent_free_form_handler("Waiter"));

            let error = request.send().await.err();
            match self.evaluate(&request, error.as_ref()) {
                Some(WaiterState::Success) => {
                    debug!(attempt, "resource reached the desired state");
                    return Ok(());
                }
                Some(WaiterState::Failure) => {
                    debug!(attempt, "resource reached a failure state");
                    return Err(SdkError::resource_not_ready(
                        FAILURE_MESSAGE,
                        error.map(|err| -> SharedError { Arc::new(err) }),
                    ));
                }
                Some(WaiterState::Retry) => {}
                None => {
                    if let Some(error) = error {
                        debug!(
                            attempt,
                            error = %error,
                            "attempt failed without a matching acceptor"
                        );
                        return Err(error);
                    }
                }
            }

            if attempt + 1 == self.max_attempts {
                break;
            }
            let delay = self.delay(attempt);
            debug!(attempt, delay = ?delay, "resource not ready, waiting");
            if token.is_cancelled() {
                return Err(SdkError::canceled_with(CANCELED_MESSAGE, None));
            }
            if delay > Duration::ZERO {
                let sleep = match &self.sleep_impl {
                    Some(sleep) => sleep,
                    None => {
                        return Err(SdkError::construction_failure(
                            "a sleep implementation is required to wait between attempts",
                        ))
                    }
                };
                if cancellable(sleep.sleep(delay), &token).await.is_err() {
                    return Err(SdkError::canceled_with(CANCELED_MESSAGE, None));
                }
            }
        }
        Err(SdkError::resource_not_ready(EXCEEDED_MESSAGE, None))
    }

    fn evaluate(&self, request: &Request, error: Option<&SdkError>) -> Option<WaiterState> {
        self.acceptors
            .iter()
            .find(|acceptor| acceptor.matcher.matches(request, error))
            .map(|acceptor| acceptor.state)
    }
}
