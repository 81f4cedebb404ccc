/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! A single API call and the state machine that sends it.
//!
//! [`Request::send`] drives the request through its handler stages:
//!
//! ```text
//! Validate -> Build                     (once per request)
//! loop {
//!     Sign -> Send -> UnmarshalMeta -> ValidateResponse -> Unmarshal
//!     on failure: UnmarshalError (for responses), Retry, AfterRetry, then loop or stop
//! }
//! Complete                              (always)
//! ```
//!
//! Handlers communicate through the public fields of [`Request`]: a handler records a failure
//! by setting [`Request::error`], and an `AfterRetry` handler clears it to request another
//! attempt.

use crate::config::{Config, LogLevel};
use crate::endpoint::{Endpoint, ResolveEndpoint};
use crate::error::{SdkError, SharedError, ValidationError};
use crate::handlers::{Handlers, Stage};
use crate::operation::{Operation, ServiceMetadata};
use crate::options::RequestOption;
use crate::retry::{Retryer, SharedRetryer};
use smithy_async::time::TimeSource;
use smithy_http::body::SdkBody;
use smithy_http::connector::ConnectorError;
use smithy_http::handler::log_each;
use smithy_types::Document;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, trace, Instrument};

/// Where a request is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestState {
    Created,
    Validating,
    Building,
    Signing,
    Sending,
    Unmarshaling,
    Retrying,
    Completed,
}

pub struct Request {
    pub config: Config,
    pub metadata: ServiceMetadata,
    pub operation: Operation,
    /// Handlers for this request only; changing them does not affect the client
    pub handlers: Handlers,
    pub retryer: SharedRetryer,
    pub endpoint: Option<Endpoint>,

    pub http_request: http::Request<SdkBody>,
    /// Response of the most recent attempt
    pub http_response: Option<http::Response<SdkBody>>,

    /// Operation input
    pub params: Document,
    /// Decoded operation output, filled by `Unmarshal` handlers
    pub output: Option<Document>,

    /// Failure of the current attempt, if any
    pub error: Option<SdkError>,
    /// Retry decision for the current attempt.
    ///
    /// `None` means undecided: the retryer is consulted after the attempt fails. Handlers may set
    /// an explicit decision which the retryer then honors.
    pub retryable: Option<bool>,
    pub retry_count: u32,
    /// Delay applied before the most recent retry
    pub retry_delay: Duration,

    /// When the request was created
    pub time: SystemTime,
    /// When the current attempt started
    pub attempt_time: SystemTime,
    pub last_signed_at: Option<SystemTime>,
    pub request_id: Option<String>,

    pub log_level: LogLevel,
    pub response_timeout: Option<Duration>,

    cancellation: CancellationToken,
    state: RequestState,
    built: bool,
    body_snapshot: Option<SdkBody>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("operation", &self.operation.name())
            .field("state", &self.state)
            .field("retry_count", &self.retry_count)
            .field("error", &self.error)
            .finish()
    }
}

impl Request {
    /// Creates a request for `operation`.
    ///
    /// The endpoint is resolved immediately. A resolution failure is recorded on the request and
    /// surfaces when it is sent.
    pub fn new(
        config: Config,
        metadata: ServiceMetadata,
        handlers: Handlers,
        retryer: SharedRetryer,
        operation: Operation,
        params: Document,
    ) -> Self {
        let now = config.time_source().now();
        let mut error = None;
        let endpoint = match config.endpoint_resolver() {
            Some(resolver) => {
                match resolver.resolve_endpoint(metadata.endpoints_id(), config.region()) {
                    Ok(endpoint) => Some(endpoint),
                    Err(err) => {
                        error = Some(SdkError::construction_failure(err));
                        None
                    }
                }
            }
            None => None,
        };

        let mut http_request = http::Request::new(SdkBody::empty());
        *http_request.method_mut() = operation.http_method().clone();
        if let Some(endpoint) = &endpoint {
            let uri = format!(
                "{}{}",
                endpoint.url().trim_end_matches('/'),
                operation.http_path()
            );
            match uri.parse::<http::Uri>() {
                Ok(uri) => *http_request.uri_mut() = uri,
                Err(err) => {
                    error = Some(
                        ValidationError::InvalidEndpoint {
                            endpoint: uri,
                            reason: err.to_string(),
                        }
                        .into(),
                    )
                }
            }
        }

        Request {
            log_level: config.log_level(),
            response_timeout: config.response_timeout(),
            config,
            metadata,
            operation,
            handlers,
            retryer,
            endpoint,
            http_request,
            http_response: None,
            params,
            output: None,
            error,
            retryable: None,
            retry_count: 0,
            retry_delay: Duration::ZERO,
            time: now,
            attempt_time: now,
            last_signed_at: None,
            request_id: None,
            cancellation: CancellationToken::new(),
            state: RequestState::Created,
            built: false,
            body_snapshot: None,
        }
    }

    pub fn apply_options<'a>(&mut self, options: impl IntoIterator<Item = &'a RequestOption>) {
        for option in options {
            option.apply(self);
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Cancels in-flight work and retry delays when `token` fires
    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancellation = token;
    }

    pub fn set_body(&mut self, body: impl Into<SdkBody>) {
        *self.http_request.body_mut() = body.into();
    }

    /// Status of the most recent response
    pub fn status(&self) -> Option<http::StatusCode> {
        self.http_response.as_ref().map(|response| response.status())
    }

    pub fn max_retries(&self) -> u32 {
        self.retryer.max_retries()
    }

    /// Whether the current failure will be retried
    pub fn will_retry(&self) -> bool {
        self.error.is_some()
            && self.retryable.unwrap_or(false)
            && self.retry_count < self.max_retries()
    }

    pub fn is_error_retryable(&self) -> bool {
        self.error
            .as_ref()
            .map(SdkError::is_retryable)
            .unwrap_or(false)
    }

    pub fn is_error_throttle(&self) -> bool {
        self.error
            .as_ref()
            .map(SdkError::is_throttle)
            .unwrap_or(false)
    }

    pub fn is_error_expired(&self) -> bool {
        self.error
            .as_ref()
            .map(SdkError::is_expired_credentials)
            .unwrap_or(false)
    }

    /// Whether an output was decoded
    pub fn data_filled(&self) -> bool {
        self.output.is_some()
    }

    /// Runs the `Validate` and `Build` stages.
    ///
    /// Building happens once: later calls return the outcome of the first build.
    pub async fn build(&mut self) -> Result<(), SdkError> {
        if !self.built {
            self.state = RequestState::Validating;
            self.run_stage(Stage::Validate).await;
            if let Some(err) = &self.error {
                debug!(error = %err, "request failed validation");
                return Err(err.clone());
            }
            self.state = RequestState::Building;
            self.run_stage(Stage::Build).await;
            if let Some(err) = &self.error {
                debug!(error = %err, "failed to build request");
                return Err(err.clone());
            }
            self.built = true;
            self.body_snapshot = self.http_request.body().try_clone();
        }
        self.result()
    }

    /// Builds the request if needed, then runs the `Sign` stage
    pub async fn sign(&mut self) -> Result<(), SdkError> {
        self.build().await?;
        self.state = RequestState::Signing;
        self.run_stage(Stage::Sign).await;
        self.result()
    }

    /// Sends the request, retrying failed attempts as the retryer allows.
    ///
    /// The final error, if any, stays recorded on [`Request::error`] and is returned.
    pub async fn send(&mut self) -> Result<(), SdkError> {
        let span = debug_span!(
            "send_request",
            service = %self.metadata.service_name(),
            operation = %self.operation.name(),
        );
        self.send_inner().instrument(span).await;
        self.result()
    }

    async fn send_inner(&mut self) {
        self.attempt_loop().await;
        if self.cancellation.is_cancelled() {
            if let Some(err) = &self.error {
                if !err.is_canceled() {
                    let source: SharedError = Arc::new(err.clone());
                    self.error = Some(SdkError::canceled_with(
                        "request context canceled",
                        Some(source),
                    ));
                }
            }
        }
        self.state = RequestState::Completed;
        self.run_stage(Stage::Complete).await;
        debug!(
            retries = self.retry_count,
            error = self.error.is_some(),
            "request completed"
        );
    }

    async fn attempt_loop(&mut self) {
        let mut first = true;
        loop {
            if self.cancellation.is_cancelled() {
                if self.error.is_none() {
                    self.error = Some(SdkError::canceled());
                }
                return;
            }
            if !first {
                self.reset_for_retry();
            }
            first = false;

            if self.sign().await.is_err() {
                return;
            }
            self.retryable = None;

            self.attempt_time = self.config.time_source().now();
            self.http_response = None;
            self.request_id = None;
            self.state = RequestState::Sending;
            self.run_stage(Stage::Send).await;
            if self.error.is_none() && self.http_response.is_none() {
                self.error = Some(SdkError::dispatch_failure(ConnectorError::other(
                    "no response was received".into(),
                    None,
                )));
            }
            if let Some(err) = &self.error {
                if err.is_canceled() {
                    return;
                }
                debug!(error = %err, "failed to send request");
                if self.recover().await {
                    continue;
                }
                return;
            }

            self.state = RequestState::Unmarshaling;
            self.run_stage(Stage::UnmarshalMeta).await;
            self.run_stage(Stage::ValidateResponse).await;
            if self.error.is_some() {
                self.run_stage(Stage::UnmarshalError).await;
                if self.recover().await {
                    continue;
                }
                return;
            }

            self.run_stage(Stage::Unmarshal).await;
            if self.error.is_some() {
                if self.recover().await {
                    continue;
                }
                return;
            }
            return;
        }
    }

    /// Runs `Retry` and `AfterRetry`. Returns `true` when another attempt should be made.
    async fn recover(&mut self) -> bool {
        self.state = RequestState::Retrying;
        self.run_stage(Stage::Retry).await;
        self.run_stage(Stage::AfterRetry).await;
        self.error.is_none()
    }

    fn reset_for_retry(&mut self) {
        let body = match &self.body_snapshot {
            Some(snapshot) => snapshot.try_clone().unwrap_or_else(SdkBody::taken),
            None => SdkBody::taken(),
        };
        *self.http_request.body_mut() = body;
        trace!(retry_count = self.retry_count, "reset request for retry");
    }

    async fn run_stage(&mut self, stage: Stage) {
        let mut list = self.handlers.stage(stage).clone();
        if self.log_level.matches(LogLevel::Debug) {
            debug!(
                stage = stage.name(),
                handlers = ?list.names().collect::<Vec<_>>(),
                "running stage"
            );
            if !list.has_after_each() {
                list.set_after_each(log_each(stage.name()));
            }
        }
        list.run(self).await;
    }

    fn result(&self) -> Result<(), SdkError> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Copies method, uri, version, headers and body of `request`.
///
/// Returns `None` when the body cannot be replayed.
pub fn try_clone_http_request(request: &http::Request<SdkBody>) -> Option<http::Request<SdkBody>> {
    let body = request.body().try_clone()?;
    let mut copy = http::Request::new(body);
    *copy.method_mut() = request.method().clone();
    *copy.uri_mut() = request.uri().clone();
    *copy.version_mut() = request.version();
    *copy.headers_mut() = request.headers().clone();
    Some(copy)
}

#[cfg(test)]
mod test {
    use crate::config::{Config, LogLevel};
    use crate::error::{SdkError, ServiceError, ValidationError};
    use crate::handlers::{stop_on_error, Handlers};
    use crate::operation::{Operation, ServiceMetadata};
    use crate::request::{Request, RequestState};
    use crate::retry::{DefaultRetryer, Retryer, SharedRetryer};
    use aws_types::Region;
    use smithy_http::body::SdkBody;
    use smithy_http::handler::{handler_fn, Handler, HandlerFuture};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    type Log = Arc<Mutex<Vec<String>>>;

    fn config() -> Config {
        Config::builder()
            .region(Region::new("mock-region"))
            .endpoint_url("https://mock.amazonaws.com")
            .build()
    }

    fn new_request(handlers: Handlers, max_retries: u32) -> Request {
        Request::new(
            config(),
            ServiceMetadata::new("mock"),
            handlers,
            SharedRetryer::new(DefaultRetryer::new(max_retries)),
            Operation::new("MockOperation").with_http_path("/things"),
            serde_json::json!({"Name": "thing"}),
        )
    }

    fn record(log: &Log, label: &'static str) -> impl Handler<Request> {
        let log = log.clone();
        handler_fn(move |_: &mut Request| log.lock().unwrap().push(label.to_string()))
    }

    fn fail_on_status(request: &mut Request) {
        let status = request.status().map(|s| s.as_u16()).unwrap_or_default();
        if status >= 300 {
            request.error = Some(SdkError::service(ServiceError::new(status, "UnknownError")));
        }
    }

    /// Retries without sleeping
    fn retry_immediately(request: &mut Request) {
        let retryer = request.retryer.clone();
        if request.retryable.is_none() {
            request.retryable = Some(retryer.should_retry(request));
        }
        if request.will_retry() {
            request.retry_count += 1;
            request.error = None;
        }
    }

    fn handlers(log: &Log, statuses: &'static [u16]) -> Handlers {
        let mut handlers = Handlers::new();
        let attempt = Arc::new(Mutex::new(0usize));
        handlers.validate.push_back_named("validate", record(log, "validate"));
        handlers.build.push_back_named("build", record(log, "build"));
        handlers.sign.push_back_named("sign", record(log, "sign"));
        handlers.send.push_back_named("send", record(log, "send"));
        handlers.send.push_back_named(
            "respond",
            handler_fn(move |request: &mut Request| {
                let mut attempt = attempt.lock().unwrap();
                let status = statuses[(*attempt).min(statuses.len() - 1)];
                *attempt += 1;
                request.http_response = Some(
                    http::Response::builder()
                        .status(status)
                        .body(SdkBody::empty())
                        .unwrap(),
                );
            }),
        );
        handlers
            .unmarshal_meta
            .push_back_named("unmarshal_meta", record(log, "unmarshal_meta"));
        handlers
            .validate_response
            .push_back_named("validate_response", handler_fn(fail_on_status));
        handlers
            .unmarshal_error
            .push_back_named("unmarshal_error", record(log, "unmarshal_error"));
        handlers
            .unmarshal
            .push_back_named("unmarshal", record(log, "unmarshal"));
        handlers.retry.push_back_named("retry", record(log, "retry"));
        handlers
            .after_retry
            .push_back_named("after_retry", handler_fn(retry_immediately));
        handlers
            .complete
            .push_back_named("complete", record(log, "complete"));
        handlers
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn successful_request_runs_stages_in_order() {
        let log = Log::default();
        let mut request = new_request(handlers(&log, &[200]), 3);
        request.send().await.expect("success");
        assert_eq!(
            vec![
                "validate",
                "build",
                "sign",
                "send",
                "unmarshal_meta",
                "unmarshal",
                "complete"
            ],
            entries(&log)
        );
        assert_eq!(RequestState::Completed, request.state());
        assert_eq!(0, request.retry_count);
        assert_eq!(
            "https://mock.amazonaws.com/things",
            request.http_request.uri().to_string()
        );
    }

    #[tokio::test]
    async fn retries_rebuild_nothing_but_resign() {
        let log = Log::default();
        let mut request = new_request(handlers(&log, &[500, 500, 200]), 3);
        request.send().await.expect("success after retries");
        assert_eq!(2, request.retry_count);
        let log = entries(&log);
        assert_eq!(1, log.iter().filter(|e| *e == "build").count());
        assert_eq!(3, log.iter().filter(|e| *e == "sign").count());
        assert_eq!(2, log.iter().filter(|e| *e == "unmarshal_error").count());
        assert_eq!(2, log.iter().filter(|e| *e == "retry").count());
        assert_eq!("complete", log.last().unwrap());
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_last_error() {
        let log = Log::default();
        let mut request = new_request(handlers(&log, &[500]), 3);
        let err = request.send().await.expect_err("retries exhausted");
        assert_eq!(Some(500), err.status());
        assert_eq!(3, request.retry_count);
        assert_eq!(4, entries(&log).iter().filter(|e| *e == "send").count());
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let log = Log::default();
        let mut request = new_request(handlers(&log, &[400]), 3);
        assert!(request.send().await.is_err());
        assert_eq!(0, request.retry_count);
        assert_eq!(Some(false), request.retryable);
    }

    #[tokio::test]
    async fn validation_failure_skips_everything_but_complete() {
        let log = Log::default();
        let mut handlers = handlers(&log, &[200]);
        handlers.validate.set_after_each(stop_on_error);
        handlers.validate.push_front_named(
            "reject",
            handler_fn(|request: &mut Request| {
                request.error = Some(ValidationError::MissingRegion.into())
            }),
        );
        let mut request = new_request(handlers, 3);
        let err = request.send().await.expect_err("invalid");
        assert_eq!("MissingRegion", err.code());
        assert_eq!(vec!["complete"], entries(&log));
    }

    #[tokio::test]
    async fn build_runs_once() {
        let log = Log::default();
        let mut request = new_request(handlers(&log, &[200]), 3);
        request.build().await.unwrap();
        request.build().await.unwrap();
        request.sign().await.unwrap();
        assert_eq!(vec!["validate", "build", "sign"], entries(&log));
    }

    #[tokio::test]
    async fn missing_response_is_a_retryable_transport_failure() {
        let log = Log::default();
        let mut handlers = handlers(&log, &[200]);
        let attempts = Arc::new(Mutex::new(0));
        let counter = attempts.clone();
        handlers.send.swap_named(
            "respond",
            handler_fn(move |request: &mut Request| {
                let mut attempts = counter.lock().unwrap();
                *attempts += 1;
                if *attempts > 1 {
                    request.http_response = Some(
                        http::Response::builder()
                            .status(200)
                            .body(SdkBody::empty())
                            .unwrap(),
                    );
                }
            }),
        );
        let mut request = new_request(handlers, 3);
        request.send().await.expect("recovered");
        assert_eq!(1, request.retry_count);
        assert_eq!(2, *attempts.lock().unwrap());
    }

    #[tokio::test]
    async fn handler_can_override_retry_decision() {
        let log = Log::default();
        let mut handlers = handlers(&log, &[400, 200]);
        handlers.retry.push_back_named(
            "force",
            handler_fn(|request: &mut Request| request.retryable = Some(true)),
        );
        let mut request = new_request(handlers, 3);
        request.send().await.expect("forced retry succeeds");
        assert_eq!(1, request.retry_count);
    }

    #[tokio::test]
    async fn body_is_restored_before_each_attempt() {
        let log = Log::default();
        let mut handlers = handlers(&log, &[500, 200]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let bodies = seen.clone();
        handlers.build.push_back_named(
            "body",
            handler_fn(|request: &mut Request| request.set_body("payload")),
        );
        handlers.send.push_front_named(
            "consume",
            handler_fn(move |request: &mut Request| {
                let body = request.http_request.body_mut().take();
                bodies
                    .lock()
                    .unwrap()
                    .push(body.bytes().map(|b| b.to_vec()));
            }),
        );
        let mut request = new_request(handlers, 3);
        request.send().await.unwrap();
        assert_eq!(
            vec![Some(b"payload".to_vec()), Some(b"payload".to_vec())],
            *seen.lock().unwrap()
        );
    }

    #[tokio::test]
    async fn canceled_before_sending() {
        let log = Log::default();
        let mut request = new_request(handlers(&log, &[200]), 3);
        let token = CancellationToken::new();
        token.cancel();
        request.set_cancellation(token);
        let err = request.send().await.expect_err("canceled");
        assert!(err.is_canceled());
        assert_eq!(vec!["complete"], entries(&log));
    }

    #[tokio::test]
    async fn error_after_cancellation_is_reported_as_canceled() {
        let log = Log::default();
        let mut handlers = handlers(&log, &[500]);
        let token = CancellationToken::new();
        let trigger = token.clone();
        handlers.unmarshal_error.push_back_named(
            "cancel",
            handler_fn(move |_: &mut Request| trigger.cancel()),
        );
        handlers.after_retry.clear();
        let mut request = new_request(handlers, 3);
        request.set_cancellation(token);
        let err = request.send().await.expect_err("canceled");
        assert_eq!("RequestCanceled", err.code());
    }

    #[tokio::test]
    async fn unresolvable_endpoint_is_reported_on_send() {
        let log = Log::default();
        let mut handlers = handlers(&log, &[200]);
        handlers.validate.set_after_each(stop_on_error);
        let mut request = Request::new(
            Config::builder().endpoint_url("").build(),
            ServiceMetadata::new("mock"),
            handlers,
            SharedRetryer::new(DefaultRetryer::default()),
            Operation::new("MockOperation"),
            serde_json::Value::Null,
        );
        assert!(request.endpoint.is_none());
        assert!(request.send().await.is_err());
        assert!(!entries(&log).contains(&"send".to_string()));
    }

    #[tokio::test]
    #[traced_test]
    async fn send_is_instrumented() {
        let log = Log::default();
        let mut request = new_request(handlers(&log, &[200]), 3);
        request.send().await.unwrap();
        assert!(logs_contain("send_request"));
        assert!(logs_contain("request completed"));
    }

    #[tokio::test]
    #[traced_test]
    async fn debug_level_logs_every_handler() {
        let log = Log::default();
        let mut handlers = handlers(&log, &[200]);
        handlers.validate.set_after_each(stop_on_error);
        let mut request = new_request(handlers, 3);
        request.log_level = LogLevel::Debug;
        request.send().await.unwrap();
        assert!(logs_contain("ran handler"));
        assert!(logs_contain("unmarshal_meta"));
        // stages with their own interceptor keep it
        assert!(request.handlers.validate.has_after_each());
        assert!(!request.handlers.send.has_after_each());
    }

    struct Yield;

    impl Handler<Request> for Yield {
        fn handle<'a>(&'a self, request: &'a mut Request) -> HandlerFuture<'a> {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                request.retry_delay = Duration::from_millis(1);
            })
        }
    }

    #[tokio::test]
    async fn handlers_may_await() {
        let log = Log::default();
        let mut handlers = handlers(&log, &[200]);
        handlers.send.push_front_named("yield", Yield);
        let mut request = new_request(handlers, 0);
        request.send().await.unwrap();
        assert_eq!(Duration::from_millis(1), request.retry_delay);
    }
}
