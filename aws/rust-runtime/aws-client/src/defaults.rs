/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! The handlers every client installs by default.
//!
//! | stage            | handler                              |
//! |------------------|--------------------------------------|
//! | Validate         | [`VALIDATE_ENDPOINT`]                |
//! | Build            | [`SDK_VERSION_USER_AGENT`]           |
//! | Sign             | [`BUILD_CONTENT_LENGTH`], [`SIGN`]   |
//! | Send             | [`VALIDATE_REQ_SIG`], [`LOG_REQUEST`], [`SEND`] |
//! | ValidateResponse | [`LOG_RESPONSE`], [`VALIDATE_RESPONSE`] |
//! | AfterRetry       | [`AFTER_RETRY`]                      |
//!
//! Handlers are registered by name, so a client can swap or remove any of them.

use aws_http::config::LogLevel;
use aws_http::error::{SdkError, ServiceError, ValidationError};
use aws_http::handlers::{stop_on_error, Handlers};
use aws_http::request::{try_clone_http_request, Request};
use aws_http::retry::Retryer;
use aws_http::signing::{SignRequest, SigningParams};
use aws_http::user_agent::{add_to_user_agent, sdk_user_agent};
use http::header::CONTENT_LENGTH;
use http::HeaderValue;
use smithy_async::future::cancellable::{cancellable, Cancellable};
use smithy_async::rt::sleep::{AsyncSleep, SharedAsyncSleep};
use smithy_async::time::TimeSource;
use smithy_http::body::SdkBody;
use smithy_http::connector::{HttpConnector, SharedConnector};
use smithy_http::handler::{handler_fn, Handler, HandlerFuture, NamedHandler};
use smithy_http::header;
use std::time::Duration;
use tracing::{debug, warn};

pub const VALIDATE_ENDPOINT: &str = "core.ValidateEndpointHandler";
pub const SDK_VERSION_USER_AGENT: &str = "core.SDKVersionUserAgentHandler";
pub const BUILD_CONTENT_LENGTH: &str = "core.BuildContentLengthHandler";
pub const SIGN: &str = "core.SignHandler";
pub const VALIDATE_REQ_SIG: &str = "core.ValidateReqSigHandler";
pub const LOG_REQUEST: &str = "core.LogHandler";
pub const SEND: &str = "core.SendHandler";
pub const LOG_RESPONSE: &str = "core.LogResponseHandler";
pub const VALIDATE_RESPONSE: &str = "core.ValidateResponseHandler";
pub const AFTER_RETRY: &str = "core.AfterRetryHandler";

/// Signatures older than this are recomputed before a retry is sent
const SIGNATURE_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// The default handler set
pub fn handlers() -> Handlers {
    let mut handlers = Handlers::new();
    handlers.validate.set_after_each(stop_on_error);
    handlers.validate.push_back_handler(validate_endpoint_handler());
    handlers.build.set_after_each(stop_on_error);
    handlers.build.push_back_handler(sdk_version_user_agent_handler());
    handlers.sign.push_back_handler(build_content_length_handler());
    handlers.sign.push_back_handler(sign_handler());
    handlers.send.push_back_handler(validate_req_sig_handler());
    handlers.send.push_back_handler(log_request_handler());
    handlers.send.push_back_handler(send_handler());
    handlers
        .validate_response
        .push_back_handler(log_response_handler());
    handlers
        .validate_response
        .push_back_handler(validate_response_handler());
    handlers.after_retry.push_back_handler(after_retry_handler());
    handlers
}

/// Rejects requests without a region to sign for or an endpoint to send to
pub fn validate_endpoint_handler() -> NamedHandler<Request> {
    NamedHandler::new(
        VALIDATE_ENDPOINT,
        handler_fn(|request: &mut Request| {
            let signs = request.config.credentials().is_some();
            let has_region = request.metadata.signing_region().is_some()
                || request.config.region().is_some();
            if signs && !has_region {
                request.error = Some(ValidationError::MissingRegion.into());
            } else if request.endpoint.is_none() && request.error.is_none() {
                request.error = Some(ValidationError::MissingEndpoint.into());
            }
        }),
    )
}

pub fn sdk_version_user_agent_handler() -> NamedHandler<Request> {
    let user_agent = sdk_user_agent();
    NamedHandler::new(SDK_VERSION_USER_AGENT, user_agent_handler(user_agent))
}

/// Appends `name/version (extra; ...)` to the `User-Agent` header
pub fn add_to_user_agent_handler(
    name: &str,
    version: &str,
    extra: &[&str],
) -> impl Handler<Request> {
    let mut value = format!("{}/{}", name, version);
    if !extra.is_empty() {
        value.push_str(&format!(" ({})", extra.join("; ")));
    }
    user_agent_handler(value)
}

/// Appends `value` verbatim to the `User-Agent` header
pub fn add_to_user_agent_free_form_handler(value: impl Into<String>) -> impl Handler<Request> {
    user_agent_handler(value.into())
}

fn user_agent_handler(value: String) -> impl Handler<Request> {
    handler_fn(move |request: &mut Request| {
        if let Err(err) = add_to_user_agent(&mut request.http_request, &value) {
            request.error = Some(SdkError::construction_failure(err));
        }
    })
}

/// Sets `Content-Length` from the body, unless a handler already set it
pub fn build_content_length_handler() -> NamedHandler<Request> {
    NamedHandler::new(
        BUILD_CONTENT_LENGTH,
        handler_fn(|request: &mut Request| {
            let headers = request.http_request.headers();
            let length = match headers.get(CONTENT_LENGTH) {
                Some(value) => value
                    .to_str()
                    .ok()
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or_default(),
                None => request
                    .http_request
                    .body()
                    .content_length()
                    .unwrap_or_default(),
            };
            let headers = request.http_request.headers_mut();
            if length > 0 {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
            } else {
                headers.remove(CONTENT_LENGTH);
            }
        }),
    )
}

#[derive(Debug)]
struct SignHandler;

impl Handler<Request> for SignHandler {
    fn handle<'a>(&'a self, request: &'a mut Request) -> HandlerFuture<'a> {
        Box::pin(sign(request))
    }
}

async fn sign(request: &mut Request) {
    let cache = match request.config.credentials() {
        Some(cache) => cache.clone(),
        None => return,
    };
    let token = request.cancellation().clone();
    let credentials = match cancellable(cache.retrieve(), &token).await {
        Ok(Ok(credentials)) => credentials,
        Ok(Err(err)) => {
            request.error = Some(SdkError::credentials(err));
            return;
        }
        Err(_) => {
            request.error = Some(SdkError::canceled());
            return;
        }
    };
    let signer = match request.config.signer() {
        Some(signer) => signer.clone(),
        None => return,
    };
    let signing_region = request
        .endpoint
        .as_ref()
        .and_then(|endpoint| endpoint.signing_region())
        .or_else(|| request.metadata.signing_region())
        .map(str::to_string)
        .or_else(|| request.config.region().map(|region| region.to_string()));
    let signing_name = request
        .endpoint
        .as_ref()
        .and_then(|endpoint| endpoint.signing_name())
        .unwrap_or_else(|| request.metadata.signing_name())
        .to_string();
    let params = SigningParams {
        signing_name,
        signing_region,
        time: request.config.time_source().now(),
    };
    match signer.sign(&mut request.http_request, &credentials, &params) {
        Ok(()) => request.last_signed_at = Some(params.time),
        Err(err) => request.error = Some(SdkError::signing_failure(err)),
    }
}

/// Loads credentials through the client's cache and signs the request.
///
/// Anonymous clients, and clients without a signer, send the request unsigned.
pub fn sign_handler() -> NamedHandler<Request> {
    NamedHandler::new(SIGN, SignHandler)
}

#[derive(Debug)]
struct ValidateReqSigHandler;

impl Handler<Request> for ValidateReqSigHandler {
    fn handle<'a>(&'a self, request: &'a mut Request) -> HandlerFuture<'a> {
        Box::pin(async move {
            let signed_at = match request.last_signed_at {
                Some(signed_at) => signed_at,
                None => return,
            };
            let now = request.config.time_source().now();
            let fresh = now
                .duration_since(signed_at)
                .map(|age| age < SIGNATURE_LIFETIME)
                .unwrap_or(true);
            if !fresh {
                debug!("signature expired, re-signing request");
                if request.sign().await.is_err() {
                    return;
                }
            }
        })
    }
}

/// Re-signs requests whose signature is older than five minutes, eg. after a long backoff
pub fn validate_req_sig_handler() -> NamedHandler<Request> {
    NamedHandler::new(VALIDATE_REQ_SIG, ValidateReqSigHandler)
}

#[derive(Debug)]
struct SendHandler;

impl Handler<Request> for SendHandler {
    fn handle<'a>(&'a self, request: &'a mut Request) -> HandlerFuture<'a> {
        Box::pin(send(request))
    }
}

async fn send(request: &mut Request) {
    if request.error.is_some() {
        return;
    }
    let connector = match request.config.connector() {
        Some(connector) => connector.clone(),
        None => {
            request.error = Some(SdkError::construction_failure(
                "no HTTP connector was configured",
            ));
            return;
        }
    };
    let http_request = match try_clone_http_request(&request.http_request) {
        Some(http_request) => http_request,
        None => {
            request.error = Some(SdkError::serialization(
                "request body cannot be replayed",
                None,
            ));
            return;
        }
    };
    let deadline = match (request.response_timeout, request.config.sleep_impl()) {
        (Some(timeout), Some(sleep)) => Some((sleep.clone(), timeout)),
        _ => None,
    };
    let token = request.cancellation().clone();
    match cancellable(dispatch(connector, http_request, deadline), &token).await {
        Ok(Ok(response)) => {
            request.request_id = header::request_id(response.headers()).map(str::to_string);
            request.http_response = Some(response);
        }
        Ok(Err(err)) => request.error = Some(err),
        Err(_) => request.error = Some(SdkError::canceled()),
    }
}

async fn dispatch(
    connector: SharedConnector,
    request: http::Request<SdkBody>,
    deadline: Option<(SharedAsyncSleep, Duration)>,
) -> Result<http::Response<SdkBody>, SdkError> {
    let call = connector.call(request);
    match deadline {
        // an elapsed deadline wins the race the same way a fired cancellation token does
        Some((sleep, timeout)) => match Cancellable::new(call, sleep.sleep(timeout)).await {
            Ok(result) => result.map_err(SdkError::dispatch_failure),
            Err(_) => Err(SdkError::ResponseTimeout { timeout }),
        },
        None => call.await.map_err(SdkError::dispatch_failure),
    }
}

/// Dispatches the request through the configured connector
pub fn send_handler() -> NamedHandler<Request> {
    NamedHandler::new(SEND, SendHandler)
}

/// Logs the outgoing request when the request's log level asks for it
pub fn log_request_handler() -> NamedHandler<Request> {
    NamedHandler::new(
        LOG_REQUEST,
        handler_fn(|request: &mut Request| {
            if !request.log_level.matches(LogLevel::Debug) {
                return;
            }
            let http_request = &request.http_request;
            if request.log_level.matches(LogLevel::DebugWithHttpBody) {
                debug!(
                    method = %http_request.method(),
                    uri = %http_request.uri(),
                    headers = ?http_request.headers(),
                    body = ?http_request.body().bytes().map(String::from_utf8_lossy),
                    "sending request"
                );
            } else {
                debug!(
                    method = %http_request.method(),
                    uri = %http_request.uri(),
                    "sending request"
                );
            }
        }),
    )
}

/// Logs the response when the request's log level asks for it
pub fn log_response_handler() -> NamedHandler<Request> {
    NamedHandler::new(
        LOG_RESPONSE,
        handler_fn(|request: &mut Request| {
            if !request.log_level.matches(LogLevel::Debug) {
                return;
            }
            let response = match &request.http_response {
                Some(response) => response,
                None => return,
            };
            if request.log_level.matches(LogLevel::DebugWithHttpBody) {
                debug!(
                    status = response.status().as_u16(),
                    request_id = ?request.request_id,
                    headers = ?response.headers(),
                    body = ?response.body().bytes().map(String::from_utf8_lossy),
                    "received response"
                );
            } else {
                debug!(
                    status = response.status().as_u16(),
                    request_id = ?request.request_id,
                    "received response"
                );
            }
        }),
    )
}

/// Records a generic `UnknownError` for responses outside the 2xx range.
///
/// Protocol specific `UnmarshalError` handlers replace it with the decoded service error.
pub fn validate_response_handler() -> NamedHandler<Request> {
    NamedHandler::new(
        VALIDATE_RESPONSE,
        handler_fn(|request: &mut Request| {
            let status = request.status().map(|status| status.as_u16()).unwrap_or(0);
            if status == 0 || status >= 300 {
                let mut error =
                    ServiceError::new(status, "UnknownError").with_message("unknown error");
                if let Some(request_id) = &request.request_id {
                    error = error.with_request_id(request_id.clone());
                }
                request.error = Some(SdkError::service(error));
            }
        }),
    )
}

#[derive(Debug)]
struct AfterRetryHandler;

impl Handler<Request> for AfterRetryHandler {
    fn handle<'a>(&'a self, request: &'a mut Request) -> HandlerFuture<'a> {
        Box::pin(after_retry(request))
    }
}

async fn after_retry(request: &mut Request) {
    let retryer = request.retryer.clone();
    if request.retryable.is_none() || request.config.enforce_should_retry_check() {
        request.retryable = Some(retryer.should_retry(request));
    }
    if !request.will_retry() {
        return;
    }

    let delay = retryer.retry_rules(request);
    request.retry_delay = delay;
    let sleep = match request.config.sleep_impl() {
        Some(sleep) => sleep.clone(),
        None => {
            warn!("a sleep implementation is required to retry; not retrying");
            request.retryable = Some(false);
            return;
        }
    };
    debug!(
        retry_count = request.retry_count,
        delay = ?delay,
        error = ?request.error,
        "retrying request"
    );
    let token = request.cancellation().clone();
    if cancellable(sleep.sleep(delay), &token).await.is_err() {
        request.error = Some(SdkError::canceled());
        request.retryable = Some(false);
        return;
    }

    if request.is_error_expired() {
        if let Some(credentials) = request.config.credentials() {
            debug!("credentials expired, invalidating cached credentials");
            credentials.invalidate();
        }
    }
    request.retry_count += 1;
    request.error = None;
}

/// Decides whether to retry, sleeps for the backoff delay and clears the error to retry.
///
/// Expired credentials are invalidated so the next attempt loads fresh ones.
pub fn after_retry_handler() -> NamedHandler<Request> {
    NamedHandler::new(AFTER_RETRY, AfterRetryHandler)
}
