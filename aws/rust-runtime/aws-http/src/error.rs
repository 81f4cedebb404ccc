/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Errors produced while sending a request, and their retry classification.
//!
//! Every failure recorded on a [`Request`](crate::request::Request) is an [`SdkError`]. Each
//! variant maps onto a stable string [`code`](SdkError::code), and the classification helpers
//! ([`is_retryable`](SdkError::is_retryable), [`is_throttle`](SdkError::is_throttle),
//! [`is_expired_credentials`](SdkError::is_expired_credentials)) are driven by those codes.

use aws_types::credential::CredentialsError;
use smithy_http::connector::{BoxError, ConnectorError};
use smithy_types::retry::{ErrorKind, ProvideErrorKind};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A cloneable, type-erased error source
pub type SharedError = Arc<dyn Error + Send + Sync>;

/// Well known error codes
pub mod code {
    /// The request was canceled before it completed
    pub const REQUEST_CANCELED: &str = "RequestCanceled";
    /// A waiter gave up before the resource reached the desired state
    pub const RESOURCE_NOT_READY: &str = "ResourceNotReady";
    /// The request could not be delivered
    pub const REQUEST_ERROR: &str = "RequestError";
    /// The response could not be read
    pub const READ_ERROR: &str = "ReadError";
    /// No response arrived within the configured response timeout
    pub const RESPONSE_TIMEOUT: &str = "ResponseTimeout";
    /// Building the request or reading the response payload failed
    pub const SERIALIZATION: &str = "SerializationError";
    /// An error response could not be decoded
    pub const UNKNOWN: &str = "UnknownError";
    pub const INVALID_ENDPOINT_URL: &str = "InvalidEndpointURL";
    pub const MISSING_REGION: &str = "MissingRegion";
    pub const MISSING_ENDPOINT: &str = "MissingEndpoint";
    pub const INVALID_PARAMETER: &str = "InvalidParameter";
    pub const CREDENTIALS: &str = "CredentialsError";
    pub const SIGNING: &str = "SigningError";

    pub(crate) const RETRYABLE: &[&str] = &[
        REQUEST_ERROR,
        "RequestTimeout",
        RESPONSE_TIMEOUT,
        "RequestTimeoutException",
        READ_ERROR,
    ];

    pub(crate) const THROTTLE: &[&str] = &[
        "ProvisionedThroughputExceededException",
        "ThrottledException",
        "Throttling",
        "ThrottlingException",
        "RequestLimitExceeded",
        "RequestThrottled",
        "RequestThrottledException",
        "TooManyRequestsException",
        "PriorRequestNotComplete",
        "TransactionInProgressException",
        "EC2ThrottledException",
    ];

    pub(crate) const EXPIRED_CREDENTIALS: &[&str] =
        &["ExpiredToken", "ExpiredTokenException", "RequestExpired"];
}

/// Problems found before anything was sent
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("could not find region configuration")]
    MissingRegion,

    #[error("'Endpoint' configuration is required for this service")]
    MissingEndpoint,

    #[error("invalid endpoint uri `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("{} validation error(s) found in {context}: {}", .errors.len(), .errors.join(", "))]
    InvalidParameters { context: String, errors: Vec<String> },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingRegion => code::MISSING_REGION,
            ValidationError::MissingEndpoint => code::MISSING_ENDPOINT,
            ValidationError::InvalidEndpoint { .. } => code::INVALID_ENDPOINT_URL,
            ValidationError::InvalidParameters { .. } => code::INVALID_PARAMETER,
        }
    }
}

/// An error response returned by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    status: u16,
    code: String,
    message: Option<String>,
    request_id: Option<String>,
}

impl ServiceError {
    pub fn new(status: u16, code: impl Into<String>) -> Self {
        ServiceError {
            status,
            code: code.into(),
            message: None,
            request_id: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        write!(f, " (status code: {}", self.status)?;
        if let Some(request_id) = &self.request_id {
            write!(f, ", request id: {}", request_id)?;
        }
        write!(f, ")")
    }
}

impl Error for ServiceError {}

/// Failure recorded on a request.
///
/// `SdkError` is cheap to clone: underlying sources are reference counted so the same error can
/// be stored on the request and returned to the caller.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum SdkError {
    /// The request was rejected before it was built
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request could not be built
    #[error("failed to construct request: {source}")]
    ConstructionFailure { source: SharedError },

    /// Credentials could not be loaded for signing
    #[error("failed to load credentials: {source}")]
    Credentials { source: Arc<CredentialsError> },

    #[error("failed to sign request: {source}")]
    SigningFailure { source: SharedError },

    /// The request failed during dispatch; no HTTP response was received
    #[error("failed to dispatch request: {source}")]
    DispatchFailure { source: Arc<ConnectorError> },

    #[error("no response received within {timeout:?}")]
    ResponseTimeout { timeout: Duration },

    /// The response was received but could not be read or decoded
    #[error("{message}")]
    Serialization {
        message: String,
        source: Option<SharedError>,
    },

    /// The service returned an error response
    #[error(transparent)]
    Service(ServiceError),

    #[error("{message}")]
    Canceled {
        message: String,
        source: Option<SharedError>,
    },

    /// A waiter gave up on the resource
    #[error("{message}")]
    ResourceNotReady {
        message: String,
        source: Option<SharedError>,
    },
}

impl SdkError {
    pub fn construction_failure(source: impl Into<BoxError>) -> Self {
        SdkError::ConstructionFailure {
            source: source.into().into(),
        }
    }

    pub fn credentials(source: CredentialsError) -> Self {
        SdkError::Credentials {
            source: Arc::new(source),
        }
    }

    pub fn signing_failure(source: impl Into<BoxError>) -> Self {
        SdkError::SigningFailure {
            source: source.into().into(),
        }
    }

    pub fn dispatch_failure(source: ConnectorError) -> Self {
        SdkError::DispatchFailure {
            source: Arc::new(source),
        }
    }

    pub fn serialization(message: impl Into<String>, source: Option<BoxError>) -> Self {
        SdkError::Serialization {
            message: message.into(),
            source: source.map(Into::into),
        }
    }

    pub fn service(error: ServiceError) -> Self {
        SdkError::Service(error)
    }

    /// The error recorded when a request's cancellation token fires
    pub fn canceled() -> Self {
        Self::canceled_with("request context canceled", None)
    }

    pub fn canceled_with(message: impl Into<String>, source: Option<SharedError>) -> Self {
        SdkError::Canceled {
            message: message.into(),
            source,
        }
    }

    pub fn resource_not_ready(message: impl Into<String>, source: Option<SharedError>) -> Self {
        SdkError::ResourceNotReady {
            message: message.into(),
            source,
        }
    }

    /// Stable string code identifying this error
    pub fn code(&self) -> &str {
        match self {
            SdkError::Validation(err) => err.code(),
            SdkError::ConstructionFailure { .. } => code::SERIALIZATION,
            SdkError::Credentials { .. } => code::CREDENTIALS,
            SdkError::SigningFailure { .. } => code::SIGNING,
            SdkError::DispatchFailure { .. } => code::REQUEST_ERROR,
            SdkError::ResponseTimeout { .. } => code::RESPONSE_TIMEOUT,
            SdkError::Serialization { .. } => code::SERIALIZATION,
            SdkError::Service(err) => err.code(),
            SdkError::Canceled { .. } => code::REQUEST_CANCELED,
            SdkError::ResourceNotReady { .. } => code::RESOURCE_NOT_READY,
        }
    }

    pub fn message(&self) -> String {
        match self {
            SdkError::Service(err) => err.message().unwrap_or_default().to_string(),
            other => other.to_string(),
        }
    }

    /// HTTP status of a service error response
    pub fn status(&self) -> Option<u16> {
        match self {
            SdkError::Service(err) => Some(err.status()),
            _ => None,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            SdkError::Service(err) => err.request_id(),
            _ => None,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, SdkError::Canceled { .. })
    }

    /// Whether the error is transient and the request may succeed when sent again
    pub fn is_retryable(&self) -> bool {
        self.retryable_error_kind()
            .map(ErrorKind::is_retryable)
            .unwrap_or(false)
    }

    /// Whether the service asked the caller to slow down
    pub fn is_throttle(&self) -> bool {
        code::THROTTLE.contains(&self.code())
    }

    /// Whether the credentials used to sign the request were rejected as expired
    pub fn is_expired_credentials(&self) -> bool {
        code::EXPIRED_CREDENTIALS.contains(&self.code())
    }

    fn has_transient_cause(&self) -> bool {
        let mut next: Option<&(dyn Error + 'static)> = match self {
            SdkError::Serialization {
                source: Some(source),
                ..
            } => Some(&**source),
            _ => None,
        };
        while let Some(err) = next {
            if let Some(connector) = err.downcast_ref::<ConnectorError>() {
                if connector.is_transient() {
                    return true;
                }
            }
            if let Some(io) = err.downcast_ref::<std::io::Error>() {
                if is_transient_io(io.kind()) {
                    return true;
                }
            }
            next = err.source();
        }
        false
    }
}

fn is_transient_io(kind: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind::*;
    matches!(
        kind,
        ConnectionReset | ConnectionAborted | BrokenPipe | TimedOut | UnexpectedEof | Interrupted
    )
}

impl ProvideErrorKind for SdkError {
    fn retryable_error_kind(&self) -> Option<ErrorKind> {
        match self {
            SdkError::Canceled { .. }
            | SdkError::Validation(_)
            | SdkError::ConstructionFailure { .. }
            | SdkError::Credentials { .. }
            | SdkError::SigningFailure { .. }
            | SdkError::ResourceNotReady { .. } => None,
            SdkError::DispatchFailure { source } if source.is_user() => None,
            SdkError::DispatchFailure { source } => source
                .retryable_error_kind()
                .or(Some(ErrorKind::TransientError)),
            SdkError::ResponseTimeout { .. } => Some(ErrorKind::TransientError),
            SdkError::Serialization { .. } if self.has_transient_cause() => {
                Some(ErrorKind::TransientError)
            }
            SdkError::Serialization { .. } => None,
            SdkError::Service(err) => {
                if code::THROTTLE.contains(&err.code()) {
                    Some(ErrorKind::ThrottlingError)
                } else if code::RETRYABLE.contains(&err.code())
                    || code::EXPIRED_CREDENTIALS.contains(&err.code())
                {
                    Some(ErrorKind::TransientError)
                } else if err.status() >= 500 {
                    Some(ErrorKind::ServerError)
                } else {
                    None
                }
            }
        }
    }

    fn code(&self) -> Option<&str> {
        Some(SdkError::code(self))
    }
}
