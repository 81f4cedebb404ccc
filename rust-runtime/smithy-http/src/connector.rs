/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! The transport seam: anything that can exchange an HTTP request for a response.

use crate::body::SdkBody;
use smithy_types::retry::{ErrorKind, ProvideErrorKind};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Future returned by [`HttpConnector::call`]
pub type ConnectorFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<SdkBody>, ConnectorError>> + Send>>;

/// Sends an HTTP request and returns the response
pub trait HttpConnector: Debug + Send + Sync {
    fn call(&self, request: http::Request<SdkBody>) -> ConnectorFuture;
}

/// Wrapper type around a shareable [`HttpConnector`]
#[derive(Clone, Debug)]
pub struct SharedConnector(Arc<dyn HttpConnector>);

impl SharedConnector {
    pub fn new(connector: impl HttpConnector + 'static) -> Self {
        SharedConnector(Arc::new(connector))
    }
}

impl HttpConnector for SharedConnector {
    fn call(&self, request: http::Request<SdkBody>) -> ConnectorFuture {
        self.0.call(request)
    }
}

#[derive(Debug)]
enum ConnectorErrorKind {
    /// A timeout occurred while processing the request
    Timeout,

    /// A user-caused error (eg. invalid HTTP request)
    User,

    /// Socket/IO error
    Io,

    /// An unclassified error, optionally with a retry classification
    Other(Option<ErrorKind>),
}

/// Error from the transport.
///
/// The response may or may not have reached the server, but no response was received.
#[derive(Debug)]
pub struct ConnectorError {
    kind: ConnectorErrorKind,
    source: BoxError,
}

impl Display for ConnectorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConnectorErrorKind::Timeout => write!(f, "timeout"),
            ConnectorErrorKind::User => write!(f, "user error"),
            ConnectorErrorKind::Io => write!(f, "io error"),
            ConnectorErrorKind::Other(_) => write!(f, "other"),
        }?;
        write!(f, ": {}", self.source)
    }
}

impl Error for ConnectorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl ConnectorError {
    pub fn timeout(source: BoxError) -> Self {
        Self {
            kind: ConnectorErrorKind::Timeout,
            source,
        }
    }

    pub fn user(source: BoxError) -> Self {
        Self {
            kind: ConnectorErrorKind::User,
            source,
        }
    }

    pub fn io(source: BoxError) -> Self {
        Self {
            kind: ConnectorErrorKind::Io,
            source,
        }
    }

    pub fn other(source: BoxError, kind: Option<ErrorKind>) -> Self {
        Self {
            kind: ConnectorErrorKind::Other(kind),
            source,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ConnectorErrorKind::Timeout)
    }

    pub fn is_io(&self) -> bool {
        matches!(self.kind, ConnectorErrorKind::Io)
    }

    pub fn is_user(&self) -> bool {
        matches!(self.kind, ConnectorErrorKind::User)
    }

    /// Timeouts and IO failures (connection reset, broken pipe, ...) may succeed on a second try
    pub fn is_transient(&self) -> bool {
        self.is_timeout() || self.is_io()
    }
}

impl ProvideErrorKind for ConnectorError {
    fn retryable_error_kind(&self) -> Option<ErrorKind> {
        match self.kind {
            ConnectorErrorKind::Timeout | ConnectorErrorKind::Io => Some(ErrorKind::TransientError),
            ConnectorErrorKind::User => None,
            ConnectorErrorKind::Other(kind) => kind,
        }
    }

    fn code(&self) -> Option<&str> {
        None
    }
}

#[cfg(test)]
mod test {
    use crate::connector::ConnectorError;
    use smithy_types::retry::{ErrorKind, ProvideErrorKind};
    use std::error::Error;

    #[test]
    fn classification() {
        let timeout = ConnectorError::timeout("read timed out".into());
        assert!(timeout.is_transient());
        assert_eq!(
            Some(ErrorKind::TransientError),
            timeout.retryable_error_kind()
        );

        let user = ConnectorError::user("bad uri".into());
        assert!(!user.is_transient());
        assert_eq!(None, user.retryable_error_kind());

        let other =
            ConnectorError::other("throttled by proxy".into(), Some(ErrorKind::ThrottlingError));
        assert_eq!(Some(ErrorKind::ThrottlingError), other.retryable_error_kind());
    }

    #[test]
    fn display_includes_source() {
        let err = ConnectorError::io("connection reset by peer".into());
        assert_eq!("io error: connection reset by peer", err.to_string());
        assert!(err.source().is_some());
    }
}
