/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::Credentials;
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
#[non_exhaustive]
pub enum CredentialsError {
    /// No credentials were available for this provider
    CredentialsNotLoaded,

    /// Loading credentials from this provider exceeded the maximum allowed duration
    ProviderTimedOut(Duration),

    /// The provider was given an invalid configuration
    InvalidConfiguration(Box<dyn Error + Send + Sync + 'static>),

    /// The provider experienced an error during credential resolution
    ///
    /// This may include errors like a 503 from STS or a file system error when attempting to
    /// read a configuration file.
    ProviderError(Box<dyn Error + Send + Sync + 'static>),

    /// An unexpected error occured during credential resolution
    Unhandled(Box<dyn Error + Send + Sync + 'static>),
}

impl Display for CredentialsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CredentialsError::CredentialsNotLoaded => {
                write!(f, "The provider could not provide credentials or required configuration was not set")
            }
            CredentialsError::ProviderTimedOut(d) => write!(
                f,
                "Credentials provider timed out after {} seconds",
                d.as_secs()
            ),
            CredentialsError::Unhandled(err) => write!(f, "Unexpected credentials error: {}", err),
            CredentialsError::InvalidConfiguration(err) => {
                write!(f, "The credentials provider was not properly configured: {}", err)
            }
            CredentialsError::ProviderError(err) => {
                write!(f, "An error occured while loading credentials: {}", err)
            }
        }
    }
}

impl Error for CredentialsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CredentialsError::Unhandled(e)
            | CredentialsError::ProviderError(e)
            | CredentialsError::InvalidConfiguration(e) => Some(e.as_ref() as _),
            _ => None,
        }
    }
}

pub type Result = std::result::Result<Credentials, CredentialsError>;

pub mod future {
    use std::future::Future;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

    /// Future returned by [`ProvideCredentials`](super::ProvideCredentials)
    pub struct ProvideCredentials<'a>(BoxFuture<'a, super::Result>);

    impl<'a> ProvideCredentials<'a> {
        pub fn new(future: impl Future<Output = super::Result> + Send + 'a) -> Self {
            ProvideCredentials(Box::pin(future))
        }

        pub fn ready(credentials: super::Result) -> Self {
            ProvideCredentials(Box::pin(std::future::ready(credentials)))
        }
    }

    impl Future for ProvideCredentials<'_> {
        type Output = super::Result;

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            self.0.as_mut().poll(cx)
        }
    }
}

/// Asynchronous Credentials Provider
pub trait ProvideCredentials: Send + Sync + Debug {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a;

    /// Forces the next `provide_credentials` call to load fresh credentials.
    ///
    /// Called when a service rejected the current credentials as expired. Providers without a
    /// notion of staleness can ignore it.
    fn invalidate(&self) {}
}

impl ProvideCredentials for Credentials {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::ready(Ok(self.clone()))
    }
}

/// Wrapper type around a shareable [`ProvideCredentials`]
#[derive(Clone, Debug)]
pub struct SharedCredentialsProvider(Arc<dyn ProvideCredentials>);

impl SharedCredentialsProvider {
    pub fn new(provider: impl ProvideCredentials + 'static) -> Self {
        SharedCredentialsProvider(Arc::new(provider))
    }
}

impl ProvideCredentials for SharedCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        self.0.provide_credentials()
    }

    fn invalidate(&self) {
        self.0.invalidate()
    }
}

/// A [`ProvideCredentials`] implemented by a closure.
///
/// See [`provide_credentials_fn`] for more details.
#[derive(Copy, Clone)]
pub struct ProvideCredentialsFn<'c, T> {
    f: T,
    phantom: PhantomData<&'c T>,
}

impl<T> Debug for ProvideCredentialsFn<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ProvideCredentialsFn")
    }
}

impl<'c, T, F> ProvideCredentials for ProvideCredentialsFn<'c, T>
where
    T: Fn() -> F + Send + Sync + 'c,
    F: Future<Output = Result> + Send + 'static,
{
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new((self.f)())
    }
}

/// Returns a new [`ProvideCredentialsFn`] with the given closure. This allows you
/// to create an [`ProvideCredentials`] implementation from an async block that returns
/// a [`Result`].
///
/// # Example
///
/// ```
/// use aws_types::Credentials;
/// use aws_types::credential::provide_credentials_fn;
///
/// provide_credentials_fn(|| async {
///     // Async process to retrieve credentials goes here
///     Ok(Credentials::from_keys("akid", "secret", None))
/// });
/// ```
pub fn provide_credentials_fn<'c, T, F>(f: T) -> ProvideCredentialsFn<'c, T>
where
    T: Fn() -> F + Send + Sync + 'c,
    F: Future<Output = Result> + Send + 'static,
{
    ProvideCredentialsFn {
        f,
        phantom: Default::default(),
    }
}

#[cfg(test)]
mod test {
    use crate::credential::{provide_credentials_fn, ProvideCredentials, SharedCredentialsProvider};
    use crate::Credentials;
    use futures_util::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn creds_are_send_sync() {
        assert_send_sync::<Credentials>();
        assert_send_sync::<SharedCredentialsProvider>();
    }

    #[test]
    fn static_credentials_are_immediately_ready() {
        let creds = Credentials::from_keys("akid", "secret", None);
        let loaded = creds
            .provide_credentials()
            .now_or_never()
            .expect("ready future")
            .expect("static credentials");
        assert_eq!(creds, loaded);
    }

    #[tokio::test]
    async fn closure_provider_is_called_every_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let provider = SharedCredentialsProvider::new(provide_credentials_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Credentials::from_keys("akid", "secret", None)) }
        }));
        provider.provide_credentials().await.unwrap();
        provider.provide_credentials().await.unwrap();
        // default invalidate is a no-op
        provider.invalidate();
        assert_eq!(2, calls.load(Ordering::SeqCst));
    }
}
