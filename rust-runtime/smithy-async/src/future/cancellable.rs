/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Provides the [`Cancellable`] future for racing another future against a caller's
//! [`CancellationToken`].
//!
//! Every suspension point of a request (credential refresh, retry backoff, dispatch) is wrapped
//! with [`cancellable`] so that a fired token is observed promptly.

use pin_project_lite::pin_project;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Returned when the token fired before the wrapped future completed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CanceledError;

impl Error for CanceledError {}

impl fmt::Display for CanceledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "canceled")
    }
}

pin_project! {
    /// Future returned by [`cancellable`].
    #[non_exhaustive]
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    #[derive(Debug)]
    pub struct Cancellable<T, C> {
        #[pin]
        value: T,
        #[pin]
        cancelled: C,
    }
}

impl<T, C> Cancellable<T, C> {
    /// Race `value` against the `cancelled` future.
    pub fn new(value: T, cancelled: C) -> Cancellable<T, C> {
        Cancellable { value, cancelled }
    }
}

/// Wrap `future` so that it resolves to `Err(CanceledError)` as soon as `token` is cancelled.
pub fn cancellable<T>(
    future: T,
    token: &CancellationToken,
) -> Cancellable<T, WaitForCancellationFuture<'_>>
where
    T: Future,
{
    Cancellable::new(future, token.cancelled())
}

impl<T, C> Future for Cancellable<T, C>
where
    T: Future,
    C: Future,
{
    type Output = Result<T::Output, CanceledError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let me = self.project();

        // Cancellation takes priority over a value that became ready at the same time
        if let Poll::Ready(_) = me.cancelled.poll(cx) {
            return Poll::Ready(Err(CanceledError));
        }

        match me.value.poll(cx) {
            Poll::Ready(v) => Poll::Ready(Ok(v)),
            Poll::Pending => Poll::Pending,
        }
    }
}
