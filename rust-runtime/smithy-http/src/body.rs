/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use bytes::Bytes;
use http::{HeaderMap, HeaderValue};
use std::error::Error;
use std::pin::Pin;
use std::task::{Context, Poll};

type BodyError = Box<dyn Error + Send + Sync>;

/// SdkBody type
///
/// This is the Body used for dispatching all HTTP Requests and for the responses handed back by
/// a connector. Bodies are held in memory so that a request can be replayed on retry.
#[derive(Debug)]
pub struct SdkBody {
    inner: Inner,
}

#[derive(Debug)]
enum Inner {
    Once(Option<Bytes>),
    Taken,
}

impl SdkBody {
    pub fn empty() -> Self {
        SdkBody {
            inner: Inner::Once(None),
        }
    }

    /// A body whose contents were already consumed and cannot be replayed
    pub fn taken() -> Self {
        SdkBody { inner: Inner::Taken }
    }

    fn poll_inner(&mut self) -> Poll<Option<Result<Bytes, BodyError>>> {
        match &mut self.inner {
            Inner::Once(opt) => {
                let data = opt.take();
                match data {
                    Some(bytes) if bytes.is_empty() => Poll::Ready(None),
                    Some(bytes) => Poll::Ready(Some(Ok(bytes))),
                    None => Poll::Ready(None),
                }
            }
            Inner::Taken => Poll::Ready(Some(Err("A `Taken` body should never be polled".into()))),
        }
    }

    /// The full body, if it is still held in memory
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.inner {
            Inner::Once(Some(b)) => Some(b),
            Inner::Once(None) => Some(&[]),
            Inner::Taken => None,
        }
    }

    pub fn try_clone(&self) -> Option<Self> {
        match &self.inner {
            Inner::Once(bytes) => Some(SdkBody {
                inner: Inner::Once(bytes.clone()),
            }),
            Inner::Taken => None,
        }
    }

    /// Length of the body, `None` if it was already taken
    pub fn content_length(&self) -> Option<u64> {
        self.bytes().map(|b| b.len() as u64)
    }

    /// Moves the contents out, leaving a `Taken` body behind
    pub fn take(&mut self) -> SdkBody {
        std::mem::replace(self, SdkBody::taken())
    }
}

impl Default for SdkBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&str> for SdkBody {
    fn from(s: &str) -> Self {
        SdkBody::from(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for SdkBody {
    fn from(s: String) -> Self {
        SdkBody::from(Bytes::from(s))
    }
}

impl From<Bytes> for SdkBody {
    fn from(bytes: Bytes) -> Self {
        SdkBody {
            inner: Inner::Once(Some(bytes)),
        }
    }
}

impl From<Vec<u8>> for SdkBody {
    fn from(data: Vec<u8>) -> SdkBody {
        Self::from(Bytes::from(data))
    }
}

impl http_body::Body for SdkBody {
    type Data = Bytes;
    type Error = BodyError;

    fn poll_data(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Self::Data, Self::Error>>> {
        self.poll_inner()
    }

    fn poll_trailers(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<HeaderMap<HeaderValue>>, Self::Error>> {
        Poll::Ready(Ok(None))
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Inner::Once(None) => true,
            Inner::Once(Some(bytes)) => bytes.is_empty(),
            Inner::Taken => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self.content_length() {
            Some(len) => http_body::SizeHint::with_exact(len),
            None => http_body::SizeHint::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::body::SdkBody;
    use http_body::Body;

    #[tokio::test]
    async fn body_is_polled_once() {
        let mut body = SdkBody::from("hello");
        let data = body.data().await.unwrap().unwrap();
        assert_eq!(&data[..], b"hello");
        assert!(body.data().await.is_none());
    }

    #[test]
    fn clones_are_independent() {
        let body = SdkBody::from("abc");
        let cloned = body.try_clone().expect("in-memory bodies can be cloned");
        assert_eq!(Some(&b"abc"[..]), cloned.bytes());
        assert_eq!(Some(3), body.content_length());
    }

    #[test]
    fn taken_bodies_cannot_be_replayed() {
        let mut body = SdkBody::from("abc");
        let moved = body.take();
        assert_eq!(Some(&b"abc"[..]), moved.bytes());
        assert!(body.try_clone().is_none());
        assert_eq!(None, body.content_length());
    }

    #[test]
    fn empty_body_has_zero_length() {
        let body = SdkBody::empty();
        assert_eq!(Some(0), body.content_length());
        assert!(body.is_end_stream());
    }
}
