/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Utilities for parsing information from headers

use http::HeaderMap;
use std::time::Duration;

pub const RETRY_AFTER: &str = "retry-after";

const REQUEST_ID_HEADERS: &[&str] = &["x-amzn-requestid", "x-amz-request-id"];

/// Reads a `Retry-After` header expressed in whole seconds.
///
/// HTTP-date values, negative numbers and garbage are ignored.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let seconds: u64 = value.trim().parse().ok()?;
    Some(Duration::from_secs(seconds))
}

/// Reads the request id assigned by the service, if any
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    REQUEST_ID_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod test {
    use crate::header::{request_id, retry_after};
    use http::{HeaderMap, HeaderValue};
    use proptest::prelude::*;
    use std::time::Duration;

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(name, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn retry_after_seconds() {
        assert_eq!(
            Some(Duration::from_secs(3600)),
            retry_after(&headers("retry-after", "3600"))
        );
        assert_eq!(Some(Duration::from_secs(0)), retry_after(&headers("retry-after", "0")));
    }

    #[test]
    fn malformed_retry_after_is_ignored() {
        assert_eq!(None, retry_after(&HeaderMap::new()));
        assert_eq!(None, retry_after(&headers("retry-after", "soon")));
        assert_eq!(None, retry_after(&headers("retry-after", "-5")));
        assert_eq!(
            None,
            retry_after(&headers("retry-after", "Wed, 21 Oct 2015 07:28:00 GMT"))
        );
    }

    #[test]
    fn request_id_from_either_header() {
        assert_eq!(Some("abc"), request_id(&headers("x-amzn-requestid", "abc")));
        assert_eq!(Some("def"), request_id(&headers("x-amz-request-id", "def")));
        assert_eq!(None, request_id(&HeaderMap::new()));
    }

    proptest! {
        #[test]
        fn any_integer_seconds_parse(secs in 0u32..u32::MAX) {
            let value = secs.to_string();
            prop_assert_eq!(
                Some(Duration::from_secs(secs as u64)),
                retry_after(&headers("retry-after", &value))
            );
        }
    }
}
