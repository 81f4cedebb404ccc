/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! `User-Agent` construction

use http::header::{InvalidHeaderValue, USER_AGENT};
use http::HeaderValue;
use std::fmt;
use std::fmt::{Display, Formatter};

pub const SDK_NAME: &str = "aws-sdk-rust";
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone, Copy, Debug)]
pub struct SdkMetadata {
    name: &'static str,
    version: &'static str,
}

impl SdkMetadata {
    pub const fn new(name: &'static str, version: &'static str) -> Self {
        SdkMetadata { name, version }
    }
}

impl Default for SdkMetadata {
    fn default() -> Self {
        SdkMetadata::new(SDK_NAME, SDK_VERSION)
    }
}

impl Display for SdkMetadata {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// Platform the SDK was compiled for
#[derive(Clone, Copy, Debug)]
pub struct OsMetadata {
    os: &'static str,
    arch: &'static str,
}

impl OsMetadata {
    pub fn current() -> Self {
        OsMetadata {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
        }
    }
}

impl Display for OsMetadata {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({}; {})", self.os, self.arch)
    }
}

/// The `User-Agent` token identifying this SDK, eg. `aws-sdk-rust/0.1.0 (linux; x86_64)`
pub fn sdk_user_agent() -> String {
    format!("{} {}", SdkMetadata::default(), OsMetadata::current())
}

/// Appends `value` to the request's `User-Agent` header, separated by a single space.
///
/// The header is created when the request has none.
pub fn add_to_user_agent<B>(
    request: &mut http::Request<B>,
    value: &str,
) -> Result<(), InvalidHeaderValue> {
    let updated = match request
        .headers()
        .get(USER_AGENT)
        .and_then(|current| current.to_str().ok())
    {
        Some(current) if !current.is_empty() => format!("{} {}", current, value),
        _ => value.to_string(),
    };
    let updated = HeaderValue::from_str(&updated)?;
    request.headers_mut().insert(USER_AGENT, updated);
    Ok(())
}

#[cfg(test)]
mod test {
    use crate::user_agent::{add_to_user_agent, sdk_user_agent, SDK_NAME};
    use http::header::USER_AGENT;

    fn user_agent(request: &http::Request<()>) -> &str {
        request.headers()[USER_AGENT].to_str().unwrap()
    }

    #[test]
    fn sdk_token_names_the_platform() {
        let ua = sdk_user_agent();
        assert!(ua.starts_with(&format!("{}/", SDK_NAME)), "{}", ua);
        assert!(ua.contains(std::env::consts::OS), "{}", ua);
        assert!(ua.ends_with(&format!("; {})", std::env::consts::ARCH)), "{}", ua);
    }

    #[test]
    fn appends_with_a_single_space() {
        let mut request = http::Request::new(());
        add_to_user_agent(&mut request, "first/1.0").unwrap();
        assert_eq!("first/1.0", user_agent(&request));
        add_to_user_agent(&mut request, "Waiter").unwrap();
        assert_eq!("first/1.0 Waiter", user_agent(&request));
    }

    #[test]
    fn invalid_values_leave_the_header_untouched() {
        let mut request = http::Request::new(());
        add_to_user_agent(&mut request, "first/1.0").unwrap();
        assert!(add_to_user_agent(&mut request, "bad\nvalue").is_err());
        assert_eq!("first/1.0", user_agent(&request));
    }
}
