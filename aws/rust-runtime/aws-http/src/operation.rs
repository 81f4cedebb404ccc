/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use std::borrow::Cow;

/// Name and HTTP binding of a service operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    name: Cow<'static, str>,
    http_method: http::Method,
    http_path: Cow<'static, str>,
    paginator: Option<Paginator>,
}

impl Operation {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Operation {
            name: name.into(),
            http_method: http::Method::POST,
            http_path: Cow::Borrowed("/"),
            paginator: None,
        }
    }

    /// Marks the operation as paginated
    pub fn with_paginator(mut self, paginator: Paginator) -> Self {
        self.paginator = Some(paginator);
        self
    }

    pub fn with_http_method(mut self, method: http::Method) -> Self {
        self.http_method = method;
        self
    }

    pub fn with_http_path(mut self, path: impl Into<Cow<'static, str>>) -> Self {
        self.http_path = path.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn http_method(&self) -> &http::Method {
        &self.http_method
    }

    pub fn http_path(&self) -> &str {
        &self.http_path
    }

    pub fn paginator(&self) -> Option<&Paginator> {
        self.paginator.as_ref()
    }
}

/// How the pages of a paginated operation are chained together.
///
/// Tokens are paths into the operation's input and output documents. After each page, the values
/// at `output_tokens` are copied to the matching `input_tokens` of the next request. An output
/// token may list alternatives separated by `||`; the first one with a value is used.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Paginator {
    input_tokens: Vec<Cow<'static, str>>,
    output_tokens: Vec<Cow<'static, str>>,
    limit_token: Option<Cow<'static, str>>,
    truncation_token: Option<Cow<'static, str>>,
}

impl Paginator {
    /// Pairs `input` with `output`: `output`'s value is sent as `input` on the next page
    pub fn new(input: impl Into<Cow<'static, str>>, output: impl Into<Cow<'static, str>>) -> Self {
        Paginator::default().with_token(input, output)
    }

    /// Adds another input/output token pair
    pub fn with_token(
        mut self,
        input: impl Into<Cow<'static, str>>,
        output: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.input_tokens.push(input.into());
        self.output_tokens.push(output.into());
        self
    }

    /// Input member that bounds the number of items per page
    pub fn with_limit_token(mut self, token: impl Into<Cow<'static, str>>) -> Self {
        self.limit_token = Some(token.into());
        self
    }

    /// Output member that is `false` on the last page
    pub fn with_truncation_token(mut self, token: impl Into<Cow<'static, str>>) -> Self {
        self.truncation_token = Some(token.into());
        self
    }

    pub fn input_tokens(&self) -> impl Iterator<Item = &str> {
        self.input_tokens.iter().map(|token| token.as_ref())
    }

    pub fn output_tokens(&self) -> impl Iterator<Item = &str> {
        self.output_tokens.iter().map(|token| token.as_ref())
    }

    pub fn limit_token(&self) -> Option<&str> {
        self.limit_token.as_deref()
    }

    pub fn truncation_token(&self) -> Option<&str> {
        self.truncation_token.as_deref()
    }
}

/// Static information about the service a client talks to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceMetadata {
    service_name: Cow<'static, str>,
    endpoints_id: Cow<'static, str>,
    signing_name: Cow<'static, str>,
    signing_region: Option<Cow<'static, str>>,
    api_version: Cow<'static, str>,
}

impl ServiceMetadata {
    /// Metadata whose endpoint id and signing name both default to `service_name`
    pub fn new(service_name: impl Into<Cow<'static, str>>) -> Self {
        let service_name = service_name.into();
        ServiceMetadata {
            endpoints_id: service_name.clone(),
            signing_name: service_name.clone(),
            service_name,
            signing_region: None,
            api_version: Cow::Borrowed(""),
        }
    }

    pub fn with_endpoints_id(mut self, id: impl Into<Cow<'static, str>>) -> Self {
        self.endpoints_id = id.into();
        self
    }

    pub fn with_signing_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.signing_name = name.into();
        self
    }

    /// Pins signing to a region regardless of client configuration
    pub fn with_signing_region(mut self, region: impl Into<Cow<'static, str>>) -> Self {
        self.signing_region = Some(region.into());
        self
    }

    pub fn with_api_version(mut self, version: impl Into<Cow<'static, str>>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn endpoints_id(&self) -> &str {
        &self.endpoints_id
    }

    pub fn signing_name(&self) -> &str {
        &self.signing_name
    }

    pub fn signing_region(&self) -> Option<&str> {
        self.signing_region.as_deref()
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }
}
