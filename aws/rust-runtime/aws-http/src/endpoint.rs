/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Endpoint resolution

use aws_types::Region;
use smithy_http::connector::BoxError;
use std::fmt::Debug;
use std::sync::Arc;

/// A resolved service endpoint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    url: String,
    signing_region: Option<String>,
    signing_name: Option<String>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Endpoint {
            url: url.into(),
            signing_region: None,
            signing_name: None,
        }
    }

    /// Overrides the region requests to this endpoint are signed for
    pub fn with_signing_region(mut self, region: impl Into<String>) -> Self {
        self.signing_region = Some(region.into());
        self
    }

    pub fn with_signing_name(mut self, name: impl Into<String>) -> Self {
        self.signing_name = Some(name.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn signing_region(&self) -> Option<&str> {
        self.signing_region.as_deref()
    }

    pub fn signing_name(&self) -> Option<&str> {
        self.signing_name.as_deref()
    }
}

/// Resolves the endpoint for a service in a region
pub trait ResolveEndpoint: Send + Sync + Debug {
    fn resolve_endpoint(&self, service: &str, region: Option<&Region>)
        -> Result<Endpoint, BoxError>;
}

/// Resolves every service and region to the same endpoint
#[derive(Clone, Debug)]
pub struct StaticEndpoint(Endpoint);

impl StaticEndpoint {
    pub fn new(endpoint: Endpoint) -> Self {
        StaticEndpoint(endpoint)
    }

    pub fn url(url: impl Into<String>) -> Self {
        StaticEndpoint(Endpoint::new(url))
    }
}

impl ResolveEndpoint for StaticEndpoint {
    fn resolve_endpoint(&self, _: &str, _: Option<&Region>) -> Result<Endpoint, BoxError> {
        if self.0.url().is_empty() {
            return Err("endpoint url is empty".into());
        }
        Ok(self.0.clone())
    }
}

/// Builds `https://{service}.{region}.amazonaws.com` endpoints
#[derive(Clone, Debug, Default)]
pub struct AwsDefaultEndpoint;

impl ResolveEndpoint for AwsDefaultEndpoint {
    fn resolve_endpoint(
        &self,
        service: &str,
        region: Option<&Region>,
    ) -> Result<Endpoint, BoxError> {
        let region = region.ok_or("a region is required to resolve an endpoint")?;
        Ok(Endpoint::new(format!(
            "https://{}.{}.amazonaws.com",
            service, region
        )))
    }
}

#[derive(Clone, Debug)]
pub struct SharedEndpointResolver(Arc<dyn ResolveEndpoint>);

impl SharedEndpointResolver {
    pub fn new(resolver: impl ResolveEndpoint + 'static) -> Self {
        SharedEndpointResolver(Arc::new(resolver))
    }
}

impl ResolveEndpoint for SharedEndpointResolver {
    fn resolve_endpoint(
        &self,
        service: &str,
        region: Option<&Region>,
    ) -> Result<Endpoint, BoxError> {
        self.0.resolve_endpoint(service, region)
    }
}
