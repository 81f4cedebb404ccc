/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::defaults;
use crate::paginator::Pager;
use crate::waiter::Waiter;
use aws_http::config::Config;
use aws_http::error::SdkError;
use aws_http::handlers::Handlers;
use aws_http::operation::{Operation, ServiceMetadata};
use aws_http::options::RequestOption;
use aws_http::request::Request;
use aws_http::retry::{DefaultRetryer, SharedRetryer};
use smithy_types::Document;
use std::borrow::Cow;

/// A service client.
///
/// A client holds the configuration, service metadata, handler template and retry policy that
/// every request it creates starts from. Requests receive copies, so customizing one request
/// never affects another.
#[derive(Clone, Debug)]
pub struct Client {
    config: Config,
    metadata: ServiceMetadata,
    handlers: Handlers,
    retryer: SharedRetryer,
}

impl Client {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// A client with the default handlers and the configured (or default) retryer
    pub fn new(config: Config, metadata: ServiceMetadata) -> Self {
        let retryer = config
            .retryer()
            .cloned()
            .unwrap_or_else(|| SharedRetryer::new(DefaultRetryer::default()));
        Client {
            config,
            metadata,
            handlers: defaults::handlers(),
            retryer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metadata(&self) -> &ServiceMetadata {
        &self.metadata
    }

    pub fn handlers(&self) -> &Handlers {
        &self.handlers
    }

    /// Handler template for requests created from now on
    pub fn handlers_mut(&mut self) -> &mut Handlers {
        &mut self.handlers
    }

    pub fn retryer(&self) -> &SharedRetryer {
        &self.retryer
    }

    /// Creates a request for `operation` with its own copy of the client's handlers
    pub fn new_request(&self, operation: Operation, params: Document) -> Request {
        Request::new(
            self.config.clone(),
            self.metadata.clone(),
            self.handlers.clone(),
            self.retryer.clone(),
            operation,
            params,
        )
    }

    /// Sends `operation` and returns its decoded output
    pub async fn send(
        &self,
        operation: Operation,
        params: Document,
        options: &[RequestOption],
    ) -> Result<Document, SdkError> {
        let mut request = self.new_request(operation, params);
        request.apply_options(options);
        request.send().await?;
        Ok(request.output.take().unwrap_or(Document::Null))
    }

    /// A waiter polling `operation` with `params`.
    ///
    /// The waiter has no acceptors yet; add them with [`Waiter::with_acceptors`].
    pub fn waiter(
        &self,
        name: impl Into<Cow<'static, str>>,
        operation: Operation,
        params: Document,
    ) -> Waiter {
        let client = self.clone();
        Waiter::new(name, move |options: &[RequestOption]| {
            let mut request = client.new_request(operation.clone(), params.clone());
            request.apply_options(options);
            Ok(request)
        })
        .with_sleep_impl(self.config.sleep_impl().cloned())
    }

    /// A pager over the pages of `operation`, starting from `params`.
    ///
    /// Pages are only chained when `operation` carries a
    /// [`Paginator`](aws_http::operation::Paginator); otherwise the pager yields a single page.
    pub fn paginator(&self, operation: Operation, params: Document) -> Pager {
        let client = self.clone();
        Pager::new(move |options: &[RequestOption]| {
            let mut request = client.new_request(operation.clone(), params.clone());
            request.apply_options(options);
            Ok(request)
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("`{0}` is required to build a client")]
    MissingField(&'static str),
}

#[derive(Debug, Default)]
pub struct Builder {
    config: Option<Config>,
    metadata: Option<ServiceMetadata>,
    handlers: Option<Handlers>,
    retryer: Option<SharedRetryer>,
}

impl Builder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn metadata(mut self, metadata: ServiceMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Replaces the default handlers
    pub fn handlers(mut self, handlers: Handlers) -> Self {
        self.handlers = Some(handlers);
        self
    }

    /// Overrides the retryer from the configuration
    pub fn retryer(mut self, retryer: SharedRetryer) -> Self {
        self.retryer = Some(retryer);
        self
    }

    pub fn build(self) -> Result<Client, BuildError> {
        let metadata = self.metadata.ok_or(BuildError::MissingField("metadata"))?;
        let config = self.config.unwrap_or_else(|| Config::builder().build());
        let mut client = Client::new(config, metadata);
        if let Some(handlers) = self.handlers {
            client.handlers = handlers;
        }
        if let Some(retryer) = self.retryer {
            client.retryer = retryer;
        }
        Ok(client)
    }
}
