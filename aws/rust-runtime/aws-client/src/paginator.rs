/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Iterating over the pages of a paginated operation.
//!
//! A [`Pager`] sends one request per page. Every request after the first carries the tokens the
//! previous page returned, as described by the operation's
//! [`Paginator`](aws_http::operation::Paginator). Paging ends when a page returns no tokens, or
//! when its truncation token is `false`.

use crate::waiter::values_at_path;
use aws_http::error::SdkError;
use aws_http::operation::Paginator;
use aws_http::options::RequestOption;
use aws_http::request::Request;
use serde_json::Map;
use smithy_types::Document;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, Instrument};

type NewRequest = Arc<dyn Fn(&[RequestOption]) -> Result<Request, SdkError> + Send + Sync>;

/// Tokens for the page following the one `output` belongs to.
///
/// Returns an empty list when there is no next page: the operation is not paginated, the
/// truncation token is missing or `false`, or no output token has a value. Output tokens that
/// are missing or empty strings are `null` in the returned list.
pub fn next_page_tokens(paginator: &Paginator, output: &Document) -> Vec<Document> {
    if let Some(truncation_token) = paginator.truncation_token() {
        match values_at_path(output, truncation_token).first() {
            None => return Vec::new(),
            Some(Document::Bool(false)) => return Vec::new(),
            Some(_) => {}
        }
    }
    let tokens: Vec<Document> = paginator
        .output_tokens()
        .map(|token| output_token(output, token))
        .collect();
    if tokens.iter().all(Document::is_null) {
        return Vec::new();
    }
    tokens
}

fn output_token(output: &Document, token: &str) -> Document {
    token
        .split("||")
        .filter_map(|alternative| values_at_path(output, alternative.trim()).first().copied())
        .find(|value| !matches!(value, Document::String(s) if s.is_empty()))
        .cloned()
        .unwrap_or(Document::Null)
}

/// Sets `value` at the dotted field `path` of `document`, creating objects along the way.
///
/// A `null` input document becomes an object. Setting `null` removes the field. Paths that run
/// into a value that is not an object are left untouched.
pub fn set_value_at_path(document: &mut Document, path: &str, value: Document) {
    if document.is_null() {
        *document = Document::Object(Map::new());
    }
    let mut fields = path.split('.').peekable();
    let mut current = document;
    while let Some(field) = fields.next() {
        let object = match current.as_object_mut() {
            Some(object) => object,
            None => return,
        };
        if fields.peek().is_none() {
            if value.is_null() {
                object.remove(field);
            } else {
                object.insert(field.to_string(), value);
            }
            return;
        }
        current = object
            .entry(field.to_string())
            .or_insert_with(|| Document::Object(Map::new()));
    }
}

/// Sends one request per page of a paginated operation
pub struct Pager {
    new_request: NewRequest,
    request_options: Vec<RequestOption>,
    cancellation: Option<CancellationToken>,
    page_size: Option<u64>,
    end_page_on_same_token: bool,
    started: bool,
    done: bool,
    tokens: Vec<Document>,
}

impl fmt::Debug for Pager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pager")
            .field("started", &self.started)
            .field("done", &self.done)
            .field("tokens", &self.tokens)
            .finish()
    }
}

impl Pager {
    /// Creates a pager that builds each page's request with `new_request`.
    ///
    /// `new_request` receives the pager's request options and is expected to apply them. The
    /// pager sets the page tokens on the request's params before sending it.
    pub fn new(
        new_request: impl Fn(&[RequestOption]) -> Result<Request, SdkError> + Send + Sync + 'static,
    ) -> Self {
        Pager {
            new_request: Arc::new(new_request),
            request_options: Vec::new(),
            cancellation: None,
            page_size: None,
            end_page_on_same_token: false,
            started: false,
            done: false,
            tokens: Vec::new(),
        }
    }

    /// Options applied to every page request
    pub fn with_request_options(
        mut self,
        options: impl IntoIterator<Item = RequestOption>,
    ) -> Self {
        self.request_options.extend(options);
        self
    }

    /// Cancels the in-flight page request, and ends paging, once `token` fires
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Sets the operation's limit token on every page request
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Ends paging when a page returns the same tokens it was requested with.
    ///
    /// Some services keep returning the last token on the final page.
    pub fn with_end_page_on_same_token(mut self, end: bool) -> Self {
        self.end_page_on_same_token = end;
        self
    }

    /// Whether another call to [`Pager::next_page`] may return a page
    pub fn has_next_page(&self) -> bool {
        !self.done && !(self.started && self.tokens.is_empty())
    }

    /// Sends the request for the next page and returns its output.
    ///
    /// Returns `None` once paging is over. After an error, paging is over as well.
    pub async fn next_page(&mut self) -> Option<Result<Document, SdkError>> {
        if !self.has_next_page() {
            return None;
        }
        let span = debug_span!("next_page", started = self.started);
        let result = self.send_page().instrument(span).await;
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }

    /// Sends every remaining page and returns their outputs in order
    pub async fn try_collect(mut self) -> Result<Vec<Document>, SdkError> {
        let mut pages = Vec::new();
        while let Some(page) = self.next_page().await {
            pages.push(page?);
        }
        Ok(pages)
    }

    async fn send_page(&mut self) -> Result<Document, SdkError> {
        let mut request = (self.new_request)(self.request_options.as_slice())?;
        if let Some(token) = &self.cancellation {
            request.set_cancellation(token.clone());
        }
        let paginator = request.operation.paginator().cloned();
        if let Some(paginator) = &paginator {
            if self.started {
                for (input, value) in paginator.input_tokens().zip(self.tokens.iter()) {
                    set_value_at_path(&mut request.params, input, value.clone());
                }
            }
            if let (Some(limit), Some(page_size)) = (paginator.limit_token(), self.page_size) {
                set_value_at_path(&mut request.params, limit, Document::from(page_size));
            }
        }

        request.send().await?;
        let output = request.output.take().unwrap_or(Document::Null);
        let next = match &paginator {
            Some(paginator) => next_page_tokens(paginator, &output),
            None => Vec::new(),
        };
        if self.end_page_on_same_token && self.started && next == self.tokens {
            debug!("page returned the tokens it was requested with");
            self.done = true;
        }
        debug!(last_page = next.is_empty(), "received page");
        self.tokens = next;
        self.started = true;
        Ok(output)
    }
}
