/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Handlers for the `awsJson` protocols: parameters are sent as a JSON document, the target
//! operation is named by the `X-Amz-Target` header, and both outputs and error responses are JSON.

use aws_http::error::{SdkError, ServiceError};
use aws_http::handlers::Handlers;
use aws_http::request::Request;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use smithy_http::handler::{handler_fn, NamedHandler};
use smithy_types::Document;

pub const BUILD: &str = "json.BuildHandler";
pub const UNMARSHAL: &str = "json.UnmarshalHandler";
pub const UNMARSHAL_ERROR: &str = "json.UnmarshalErrorHandler";

const X_AMZ_TARGET: &str = "x-amz-target";
const X_AMZN_ERRORTYPE: &str = "x-amzn-errortype";

/// Installs the JSON protocol handlers.
///
/// `target_prefix` is the service's target namespace, eg. `DynamoDB_20120810`, and
/// `json_version` the protocol version, eg. `1.0`.
pub fn install(handlers: &mut Handlers, target_prefix: &str, json_version: &str) {
    let build = build_handler(target_prefix, json_version);
    if !handlers.build.swap(BUILD, build.clone()) {
        handlers.build.push_back_handler(build);
    }
    if !handlers.unmarshal.swap(UNMARSHAL, unmarshal_handler()) {
        handlers.unmarshal.push_back_handler(unmarshal_handler());
    }
    if !handlers
        .unmarshal_error
        .swap(UNMARSHAL_ERROR, unmarshal_error_handler())
    {
        handlers
            .unmarshal_error
            .push_back_handler(unmarshal_error_handler());
    }
}

/// Serializes the request parameters and sets the protocol headers
pub fn build_handler(target_prefix: &str, json_version: &str) -> NamedHandler<Request> {
    let content_type = format!("application/x-amz-json-{}", json_version);
    let target_prefix = target_prefix.to_string();
    NamedHandler::new(
        BUILD,
        handler_fn(move |request: &mut Request| {
            let body = match &request.params {
                Document::Null => b"{}".to_vec(),
                params => match serde_json::to_vec(params) {
                    Ok(body) => body,
                    Err(err) => {
                        request.error = Some(SdkError::construction_failure(err));
                        return;
                    }
                },
            };
            let target = format!("{}.{}", target_prefix, request.operation.name());
            let target = match HeaderValue::from_str(&target) {
                Ok(target) => target,
                Err(err) => {
                    request.error = Some(SdkError::construction_failure(err));
                    return;
                }
            };
            let headers = request.http_request.headers_mut();
            headers.insert(HeaderName::from_static(X_AMZ_TARGET), target);
            if let Ok(content_type) = HeaderValue::from_str(&content_type) {
                headers.insert(CONTENT_TYPE, content_type);
            }
            request.set_body(body);
        }),
    )
}

/// Decodes a successful response body into [`Request::output`]
pub fn unmarshal_handler() -> NamedHandler<Request> {
    NamedHandler::new(
        UNMARSHAL,
        handler_fn(|request: &mut Request| {
            let body = match request
                .http_response
                .as_ref()
                .and_then(|response| response.body().bytes())
            {
                Some(body) => body,
                None => {
                    request.error = Some(SdkError::serialization(
                        "response body was already consumed",
                        None,
                    ));
                    return;
                }
            };
            if body.iter().all(u8::is_ascii_whitespace) {
                request.output = Some(Document::Object(Default::default()));
                return;
            }
            match serde_json::from_slice::<Document>(body) {
                Ok(output) => request.output = Some(output),
                Err(err) => {
                    request.error = Some(SdkError::serialization(
                        "failed decoding JSON RPC response",
                        Some(err.into()),
                    ))
                }
            }
        }),
    )
}

/// Replaces the generic error recorded by `ValidateResponse` with the decoded service error
pub fn unmarshal_error_handler() -> NamedHandler<Request> {
    NamedHandler::new(
        UNMARSHAL_ERROR,
        handler_fn(|request: &mut Request| {
            let response = match &request.http_response {
                Some(response) => response,
                None => return,
            };
            let status = response.status().as_u16();
            let body = response.body().bytes().unwrap_or_default();
            let document = if body.iter().all(u8::is_ascii_whitespace) {
                Document::Null
            } else {
                match serde_json::from_slice::<Document>(body) {
                    Ok(document) => document,
                    Err(err) => {
                        request.error = Some(SdkError::serialization(
                            "failed decoding JSON RPC error response",
                            Some(err.into()),
                        ));
                        return;
                    }
                }
            };
            let header_code = response
                .headers()
                .get(X_AMZN_ERRORTYPE)
                .and_then(|value| value.to_str().ok());
            let code = header_code
                .or_else(|| field(&document, &["__type", "code", "Code"]))
                .map(sanitize_error_code);
            let code = match code {
                Some(code) if !code.is_empty() => code.to_string(),
                _ => return,
            };
            let mut error = ServiceError::new(status, code);
            if let Some(message) = field(&document, &["message", "Message", "errorMessage"]) {
                error = error.with_message(message);
            }
            if let Some(request_id) = &request.request_id {
                error = error.with_request_id(request_id.clone());
            }
            request.error = Some(SdkError::service(error));
        }),
    )
}

fn field<'a>(document: &'a Document, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| document.get(*name).and_then(Document::as_str))
}

/// Strips namespaces (`aws.protocoltests#FooError`) and trailing metadata (`FooError:http://...`)
fn sanitize_error_code(code: &str) -> &str {
    let code = code.split(':').next().unwrap_or(code);
    code.rsplit('#').next().unwrap_or(code)
}

#[cfg(test)]
mod test {
    use crate::json::sanitize_error_code;

    #[test]
    fn error_codes_are_sanitized() {
        assert_eq!("FooError", sanitize_error_code("FooError"));
        assert_eq!("FooError", sanitize_error_code("aws.protocoltests.restjson#FooError"));
        assert_eq!(
            "FooError",
            sanitize_error_code("FooError:http://internal.amazon.com/coral/com.amazon.coral.validate/")
        );
        assert_eq!(
            "FooError",
            sanitize_error_code("aws.protocoltests.restjson#FooError:http://internal.amazon.com/coral/com.amazon.coral.validate/")
        );
    }
}
