/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use aws_client::test_connection::TestConnection;
use aws_client::{defaults, json, Client};
use aws_http::config::Config;
use aws_http::operation::{Operation, Paginator, ServiceMetadata};
use aws_http::options::{self, RequestOption};
use aws_types::Region;
use http::header::USER_AGENT;
use serde_json::{json, Value};
use smithy_async::rt::sleep::SharedAsyncSleep;
use smithy_async::test_util::InstantSleep;
use smithy_http::body::SdkBody;
use smithy_http::connector::ConnectorError;
use tokio_util::sync::CancellationToken;

fn response(status: u16, body: &str) -> Result<http::Response<SdkBody>, ConnectorError> {
    Ok(http::Response::builder()
        .status(status)
        .body(SdkBody::from(body))
        .unwrap())
}

fn page(bar: &str, token: Option<&str>) -> Result<http::Response<SdkBody>, ConnectorError> {
    let mut body = json!({ "Bar": bar });
    if let Some(token) = token {
        body["NextToken"] = json!(token);
    }
    response(200, &body.to_string())
}

fn client(conn: TestConnection) -> Client {
    let config = Config::builder()
        .region(Region::new("us-east-1"))
        .endpoint_url("https://mock.us-east-1.amazonaws.com")
        .connector(conn)
        .sleep_impl(SharedAsyncSleep::new(InstantSleep::new()))
        .build();
    let mut client = Client::new(config, ServiceMetadata::new("mock"));
    json::install(client.handlers_mut(), "Mock_20210101", "1.1");
    client
}

fn list_things() -> Operation {
    Operation::new("ListThings").with_paginator(Paginator::new("NextToken", "NextToken"))
}

fn bars(pages: &[Value]) -> Vec<&str> {
    pages.iter().filter_map(|page| page["Bar"].as_str()).collect()
}

/// Params of every request the connection received, decoded from the request bodies
fn sent_params(conn: &TestConnection) -> Vec<Value> {
    conn.requests()
        .iter()
        .map(|request| serde_json::from_slice(request.actual.body().bytes().unwrap()).unwrap())
        .collect()
}

#[tokio::test]
async fn empty_token_ends_paging() {
    let conn = TestConnection::from_results(vec![
        page("1", Some("token")),
        page("2", Some("token")),
        page("3", Some("")),
        page("4", Some("token")),
    ]);
    let pages = client(conn.clone())
        .paginator(list_things(), json!({ "Foo": "foo" }))
        .try_collect()
        .await
        .expect("every page succeeds");

    assert_eq!(vec!["1", "2", "3"], bars(&pages));
    assert_eq!(1, conn.remaining());
    assert_eq!(
        vec![
            json!({ "Foo": "foo" }),
            json!({ "Foo": "foo", "NextToken": "token" }),
            json!({ "Foo": "foo", "NextToken": "token" }),
        ],
        sent_params(&conn)
    );
}

#[tokio::test]
async fn missing_token_ends_paging() {
    let conn = TestConnection::from_results(vec![
        page("1", Some("token")),
        page("2", Some("token")),
        page("3", None),
        page("4", Some("token")),
    ]);
    let mut pager = client(conn.clone()).paginator(list_things(), json!({ "Foo": "foo" }));
    let mut results = Vec::new();
    while let Some(page) = pager.next_page().await {
        results.push(page.expect("page succeeds"));
    }
    assert_eq!(vec!["1", "2", "3"], bars(&results));
    assert!(!pager.has_next_page());
    assert!(pager.next_page().await.is_none());
    assert_eq!(3, conn.requests().len());
}

#[tokio::test]
async fn null_input_still_paginates() {
    let conn = TestConnection::from_results(vec![
        page("1", Some("a")),
        page("2", Some("b")),
        page("3", None),
    ]);
    let pages = client(conn.clone())
        .paginator(list_things(), Value::Null)
        .try_collect()
        .await
        .expect("every page succeeds");
    assert_eq!(vec!["1", "2", "3"], bars(&pages));
    assert_eq!(
        vec![
            json!({}),
            json!({ "NextToken": "a" }),
            json!({ "NextToken": "b" }),
        ],
        sent_params(&conn)
    );
}

#[tokio::test]
async fn truncation_token_ends_paging() {
    let conn = TestConnection::from_results(vec![
        response(200, r#"{"Bar": "1", "NextToken": "token", "IsTruncated": true}"#),
        response(200, r#"{"Bar": "2", "NextToken": "token", "IsTruncated": true}"#),
        response(200, r#"{"Bar": "3", "NextToken": "", "IsTruncated": false}"#),
        response(200, r#"{"Bar": "4", "NextToken": "", "IsTruncated": true}"#),
    ]);
    let operation = Operation::new("ListThings").with_paginator(
        Paginator::new("NextToken", "NextToken").with_truncation_token("IsTruncated"),
    );
    let pages = client(conn.clone())
        .paginator(operation, json!({ "Foo": "foo" }))
        .try_collect()
        .await
        .expect("every page succeeds");
    assert_eq!(vec!["1", "2", "3"], bars(&pages));
    assert_eq!(1, conn.remaining());
}

#[tokio::test]
async fn truncation_wins_over_a_present_token() {
    // the last page still carries a token but reports it is not truncated
    let conn = TestConnection::from_results(vec![
        response(200, r#"{"Bar": "1", "NextToken": "a", "IsTruncated": true}"#),
        response(200, r#"{"Bar": "2", "NextToken": "b", "IsTruncated": false}"#),
        response(200, r#"{"Bar": "3"}"#),
    ]);
    let operation = Operation::new("ListThings").with_paginator(
        Paginator::new("NextToken", "NextToken").with_truncation_token("IsTruncated"),
    );
    let pages = client(conn.clone())
        .paginator(operation, json!({}))
        .try_collect()
        .await
        .unwrap();
    assert_eq!(vec!["1", "2"], bars(&pages));
    assert_eq!(1, conn.remaining());
}

#[tokio::test]
async fn repeated_tokens_end_paging_when_asked() {
    let conn = TestConnection::from_results(vec![
        page("1", Some("a")),
        page("2", Some("b")),
        page("3", Some("b")),
        page("4", Some("b")),
    ]);
    let pages = client(conn.clone())
        .paginator(list_things(), json!({}))
        .with_end_page_on_same_token(true)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(vec!["1", "2", "3"], bars(&pages));
    assert_eq!(1, conn.remaining());
}

#[tokio::test]
async fn page_size_sets_the_limit_token() {
    let conn = TestConnection::from_results(vec![page("1", Some("a")), page("2", None)]);
    let operation = Operation::new("ListThings")
        .with_paginator(Paginator::new("NextToken", "NextToken").with_limit_token("MaxResults"));
    client(conn.clone())
        .paginator(operation, json!({}))
        .with_page_size(25)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(
        vec![
            json!({ "MaxResults": 25 }),
            json!({ "MaxResults": 25, "NextToken": "a" }),
        ],
        sent_params(&conn)
    );
}

#[tokio::test]
async fn unpaginated_operations_yield_one_page() {
    let conn = TestConnection::from_results(vec![page("1", Some("a")), page("2", None)]);
    let pages = client(conn.clone())
        .paginator(Operation::new("GetThing"), json!({}))
        .try_collect()
        .await
        .unwrap();
    assert_eq!(vec!["1"], bars(&pages));
    assert_eq!(1, conn.requests().len());
}

#[tokio::test]
async fn errors_end_paging() {
    let conn = TestConnection::from_results(vec![
        page("1", Some("a")),
        response(
            400,
            r#"{"__type": "ValidationException", "message": "bad token"}"#,
        ),
        page("3", None),
    ]);
    let mut pager = client(conn.clone()).paginator(list_things(), json!({}));
    assert!(pager.next_page().await.unwrap().is_ok());
    let err = pager.next_page().await.unwrap().expect_err("bad token");
    assert_eq!("ValidationException", err.code());
    assert!(!pager.has_next_page());
    assert!(pager.next_page().await.is_none());
    assert_eq!(2, conn.requests().len());
}

#[tokio::test]
async fn canceled_pagers_send_nothing() {
    let conn = TestConnection::from_results(vec![page("1", Some("a"))]);
    let token = CancellationToken::new();
    token.cancel();
    let mut pager = client(conn.clone())
        .paginator(list_things(), json!({ "Foo": "foo" }))
        .with_cancellation(token);
    let err = pager.next_page().await.unwrap().expect_err("canceled");
    assert!(err.is_canceled(), "{:?}", err);
    assert!(err.to_string().contains("canceled"), "{}", err);
    assert!(pager.next_page().await.is_none());
    assert!(conn.requests().is_empty());
}

#[tokio::test]
async fn request_options_apply_to_every_page() {
    let conn = TestConnection::from_results(vec![page("1", Some("a")), page("2", None)]);
    let options: Vec<RequestOption> = vec![options::with_handlers(|handlers| {
        handlers
            .build
            .push_back(defaults::add_to_user_agent_free_form_handler("pager-test"));
    })];
    client(conn.clone())
        .paginator(list_things(), json!({}))
        .with_request_options(options)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(2, conn.requests().len());
    for request in conn.requests().iter() {
        let user_agent = request.actual.headers()[USER_AGENT].to_str().unwrap();
        assert!(user_agent.contains("pager-test"), "{}", user_agent);
    }
}
