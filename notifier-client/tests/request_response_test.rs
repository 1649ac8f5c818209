//! Call semantics against mock servers: results, timeouts, remote errors,
//! contract skew and concurrency.

mod common;

use chrono::Utc;
use common::{mock_error_response, mock_response, notification_reply, MockWsServer, Reply};
use notifier_client::{ClientBuilder, NotificationClient, RpcClient};
use notifier_core::{Error, UserRequest};
use serde_json::{json, Value};
use std::time::Duration;

fn client_for(mock: &MockWsServer, call_timeout: Duration) -> RpcClient {
    ClientBuilder::new(mock.url())
        .connect_timeout(Duration::from_secs(2))
        .call_timeout(call_timeout)
        .build()
}

#[tokio::test]
async fn test_run_returns_greeting() {
    let mock = MockWsServer::notification(Duration::ZERO).await;
    let stub = NotificationClient::new(client_for(&mock, Duration::from_secs(2)));

    let before = Utc::now();
    let response = stub.run(UserRequest::new("Ada")).await.unwrap();
    let after = Utc::now();

    assert_eq!(response.id, 1);
    assert_eq!(response.message, "Hello, Ada");

    let at = response.parsed_timestamp().unwrap();
    assert!(at >= before);
    assert!(at <= after);
}

#[tokio::test]
async fn test_identical_requests_are_independent() {
    let mock = MockWsServer::notification(Duration::ZERO).await;
    let stub = NotificationClient::new(client_for(&mock, Duration::from_secs(2)));

    let first = stub.run(UserRequest::new("Grace")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = stub.run(UserRequest::new("Grace")).await.unwrap();

    assert_eq!(first.message, second.message);
    assert_eq!(first.id, second.id);
    assert!(second.parsed_timestamp().unwrap() > first.parsed_timestamp().unwrap());
}

#[tokio::test]
async fn test_request_frame_shape() {
    let mut mock = MockWsServer::notification(Duration::ZERO).await;
    let stub = NotificationClient::new(client_for(&mock, Duration::from_secs(2)));

    stub.run(UserRequest::new("Ada")).await.unwrap();

    let frame: Value = serde_json::from_str(&mock.wait_for_message().await.unwrap()).unwrap();
    assert_eq!(frame["jsonrpc"], "2.0");
    assert_eq!(frame["method"], "NotificationService.run");
    assert_eq!(frame["params"], json!({"name": "Ada"}));
    assert!(frame["id"].is_u64());
}

#[tokio::test]
async fn test_unit_params_are_omitted() {
    let mut mock = MockWsServer::notification(Duration::ZERO).await;
    let client = client_for(&mock, Duration::from_secs(2));

    client.describe().await.unwrap();

    let frame: Value = serde_json::from_str(&mock.wait_for_message().await.unwrap()).unwrap();
    assert_eq!(frame["method"], "rpc.describe");
    assert!(frame.get("params").is_none());
}

#[tokio::test]
async fn test_timeout_then_success_on_same_channel() {
    let mock = MockWsServer::notification(Duration::from_millis(400)).await;
    let stub = NotificationClient::new(client_for(&mock, Duration::from_millis(150)));

    let result = stub.run(UserRequest::new("slow Ada")).await;
    assert!(matches!(result, Err(Error::Timeout)), "got {:?}", result);

    let response = stub.run(UserRequest::new("Ada")).await.unwrap();
    assert_eq!(response.message, "Hello, Ada");

    // The late response for the timed-out call arrives and is dropped
    tokio::time::sleep(Duration::from_millis(400)).await;
    let response = stub.run(UserRequest::new("Linus")).await.unwrap();
    assert_eq!(response.message, "Hello, Linus");

    assert_eq!(mock.connections(), 1);
    assert_eq!(stub.client().in_flight(), 0);
}

#[tokio::test]
async fn test_remote_errors() {
    let mock = MockWsServer::with_handler(|request| async move {
        let id = request["id"].clone();
        match request["method"].as_str() {
            Some("cancel") => Reply::Frame(mock_error_response(id, -32001, "Call cancelled")),
            Some("boom") => Reply::Frame(mock_error_response(id, -32603, "Internal error")),
            _ => Reply::Frame(mock_error_response(id, -32601, "Method not found")),
        }
    })
    .await;
    let client = client_for(&mock, Duration::from_secs(2));

    let cancelled: Result<Value, _> = client.call("cancel", ()).await;
    assert!(matches!(cancelled, Err(Error::Cancelled(_))));

    match client.call::<_, Value>("boom", ()).await {
        Err(Error::JsonRpc(data)) => assert_eq!(data.code, -32603),
        other => panic!("Expected remote error, got {:?}", other),
    }

    match client.call::<_, Value>("nope", ()).await {
        Err(Error::JsonRpc(data)) => assert_eq!(data.code, -32601),
        other => panic!("Expected method not found, got {:?}", other),
    }
}

#[tokio::test]
async fn test_result_not_matching_contract_is_invalid_response() {
    let mock = MockWsServer::with_handler(|request| async move {
        let id = request["id"].clone();
        Reply::Frame(mock_response(id, json!({"greeting": "hi"})))
    })
    .await;
    let stub = NotificationClient::new(client_for(&mock, Duration::from_secs(2)));

    let result = stub.run(UserRequest::new("Ada")).await;
    assert!(matches!(result, Err(Error::InvalidResponse(_))), "got {:?}", result);
}

#[tokio::test]
async fn test_malformed_envelope_is_invalid_response() {
    let mock = MockWsServer::with_handler(|request| async move {
        let id = request["id"].clone();
        Reply::Frame(json!({"jsonrpc": "2.0", "id": id}).to_string())
    })
    .await;
    let client = client_for(&mock, Duration::from_secs(2));

    let result: Result<Value, _> = client.call("anything", ()).await;
    assert!(matches!(result, Err(Error::InvalidResponse(_))), "got {:?}", result);
}

#[tokio::test]
async fn test_concurrent_calls_are_matched_by_id() {
    // Later requests are answered first
    let mock = MockWsServer::with_handler(|request| async move {
        let n = request["params"]["n"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis((10 - n) * 15)).await;
        Reply::Frame(mock_response(request["id"].clone(), json!(n)))
    })
    .await;
    let client = client_for(&mock, Duration::from_secs(5));

    let calls = (0..10u64).map(|n| {
        let client = client.clone();
        async move { client.call::<_, u64>("echo", json!({"n": n})).await }
    });
    let results = futures::future::join_all(calls).await;

    for (n, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), n as u64);
    }
    assert_eq!(mock.connections(), 1);
}

#[tokio::test]
async fn test_dropped_call_releases_caller() {
    let mock = MockWsServer::notification(Duration::from_millis(300)).await;
    let stub = NotificationClient::new(client_for(&mock, Duration::from_secs(5)));

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), stub.run(UserRequest::new("slow Ada")))
            .await;
    assert!(abandoned.is_err());
    assert_eq!(stub.client().in_flight(), 0);

    let response = stub.run(UserRequest::new("Ada")).await.unwrap();
    assert_eq!(response.message, "Hello, Ada");

    // The abandoned call's late response finds nobody waiting
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(stub.run(UserRequest::new("Bob")).await.is_ok());
}

#[tokio::test]
async fn test_missing_name_is_rejected_by_server() {
    let mock = MockWsServer::with_handler(|request| async move {
        notification_reply(request, Duration::ZERO).await
    })
    .await;
    let client = client_for(&mock, Duration::from_secs(2));

    match client
        .call::<_, Value>("NotificationService.run", json!({}))
        .await
    {
        Err(Error::JsonRpc(data)) => assert_eq!(data.code, -32602),
        other => panic!("Expected invalid params, got {:?}", other),
    }
}
