//! Graceful stop: Serving → Draining → Stopped, completed and abandoned calls

use futures::{SinkExt, StreamExt};
use notifier_client::{ClientBuilder, NotificationClient, RpcClient};
use notifier_core::{Error, UserRequest};
use notifier_server::{
    from_fn, NotificationService, RpcServer, ServerHandle, ServerState, CLOSE_GRACE,
};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// `fast` answers after 100 ms, `stuck` after 10 s
async fn start_server(drain_timeout: Duration) -> ServerHandle {
    RpcServer::builder()
        .bind_str("127.0.0.1:0")
        .unwrap()
        .drain_timeout(drain_timeout)
        .handler(
            "fast",
            from_fn(|_| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(json!("done"))
            }),
        )
        .handler(
            "stuck",
            from_fn(|_| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(json!("too late"))
            }),
        )
        .start()
        .await
        .unwrap()
}

fn client_for(handle: &ServerHandle) -> RpcClient {
    ClientBuilder::new(format!("ws://{}", handle.local_addr()))
        .call_timeout(Duration::from_secs(20))
        .build()
}

#[tokio::test]
async fn test_stop_idle_server() {
    let handle = start_server(Duration::from_secs(5)).await;
    let mut states = handle.watch_state();

    let start = Instant::now();
    let report = handle.stop().await;

    assert_eq!(report.completed, 0);
    assert_eq!(report.abandoned, 0);
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(*states.borrow_and_update(), ServerState::Stopped);
}

#[tokio::test]
async fn test_in_flight_call_completes_during_drain() {
    let handle = start_server(Duration::from_secs(2)).await;
    let client = client_for(&handle);
    client.connect().await.unwrap();

    let caller = client.clone();
    let call = tokio::spawn(async move { caller.call::<_, Value>("fast", ()).await });

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(handle.in_flight(), 1);

    let report = handle.stop().await;
    assert_eq!(report.completed, 1);
    assert_eq!(report.abandoned, 0);

    assert_eq!(call.await.unwrap().unwrap(), json!("done"));
}

#[tokio::test]
async fn test_call_abandoned_at_drain_deadline() {
    let handle = start_server(Duration::from_millis(200)).await;
    let client = client_for(&handle);
    client.connect().await.unwrap();

    let caller = client.clone();
    let call = tokio::spawn(async move { caller.call::<_, Value>("stuck", ()).await });
    tokio::time::sleep(Duration::from_millis(30)).await;

    let start = Instant::now();
    let report = handle.stop().await;
    let elapsed = start.elapsed();

    assert_eq!(report.completed, 0);
    assert_eq!(report.abandoned, 1);
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_secs(2), "drain took {:?}", elapsed);

    let result = call.await.unwrap();
    assert!(matches!(result, Err(Error::Cancelled(_))), "got {:?}", result);
}

#[tokio::test]
async fn test_mixed_drain_outcome() {
    let handle = start_server(Duration::from_millis(400)).await;
    let client = client_for(&handle);
    client.connect().await.unwrap();

    let fast = {
        let client = client.clone();
        tokio::spawn(async move { client.call::<_, Value>("fast", ()).await })
    };
    let stuck = {
        let client = client.clone();
        tokio::spawn(async move { client.call::<_, Value>("stuck", ()).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(handle.in_flight(), 2);

    let report = handle.stop().await;
    assert_eq!(report.completed, 1);
    assert_eq!(report.abandoned, 1);

    assert!(fast.await.unwrap().is_ok());
    assert!(matches!(stuck.await.unwrap(), Err(Error::Cancelled(_))));
}

#[tokio::test]
async fn test_concurrent_calls_on_one_channel_start_together() {
    let handle = start_server(Duration::from_millis(100)).await;
    let client = client_for(&handle);
    client.connect().await.unwrap();

    let first = {
        let client = client.clone();
        tokio::spawn(async move { client.call::<_, Value>("stuck", ()).await })
    };
    let second = {
        let client = client.clone();
        tokio::spawn(async move { client.call::<_, Value>("stuck", ()).await })
    };

    // Small frames on a shared socket are not held back by Nagle's algorithm
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(handle.in_flight(), 2);

    let report = handle.stop().await;
    assert_eq!(report.abandoned, 2);
    assert!(first.await.unwrap().is_err());
    assert!(second.await.unwrap().is_err());
}

#[tokio::test]
async fn test_stop_with_peer_stuck_before_handshake() {
    let handle = start_server(Duration::from_millis(200)).await;

    // TCP connected, WebSocket handshake never sent
    let _peer = TcpStream::connect(handle.local_addr()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let start = Instant::now();
    let report = tokio::time::timeout(Duration::from_secs(5), handle.stop())
        .await
        .expect("stop must not wait on an unfinished handshake");

    assert_eq!(report.completed, 0);
    assert_eq!(report.abandoned, 0);
    assert!(start.elapsed() < Duration::from_secs(1), "stop took {:?}", start.elapsed());
}

#[tokio::test]
async fn test_stop_with_peer_that_stops_reading() {
    let payload = "x".repeat(1 << 20);
    let handle = RpcServer::builder()
        .bind_str("127.0.0.1:0")
        .unwrap()
        .drain_timeout(Duration::from_millis(200))
        .handler(
            "bulk",
            from_fn(move |_| {
                let payload = payload.clone();
                async move { Ok(json!(payload)) }
            }),
        )
        .start()
        .await
        .unwrap();

    let (ws, _) = connect_async(format!("ws://{}", handle.local_addr()))
        .await
        .unwrap();
    // The read half is never polled, so the server's writes back up
    let (mut sink, _unread) = ws.split();
    for id in 1..=32 {
        let request = json!({"jsonrpc": "2.0", "method": "bulk", "id": id});
        sink.send(Message::Text(request.to_string())).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    let start = Instant::now();
    let stopped = tokio::time::timeout(Duration::from_secs(5), handle.stop()).await;
    let elapsed = start.elapsed();

    assert!(stopped.is_ok(), "stop did not return");
    assert!(elapsed < CLOSE_GRACE + Duration::from_secs(1), "stop took {:?}", elapsed);
}

#[tokio::test]
async fn test_state_passes_through_draining() {
    let handle = start_server(Duration::from_millis(300)).await;
    let mut states = handle.watch_state();
    assert_eq!(handle.state(), ServerState::Serving);

    let client = client_for(&handle);
    client.connect().await.unwrap();
    let caller = client.clone();
    let _call = tokio::spawn(async move { caller.call::<_, Value>("stuck", ()).await });
    tokio::time::sleep(Duration::from_millis(30)).await;

    let stopping = tokio::spawn(handle.stop());

    let reached_draining = tokio::time::timeout(
        Duration::from_secs(1),
        states.wait_for(|state| *state == ServerState::Draining),
    )
    .await
    .is_ok();
    assert!(reached_draining);

    stopping.await.unwrap();
    assert_eq!(*states.borrow(), ServerState::Stopped);
}

#[tokio::test]
async fn test_stopped_server_refuses_connections() {
    let handle = RpcServer::builder()
        .bind_str("127.0.0.1:0")
        .unwrap()
        .service(NotificationService::new())
        .start()
        .await
        .unwrap();
    let url = format!("ws://{}", handle.local_addr());

    handle.stop().await;

    let stub = NotificationClient::new(
        ClientBuilder::new(url)
            .connect_timeout(Duration::from_millis(500))
            .build(),
    );
    let result = stub.run(UserRequest::new("Ada")).await;
    assert!(matches!(result, Err(Error::Unavailable(_))), "got {:?}", result);
}

#[tokio::test]
async fn test_client_returns_to_idle_after_server_stops() {
    let handle = RpcServer::builder()
        .bind_str("127.0.0.1:0")
        .unwrap()
        .service(NotificationService::new())
        .start()
        .await
        .unwrap();

    let stub = NotificationClient::new(
        ClientBuilder::new(format!("ws://{}", handle.local_addr())).build(),
    );
    stub.run(UserRequest::new("Ada")).await.unwrap();

    handle.stop().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
        stub.client().state(),
        notifier_client::ChannelState::Idle
    );
}
