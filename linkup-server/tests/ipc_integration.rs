//! IPC integration tests - a real Unix socket server backed by the
//! in-memory network, driven through `IpcClient`.

use linkup_core::config::ReachabilityConfig;
use linkup_core::ipc::{LinkupRequest, LinkupResponse};
use linkup_core::{Decision, Network};
use linkup_server::server::{run_unix_server, IpcClient};
use std::time::Duration;
use tokio::sync::broadcast;

fn socket_path() -> String {
    std::env::temp_dir()
        .join(format!("linkup-test-{}.sock", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned()
}

async fn start_server() -> (String, broadcast::Sender<()>, tokio::task::JoinHandle<()>) {
    let path = socket_path();
    let network = Network::in_memory(ReachabilityConfig::default());
    let (tx, rx) = broadcast::channel(1);

    let server_path = path.clone();
    let handle = tokio::spawn(async move {
        if let Err(e) = run_unix_server(&server_path, network, rx).await {
            eprintln!("IPC server error: {}", e);
        }
    });

    for _ in 0..50 {
        if std::path::Path::new(&path).exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    (path, tx, handle)
}

// ===========================================================================
// TEST 1: ping over the socket
// ===========================================================================
#[tokio::test]
async fn test_ping() {
    let (path, shutdown, handle) = start_server().await;
    let mut client = IpcClient::connect(&path).await.unwrap();

    let resp = client.call(&LinkupRequest::Ping).await.unwrap();
    assert!(resp.is_ok());
    assert_eq!(resp.data.unwrap()["pong"], true);

    let _ = shutdown.send(());
    handle.await.unwrap();
    assert!(!std::path::Path::new(&path).exists(), "socket file removed on shutdown");
}

// ===========================================================================
// TEST 2: full connection workflow across several frames
// ===========================================================================
#[tokio::test]
async fn test_connection_workflow_over_socket() {
    let (path, shutdown, handle) = start_server().await;
    let mut client = IpcClient::connect(&path).await.unwrap();

    let resp = client
        .call(&LinkupRequest::RequestConnection {
            requester: "alice".into(),
            target: "bob".into(),
        })
        .await
        .unwrap();
    assert!(resp.is_ok(), "{:?}", resp.error);
    let edge_id: uuid::Uuid =
        serde_json::from_value(resp.data.unwrap()["edge_id"].clone()).unwrap();

    // Wrong actor is rejected with a code
    let resp = client
        .call(&LinkupRequest::RespondConnection {
            edge_id,
            actor: "alice".into(),
            decision: Decision::Accept,
        })
        .await
        .unwrap();
    assert_eq!(resp.code.as_deref(), Some("unauthorized"));

    let resp = client
        .call(&LinkupRequest::RespondConnection {
            edge_id,
            actor: "bob".into(),
            decision: Decision::Accept,
        })
        .await
        .unwrap();
    assert!(resp.is_ok());

    let resp = client
        .call(&LinkupRequest::ListConnections {
            member_id: "bob".into(),
        })
        .await
        .unwrap();
    let data = resp.data.unwrap();
    assert_eq!(data["count"], 1);
    assert_eq!(data["connections"][0], "alice");

    let _ = shutdown.send(());
    handle.await.unwrap();
}

// ===========================================================================
// TEST 3: malformed frame yields an error response, connection stays open
// ===========================================================================
#[tokio::test]
async fn test_malformed_frame() {
    use bytes::Bytes;
    use futures::{SinkExt, StreamExt};
    use tokio_util::codec::{Framed, LengthDelimitedCodec};

    let (path, shutdown, handle) = start_server().await;
    let stream = tokio::net::UnixStream::connect(&path).await.unwrap();
    let mut framed = Framed::new(
        stream,
        LengthDelimitedCodec::builder().little_endian().new_codec(),
    );

    framed.send(Bytes::from_static(b"\xc1garbage")).await.unwrap();
    let frame = framed.next().await.unwrap().unwrap();
    let resp: LinkupResponse = linkup_core::ipc::decode(&frame).unwrap();
    assert_eq!(resp.status, "error");
    assert!(resp.error.unwrap().contains("Deserialization error"));

    let ping = linkup_core::ipc::encode(&LinkupRequest::Ping).unwrap();
    framed.send(Bytes::from(ping)).await.unwrap();
    let frame = framed.next().await.unwrap().unwrap();
    let resp: LinkupResponse = linkup_core::ipc::decode(&frame).unwrap();
    assert!(resp.is_ok());

    let _ = shutdown.send(());
    handle.await.unwrap();
}
