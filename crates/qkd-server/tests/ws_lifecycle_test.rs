//! WebSocket observer lifecycle tests.
//!
//! These tests verify, over real sockets:
//! - Connecting registers an observer
//! - Text from any connection starts a run every connection sees
//! - A dropped connection is unregistered and `/ws` keeps serving
//!
//! The hub runs on `SystemEnv` with a short stage delay.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use qkd_proto::{StageMessage, StageStatus};
use qkd_server::{
    AppState, ChannelObserver, HubConfig, MemoryStorage, Server, ServerRuntimeConfig, SessionHub,
    SystemEnv, router,
};
use tokio::{net::TcpListener, time::timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
type Hub = SessionHub<SystemEnv, ChannelObserver>;

const START: &str = r#"{"action":"START_KEY_GEN","hacker":false}"#;
const START_ATTACK: &str = r#"{"action":"START_KEY_GEN","hacker":true}"#;
const WAIT: Duration = Duration::from_secs(5);

fn fast_config() -> HubConfig {
    HubConfig { stage_delay: Duration::from_millis(20), ..HubConfig::default() }
}

/// Serve the router on an ephemeral port, keeping a handle on the hub.
async fn serve_router() -> (SocketAddr, Arc<Hub>) {
    let hub = Arc::new(SessionHub::new(SystemEnv::new(), fast_config()));
    let app = router(AppState::new(Arc::clone(&hub), MemoryStorage::new()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, hub)
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    client
}

async fn send(client: &mut Client, text: &str) {
    client.send(Message::Text(text.into())).await.unwrap();
}

/// Next stage message, skipping control frames.
async fn next_stage(client: &mut Client) -> StageMessage {
    loop {
        let frame = timeout(WAIT, client.next())
            .await
            .expect("timed out waiting for a stage")
            .expect("connection closed")
            .unwrap();

        if let Message::Text(text) = frame {
            return StageMessage::from_json(&text).unwrap();
        }
    }
}

/// Oracle: one run's worth of stages, returning the complete message
async fn verify_single_run(client: &mut Client, context: &str) -> StageMessage {
    let initializing = next_stage(client).await;
    assert_eq!(initializing.status(), StageStatus::Initializing, "{context}");

    let complete = next_stage(client).await;
    assert_eq!(complete.status(), StageStatus::Complete, "{context}");
    complete
}

/// Oracle: registry reaches `expected` observers
async fn wait_for_observers(hub: &Hub, expected: usize) {
    let reached = timeout(WAIT, async {
        while hub.observer_count().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    assert!(reached.is_ok(), "expected {expected} observers, have {}", hub.observer_count().await);
}

#[tokio::test]
async fn connect_registers_and_drop_unregisters() {
    let (addr, hub) = serve_router().await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_observers(&hub, 2).await;

    send(&mut a, START_ATTACK).await;

    let complete_a = verify_single_run(&mut a, "client a, first run").await;
    let complete_b = verify_single_run(&mut b, "client b, first run").await;
    assert_eq!(complete_a, complete_b, "shared session: both see the same key");

    drop(b);
    wait_for_observers(&hub, 1).await;

    send(&mut a, START).await;
    verify_single_run(&mut a, "client a, after b left").await;

    // Endpoint still accepts and the newcomer's run reaches both
    let mut c = connect(addr).await;
    wait_for_observers(&hub, 2).await;
    send(&mut c, START).await;

    let complete_c = verify_single_run(&mut c, "client c").await;
    let complete_a = verify_single_run(&mut a, "client a, third run").await;
    assert_eq!(complete_a, complete_c);
}

#[tokio::test]
async fn malformed_text_keeps_connection_open() {
    let (addr, hub) = serve_router().await;
    let mut a = connect(addr).await;
    wait_for_observers(&hub, 1).await;

    send(&mut a, "not json").await;
    send(&mut a, r#"{"action":"PING"}"#).await;
    send(&mut a, START).await;

    let initializing = next_stage(&mut a).await;
    assert_eq!(initializing, StageMessage::initializing(false));
    assert_eq!(next_stage(&mut a).await.status(), StageStatus::Complete);
    assert_eq!(hub.observer_count().await, 1);
}

#[tokio::test]
async fn bound_server_serves_observers_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let config = ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".to_string(),
        upload_dir: tmp.path().join("uploads"),
        hub: fast_config(),
        ..ServerRuntimeConfig::default()
    };
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        server.run().await.unwrap();
    });

    // A connection is registered before its own text is read, so each run
    // below reaches everyone connected before it was requested
    let mut a = connect(addr).await;
    send(&mut a, START).await;
    verify_single_run(&mut a, "client a alone").await;

    let mut b = connect(addr).await;
    send(&mut b, START_ATTACK).await;
    let complete_b = verify_single_run(&mut b, "client b").await;
    let complete_a = verify_single_run(&mut a, "client a, b's run").await;
    assert_eq!(complete_a, complete_b);

    drop(b);
    send(&mut a, START).await;
    verify_single_run(&mut a, "client a after b left").await;

    let mut c = connect(addr).await;
    send(&mut c, START).await;
    verify_single_run(&mut c, "client c").await;
}
