#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end tests over real TCP sockets

use packet_dispatch::config::NetworkConfig;
use packet_dispatch::core::codec::{Codec, PacketCodec};
use packet_dispatch::core::packet::Packet;
use packet_dispatch::error::DispatchError;
use packet_dispatch::handler::Registry;
use packet_dispatch::service::Server;
use packet_dispatch::transport::{Connection, TcpConnection};
use packet_dispatch::utils::metrics::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

fn echo_registry() -> Arc<Registry> {
    let registry = Arc::new(Registry::new());
    registry
        .register_fn(1, |p| Ok(Some(Packet::new(p.id(), p.kind(), p.data().to_vec()))))
        .unwrap();
    registry
}

async fn spawn_server(
    config: NetworkConfig,
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
) -> (String, mpsc::Sender<()>, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let (tx, rx) = mpsc::channel(1);

    let server = Server::new(config, registry).with_metrics(metrics);
    let handle = tokio::spawn(async move {
        server.serve(listener, rx).await.unwrap();
    });
    (addr, tx, handle)
}

async fn request(client: &TcpConnection, packet: &Packet) -> Packet {
    client.write(&PacketCodec.encode(packet).unwrap()).await.unwrap();
    let mut buf = vec![0u8; 1024];
    let n = client.read(&mut buf).await.unwrap();
    PacketCodec.decode(&buf[..n]).unwrap()
}

#[tokio::test]
async fn test_echo_round_trip() {
    let metrics = Arc::new(Metrics::new());
    let (addr, shutdown, handle) =
        spawn_server(NetworkConfig::default(), echo_registry(), metrics.clone()).await;

    let client = TcpConnection::connect(&addr).await.unwrap();
    let reply = request(&client, &Packet::new(1, 2, "ping")).await;
    assert_eq!(reply, Packet::new(1, 2, "ping"));

    let reply = request(&client, &Packet::new(1, 5, "again")).await;
    assert_eq!(reply.data(), b"again");

    client.close().await.unwrap();
    drop(client);
    shutdown.send(()).await.unwrap();
    handle.await.unwrap();

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.connections_total, 1);
    assert_eq!(snapshot.messages_sent, 2);
}

#[tokio::test]
async fn test_unknown_message_does_not_close_connection() {
    let metrics = Arc::new(Metrics::new());
    let (addr, shutdown, handle) =
        spawn_server(NetworkConfig::default(), echo_registry(), metrics.clone()).await;

    let client = TcpConnection::connect(&addr).await.unwrap();
    client
        .write(&PacketCodec.encode(&Packet::new(99, 0, "nobody")).unwrap())
        .await
        .unwrap();
    // Let the server consume the first message on its own before sending the next.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let reply = request(&client, &Packet::new(1, 0, "still here")).await;
    assert_eq!(reply.data(), b"still here");

    drop(client);
    shutdown.send(()).await.unwrap();
    handle.await.unwrap();
    assert_eq!(metrics.snapshot().unregistered_messages, 1);
}

#[tokio::test]
async fn test_connection_limit() {
    let config = NetworkConfig::default_with_overrides(|c| c.server.max_connections = 1);
    let metrics = Arc::new(Metrics::new());
    let (addr, shutdown, handle) = spawn_server(config, echo_registry(), metrics.clone()).await;

    let first = TcpConnection::connect(&addr).await.unwrap();
    let reply = request(&first, &Packet::new(1, 0, "one")).await;
    assert_eq!(reply.data(), b"one");

    let second = TcpConnection::connect(&addr).await.unwrap();
    let mut buf = [0u8; 16];
    // The server drops the refused stream, so the read sees end of stream.
    assert!(second.read(&mut buf).await.is_err());
    assert!(!second.alive());

    drop(first);
    drop(second);
    shutdown.send(()).await.unwrap();
    handle.await.unwrap();
    assert_eq!(metrics.snapshot().connections_rejected, 1);
}

#[tokio::test]
async fn test_bind_rejects_invalid_config() {
    let config = NetworkConfig::default_with_overrides(|c| c.server.address = "nope".into());
    let server = Server::new(config, echo_registry());
    assert!(server.bind().await.is_err());
}

#[tokio::test]
async fn test_serve_rejects_zero_read_len() {
    let config = NetworkConfig::default_with_overrides(|c| c.router.max_read_len = 0);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (_tx, rx) = mpsc::channel(1);

    let result = Server::new(config, echo_registry()).serve(listener, rx).await;
    assert!(matches!(result, Err(DispatchError::ConfigError(_))));
}
