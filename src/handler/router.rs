use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::{RouterConfig, MAX_READ_BUF_LEN};
use crate::core::codec::{default_codec, Codec};
use crate::core::packet::Packet;
use crate::error::constants::{ERR_MISSING_CONNECTION, ERR_ZERO_READ_LEN};
use crate::error::{DispatchError, Result};
use crate::handler::{BaseHandler, Registry};
use crate::transport::Connection;
use crate::utils::metrics::{global_metrics, Metrics, Timer};

/// Reads one message from its connection and routes it by packet ID.
pub struct RouterHandler {
    base: BaseHandler,
    registry: Arc<Registry>,
    max_read_len: usize,
}

impl RouterHandler {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Construct a router with every collaborator supplied up front.
    pub fn from_config(
        conn: Arc<dyn Connection>,
        codec: Arc<dyn Codec>,
        registry: Arc<Registry>,
        config: &RouterConfig,
    ) -> Result<Self> {
        RouterBuilder::new()
            .conn(conn)
            .codec(codec)
            .registry(registry)
            .max_read_len(config.max_read_len)
            .try_build()
    }

    pub fn base(&self) -> &BaseHandler {
        &self.base
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn max_read_len(&self) -> usize {
        self.max_read_len
    }

    pub fn set_conn(&mut self, conn: Option<Arc<dyn Connection>>) {
        self.base.set_conn(conn);
    }

    pub fn bind_conn(&mut self, conn: Arc<dyn Connection>) {
        self.base.bind_conn(conn);
    }

    pub fn set_codec(&mut self, codec: Arc<dyn Codec>) {
        self.base.set_codec(codec);
    }

    /// Write a packet on the router's own connection.
    pub async fn write(&self, packet: &Packet) -> Result<()> {
        self.base.write(packet).await
    }

    /// Run one read-decode-dispatch cycle.
    ///
    /// Performs exactly one read of at most `max_read_len` bytes. A message
    /// larger than that is truncated to what the read returned.
    pub async fn dispatch_once(&self) -> Result<()> {
        let conn = match self.base.conn() {
            Some(conn) if conn.alive() => Arc::clone(conn),
            _ => {
                error!(handler = ?self, "Connection not alive");
                return Err(DispatchError::ConnectionNotAlive);
            }
        };

        let metrics = self.base.metrics();
        let _timer = Timer::start("dispatch_cycle");
        metrics.cycle_started();

        let remote = conn.remote_addr();
        let mut buf = vec![0u8; self.max_read_len];
        let n = match conn.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                metrics.read_error();
                error!(peer = %remote, error = %e, "Read failed");
                return Err(DispatchError::Read(e));
            }
        };
        buf.truncate(n);
        metrics.message_received(n as u64);
        info!(peer = %remote, bytes = n, payload = %hex::encode(&buf), "Received message");

        let packet = self.base.codec().decode(&buf).map_err(|e| {
            metrics.decode_error();
            warn!(peer = %remote, error = %e, "Decode failed");
            e
        })?;
        debug!(
            peer = %remote,
            id = packet.id(),
            kind = packet.kind(),
            body_len = packet.body_len(),
            body = %packet.body_lossy(),
            "Received packet"
        );

        let Some(target) = self.registry.get(packet.id())? else {
            metrics.unregistered_message();
            warn!(peer = %remote, id = packet.id(), kind = packet.kind(), "No handler registered");
            return Err(DispatchError::UnregisteredMessage {
                kind: packet.kind(),
                id: packet.id(),
            });
        };

        let ctx = BaseHandler::bound(conn, Arc::clone(self.base.codec()))
            .with_metrics(Arc::clone(metrics));
        target.handle_msg(&ctx, packet).await.map_err(|e| {
            // Failed replies are already counted by the write path.
            if !matches!(e, DispatchError::Write(_)) {
                metrics.handler_error();
            }
            e
        })
    }

    /// Run cycles until the connection goes away.
    ///
    /// Per-message failures (decode, routing, handler) are logged and the loop
    /// continues. End of stream or a dead connection ends the loop with `Ok`;
    /// other read and write failures are returned. A zero `max_read_len` is
    /// rejected up front since no cycle could ever read a message.
    pub async fn run(&self) -> Result<()> {
        if self.base.conn().is_none() {
            return Err(DispatchError::ConnectionNotAlive);
        }
        if self.max_read_len == 0 {
            return Err(DispatchError::ConfigError(ERR_ZERO_READ_LEN.to_string()));
        }

        loop {
            match self.dispatch_once().await {
                Ok(()) => {}
                Err(DispatchError::ConnectionNotAlive) => return Ok(()),
                Err(DispatchError::Read(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!(handler = ?self, "Peer closed connection");
                    return Ok(());
                }
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "Dropped message");
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl fmt::Debug for RouterHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterHandler")
            .field("base", &self.base)
            .field("max_read_len", &self.max_read_len)
            .finish()
    }
}

/// Fluent assembly of a [`RouterHandler`].
///
/// Connection and codec are optional: [`build`](RouterBuilder::build) falls
/// back to the default codec and leaves a missing connection to be reported
/// by the first cycle. [`try_build`](RouterBuilder::try_build) rejects an
/// incomplete configuration instead.
pub struct RouterBuilder {
    codec: Option<Arc<dyn Codec>>,
    conn: Option<Arc<dyn Connection>>,
    registry: Option<Arc<Registry>>,
    metrics: Option<Arc<Metrics>>,
    max_read_len: usize,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            codec: None,
            conn: None,
            registry: None,
            metrics: None,
            max_read_len: MAX_READ_BUF_LEN,
        }
    }

    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn conn(mut self, conn: Arc<dyn Connection>) -> Self {
        self.conn = Some(conn);
        self
    }

    /// Routing table; defaults to [`Registry::global`].
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn max_read_len(mut self, len: usize) -> Self {
        self.max_read_len = len;
        self
    }

    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> RouterHandler {
        let mut base = BaseHandler::new(self.codec.unwrap_or_else(default_codec))
            .with_metrics(self.metrics.unwrap_or_else(global_metrics));
        base.set_conn(self.conn);

        RouterHandler {
            base,
            registry: self.registry.unwrap_or_else(Registry::global),
            max_read_len: self.max_read_len,
        }
    }

    pub fn try_build(self) -> Result<RouterHandler> {
        if self.conn.is_none() {
            return Err(DispatchError::ConfigError(ERR_MISSING_CONNECTION.to_string()));
        }
        if self.max_read_len == 0 {
            return Err(DispatchError::ConfigError(ERR_ZERO_READ_LEN.to_string()));
        }
        Ok(self.build())
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::PacketCodec;
    use crate::transport::MemoryConnection;

    fn frame(packet: &Packet) -> Vec<u8> {
        PacketCodec.encode(packet).unwrap()
    }

    #[test]
    fn test_build_without_anything() {
        let router = RouterHandler::builder().build();
        assert!(router.base().conn().is_none());
        assert_eq!(router.base().codec().name(), "packet");
        assert_eq!(router.max_read_len(), MAX_READ_BUF_LEN);
    }

    #[test]
    fn test_try_build_requires_connection() {
        let err = RouterHandler::builder().try_build().unwrap_err();
        assert!(matches!(err, DispatchError::ConfigError(_)));
    }

    #[test]
    fn test_from_config_applies_read_len() {
        let config = RouterConfig { max_read_len: 4096 };
        let router = RouterHandler::from_config(
            Arc::new(MemoryConnection::new("h", 1)),
            default_codec(),
            Arc::new(Registry::new()),
            &config,
        )
        .unwrap();
        assert_eq!(router.max_read_len(), 4096);
        assert!(router.base().conn().is_some());
    }

    #[test]
    fn test_try_build_rejects_zero_read_len() {
        let err = RouterHandler::builder()
            .conn(Arc::new(MemoryConnection::new("h", 1)))
            .max_read_len(0)
            .try_build()
            .unwrap_err();
        assert!(matches!(err, DispatchError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_read_is_bounded() {
        let conn = Arc::new(MemoryConnection::new("h", 1));
        let packet = Packet::new(5, 0, vec![b'x'; 64]);
        conn.push_inbound(frame(&packet));

        let registry = Arc::new(Registry::new());
        registry.register_fn(5, |_| Ok(None)).unwrap();

        let router = RouterHandler::builder()
            .conn(conn.clone())
            .registry(registry)
            .max_read_len(16)
            .metrics(Arc::new(Metrics::new()))
            .build();

        // Only 16 bytes arrive in the single read: the body is truncated.
        let err = router.dispatch_once().await.unwrap_err();
        assert!(matches!(err, DispatchError::Decode(_)));
        assert_eq!(conn.read_count(), 1);
    }

    #[tokio::test]
    async fn test_metrics_track_cycle_outcomes() {
        let conn = Arc::new(MemoryConnection::new("h", 1));
        conn.push_inbound(frame(&Packet::new(1, 0, "a")));
        conn.push_inbound(frame(&Packet::new(2, 0, "b")));
        conn.push_inbound(vec![0u8; 3]);

        let registry = Arc::new(Registry::new());
        registry.register_fn(1, |_| Ok(None)).unwrap();

        let metrics = Arc::new(Metrics::new());
        let router = RouterHandler::builder()
            .conn(conn)
            .registry(registry)
            .metrics(metrics.clone())
            .build();

        router.dispatch_once().await.unwrap();
        assert!(router.dispatch_once().await.is_err());
        assert!(router.dispatch_once().await.is_err());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cycles_total, 3);
        assert_eq!(snapshot.messages_received, 3);
        assert_eq!(snapshot.unregistered_messages, 1);
        assert_eq!(snapshot.decode_errors, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_eof_and_skips_bad_messages() {
        let conn = Arc::new(MemoryConnection::new("h", 1));
        conn.push_inbound(frame(&Packet::new(1, 0, "first")));
        conn.push_inbound(frame(&Packet::new(99, 0, "unknown")));
        conn.push_inbound(frame(&Packet::new(1, 0, "second")));

        let registry = Arc::new(Registry::new());
        registry
            .register_fn(1, |p| Ok(Some(Packet::new(p.id(), 1, p.data().to_vec()))))
            .unwrap();

        let router = RouterHandler::builder()
            .conn(conn.clone())
            .registry(registry)
            .metrics(Arc::new(Metrics::new()))
            .build();

        router.run().await.unwrap();

        let replies: Vec<Packet> = conn
            .written()
            .iter()
            .map(|b| PacketCodec.decode(b).unwrap())
            .collect();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].data(), b"first");
        assert_eq!(replies[1].data(), b"second");
    }

    #[tokio::test]
    async fn test_run_without_connection() {
        let router = RouterHandler::builder().build();
        assert!(matches!(
            router.run().await,
            Err(DispatchError::ConnectionNotAlive)
        ));
    }

    #[tokio::test]
    async fn test_run_returns_fatal_read_error() {
        let conn = Arc::new(MemoryConnection::new("h", 1));
        conn.fail_next_read(io::ErrorKind::ConnectionReset);

        let router = RouterHandler::builder()
            .conn(conn)
            .registry(Arc::new(Registry::new()))
            .metrics(Arc::new(Metrics::new()))
            .build();

        match router.run().await {
            Err(DispatchError::Read(e)) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_rejects_zero_read_len_without_reading() {
        let conn = Arc::new(MemoryConnection::new("h", 1));
        conn.push_inbound(frame(&Packet::new(1, 0, "queued")));

        let router = RouterHandler::builder()
            .conn(conn.clone())
            .registry(Arc::new(Registry::new()))
            .max_read_len(0)
            .metrics(Arc::new(Metrics::new()))
            .build();

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), router.run())
            .await
            .expect("run should return immediately");
        assert!(matches!(result, Err(DispatchError::ConfigError(_))));
        assert_eq!(conn.read_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_reply_counts_as_write_error_only() {
        let conn = Arc::new(MemoryConnection::new("h", 1));
        conn.push_inbound(frame(&Packet::new(1, 0, "ping")));
        conn.fail_writes(io::ErrorKind::BrokenPipe);

        let registry = Arc::new(Registry::new());
        registry
            .register_fn(1, |p| Ok(Some(Packet::new(p.id(), 1, "pong"))))
            .unwrap();

        let metrics = Arc::new(Metrics::new());
        let router = RouterHandler::builder()
            .conn(conn)
            .registry(registry)
            .metrics(metrics.clone())
            .build();

        let err = router.dispatch_once().await.unwrap_err();
        assert!(matches!(err, DispatchError::Write(_)));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.write_errors, 1);
        assert_eq!(snapshot.handler_errors, 0);
    }

    #[tokio::test]
    async fn test_handler_failure_counts_as_handler_error() {
        let conn = Arc::new(MemoryConnection::new("h", 1));
        conn.push_inbound(frame(&Packet::new(2, 0, "boom")));

        let registry = Arc::new(Registry::new());
        registry
            .register_fn(2, |_| Err(DispatchError::Handler("rejected".into())))
            .unwrap();

        let metrics = Arc::new(Metrics::new());
        let router = RouterHandler::builder()
            .conn(conn)
            .registry(registry)
            .metrics(metrics.clone())
            .build();

        assert!(router.dispatch_once().await.is_err());
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.handler_errors, 1);
        assert_eq!(snapshot.write_errors, 0);
    }
}
