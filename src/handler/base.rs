use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::{debug, error};

use crate::core::codec::{default_codec, Codec};
use crate::core::packet::Packet;
use crate::error::constants::ERR_SHORT_WRITE;
use crate::error::{DispatchError, Result};
use crate::transport::Connection;
use crate::utils::metrics::{global_metrics, Metrics};

/// A codec and the connection it writes to.
///
/// The codec is always present: handlers built without one get the default
/// codec at construction. The connection may be absent until bound.
#[derive(Clone)]
pub struct BaseHandler {
    codec: Arc<dyn Codec>,
    conn: Option<Arc<dyn Connection>>,
    metrics: Arc<Metrics>,
}

impl BaseHandler {
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self {
            codec,
            conn: None,
            metrics: global_metrics(),
        }
    }

    /// A handler already bound to `conn`.
    pub fn bound(conn: Arc<dyn Connection>, codec: Arc<dyn Codec>) -> Self {
        Self {
            codec,
            conn: Some(conn),
            metrics: global_metrics(),
        }
    }

    pub(crate) fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Replace the connection, or clear it with `None`.
    pub fn set_conn(&mut self, conn: Option<Arc<dyn Connection>>) {
        self.conn = conn;
    }

    pub fn bind_conn(&mut self, conn: Arc<dyn Connection>) {
        self.conn = Some(conn);
    }

    pub fn set_codec(&mut self, codec: Arc<dyn Codec>) {
        self.codec = codec;
    }

    pub fn conn(&self) -> Option<&Arc<dyn Connection>> {
        self.conn.as_ref()
    }

    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    pub(crate) fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Encode `packet` and write it to the bound connection.
    ///
    /// Nothing is written when encoding fails.
    pub async fn write(&self, packet: &Packet) -> Result<()> {
        let buf = self.codec.encode(packet)?;

        let conn = self.conn.as_ref().ok_or(DispatchError::ConnectionNotAlive)?;
        match conn.write(&buf).await {
            Ok(n) if n == buf.len() => {
                self.metrics.message_sent(n as u64);
                debug!(
                    peer = %conn.remote_addr(),
                    id = packet.id(),
                    kind = packet.kind(),
                    bytes = n,
                    "Sent packet"
                );
                Ok(())
            }
            Ok(n) => {
                self.metrics.write_error();
                error!(peer = %conn.remote_addr(), written = n, expected = buf.len(), "Short write");
                Err(DispatchError::Write(io::Error::new(
                    io::ErrorKind::WriteZero,
                    ERR_SHORT_WRITE,
                )))
            }
            Err(e) => {
                self.metrics.write_error();
                error!(peer = %conn.remote_addr(), error = %e, "Write failed");
                Err(DispatchError::Write(e))
            }
        }
    }
}

impl Default for BaseHandler {
    fn default() -> Self {
        Self::new(default_codec())
    }
}

impl fmt::Debug for BaseHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseHandler")
            .field("codec", &self.codec.name())
            .field("conn", &self.conn.as_ref().map(|c| c.remote_addr()))
            .finish()
    }
}
