use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::error::constants::{ERR_CONNECTION_CLOSED, ERR_READ_TIMEOUT};
use crate::transport::Connection;

/// TCP connection backed by a split tokio `TcpStream`.
///
/// Reads and writes lock their own half, so a handler can respond while the
/// next read is pending on another task. Liveness is cleared on end of
/// stream, on any I/O error and on [`close`](TcpConnection::close).
#[derive(Debug)]
pub struct TcpConnection {
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    peer: SocketAddr,
    alive: AtomicBool,
    read_timeout: Option<Duration>,
}

impl TcpConnection {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            peer,
            alive: AtomicBool::new(true),
            read_timeout: None,
        })
    }

    /// Connect to a remote address.
    pub async fn connect(addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Self::new(stream)
    }

    /// Fail reads that take longer than `timeout` with `TimedOut`.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Shut down the write half and mark the connection dead.
    #[instrument(skip(self), fields(peer = %self.peer))]
    pub async fn close(&self) -> io::Result<()> {
        self.alive.store(false, Ordering::Release);
        let mut writer = self.writer.lock().await;
        writer.shutdown().await
    }

    fn mark_dead(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            debug!(peer = %self.peer, "Connection marked dead");
        }
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut reader = self.reader.lock().await;
        let result = match self.read_timeout {
            Some(limit) => match tokio::time::timeout(limit, reader.read(buf)).await {
                Ok(res) => res,
                Err(_) => return Err(io::Error::new(io::ErrorKind::TimedOut, ERR_READ_TIMEOUT)),
            },
            None => reader.read(buf).await,
        };

        match result {
            Ok(0) if !buf.is_empty() => {
                self.mark_dead();
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    ERR_CONNECTION_CLOSED,
                ))
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.mark_dead();
                Err(e)
            }
        }
    }

    async fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut writer = self.writer.lock().await;
        match writer.write_all(buf).await {
            Ok(()) => Ok(buf.len()),
            Err(e) => {
                self.mark_dead();
                Err(e)
            }
        }
    }

    fn alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn remote_host(&self) -> String {
        self.peer.ip().to_string()
    }

    fn remote_port(&self) -> u16 {
        self.peer.port()
    }
}
