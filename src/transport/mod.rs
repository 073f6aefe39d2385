//! # Transport Layer
//!
//! The [`Connection`] contract the dispatch core reads from and writes to,
//! plus two implementations:
//!
//! - **TCP** ([`tcp::TcpConnection`]): tokio `TcpStream` with optional read deadline
//! - **Memory** ([`memory::MemoryConnection`]): scripted in-process connection
//!
//! Connections are created and destroyed by the transport owner. Handlers
//! keep a shared `Arc<dyn Connection>` handle and never close it.

use std::io;

use async_trait::async_trait;

pub mod memory;
pub mod tcp;

pub use memory::MemoryConnection;
pub use tcp::TcpConnection;

/// A live bidirectional byte stream.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Perform one read, filling at most `buf.len()` bytes.
    ///
    /// Returns the number of bytes read. End of stream is reported as an
    /// `UnexpectedEof` error, never as `Ok(0)` for a non-empty buffer.
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write the whole buffer, returning the number of bytes written.
    async fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Current liveness, without side effects.
    fn alive(&self) -> bool;

    fn remote_host(&self) -> String;

    fn remote_port(&self) -> u16;

    /// `host:port` of the peer, for diagnostics.
    fn remote_addr(&self) -> String {
        format!("{}:{}", self.remote_host(), self.remote_port())
    }
}
