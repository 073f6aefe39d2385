//! # Error Types
//!
//! Error handling for the dispatch core.
//!
//! Every failure of the read-decode-dispatch cycle and of the write path is
//! reported as a [`DispatchError`] variant. Nothing at this layer retries or
//! reconnects; the caller decides whether to run another cycle, close the
//! connection or propagate the error.
//!
//! ## Error Categories
//! - **Connection Errors**: missing or dead connection, read and write failures
//! - **Codec Errors**: encode/decode failures, including oversized bodies
//! - **Routing Errors**: packets whose ID has no registered handler
//! - **Handler Errors**: failures reported by application handlers
//! - **Configuration Errors**: invalid settings, builder validation
//!
//! ## Example Usage
//! ```rust
//! use packet_dispatch::error::{DispatchError, Result};
//! use tracing::error;
//!
//! fn check_route(id: u32) -> Result<()> {
//!     Err(DispatchError::UnregisteredMessage { kind: 0, id })
//! }
//!
//! if let Err(e) = check_route(7) {
//!     error!(error = %e, "Routing failed");
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Registry lock errors
    pub const ERR_REGISTRY_WRITE_LOCK: &str = "Failed to acquire write lock on registry";
    pub const ERR_REGISTRY_READ_LOCK: &str = "Failed to acquire read lock on registry";

    /// Codec errors
    pub const ERR_TRUNCATED_HEADER: &str = "Buffer shorter than packet header";
    pub const ERR_TRUNCATED_BODY: &str = "Buffer shorter than declared body length";
    pub const ERR_TRAILING_BYTES: &str = "Buffer longer than declared body length";
    pub const ERR_BODY_LEN_MISMATCH: &str = "Declared body length does not match data length";
    pub const ERR_OVERSIZED_BODY: &str = "Body length exceeds maximum";

    /// Connection errors
    pub const ERR_SHORT_WRITE: &str = "Connection accepted fewer bytes than encoded";
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed by peer";
    pub const ERR_READ_TIMEOUT: &str = "Read deadline elapsed";

    /// Builder errors
    pub const ERR_MISSING_CONNECTION: &str = "Router handler has no connection";
    pub const ERR_ZERO_READ_LEN: &str = "Maximum read length must be greater than 0";
}

/// DispatchError is the primary error type for all dispatch operations
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Connection not alive")]
    ConnectionNotAlive,

    #[error("Read error: {0}")]
    Read(#[source] io::Error),

    #[error("Write error: {0}")]
    Write(#[source] io::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("No handler registered for message [type:{kind}, id:{id}]")]
    UnregisteredMessage { kind: u32, id: u32 },

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl DispatchError {
    /// Whether the error leaves the connection usable for another cycle.
    ///
    /// Decode, routing and handler failures concern a single message; the
    /// remaining kinds indicate the connection or configuration is broken.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DispatchError::Decode(_)
                | DispatchError::UnregisteredMessage { .. }
                | DispatchError::Handler(_)
                | DispatchError::Encode(_)
        )
    }
}

/// Type alias for Results using DispatchError
pub type Result<T> = std::result::Result<T, DispatchError>;
