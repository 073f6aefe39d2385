//! # packet-dispatch
//!
//! Message-dispatch core for small network servers: read raw bytes from a
//! connection, decode them into a [`Packet`] with a pluggable [`Codec`], and
//! route the packet to the handler registered for its ID.
//!
//! ## Modules
//! - [`core`]: packet model, codec contract, default and bincode codecs
//! - [`transport`]: connection contract, TCP and in-memory connections
//! - [`handler`]: base handler, router handler, builder, registry
//! - [`service`]: TCP server running one router per connection
//! - [`config`]: TOML/env configuration with validation
//! - [`utils`]: logging setup and metrics
//!
//! ## Example
//! ```ignore
//! use std::sync::Arc;
//! use packet_dispatch::{config::NetworkConfig, handler::Registry, Packet};
//!
//! #[tokio::main]
//! async fn main() -> packet_dispatch::Result<()> {
//!     let config = NetworkConfig::from_env()?;
//!     packet_dispatch::utils::logging::init_logging(&config.logging)?;
//!
//!     let registry = Arc::new(Registry::new());
//!     registry.register_fn(1, |pkt: &Packet| Ok(Some(pkt.clone())))?;
//!
//!     packet_dispatch::service::start_server(config, registry).await
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod handler;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::core::codec::{default_codec, Codec, PacketCodec};
pub use crate::core::packet::Packet;
pub use crate::error::{DispatchError, Result};
pub use crate::handler::{BaseHandler, MessageHandler, Registry, RouterBuilder, RouterHandler};
pub use crate::transport::Connection;
