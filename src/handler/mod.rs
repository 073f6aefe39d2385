//! # Handler Hierarchy
//!
//! Read, decode and dispatch packets to application handlers.
//!
//! ## Components
//! - [`BaseHandler`]: a codec plus a bound connection, with the write path
//! - [`RouterHandler`]: runs one read-decode-dispatch cycle per call
//! - [`RouterBuilder`]: fluent assembly of a router handler
//! - [`Registry`]: routing key (packet ID) to [`MessageHandler`]
//!
//! Registered handlers are stateless. Each dispatch hands the handler a
//! fresh [`BaseHandler`] bound to the connection the packet arrived on, so one
//! handler can serve any number of connections at the same time.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use packet_dispatch::handler::{Registry, RouterHandler};
//! use packet_dispatch::core::packet::Packet;
//!
//! let registry = Arc::new(Registry::new());
//! registry.register_fn(1, |pkt: &Packet| {
//!     Ok(Some(Packet::new(pkt.id(), pkt.kind(), pkt.data().to_vec())))
//! })?;
//!
//! let router = RouterHandler::builder()
//!     .conn(conn)
//!     .registry(registry)
//!     .build();
//! router.dispatch_once().await?;
//! ```

mod base;
mod registry;
mod router;

pub use base::BaseHandler;
pub use registry::{FnHandler, MessageHandler, Registry};
pub use router::{RouterBuilder, RouterHandler};
