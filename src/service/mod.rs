//! # Server
//!
//! TCP accept loop that runs one [`RouterHandler`](crate::handler::RouterHandler)
//! per connection on its own task, with a connection limit and graceful
//! shutdown.

pub mod server;

pub use server::{start_server, Server};
