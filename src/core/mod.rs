//! # Core Packet Components
//!
//! Packet model and the codecs that turn raw bytes into packets and back.
//!
//! ## Components
//! - **Packet**: routing key, message type, declared body length and body
//! - **Codec**: stateless encode/decode contract plus the default binary codec
//! - **Serialization**: serde/bincode alternative codec
//!
//! ## Wire Format (default codec)
//! ```text
//! [ID(4)] [Type(4)] [BodyLen(4)] [Data(BodyLen)]
//! ```
//!
//! All header fields are big-endian. Body length is validated against
//! `MAX_BODY_LEN` before any allocation.

pub mod codec;
pub mod packet;
pub mod serialization;
