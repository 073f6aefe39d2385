//! # Serde-based Codec
//!
//! [`BincodeCodec`] encodes the whole [`Packet`] with bincode instead of the
//! fixed binary header of [`PacketCodec`](crate::core::codec::PacketCodec).
//! Useful when both peers are Rust services sharing this crate and a
//! self-describing length prefix per field is acceptable.
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use packet_dispatch::core::serialization::BincodeCodec;
//! use packet_dispatch::handler::RouterHandler;
//!
//! let router = RouterHandler::builder()
//!     .codec(Arc::new(BincodeCodec))
//!     .conn(conn)
//!     .build();
//! ```

use crate::core::codec::Codec;
use crate::core::packet::{Packet, MAX_BODY_LEN};
use crate::error::constants::{ERR_BODY_LEN_MISMATCH, ERR_OVERSIZED_BODY};
use crate::error::{DispatchError, Result};

/// Codec serializing packets with bincode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn encode(&self, packet: &Packet) -> Result<Vec<u8>> {
        if packet.data().len() > MAX_BODY_LEN {
            return Err(DispatchError::Encode(format!(
                "{ERR_OVERSIZED_BODY} ({} > {MAX_BODY_LEN})",
                packet.data().len()
            )));
        }
        if !packet.is_consistent() {
            return Err(DispatchError::Encode(ERR_BODY_LEN_MISMATCH.to_string()));
        }
        bincode::serialize(packet).map_err(|e| DispatchError::Encode(e.to_string()))
    }

    fn decode(&self, buf: &[u8]) -> Result<Packet> {
        let packet: Packet =
            bincode::deserialize(buf).map_err(|e| DispatchError::Decode(e.to_string()))?;
        if !packet.is_consistent() {
            return Err(DispatchError::Decode(ERR_BODY_LEN_MISMATCH.to_string()));
        }
        Ok(packet)
    }

    fn name(&self) -> &'static str {
        "bincode"
    }
}
