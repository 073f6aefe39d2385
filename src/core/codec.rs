//! Codec contract and the default binary packet codec.
//!
//! A [`Codec`] is a stateless pair of transforms between raw bytes and a
//! [`Packet`]. Handlers hold codecs as `Arc<dyn Codec>`, so one codec value may
//! serve any number of connections concurrently.
//!
//! [`PacketCodec`] is the default. Besides the one-shot [`Codec`] contract used
//! by the router cycle, it implements `tokio_util`'s `Encoder`/`Decoder` so the
//! same wire format can be framed over a byte stream by a layer above the core.

use std::fmt;
use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::packet::{Packet, HEADER_LEN, MAX_BODY_LEN};
use crate::error::constants::{
    ERR_BODY_LEN_MISMATCH, ERR_OVERSIZED_BODY, ERR_TRAILING_BYTES, ERR_TRUNCATED_BODY,
    ERR_TRUNCATED_HEADER,
};
use crate::error::{DispatchError, Result};

/// Stateless bidirectional transform between bytes and packets.
pub trait Codec: fmt::Debug + Send + Sync + 'static {
    /// Serialize a packet. Fails with [`DispatchError::Encode`] when the packet
    /// cannot be represented.
    fn encode(&self, packet: &Packet) -> Result<Vec<u8>>;

    /// Parse exactly one packet from `buf`. Fails with
    /// [`DispatchError::Decode`] when the buffer is truncated or malformed.
    fn decode(&self, buf: &[u8]) -> Result<Packet>;

    /// Short name for diagnostics.
    fn name(&self) -> &'static str;
}

/// The codec used when none is configured.
pub fn default_codec() -> Arc<dyn Codec> {
    Arc::new(PacketCodec)
}

/// Default codec: `[id u32][type u32][body_len u32][data]`, big-endian.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PacketCodec;

impl PacketCodec {
    fn check_encodable(packet: &Packet) -> Result<()> {
        if packet.data().len() > MAX_BODY_LEN {
            return Err(DispatchError::Encode(format!(
                "{ERR_OVERSIZED_BODY} ({} > {MAX_BODY_LEN})",
                packet.data().len()
            )));
        }
        if !packet.is_consistent() {
            return Err(DispatchError::Encode(format!(
                "{ERR_BODY_LEN_MISMATCH} (declared {}, actual {})",
                packet.body_len(),
                packet.data().len()
            )));
        }
        Ok(())
    }

    fn put_frame<B: BufMut>(packet: &Packet, dst: &mut B) {
        dst.put_u32(packet.id());
        dst.put_u32(packet.kind());
        dst.put_u32(packet.body_len());
        dst.put_slice(packet.data());
    }

    /// Read the header fields; `buf` must hold at least `HEADER_LEN` bytes.
    fn parse_header(mut buf: &[u8]) -> (u32, u32, usize) {
        let id = buf.get_u32();
        let kind = buf.get_u32();
        let body_len = buf.get_u32() as usize;
        (id, kind, body_len)
    }
}

impl Codec for PacketCodec {
    fn encode(&self, packet: &Packet) -> Result<Vec<u8>> {
        Self::check_encodable(packet)?;
        let mut buf = Vec::with_capacity(HEADER_LEN + packet.data().len());
        Self::put_frame(packet, &mut buf);
        Ok(buf)
    }

    fn decode(&self, buf: &[u8]) -> Result<Packet> {
        if buf.len() < HEADER_LEN {
            return Err(DispatchError::Decode(format!(
                "{ERR_TRUNCATED_HEADER} (need {HEADER_LEN}, got {})",
                buf.len()
            )));
        }

        let (id, kind, body_len) = Self::parse_header(&buf[..HEADER_LEN]);
        if body_len > MAX_BODY_LEN {
            return Err(DispatchError::Decode(format!(
                "{ERR_OVERSIZED_BODY} ({body_len} > {MAX_BODY_LEN})"
            )));
        }

        let body = &buf[HEADER_LEN..];
        if body.len() < body_len {
            return Err(DispatchError::Decode(format!(
                "{ERR_TRUNCATED_BODY} (declared {body_len}, got {})",
                body.len()
            )));
        }
        if body.len() > body_len {
            return Err(DispatchError::Decode(format!(
                "{ERR_TRAILING_BYTES} (declared {body_len}, got {})",
                body.len()
            )));
        }

        Ok(Packet::new(id, kind, body.to_vec()))
    }

    fn name(&self) -> &'static str {
        "packet"
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = DispatchError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < HEADER_LEN {
            src.reserve(HEADER_LEN - src.len());
            return Ok(None);
        }

        let (id, kind, body_len) = Self::parse_header(&src[..HEADER_LEN]);
        if body_len > MAX_BODY_LEN {
            return Err(DispatchError::Decode(format!(
                "{ERR_OVERSIZED_BODY} ({body_len} > {MAX_BODY_LEN})"
            )));
        }

        let frame_len = HEADER_LEN + body_len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let data = src.split_to(body_len).to_vec();
        Ok(Some(Packet::new(id, kind, data)))
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = DispatchError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<()> {
        Self::check_encodable(&packet)?;
        dst.reserve(HEADER_LEN + packet.data().len());
        Self::put_frame(&packet, dst);
        Ok(())
    }
}
