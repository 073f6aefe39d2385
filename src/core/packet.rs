//! Decoded message model.

use serde::{Deserialize, Serialize};

/// Size of the fixed packet header: id, type and body length, 4 bytes each.
pub const HEADER_LEN: usize = 12;

/// Largest body a packet may carry (16 MB).
pub const MAX_BODY_LEN: usize = 16 * 1024 * 1024;

/// A decoded message.
///
/// `id` is the routing key used to select a handler, `kind` is the message
/// category (diagnostic only at the dispatch layer). Packets built with
/// [`Packet::new`] always satisfy `body_len == data.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    id: u32,
    kind: u32,
    body_len: u32,
    data: Vec<u8>,
}

impl Packet {
    /// Build a packet whose declared length matches its body.
    ///
    /// Bodies longer than `u32::MAX` saturate the declared length; the codec
    /// rejects them on encode.
    pub fn new(id: u32, kind: u32, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let body_len = u32::try_from(data.len()).unwrap_or(u32::MAX);
        Self {
            id,
            kind,
            body_len,
            data,
        }
    }

    /// Build a packet from raw header fields without checking consistency.
    pub fn from_parts(id: u32, kind: u32, body_len: u32, data: Vec<u8>) -> Self {
        Self {
            id,
            kind,
            body_len,
            data,
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> u32 {
        self.kind
    }

    #[inline]
    pub fn body_len(&self) -> u32 {
        self.body_len
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether the declared length agrees with the body.
    pub fn is_consistent(&self) -> bool {
        self.body_len as usize == self.data.len()
    }

    /// Body rendered for logs, lossy for non-UTF-8 data.
    pub fn body_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}
