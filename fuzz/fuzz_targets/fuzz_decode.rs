#![no_main]

use libfuzzer_sys::fuzz_target;
use packet_dispatch::core::serialization::BincodeCodec;
use packet_dispatch::{Codec, PacketCodec};

fuzz_target!(|data: &[u8]| {
    // Decoding untrusted bytes must never panic, and whatever decodes must re-encode identically.
    if let Ok(packet) = PacketCodec.decode(data) {
        let bytes = PacketCodec.encode(&packet).expect("decoded packet re-encodes");
        assert_eq!(bytes, data);
    }
    let _ = BincodeCodec.decode(data);
});
