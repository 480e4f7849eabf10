#![no_main]

use chat_protocol::core::codec::PacketCodec;
use chat_protocol::core::packet::Packet;
use chat_protocol::protocol::reassembler::FrameAssembler;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Anything that decodes must re-encode to a frame that decodes the same.
    if let Ok(packet) = Packet::from_bytes(data) {
        if let Ok(bytes) = packet.to_bytes() {
            assert_eq!(Packet::from_bytes(&bytes).ok(), Some(packet));
        }
    }

    // Uneven chunking must never panic or buffer past the input.
    let mut assembler = FrameAssembler::new(PacketCodec::default());
    let split = data.first().map(|b| *b as usize + 1).unwrap_or(1);
    for chunk in data.chunks(split) {
        let _ = assembler.push(chunk);
    }
    assert!(assembler.buffered() <= data.len());
});
