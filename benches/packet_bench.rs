use bytes::BytesMut;
use chat_protocol::core::codec::PacketCodec;
use chat_protocol::core::packet::{ChatList, Message, Packet};
use chat_protocol::protocol::reassembler::FrameAssembler;
use chat_protocol::utils::diagnostics::NoopDiagnostics;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use std::sync::Arc;
use tokio_util::codec::Encoder;

fn message(size: usize) -> Packet {
    Packet::Message(Message {
        first_name: "Alice".into(),
        last_name: "Liddell".into(),
        from: "alice".into(),
        text: "x".repeat(size),
        chat_name: "general".into(),
        timestamp: 1_700_000_000_000,
    })
}

fn codec() -> PacketCodec {
    PacketCodec::new(1 << 20, Arc::new(NoopDiagnostics))
}

#[allow(clippy::unwrap_used)]
fn bench_packet_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_encode_decode");
    let text_sizes = [16usize, 512, 4096, 60_000];

    for &size in &text_sizes {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("encode_{size}b"), |b| {
            b.iter_batched(
                || message(size),
                |packet| {
                    let mut buf = BytesMut::with_capacity(size + 64);
                    codec().encode(packet, &mut buf).unwrap();
                },
                BatchSize::SmallInput,
            )
        });

        let bytes = message(size).to_bytes().unwrap();
        group.bench_function(format!("decode_{size}b"), |b| {
            b.iter(|| {
                let decoded = Packet::from_bytes(&bytes);
                assert!(decoded.is_ok());
            })
        });
    }
    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_reassembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassembly");

    let mut stream = Vec::new();
    for i in 0..100 {
        stream.extend(message(64 + i).to_bytes().unwrap());
    }
    stream.extend(
        Packet::ChatList(ChatList {
            chat_names: (0..50).map(|i| format!("chat-{i}")).collect(),
        })
        .to_bytes()
        .unwrap(),
    );
    group.throughput(Throughput::Bytes(stream.len() as u64));

    for chunk_size in [1usize, 64, 1500, 16 * 1024] {
        group.bench_function(format!("chunks_of_{chunk_size}"), |b| {
            b.iter(|| {
                let mut assembler = FrameAssembler::new(codec());
                let mut count = 0;
                for chunk in stream.chunks(chunk_size) {
                    count += assembler.push(chunk).len();
                }
                assert_eq!(count, 101);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_packet_encode_decode, bench_reassembly);
criterion_main!(benches);
