use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use packet_session::core::codec::{FrameCodec, PacketCodec};
use packet_session::transport::FrameReceiver;
use packet_session::{Packet, SerializationFormat};
use tokio_util::codec::Encoder;

#[allow(clippy::unwrap_used)]
fn bench_packet_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_encode_decode");
    let payload_sizes = [64usize, 512, 4096, 65536];
    let formats = [
        SerializationFormat::Bincode,
        SerializationFormat::Json,
        SerializationFormat::MessagePack,
    ];

    for format in formats {
        let codec = PacketCodec::new(format);
        for &size in &payload_sizes {
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_function(format!("encode_{}_{size}b", format.name()), |b| {
                b.iter_batched(
                    || Packet::data(vec![0u8; size]),
                    |packet| codec.encode(&packet).unwrap(),
                    BatchSize::SmallInput,
                )
            });

            let body = codec.encode(&Packet::data(vec![0u8; size])).unwrap();
            group.bench_function(format!("decode_{}_{size}b", format.name()), |b| {
                b.iter(|| {
                    let decoded = codec.decode(&body);
                    assert!(decoded.is_ok());
                })
            });
        }
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_chunked_reassembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunked_reassembly");
    let body = vec![0x42u8; 64 * 1024];
    let mut wire = BytesMut::new();
    FrameCodec::default().encode(body.as_slice(), &mut wire).unwrap();

    for chunk_size in [256usize, 1024, 8192] {
        group.throughput(Throughput::Bytes(wire.len() as u64));
        group.bench_function(format!("chunk_{chunk_size}b"), |b| {
            b.iter(|| {
                let mut receiver = FrameReceiver::new(chunk_size, 1 << 20);
                let mut frames = 0;
                for chunk in wire.chunks(chunk_size) {
                    if receiver.push_chunk(chunk).unwrap().is_some() {
                        frames += 1;
                    }
                }
                assert_eq!(frames, 1);
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_packet_encode_decode, bench_chunked_reassembly);
criterion_main!(benches);
