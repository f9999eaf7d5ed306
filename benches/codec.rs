//! Codec benchmarks
//!
//! Covers the hot paths of the wire codec and the byte-sequence
//! container:
//! - varint encode/decode across value magnitudes
//! - tag-framed message writing and unknown-field parsing
//! - rope concatenation and traversal versus flat copies
//!
//! ## Running
//!
//! ```bash
//! cargo bench --bench codec
//! cargo bench --bench codec -- "varint"
//! cargo bench --bench codec -- "rope"
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use filament::{varint, ByteSeq, UnknownFieldStore, WireReader, WireType, WireWriter};

/// Value magnitudes spanning the varint length classes.
const VARINT_SAMPLES: &[u64] = &[1, 300, 1 << 20, 1 << 40, u64::MAX];

fn bench_varint(c: &mut Criterion) {
    let mut group = c.benchmark_group("varint");
    for &value in VARINT_SAMPLES {
        group.bench_with_input(
            BenchmarkId::new("encode", value),
            &value,
            |b, &value| {
                let mut buf = Vec::with_capacity(10);
                b.iter(|| {
                    buf.clear();
                    varint::encode_varint64(black_box(value), &mut buf);
                    black_box(buf.len())
                });
            },
        );
        let mut encoded = Vec::new();
        varint::encode_varint64(value, &mut encoded);
        group.bench_with_input(
            BenchmarkId::new("decode", value),
            &encoded,
            |b, encoded| {
                b.iter(|| varint::decode_varint64(black_box(encoded)).unwrap());
            },
        );
    }
    group.finish();
}

fn sample_message(fields: usize) -> Vec<u8> {
    let mut writer = WireWriter::new();
    for i in 0..fields {
        let field_number = (i % 64 + 1) as u32;
        match i % 3 {
            0 => {
                writer.write_tag(field_number, WireType::Varint);
                writer.write_varint64(i as u64 * 2654435761);
            }
            1 => {
                writer.write_tag(field_number, WireType::Fixed64);
                writer.write_fixed64(i as u64);
            }
            _ => {
                writer.write_tag(field_number, WireType::LengthDelimited);
                writer.write_len_prefixed(&[i as u8; 24]);
            }
        }
    }
    writer.into_bytes()
}

fn bench_message(c: &mut Criterion) {
    let mut group = c.benchmark_group("message");
    for fields in [16usize, 256] {
        let bytes = sample_message(fields);
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("parse_unknown", fields),
            &bytes,
            |b, bytes| {
                b.iter(|| {
                    let mut reader = WireReader::new(black_box(bytes));
                    UnknownFieldStore::parse_from(&mut reader).unwrap()
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("reserialize", fields),
            &bytes,
            |b, bytes| {
                let mut reader = WireReader::new(bytes);
                let store = UnknownFieldStore::parse_from(&mut reader).unwrap();
                b.iter(|| black_box(&store).to_bytes());
            },
        );
    }
    group.finish();
}

fn bench_rope(c: &mut Criterion) {
    let mut group = c.benchmark_group("rope");
    for chunk in [64usize, 1024] {
        let pieces: Vec<ByteSeq> = (0..256)
            .map(|i| ByteSeq::from_vec(vec![i as u8; chunk]))
            .collect();
        group.throughput(Throughput::Bytes((chunk * pieces.len()) as u64));
        group.bench_with_input(
            BenchmarkId::new("concat_256_pieces", chunk),
            &pieces,
            |b, pieces| {
                b.iter(|| {
                    let mut seq = ByteSeq::empty();
                    for piece in pieces {
                        seq = seq.concat(black_box(piece));
                    }
                    seq
                });
            },
        );

        let mut rope = ByteSeq::empty();
        for piece in &pieces {
            rope = rope.concat(piece);
        }
        group.bench_with_input(BenchmarkId::new("to_vec", chunk), &rope, |b, rope| {
            b.iter(|| black_box(rope).to_vec());
        });
        group.bench_with_input(BenchmarkId::new("hash", chunk), &rope, |b, rope| {
            b.iter(|| {
                // Fresh clone shapes share the cache, so rebuild to
                // measure the computation.
                let fresh = ByteSeq::copy_from_slice(&rope.to_vec());
                fresh.hash_value()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_varint, bench_message, bench_rope);
criterion_main!(benches);
