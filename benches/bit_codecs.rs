//! Benchmarks for the bit-exact tag codecs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mediabox::bits::{bits, synchsafe, unsync};

/// Tag-like data with a false sync every 64 bytes.
fn frame_data(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| match i % 64 {
            0 => 0xFF,
            1 => 0xFB,
            _ => (i % 200) as u8,
        })
        .collect()
}

fn bench_unsync(c: &mut Criterion) {
    let mut group = c.benchmark_group("unsync");

    for len in [1024, 64 * 1024] {
        let data = frame_data(len);
        let escaped = unsync::encode(&data);
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::new("encode", len), &data, |b, data| {
            b.iter(|| unsync::encode(black_box(data)));
        });
        group.bench_with_input(BenchmarkId::new("decode", len), &escaped, |b, escaped| {
            b.iter(|| unsync::decode(black_box(escaped)));
        });
    }

    group.finish();
}

fn bench_integers(c: &mut Criterion) {
    c.bench_function("synchsafe_round_trip", |b| {
        b.iter(|| {
            (0..1024u32)
                .map(|v| synchsafe::decode(synchsafe::encode(black_box(v * 4099))))
                .sum::<u32>()
        });
    });

    c.bench_function("set_get_bits", |b| {
        b.iter(|| {
            (0..60u32)
                .map(|start| {
                    let value = bits::set_bits(black_box(0), start, start + 3, 0xA);
                    bits::get_bits(value, start, start + 3)
                })
                .sum::<u64>()
        });
    });
}

criterion_group!(benches, bench_unsync, bench_integers);
criterion_main!(benches);
