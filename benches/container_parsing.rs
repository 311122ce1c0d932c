//! Benchmarks for container parsing and serialization
//!
//! Measures parse, write and edit-then-write over synthetic MP4 and WAV
//! files with many small records.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mediabox::container::schemas::riff::InfoText;
use mediabox::{Convention, Identifier};

fn iso_box(code: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let mut out = ((content.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(code);
    out.extend_from_slice(content);
    out
}

fn riff_chunk(tag: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.extend_from_slice(&(content.len() as u32).to_le_bytes());
    out.extend_from_slice(content);
    if content.len() % 2 == 1 {
        out.push(0);
    }
    out
}

/// `moov` with `tracks` tracks, each nesting down to a sample table.
fn movie(tracks: usize) -> Vec<u8> {
    let mut moov = iso_box(b"mvhd", &[0; 100]);
    for _ in 0..tracks {
        let stbl = [
            iso_box(b"stts", &[0; 16]),
            iso_box(b"stsz", &[0; 400]),
            iso_box(b"stco", &[0; 200]),
        ]
        .concat();
        let minf = iso_box(b"minf", &iso_box(b"stbl", &stbl));
        let mdia = iso_box(b"mdia", &[iso_box(b"mdhd", &[0; 24]), minf].concat());
        moov.extend(iso_box(b"trak", &[iso_box(b"tkhd", &[0; 84]), mdia].concat()));
    }
    [
        iso_box(b"ftyp", b"isom\x00\x00\x02\x00isomiso2"),
        iso_box(b"moov", &moov),
        iso_box(b"mdat", &vec![0; 64 * 1024]),
    ]
    .concat()
}

/// WAV file with `tags` INFO text chunks.
fn wave(tags: usize) -> Vec<u8> {
    let mut info = b"INFO".to_vec();
    for i in 0..tags {
        info.extend(riff_chunk(b"ICMT", format!("comment number {i}").as_bytes()));
    }
    let mut content = b"WAVE".to_vec();
    content.extend(riff_chunk(b"fmt ", &[0; 16]));
    content.extend(riff_chunk(b"LIST", &info));
    content.extend(riff_chunk(b"data", &vec![0; 64 * 1024]));
    riff_chunk(b"RIFF", &content)
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for tracks in [1, 8, 64] {
        let bytes = movie(tracks);
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("iso_bmff", tracks), &bytes, |b, bytes| {
            b.iter(|| {
                mediabox::parse_bytes(black_box(bytes.clone()), Convention::IsoBmff).unwrap()
            });
        });
    }

    let bytes = wave(100);
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_with_input(BenchmarkId::new("riff", 100), &bytes, |b, bytes| {
        b.iter(|| mediabox::parse_bytes(black_box(bytes.clone()), Convention::Riff).unwrap());
    });

    group.finish();
}

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");

    let bytes = movie(64);
    let tree = mediabox::parse_bytes(bytes.clone(), Convention::IsoBmff).unwrap();
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("iso_bmff_unmodified", |b| {
        b.iter(|| black_box(&tree).to_bytes().unwrap());
    });

    group.bench_function("iso_bmff_edit", |b| {
        b.iter(|| {
            let mut tree = mediabox::parse_bytes(bytes.clone(), Convention::IsoBmff).unwrap();
            for trak in tree.find_all("moov.trak") {
                let trak = tree.container(trak).unwrap();
                let udta = tree.create_container(Identifier::fourcc(b"udta")).unwrap();
                tree.append_child(trak, udta.node()).unwrap();
            }
            tree.to_bytes().unwrap()
        });
    });

    let bytes = wave(100);
    group.bench_function("riff_retag", |b| {
        b.iter(|| {
            let mut tree = mediabox::parse_bytes(bytes.clone(), Convention::Riff).unwrap();
            for icmt in tree.find_all("RIFF.LIST.ICMT") {
                tree.update_payload::<InfoText, _, _>(icmt, |text| text.set_text("edited"))
                    .unwrap();
            }
            tree.to_bytes().unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_write);
criterion_main!(benches);
