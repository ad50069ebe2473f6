//! Benchmarks for media source classification
//!
//! Tests performance of matching release names against the source patterns.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use metaforge_common::media_source::{self, MediaSource};

const RELEASE_NAMES: &[(&str, &str)] = &[
    ("bluray", "Inception.2010.1080p.BluRay.x264-SPARKS"),
    ("webdl", "Inception.2010.2160p.WEB-DL.DDP5.1.Atmos.HDR.HEVC"),
    ("telesync", "Inception (2010) [HDTS] [x264]"),
    ("stream", "Inception.2010.strm"),
    ("unknown", "/media/movies/Inception (2010)/Inception.mkv"),
];

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    for (label, name) in RELEASE_NAMES {
        group.bench_with_input(BenchmarkId::new("builtin", label), name, |b, name| {
            b.iter(|| media_source::classify(black_box(name)));
        });
    }

    group.finish();
}

fn bench_classify_with_declared(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_declared");

    for i in 0..20 {
        let name = format!("CUSTOM{i}");
        MediaSource::declare(&name, &name, Some(&format!("custom{i}rip"))).unwrap();
    }

    group.bench_function("miss/20_declared", |b| {
        b.iter(|| media_source::classify(black_box("Inception.2010.Remux.mkv")));
    });
    group.bench_function("hit_last/20_declared", |b| {
        b.iter(|| media_source::classify(black_box("Inception.2010.custom19rip.mkv")));
    });

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    c.bench_function("resolve/known_title", |b| {
        b.iter(|| MediaSource::resolve(black_box("Web-DL")));
    });
}

criterion_group!(benches, bench_classify, bench_classify_with_declared, bench_resolve);
criterion_main!(benches);
