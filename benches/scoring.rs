//! Benchmarks for search candidate scoring and ranking

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use metaforge::metadata::model::SearchCandidate;
use metaforge::metadata::scoring::{rank, similarity};

fn candidates(count: usize) -> Vec<SearchCandidate> {
    (0..count)
        .map(|i| {
            let title = match i % 4 {
                0 => "Inception".to_string(),
                1 => format!("Inception: Part {i}"),
                2 => format!("Amélie {i}"),
                _ => format!("The Dream Heist {i}"),
            };
            SearchCandidate {
                provider_id: if i % 2 == 0 { "imdb" } else { "tmdb" }.to_string(),
                external_id: format!("{i}"),
                match_score: similarity("Inception", &title),
                title,
                year: Some(2000 + (i % 20) as u16),
                url: None,
                imdb_id: None,
            }
        })
        .collect()
}

fn bench_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");

    group.bench_function("exact", |b| {
        b.iter(|| similarity(black_box("Inception"), black_box("Inception")));
    });
    group.bench_function("accented", |b| {
        b.iter(|| {
            similarity(
                black_box("Le Fabuleux Destin d'Amelie Poulain"),
                black_box("Le Fabuleux Destin d'Amélie Poulain"),
            )
        });
    });

    group.finish();
}

fn bench_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank");

    for size in [10, 100, 1000] {
        let input = candidates(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| {
                let mut list = input.clone();
                rank(black_box(&mut list), Some(2010));
                list
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_similarity, bench_rank);
criterion_main!(benches);
