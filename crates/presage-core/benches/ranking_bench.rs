//! Presage Ranking Benchmarks
//!
//! Benchmarks for the hot scoring paths using Criterion.
//! Run with: cargo bench -p presage-core

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use presage_core::{
    context_similarity, cosine_similarity, token_overlap, MemoryContext, MemoryItem,
    MemoryType, RetrievalStrategy,
};

fn bench_token_overlap(c: &mut Criterion) {
    let query = "how does the retrieval engine rank candidate memories";
    let content = "The retrieval engine ranks candidates with eight weighted factors \
                   including semantic similarity, context match, and access frequency";

    c.bench_function("token_overlap", |b| {
        b.iter(|| black_box(token_overlap(query, content)))
    });
}

fn bench_cosine_similarity_384d(c: &mut Criterion) {
    let a: Vec<f32> = (0..384).map(|i| (i as f32).sin()).collect();
    let b: Vec<f32> = (0..384).map(|i| (i as f32).cos()).collect();

    c.bench_function("cosine_similarity_384d", |bench| {
        bench.iter(|| black_box(cosine_similarity(&a, &b)))
    });
}

fn bench_context_similarity(c: &mut Criterion) {
    let mut left = MemoryContext::for_project_user("atlas", "alice");
    left.session = Some("s-42".to_string());
    left.application = Some("editor".to_string());
    let right = left.clone();

    c.bench_function("context_similarity", |b| {
        b.iter(|| black_box(context_similarity(&left, &right)))
    });
}

fn bench_strategy_selection(c: &mut Criterion) {
    let queries = [
        "recent deploy failures",
        "critical auth incidents",
        "what did the team decide",
        "fibonacci implementation",
    ];
    let context = MemoryContext::for_project_user("atlas", "alice");

    c.bench_function("strategy_selection", |b| {
        b.iter(|| {
            for q in &queries {
                black_box(RetrievalStrategy::select(q, Some(&context)));
            }
        })
    });
}

fn bench_fingerprint(c: &mut Criterion) {
    let now = Utc::now();
    let item = MemoryItem::with_id_at(
        "bench",
        "a moderately sized memory item body used for fingerprint benchmarking",
        MemoryType::Text,
        now,
    );

    c.bench_function("content_fingerprint", |b| {
        b.iter(|| black_box(presage_core::content_fingerprint(&item.content)))
    });
}

criterion_group!(
    benches,
    bench_token_overlap,
    bench_cosine_similarity_384d,
    bench_context_similarity,
    bench_strategy_selection,
    bench_fingerprint
);
criterion_main!(benches);
