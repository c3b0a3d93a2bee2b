use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use inmem_tsindex::collab::series_file::InMemSeriesFile;
use inmem_tsindex::index::shard::ShardIndex;
use inmem_tsindex::index::shared::SharedIndex;
use inmem_tsindex::predicate::expr::{Expr, Op};
use inmem_tsindex::series::tags::{Tag, Tags};
use inmem_tsindex::Config;
use bytes::Bytes;

fn tags_for(host: u64, region: &str) -> Tags {
    Tags::from_pairs(vec![
        Tag::new("host", format!("host-{}", host)),
        Tag::new("region", region.to_string()),
    ])
}

fn new_shard() -> ShardIndex {
    let shared = Arc::new(SharedIndex::new("bench_db", Arc::new(InMemSeriesFile::new())));
    ShardIndex::new(1, shared, Config::default())
}

fn bench_series_admission(c: &mut Criterion) {
    c.bench_function("create_series_list_if_not_exists/new_series", |b| {
        let shard = new_shard();
        let mut id = 0u64;
        b.iter(|| {
            let name = Bytes::from_static(b"cpu");
            let tags = tags_for(id, if id % 2 == 0 { "us" } else { "eu" });
            let _ = shard.create_series_list_if_not_exists(
                black_box(&[name]),
                black_box(&[tags]),
                "bench_db",
                None,
            );
            id += 1;
        });
    });
}

fn bench_series_admission_existing(c: &mut Criterion) {
    let shard = new_shard();
    let name = Bytes::from_static(b"cpu");
    let tags = tags_for(1, "us");
    shard
        .create_series_list_if_not_exists(&[name.clone()], &[tags.clone()], "bench_db", None)
        .unwrap();

    c.bench_function("create_series_list_if_not_exists/existing_series", |b| {
        b.iter(|| {
            let _ = shard.create_series_list_if_not_exists(
                black_box(&[name.clone()]),
                black_box(&[tags.clone()]),
                "bench_db",
                None,
            );
        });
    });
}

fn bench_predicate_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("predicate_compile");

    for cardinality in [100, 1_000, 10_000].iter() {
        let shard = new_shard();
        for i in 0..*cardinality {
            let name = Bytes::from_static(b"cpu");
            let tags = tags_for(i, if i % 3 == 0 { "us" } else { "eu" });
            shard.create_series_list_if_not_exists(&[name], &[tags], "bench_db", None).unwrap();
        }
        let metric = shard.shared().metric_by_name(b"cpu").unwrap();
        let expr = Expr::binary(Op::Eq, Expr::var("region"), Expr::string("us"));

        group.bench_with_input(BenchmarkId::from_parameter(cardinality), cardinality, |b, _| {
            b.iter(|| {
                let _ = inmem_tsindex::predicate::compiler::walk_where_for_series_ids(
                    black_box(&metric),
                    black_box(&expr),
                    "bench_db",
                    None,
                );
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_series_admission,
    bench_series_admission_existing,
    bench_predicate_compile
);
criterion_main!(benches);
