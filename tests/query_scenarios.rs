use std::sync::Arc;

use bytes::Bytes;
use inmem_tsindex::collab::series_file::InMemSeriesFile;
use inmem_tsindex::index::shard::ShardIndex;
use inmem_tsindex::index::shared::SharedIndex;
use inmem_tsindex::predicate::expr::{Expr, Op};
use inmem_tsindex::series::tags::{Tag, Tags};
use inmem_tsindex::Config;

fn seeded_shard() -> ShardIndex {
    let shared = Arc::new(SharedIndex::new("testdb", Arc::new(InMemSeriesFile::new())));
    let shard = ShardIndex::new(1, shared, Config::default());

    let hosts = [("a", "us"), ("b", "us"), ("c", "eu")];
    for (host, region) in hosts {
        let name = Bytes::from_static(b"cpu");
        let tags = Tags::from_pairs(vec![Tag::new("host", host), Tag::new("region", region)]);
        shard.create_series_list_if_not_exists(&[name], &[tags], "testdb", None).unwrap();
    }

    let name = Bytes::from_static(b"mem");
    let tags = Tags::from_pairs(vec![Tag::new("host", "a"), Tag::new("region", "us")]);
    shard.create_series_list_if_not_exists(&[name], &[tags], "testdb", None).unwrap();

    shard
}

#[test]
fn test_metric_names_by_expr_filters_by_name() {
    let shard = seeded_shard();
    let expr = Expr::binary(Op::Eq, Expr::var("_name"), Expr::string("cpu"));
    let names = shard.shared().metric_names_by_expr(&expr, None).unwrap();
    assert_eq!(names, vec![Bytes::from_static(b"cpu")]);
}

#[test]
fn test_tag_sets_groups_by_region_for_cpu() {
    let shard = seeded_shard();
    let dims = vec![Bytes::from_static(b"region")];
    let groups = shard.tag_sets(b"cpu", None, &dims, "testdb", None).unwrap();

    assert_eq!(groups.len(), 2);
    let total: usize = groups.iter().map(|g| g.series_ids.len()).sum();
    assert_eq!(total, 3);
}

#[test]
fn test_tag_sets_respects_condition() {
    let shard = seeded_shard();
    let condition = Expr::binary(Op::Eq, Expr::var("region"), Expr::string("us"));
    let dims = vec![Bytes::from_static(b"host")];
    let groups = shard.tag_sets(b"cpu", Some(&condition), &dims, "testdb", None).unwrap();

    let total: usize = groups.iter().map(|g| g.series_ids.len()).sum();
    assert_eq!(total, 2, "only the two us-region cpu series should match");
}

#[test]
fn test_rebuild_preserves_queryable_state() {
    let shard = seeded_shard();
    shard.shared().rebuild();

    let expr = Expr::binary(Op::Eq, Expr::var("host"), Expr::string("a"));
    let metric = shard.shared().metric_by_name(b"cpu").unwrap();
    let (set, _) =
        inmem_tsindex::predicate::compiler::walk_where_for_series_ids(&metric, &expr, "testdb", None)
            .unwrap();
    assert_eq!(set.cardinality(), 1);
}
