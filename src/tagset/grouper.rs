use std::collections::BTreeMap;

use bytes::Bytes;

use crate::collab::authorizer::Authorizer;
use crate::core::error::Result;
use crate::core::types::SeriesId;
use crate::index::series_id_set::SeriesIdSet;
use crate::metric::metric::Metric;
use crate::predicate::expr::Expr;

/// One GROUP-BY bucket: the dimension subset and the series that fall into
/// it, keyed by the deterministic encoding of that subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet {
    pub key: Bytes,
    pub tag_subset: BTreeMap<Bytes, Bytes>,
    pub series_ids: Vec<u64>,
}

fn encode_key(subset: &BTreeMap<Bytes, Bytes>) -> Bytes {
    let mut buf = Vec::new();
    for (k, v) in subset {
        buf.extend_from_slice(k);
        buf.push(b'=');
        buf.extend_from_slice(v);
        buf.push(b',');
    }
    Bytes::from(buf)
}

pub struct TagSetGrouper;

impl TagSetGrouper {
    /// 1. Compile `condition` against `metric`, intersect with the shard's
    ///    live series. 2. For every surviving series, project its tags down
    ///    to `dimensions`, substituting an empty value for any dimension the
    ///    series doesn't carry. 3. Group by the resulting subset. 4. Sort
    ///    groups by key.
    pub fn group(
        metric: &Metric,
        shard_live: &SeriesIdSet,
        condition: Option<&Expr>,
        dimensions: &[Bytes],
        db: &str,
        auth: Option<&dyn Authorizer>,
    ) -> Result<Vec<TagSet>> {
        let candidates = match condition {
            Some(expr) => {
                let (set, _residual) =
                    crate::predicate::compiler::walk_where_for_series_ids(metric, expr, db, auth)?;
                set
            }
            None => metric.series_ids_all(),
        };
        candidates.intersect(shard_live);

        let mut groups: BTreeMap<Bytes, TagSet> = BTreeMap::new();
        for id in candidates.iter() {
            let sid = SeriesId(id);
            let Some(tags) = metric.tags_for_series(sid) else { continue };
            if !metric.authorized(sid, db, auth) {
                continue;
            }

            let mut subset = BTreeMap::new();
            for dim in dimensions {
                let v = tags.get(dim).cloned().unwrap_or_default();
                subset.insert(dim.clone(), v);
            }
            let key = encode_key(&subset);
            groups
                .entry(key.clone())
                .or_insert_with(|| TagSet { key, tag_subset: subset, series_ids: Vec::new() })
                .series_ids
                .push(id);
        }

        let mut out: Vec<TagSet> = groups.into_values().collect();
        for ts in out.iter_mut() {
            ts.series_ids.sort_unstable();
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::MetricId;
    use crate::series::series::Series;
    use crate::series::tags::{Tag, Tags};

    fn metric_with(series: Vec<(u64, Vec<(&'static str, &'static str)>)>) -> Metric {
        let m = Metric::new(MetricId(0), Bytes::from_static(b"cpu"));
        for (id, tags) in series {
            let pairs = tags.into_iter().map(|(k, v)| Tag::new(k, v)).collect();
            m.add_series(Series::new(
                SeriesId(id),
                Bytes::from(format!("cpu,id={}", id)),
                MetricId(0),
                Tags::from_pairs(pairs),
            ));
        }
        m
    }

    #[test]
    fn test_groups_by_dimension() {
        let m = metric_with(vec![
            (1, vec![("host", "a"), ("region", "us")]),
            (2, vec![("host", "b"), ("region", "us")]),
            (3, vec![("host", "c"), ("region", "eu")]),
        ]);
        let live = SeriesIdSet::new();
        live.add(1);
        live.add(2);
        live.add(3);
        let dims = vec![Bytes::from_static(b"region")];
        let groups = TagSetGrouper::group(&m, &live, None, &dims, "db", None).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].series_ids.len() + groups[1].series_ids.len(), 3);
    }

    #[test]
    fn test_missing_dimension_groups_under_empty_value() {
        let m = metric_with(vec![(1, vec![("host", "a"), ("region", "us")]), (2, vec![("host", "a")])]);
        let live = SeriesIdSet::new();
        live.add(1);
        live.add(2);
        let dims = vec![Bytes::from_static(b"host"), Bytes::from_static(b"region")];
        let groups = TagSetGrouper::group(&m, &live, None, &dims, "db", None).unwrap();
        assert_eq!(groups.len(), 2);
        let regionless = groups.iter().find(|g| g.series_ids == vec![2]).unwrap();
        assert_eq!(regionless.tag_subset.get(&Bytes::from_static(b"region")), Some(&Bytes::new()));
    }
}
