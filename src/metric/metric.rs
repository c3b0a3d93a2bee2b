use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;

use crate::collab::authorizer::{is_open, Authorizer};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{MetricId, SeriesId};
use crate::index::series_id_set::SeriesIdSet;
use crate::series::series::Series;
use crate::series::tags::Tags;

const AUTH_CACHE_CAPACITY: usize = 1024;

/// The per-metric inverted tag index, plus the series it owns.
///
/// `auth_cache` is a fast-path hint only: a miss or stale entry always
/// falls through to the real `Authorizer`. It is never a source of truth
/// and is invalidated per-series on `drop_series`.
pub struct Metric {
    pub id: MetricId,
    pub name: Bytes,
    fields: Mutex<HashSet<Bytes>>,
    tag_index: Mutex<HashMap<Bytes, BTreeMap<Bytes, Vec<SeriesId>>>>,
    series_by_id: Mutex<HashMap<u64, Series>>,
    deleted: AtomicBool,
    auth_cache: Mutex<LruCache<SeriesId, bool>>,
}

impl Metric {
    pub fn new(id: MetricId, name: Bytes) -> Self {
        Metric {
            id,
            name,
            fields: Mutex::new(HashSet::new()),
            tag_index: Mutex::new(HashMap::new()),
            series_by_id: Mutex::new(HashMap::new()),
            deleted: AtomicBool::new(false),
            auth_cache: Mutex::new(LruCache::new(
                std::num::NonZeroUsize::new(AUTH_CACHE_CAPACITY).unwrap(),
            )),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub fn delete(&self) {
        self.deleted.store(true, Ordering::Release);
    }

    pub fn add_series(&self, series: Series) {
        let id = series.id;
        {
            let mut tag_index = self.tag_index.lock();
            for tag in series.tags.iter() {
                let ids = tag_index
                    .entry(tag.key.clone())
                    .or_default()
                    .entry(tag.value.clone())
                    .or_default();
                let pos = ids.partition_point(|&sid| sid < id);
                if ids.get(pos) != Some(&id) {
                    ids.insert(pos, id);
                }
            }
        }
        self.series_by_id.lock().insert(id.value(), series);
    }

    /// Soft-deletes the series: marks it deleted but leaves it in
    /// `series_by_id` and `tag_index` until the next `rebuild()` compacts
    /// it out, mirroring the original's tombstone-then-GC lifecycle.
    pub fn drop_series(&self, id: SeriesId) {
        if let Some(series) = self.series_by_id.lock().get(&id.value()) {
            series.delete();
        }
        self.auth_cache.lock().pop(&id);
    }

    pub fn has_series(&self, id: SeriesId) -> bool {
        self.series_by_id.lock().contains_key(&id.value())
    }

    fn is_live(by_id: &HashMap<u64, Series>, id: SeriesId) -> bool {
        by_id.get(&id.value()).map(|s| !s.is_deleted()).unwrap_or(false)
    }

    pub fn series_ids(&self) -> Vec<SeriesId> {
        self.series_by_id.lock().keys().map(|v| SeriesId(*v)).collect()
    }

    pub fn series_keys(&self) -> Vec<Bytes> {
        let mut keys: Vec<Bytes> =
            self.series_by_id.lock().values().map(|s| s.key.clone()).collect();
        keys.sort();
        keys
    }

    pub fn series_keys_by_id(&self, ids: &[SeriesId]) -> Vec<Bytes> {
        let by_id = self.series_by_id.lock();
        let mut keys: Vec<Bytes> = ids
            .iter()
            .filter_map(|id| by_id.get(&id.value()).map(|s| s.key.clone()))
            .collect();
        keys.sort();
        keys
    }

    /// Count of non-deleted series. Tombstoned series linger in
    /// `series_by_id` until `rebuild()` compacts them out.
    pub fn cardinality(&self) -> usize {
        self.series_by_id.lock().values().filter(|s| !s.is_deleted()).count()
    }

    pub fn has_tag_key(&self, key: &[u8]) -> bool {
        self.tag_index.lock().contains_key(key)
    }

    /// True when at least one non-deleted series carries `key=value`.
    /// A tombstoned series can still have a stale entry in `tag_index`
    /// until the next `rebuild()`, so liveness is checked directly.
    pub fn has_tag_value(&self, key: &[u8], value: &[u8]) -> bool {
        let tag_index = self.tag_index.lock();
        let Some(ids) = tag_index.get(key).and_then(|values| values.get(value)) else {
            return false;
        };
        let by_id = self.series_by_id.lock();
        ids.iter().any(|&id| Self::is_live(&by_id, id))
    }

    pub fn tag_keys(&self) -> Vec<Bytes> {
        let mut keys: Vec<Bytes> = self.tag_index.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Lexicographically sorted tag values for `key` still backed by at
    /// least one live series, for free via the inner `BTreeMap`.
    pub fn tag_values(&self, key: &[u8]) -> Vec<Bytes> {
        let tag_index = self.tag_index.lock();
        let Some(values) = tag_index.get(key) else { return Vec::new() };
        let by_id = self.series_by_id.lock();
        values
            .iter()
            .filter(|(_, ids)| ids.iter().any(|&id| Self::is_live(&by_id, id)))
            .map(|(v, _)| v.clone())
            .collect()
    }

    /// Tag values for `key` backed by at least one live series the
    /// authorizer allows. Short-circuits to the unfiltered `tag_values`
    /// when `auth` is open.
    pub fn tag_values_authorized(
        &self,
        key: &[u8],
        db: &str,
        auth: Option<&dyn Authorizer>,
    ) -> Vec<Bytes> {
        if is_open(auth) {
            return self.tag_values(key);
        }
        let candidates: Vec<(Bytes, Vec<SeriesId>)> = {
            let tag_index = self.tag_index.lock();
            let Some(values) = tag_index.get(key) else { return Vec::new() };
            let by_id = self.series_by_id.lock();
            values
                .iter()
                .map(|(v, ids)| {
                    let live: Vec<SeriesId> =
                        ids.iter().copied().filter(|&id| Self::is_live(&by_id, id)).collect();
                    (v.clone(), live)
                })
                .collect()
        };

        candidates
            .into_iter()
            .filter(|(_, ids)| ids.iter().any(|&id| self.authorized(id, db, auth)))
            .map(|(v, _)| v)
            .collect()
    }

    pub fn tag_value_n(&self, key: &[u8]) -> usize {
        self.tag_values(key).len()
    }

    pub fn series_ids_by_tag_key(&self, key: &[u8]) -> SeriesIdSet {
        let set = SeriesIdSet::new();
        let tag_index = self.tag_index.lock();
        if let Some(values) = tag_index.get(key) {
            let by_id = self.series_by_id.lock();
            for ids in values.values() {
                for &id in ids {
                    if Self::is_live(&by_id, id) {
                        set.add(id.value());
                    }
                }
            }
        }
        set
    }

    pub fn series_ids_by_tag_value(&self, key: &[u8], value: &[u8]) -> SeriesIdSet {
        let set = SeriesIdSet::new();
        let tag_index = self.tag_index.lock();
        if let Some(ids) = tag_index.get(key).and_then(|values| values.get(value)) {
            let by_id = self.series_by_id.lock();
            for &id in ids {
                if Self::is_live(&by_id, id) {
                    set.add(id.value());
                }
            }
        }
        set
    }

    /// All non-deleted series ids for this metric.
    pub fn series_ids_all(&self) -> SeriesIdSet {
        let set = SeriesIdSet::new();
        for (id, series) in self.series_by_id.lock().iter() {
            if !series.is_deleted() {
                set.add(*id);
            }
        }
        set
    }

    /// All series ids, or only those matching `expr` when one is given.
    /// A residual (a predicate part this index cannot resolve against tags)
    /// is rejected outright: callers that cannot tolerate one, such as a
    /// deletion path, should use this instead of calling
    /// `walk_where_for_series_ids` directly.
    pub fn series_ids_all_or_by_expr(
        &self,
        expr: Option<&crate::predicate::expr::Expr>,
        db: &str,
        auth: Option<&dyn Authorizer>,
    ) -> Result<SeriesIdSet> {
        let Some(expr) = expr else { return Ok(self.series_ids_all()) };
        let (set, residual) = crate::predicate::compiler::walk_where_for_series_ids(self, expr, db, auth)?;
        if residual.is_some() {
            return Err(Error::fields_in_delete_predicate());
        }
        Ok(set)
    }

    pub fn tags_for_series(&self, id: SeriesId) -> Option<Tags> {
        self.series_by_id.lock().get(&id.value()).map(|s| s.tags.clone())
    }

    /// Authorization check with an LRU fast-path hint. The hint is never
    /// trusted on its own: a cached `true` still reflects a prior real
    /// authorizer call for this exact series, so only a cache *hit* short
    /// circuits; any miss always calls through.
    pub fn authorized(&self, id: SeriesId, db: &str, authorizer: Option<&dyn Authorizer>) -> bool {
        let Some(authorizer) = authorizer else { return true };
        if let Some(cached) = self.auth_cache.lock().get(&id) {
            return *cached;
        }
        let tags = match self.series_by_id.lock().get(&id.value()) {
            Some(s) => s.tags.clone(),
            None => return false,
        };
        let verdict = authorizer.authorize_series_read(db, &self.name, &tags);
        self.auth_cache.lock().put(id, verdict);
        verdict
    }

    pub fn rebuild(&self) -> Metric {
        let fresh = Metric::new(self.id, self.name.clone());
        for (_, series) in self.series_by_id.lock().iter() {
            if !series.is_deleted() {
                fresh.add_series(series.clone());
            }
        }
        if self.is_deleted() {
            fresh.delete();
        }
        fresh
    }

    pub fn bytes(&self) -> usize {
        let tag_index = self.tag_index.lock();
        let mut n = self.name.len();
        for (k, values) in tag_index.iter() {
            n += k.len();
            for (v, ids) in values.iter() {
                n += v.len() + ids.len() * std::mem::size_of::<SeriesId>();
            }
        }
        n
    }

    pub fn fields_insert(&self, field: Bytes) {
        self.fields.lock().insert(field);
    }

    pub fn has_field(&self, field: &[u8]) -> bool {
        self.fields.lock().contains(field)
    }

    pub fn name_or_error(name: &[u8]) -> Result<()> {
        if name.is_empty() {
            return Err(Error::new(ErrorKind::InvalidArgument, "metric name must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(id: u64, tags: Vec<(&'static str, &'static str)>) -> Series {
        let pairs = tags
            .into_iter()
            .map(|(k, v)| crate::series::tags::Tag::new(k, v))
            .collect();
        Series::new(
            SeriesId(id),
            Bytes::from(format!("m,id={}", id)),
            MetricId(0),
            Tags::from_pairs(pairs),
        )
    }

    #[test]
    fn test_add_and_drop_series_updates_tag_index() {
        let m = Metric::new(MetricId(0), Bytes::from_static(b"cpu"));
        m.add_series(series(1, vec![("host", "a")]));
        assert!(m.has_tag_value(b"host", b"a"));
        assert_eq!(m.cardinality(), 1);

        m.drop_series(SeriesId(1));
        assert!(!m.has_tag_value(b"host", b"a"));
        assert_eq!(m.cardinality(), 0);
    }

    #[test]
    fn test_tag_values_sorted() {
        let m = Metric::new(MetricId(0), Bytes::from_static(b"cpu"));
        m.add_series(series(1, vec![("host", "b")]));
        m.add_series(series(2, vec![("host", "a")]));
        assert_eq!(m.tag_values(b"host"), vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
    }

    #[test]
    fn test_rebuild_drops_deleted_series() {
        let m = Metric::new(MetricId(0), Bytes::from_static(b"cpu"));
        m.add_series(series(1, vec![("host", "a")]));
        m.add_series(series(2, vec![("host", "b")]));
        if let Some(s) = m.series_by_id.lock().get(&2) {
            s.delete();
        }
        let rebuilt = m.rebuild();
        assert_eq!(rebuilt.cardinality(), 1);
        assert!(rebuilt.has_tag_value(b"host", b"a"));
        assert!(!rebuilt.has_tag_value(b"host", b"b"));
    }

    #[test]
    fn test_series_ids_all_or_by_expr_rejects_residual() {
        use crate::predicate::expr::{Expr, Op};

        let m = Metric::new(MetricId(0), Bytes::from_static(b"cpu"));
        m.add_series(series(1, vec![("host", "a")]));

        let all = m.series_ids_all_or_by_expr(None, "db", None).unwrap();
        assert_eq!(all.cardinality(), 1);

        let tag_expr = Expr::binary(Op::Eq, Expr::var("host"), Expr::string("a"));
        let filtered = m.series_ids_all_or_by_expr(Some(&tag_expr), "db", None).unwrap();
        assert_eq!(filtered.cardinality(), 1);

        let field_expr = Expr::binary(Op::Eq, Expr::string("not-a-varref"), Expr::string("x"));
        let err = m.series_ids_all_or_by_expr(Some(&field_expr), "db", None);
        assert!(err.is_err());
    }

    #[test]
    fn test_add_series_keeps_tag_index_sorted_and_deduped() {
        let m = Metric::new(MetricId(0), Bytes::from_static(b"cpu"));
        m.add_series(series(3, vec![("host", "a")]));
        m.add_series(series(1, vec![("host", "a")]));
        m.add_series(series(2, vec![("host", "a")]));
        m.add_series(series(1, vec![("host", "a")]));
        assert_eq!(m.series_ids_by_tag_value(b"host", b"a").snapshot(), vec![1, 2, 3]);
    }

    #[test]
    fn test_drop_series_soft_deletes_until_rebuild() {
        let m = Metric::new(MetricId(0), Bytes::from_static(b"cpu"));
        m.add_series(series(1, vec![("host", "a")]));
        m.add_series(series(2, vec![("host", "b")]));

        m.drop_series(SeriesId(1));
        assert!(!m.has_tag_value(b"host", b"a"));
        assert_eq!(m.cardinality(), 1);
        // Tombstoned, not yet compacted: the series is still reachable by id.
        assert!(m.has_series(SeriesId(1)));

        let rebuilt = m.rebuild();
        assert!(!rebuilt.has_series(SeriesId(1)));
        assert_eq!(rebuilt.cardinality(), 1);
    }

    #[test]
    fn test_tag_values_authorized_filters_unauthorized_series() {
        use crate::collab::authorizer::Authorizer;

        struct OnlyB;
        impl Authorizer for OnlyB {
            fn authorize_series_read(&self, _db: &str, _metric: &[u8], tags: &Tags) -> bool {
                tags.get(b"host").map(|v| v.as_ref() == b"b").unwrap_or(false)
            }
        }

        let m = Metric::new(MetricId(0), Bytes::from_static(b"cpu"));
        m.add_series(series(1, vec![("host", "a")]));
        m.add_series(series(2, vec![("host", "b")]));

        let auth = OnlyB;
        let values = m.tag_values_authorized(b"host", "db", Some(&auth));
        assert_eq!(values, vec![Bytes::from_static(b"b")]);

        let unfiltered = m.tag_values_authorized(b"host", "db", None);
        assert_eq!(unfiltered, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
    }
}
