use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use log::warn;
use parking_lot::Mutex;

use crate::collab::authorizer::Authorizer;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::SeriesId;
use crate::index::series_id_set::SeriesIdSet;
use crate::index::shared::SharedIndex;
use crate::series::tags::Tags;
use crate::tagset::grouper::{TagSet, TagSetGrouper};

/// A partial write: some series were created, but one or more were
/// dropped for exceeding a per-shard admission limit.
#[derive(Debug, Clone)]
pub struct PartialWriteError {
    pub reason: String,
    pub dropped: usize,
    pub dropped_keys: Vec<Bytes>,
}

impl std::fmt::Display for PartialWriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "partial write: {} ({} series dropped)", self.reason, self.dropped)
    }
}

impl std::error::Error for PartialWriteError {}

impl From<PartialWriteError> for crate::core::error::Error {
    fn from(err: PartialWriteError) -> Self {
        crate::core::error::Error::new(crate::core::error::ErrorKind::PartialWrite, err.to_string())
    }
}

/// Per-shard overlay over the database-wide `SharedIndex`: the subset of
/// series this shard actually holds, plus the admission/cardinality-limit
/// enforcement that only applies at shard granularity.
pub struct ShardIndex {
    pub shard_id: u64,
    shared: Arc<SharedIndex>,
    live: SeriesIdSet,
    metric_refcount: Mutex<HashMap<Bytes, u64>>,
    config: Config,
}

impl ShardIndex {
    pub fn new(shard_id: u64, shared: Arc<SharedIndex>, config: Config) -> Self {
        ShardIndex {
            shard_id,
            shared,
            live: SeriesIdSet::new(),
            metric_refcount: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn shared(&self) -> &Arc<SharedIndex> {
        &self.shared
    }

    pub fn series_n(&self) -> u64 {
        self.live.cardinality()
    }

    /// Marks each resolved id live on this shard and bumps the metric
    /// refcount, for ids this shard did not already know about.
    fn mark_live(&self, names: &[Bytes], ids: &[SeriesId]) {
        let mut refcount = self.metric_refcount.lock();
        for (name, id) in names.iter().zip(ids.iter()) {
            if self.live.contains(id.value()) {
                continue;
            }
            self.live.add(id.value());
            *refcount.entry(name.clone()).or_insert(0) += 1;
        }
    }

    /// 1. Enforce `max_values_per_tag` against the metric's tag index as it
    /// stands *before* this batch, dropping offending name/tag entries.
    /// 2. Delegate surviving entries to the shared index; if that delegation
    /// hits `max_series_per_database`, the remaining surviving entries are
    /// dropped too rather than failing the whole batch. 3. Mark the created
    /// ids live on this shard. 4. Report any drops as a `PartialWriteError`.
    /// A dropped entry is never created in the shared index and its slot in
    /// the returned ids is left as `SeriesId(0)`.
    pub fn create_series_list_if_not_exists(
        &self,
        names: &[Bytes],
        tags: &[Tags],
        db: &str,
        auth: Option<&dyn Authorizer>,
    ) -> Result<(Vec<SeriesId>, Option<PartialWriteError>)> {
        let mut dropped_keys: Vec<Bytes> = Vec::new();
        let mut reason = String::new();
        let mut admit = vec![true; names.len()];

        if self.config.max_values_per_tag > 0 {
            for i in 0..names.len() {
                let metric = self.shared.metric_by_name(&names[i]);
                for tag in tags[i].iter() {
                    let has_value =
                        metric.as_ref().map(|m| m.has_tag_value(&tag.key, &tag.value)).unwrap_or(false);
                    if has_value {
                        continue;
                    }
                    let n = metric.as_ref().map(|m| m.tag_value_n(&tag.key)).unwrap_or(0) as u64;
                    if n < self.config.max_values_per_tag {
                        continue;
                    }
                    reason = format!(
                        "max-values-per-tag limit exceeded ({}/{}): metric={:?} tag={:?} value={:?}",
                        n, self.config.max_values_per_tag, names[i], tag.key, tag.value
                    );
                    warn!("{}", reason);
                    dropped_keys.push(crate::collab::series_file::series_key(&names[i], &tags[i]));
                    admit[i] = false;
                    break;
                }
            }
        }

        let admitted_indices: Vec<usize> = (0..names.len()).filter(|&i| admit[i]).collect();
        let admitted_names: Vec<Bytes> = admitted_indices.iter().map(|&i| names[i].clone()).collect();
        let admitted_tags: Vec<Tags> = admitted_indices.iter().map(|&i| tags[i].clone()).collect();

        let mut result = vec![SeriesId(0); names.len()];

        let raw_ids = if admitted_indices.is_empty() {
            Vec::new()
        } else {
            match self.shared.create_series_list_if_not_exists(
                &admitted_names,
                &admitted_tags,
                &self.config,
                self.config.max_series_per_database == 0,
            ) {
                Ok(ids) => ids,
                Err(e) if matches!(e.kind, crate::core::error::ErrorKind::MaxSeriesExceeded) => {
                    reason = e.to_string();
                    warn!("{}", reason);
                    for &i in &admitted_indices {
                        dropped_keys.push(crate::collab::series_file::series_key(&names[i], &tags[i]));
                    }
                    Vec::new()
                }
                Err(e) => return Err(e),
            }
        };

        for (j, &i) in admitted_indices.iter().enumerate() {
            if let Some(&id) = raw_ids.get(j) {
                result[i] = id;
            }
        }

        self.mark_live(&admitted_names, &raw_ids);
        let _ = auth;
        let _ = db;

        if !dropped_keys.is_empty() {
            let dropped = dropped_keys.len();
            dropped_keys.sort();
            dropped_keys.dedup();
            return Ok((result, Some(PartialWriteError { reason, dropped, dropped_keys })));
        }

        Ok((result, None))
    }

    pub fn drop_series(&self, key: &[u8], name: &[u8], id: SeriesId) {
        if self.live.remove(id.value()) {
            let mut refcount = self.metric_refcount.lock();
            if let Some(count) = refcount.get_mut(name) {
                *count -= 1;
                if *count == 0 {
                    refcount.remove(name);
                }
            }
        }
        let _ = key;
    }

    pub fn drop_metric_if_series_not_exist(&self, name: &[u8]) {
        let local_refcount = self.metric_refcount.lock().get(name).copied().unwrap_or(0);
        if local_refcount > 0 {
            return;
        }
        self.shared.drop_metric_if_series_not_exist(name);
    }

    pub fn tag_sets(
        &self,
        metric_name: &[u8],
        condition: Option<&crate::predicate::expr::Expr>,
        dimensions: &[Bytes],
        db: &str,
        auth: Option<&dyn Authorizer>,
    ) -> Result<Vec<TagSet>> {
        let Some(metric) = self.shared.metric_by_name(metric_name) else {
            return Ok(Vec::new());
        };
        TagSetGrouper::group(&metric, &self.live, condition, dimensions, db, auth)
    }

    pub fn series_id_set(&self) -> &SeriesIdSet {
        &self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::series_file::InMemSeriesFile;
    use crate::series::tags::Tag;

    fn shard(config: Config) -> ShardIndex {
        let shared = Arc::new(SharedIndex::new("mydb", Arc::new(InMemSeriesFile::new())));
        ShardIndex::new(1, shared, config)
    }

    #[test]
    fn test_create_series_marks_shard_live() {
        let s = shard(Config::default());
        let name = Bytes::from_static(b"cpu");
        let tags = Tags::from_pairs(vec![Tag::new("host", "a")]);
        let (ids, partial) = s.create_series_list_if_not_exists(&[name], &[tags], "mydb", None).unwrap();
        assert_eq!(ids.len(), 1);
        assert!(partial.is_none());
        assert_eq!(s.series_n(), 1);
    }

    #[test]
    fn test_max_values_per_tag_reports_partial_write() {
        let config = Config { max_series_per_database: 0, max_values_per_tag: 1 };
        let s = shard(config);
        let name = Bytes::from_static(b"cpu");
        s.create_series_list_if_not_exists(
            &[name.clone()],
            &[Tags::from_pairs(vec![Tag::new("host", "a")])],
            "mydb",
            None,
        )
        .unwrap();

        let (_, partial) = s
            .create_series_list_if_not_exists(
                &[name],
                &[Tags::from_pairs(vec![Tag::new("host", "b")])],
                "mydb",
                None,
            )
            .unwrap();
        assert_eq!(partial.unwrap().dropped, 1);
    }

    #[test]
    fn test_max_series_exceeded_reports_partial_write_not_hard_error() {
        let config = Config { max_series_per_database: 1, max_values_per_tag: 0 };
        let s = shard(config);
        let name = Bytes::from_static(b"cpu");

        let (ids, partial) = s
            .create_series_list_if_not_exists(
                &[name.clone()],
                &[Tags::from_pairs(vec![Tag::new("host", "a")])],
                "mydb",
                None,
            )
            .unwrap();
        assert!(partial.is_none());
        assert_eq!(ids.len(), 1);

        // The database is already at its limit, so this second batch
        // overshoots it and must come back as a recoverable partial write
        // rather than a hard `Err`.
        let (ids, partial) = s
            .create_series_list_if_not_exists(
                &[name],
                &[Tags::from_pairs(vec![Tag::new("host", "b")])],
                "mydb",
                None,
            )
            .unwrap();
        let partial = partial.expect("batch exceeding the database limit should partially write");
        assert_eq!(partial.dropped, 1);
        assert!(ids.iter().all(|id| id.value() == 0));
        assert_eq!(s.series_n(), 1);
    }
}
