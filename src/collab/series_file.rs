use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::core::error::Result;
use crate::series::tags::Tags;

/// The durable series file this crate consumes but does not implement —
/// see the crate's scope: the real, on-disk implementation lives outside
/// this index.
pub trait SeriesFile: Send + Sync {
    fn create_series_list_if_not_exists(&self, names: &[Bytes], tags: &[Tags]) -> Result<Vec<u64>>;
}

/// An in-memory stand-in used by tests and benchmarks. Not durable: no
/// file I/O, no persistence across process restarts.
#[derive(Default)]
pub struct InMemSeriesFile {
    next_id: AtomicU64,
    by_key: Mutex<HashMap<Bytes, u64>>,
}

impl InMemSeriesFile {
    pub fn new() -> Self {
        InMemSeriesFile { next_id: AtomicU64::new(1), by_key: Mutex::new(HashMap::new()) }
    }
}

impl SeriesFile for InMemSeriesFile {
    fn create_series_list_if_not_exists(&self, names: &[Bytes], tags: &[Tags]) -> Result<Vec<u64>> {
        assert_eq!(names.len(), tags.len());
        let mut by_key = self.by_key.lock();
        let mut ids = Vec::with_capacity(names.len());
        for (name, tag_set) in names.iter().zip(tags.iter()) {
            let key = series_key(name, tag_set);
            let id = *by_key
                .entry(key)
                .or_insert_with(|| self.next_id.fetch_add(1, Ordering::Relaxed));
            ids.push(id);
        }
        Ok(ids)
    }
}

/// The series-key encoding this crate uses wherever it needs to derive an
/// identity from a name/tag pair itself (the stand-in series file, and
/// `SharedIndex`'s own existing-series lookup). The real series file's
/// on-disk encoding is opaque to this crate; this one only has to be
/// internally consistent.
pub fn series_key(name: &Bytes, tags: &Tags) -> Bytes {
    let mut buf = Vec::with_capacity(name.len() + 8 * tags.len());
    buf.extend_from_slice(name);
    for tag in tags.iter() {
        buf.push(0);
        buf.extend_from_slice(&tag.key);
        buf.push(0);
        buf.extend_from_slice(&tag.value);
    }
    Bytes::from(buf)
}
