use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;

use crate::core::types::{MetricId, SeriesId};
use crate::series::tags::Tags;

/// A series' identity: a stable id, its opaque series-file key, the metric
/// it belongs to (by id, never by reference), and its tag vector. The
/// index treats `key` as opaque; deriving or validating the
/// `metric\0k1\0v1\0...` encoding is the series file's job.
#[derive(Debug)]
pub struct Series {
    pub id: SeriesId,
    pub key: Bytes,
    pub metric_id: MetricId,
    pub tags: Tags,
    deleted: AtomicBool,
}

impl Series {
    pub fn new(id: SeriesId, key: Bytes, metric_id: MetricId, tags: Tags) -> Self {
        Series { id, key, metric_id, tags, deleted: AtomicBool::new(false) }
    }

    pub fn delete(&self) {
        self.deleted.store(true, Ordering::Release);
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }
}

impl Clone for Series {
    fn clone(&self) -> Self {
        Series {
            id: self.id,
            key: self.key.clone(),
            metric_id: self.metric_id,
            tags: self.tags.clone(),
            deleted: AtomicBool::new(self.is_deleted()),
        }
    }
}
