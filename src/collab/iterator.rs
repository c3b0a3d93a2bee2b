use bytes::Bytes;

use crate::core::types::SeriesId;

/// Tracks how many items a snapshot-then-iterate iterator actually
/// produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct IteratorStats {
    pub items_seen: usize,
}

/// Snapshot-then-iterate over a fixed list of series ids, taken under
/// whatever lock produced it; iterating itself never touches that lock.
pub struct SeriesIdIterator {
    items: std::vec::IntoIter<SeriesId>,
    stats: IteratorStats,
    closed: bool,
}

impl SeriesIdIterator {
    pub fn new(ids: Vec<SeriesId>) -> Self {
        SeriesIdIterator { items: ids.into_iter(), stats: IteratorStats::default(), closed: false }
    }

    pub fn next(&mut self) -> Option<SeriesId> {
        if self.closed {
            return None;
        }
        let item = self.items.next();
        if item.is_some() {
            self.stats.items_seen += 1;
        }
        item
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn stats(&self) -> IteratorStats {
        self.stats
    }
}

macro_rules! snapshot_iterator {
    ($name:ident, $item:ty) => {
        pub struct $name {
            items: std::vec::IntoIter<$item>,
            stats: IteratorStats,
            closed: bool,
        }

        impl $name {
            pub fn new(items: Vec<$item>) -> Self {
                $name { items: items.into_iter(), stats: IteratorStats::default(), closed: false }
            }

            pub fn next(&mut self) -> Option<$item> {
                if self.closed {
                    return None;
                }
                let item = self.items.next();
                if item.is_some() {
                    self.stats.items_seen += 1;
                }
                item
            }

            pub fn close(&mut self) {
                self.closed = true;
            }

            pub fn stats(&self) -> IteratorStats {
                self.stats
            }
        }
    };
}

snapshot_iterator!(TagKeyIterator, Bytes);
snapshot_iterator!(TagValueIterator, Bytes);
snapshot_iterator!(MetricIterator, Bytes);
