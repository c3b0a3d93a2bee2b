use parking_lot::{Mutex, MutexGuard};
use roaring::RoaringTreemap;

/// Thread-safe compressed ordered set of series ids, backed by a
/// `RoaringTreemap` (64-bit ids) behind a `parking_lot::Mutex`. `_no_lock`
/// variants take a guard the caller already holds so a shard overlay can
/// batch a bitset update together with a refcount update under one
/// critical section.
#[derive(Debug, Default)]
pub struct SeriesIdSet {
    bitmap: Mutex<RoaringTreemap>,
}

impl SeriesIdSet {
    pub fn new() -> Self {
        SeriesIdSet { bitmap: Mutex::new(RoaringTreemap::new()) }
    }

    pub fn lock(&self) -> MutexGuard<'_, RoaringTreemap> {
        self.bitmap.lock()
    }

    pub fn add(&self, id: u64) -> bool {
        self.bitmap.lock().insert(id)
    }

    pub fn add_no_lock(bitmap: &mut RoaringTreemap, id: u64) -> bool {
        bitmap.insert(id)
    }

    pub fn remove(&self, id: u64) -> bool {
        self.bitmap.lock().remove(id)
    }

    pub fn remove_no_lock(bitmap: &mut RoaringTreemap, id: u64) -> bool {
        bitmap.remove(id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.bitmap.lock().contains(id)
    }

    pub fn contains_no_lock(bitmap: &RoaringTreemap, id: u64) -> bool {
        bitmap.contains(id)
    }

    pub fn cardinality(&self) -> u64 {
        self.bitmap.lock().len()
    }

    pub fn union(&self, other: &SeriesIdSet) {
        let other_bm = other.bitmap.lock().clone();
        *self.bitmap.lock() |= other_bm;
    }

    pub fn intersect(&self, other: &SeriesIdSet) {
        let other_bm = other.bitmap.lock().clone();
        *self.bitmap.lock() &= other_bm;
    }

    pub fn difference(&self, other: &SeriesIdSet) {
        let other_bm = other.bitmap.lock().clone();
        *self.bitmap.lock() -= other_bm;
    }

    /// Sorted snapshot of the set's contents.
    pub fn snapshot(&self) -> Vec<u64> {
        self.bitmap.lock().iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> {
        self.snapshot().into_iter()
    }

    pub fn bytes(&self) -> usize {
        self.bitmap.lock().serialized_size()
    }
}
