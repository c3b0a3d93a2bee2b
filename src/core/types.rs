/// Stable per-process identifier for a series, assigned by the series file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesId(pub u64);

impl SeriesId {
    pub fn new(id: u64) -> Self {
        SeriesId(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for SeriesId {
    fn from(id: u64) -> Self {
        SeriesId(id)
    }
}

/// Stable per-process index into a `MetricTable` slab. Never an owning
/// reference: series point back to metrics through this id so the two
/// never form a reference cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetricId(pub u32);

impl MetricId {
    pub fn new(id: u32) -> Self {
        MetricId(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

/// Reserved tag key carrying a series' metric name, mirrored from the
/// underlying series-key encoding. Never present in a `Tags` value.
pub const RESERVED_METRIC_KEY: &[u8] = b"_name";

pub fn is_reserved_key(key: &[u8]) -> bool {
    key.first() == Some(&b'_')
}
