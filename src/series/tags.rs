use bytes::Bytes;

/// A single key/value tag pair. Cloning is an `O(1)` refcount bump since
/// both fields are `Bytes`, not owned allocations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tag {
    pub key: Bytes,
    pub value: Bytes,
}

impl Tag {
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Tag { key: key.into(), value: value.into() }
    }
}

/// A series' tag vector: sorted by key, unique keys. Distinct from the
/// tag-set grouper's output, which this crate names `tagset::TagSet`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(Vec<Tag>);

impl Tags {
    pub fn new() -> Self {
        Tags(Vec::new())
    }

    /// Sorts by key and asserts uniqueness in debug builds.
    pub fn from_pairs(mut pairs: Vec<Tag>) -> Self {
        pairs.sort_by(|a, b| a.key.cmp(&b.key));
        debug_assert!(
            pairs.windows(2).all(|w| w[0].key != w[1].key),
            "duplicate tag key in series tag set"
        );
        Tags(pairs)
    }

    pub fn get(&self, key: &[u8]) -> Option<&Bytes> {
        self.0
            .binary_search_by(|t| t.key.as_ref().cmp(key))
            .ok()
            .map(|i| &self.0[i].value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Tag] {
        &self.0
    }
}
