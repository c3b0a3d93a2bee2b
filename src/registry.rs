use std::collections::HashMap;
use std::sync::Arc;

use crate::collab::series_file::SeriesFile;
use crate::core::config::Config;
use crate::index::shard::ShardIndex;
use crate::index::shared::SharedIndex;

pub type SharedIndexFactory = Box<dyn Fn(&str, Arc<dyn SeriesFile>) -> Arc<SharedIndex> + Send + Sync>;
pub type ShardIndexFactory = Box<dyn Fn(u64, Arc<SharedIndex>, Config) -> ShardIndex + Send + Sync>;

/// An explicit, application-owned registry of index-type constructors.
/// Deliberately not a lazily-initialized global: the embedding application
/// constructs one and registers the types it needs, so index-type
/// availability never depends on module initialization order.
#[derive(Default)]
pub struct IndexRegistry {
    shared_factories: HashMap<String, SharedIndexFactory>,
    shard_factories: HashMap<String, ShardIndexFactory>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        IndexRegistry { shared_factories: HashMap::new(), shard_factories: HashMap::new() }
    }

    /// Registers the single index type this crate implements under the
    /// conventional `"inmem"` name.
    pub fn with_inmem_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            "inmem",
            Box::new(|db, sf| Arc::new(SharedIndex::new(db, sf))),
            Box::new(|shard_id, shared, config| ShardIndex::new(shard_id, shared, config)),
        );
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        shared_factory: SharedIndexFactory,
        shard_factory: ShardIndexFactory,
    ) {
        let name = name.into();
        self.shared_factories.insert(name.clone(), shared_factory);
        self.shard_factories.insert(name, shard_factory);
    }

    pub fn new_shared_index(
        &self,
        name: &str,
        database: &str,
        series_file: Arc<dyn SeriesFile>,
    ) -> Option<Arc<SharedIndex>> {
        self.shared_factories.get(name).map(|f| f(database, series_file))
    }

    pub fn new_shard_index(
        &self,
        name: &str,
        shard_id: u64,
        shared: Arc<SharedIndex>,
        config: Config,
    ) -> Option<ShardIndex> {
        self.shard_factories.get(name).map(|f| f(shard_id, shared, config))
    }
}
