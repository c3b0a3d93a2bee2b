pub mod collab;
pub mod core;
pub mod index;
pub mod metric;
pub mod predicate;
pub mod registry;
pub mod series;
pub mod tagset;

pub use core::config::Config;
pub use core::error::{Error, ErrorKind, Result};
pub use core::types::{MetricId, SeriesId};
pub use index::{CardinalitySketch, PartialWriteError, SeriesIdSet, ShardIndex, SharedIndex};
pub use metric::Metric;
pub use registry::IndexRegistry;
pub use series::{Series, Tag, Tags};

/*
┌────────────────────────────────────────────────────────────────────────────┐
│                     IN-MEMORY METADATA INDEX ARCHITECTURE                 │
└────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── index::shared ─────────────────────────────┐
│                                                                              │
│  struct SharedIndex                                                        │
│    metrics: RwLock<MetricTable>         // MetricId slab + name index      │
│    series_index: RwLock<HashMap<key, (SeriesId, MetricId)>>                │
│    live_series / tombstoned_series: Mutex<CardinalitySketch>               │
│    live_metrics / tombstoned_metrics: Mutex<CardinalitySketch>             │
│    rebuild_lock: Mutex<()>              // serializes rebuilds only        │
│    series_file: Arc<dyn SeriesFile>                                        │
│                                                                              │
│  create_series_list_if_not_exists / drop_series_global / drop_metric /     │
│  drop_metric_if_series_not_exist / rebuild / metric_names_by_expr          │
└──────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── index::shard ──────────────────────────────┐
│  struct ShardIndex                                                         │
│    shared: Arc<SharedIndex>                                               │
│    live: SeriesIdSet                    // this shard's series overlay    │
│    metric_refcount: Mutex<HashMap<name, u64>>                             │
│    config: Config                                                         │
│                                                                              │
│  create_series_list_if_not_exists (admission + max-values-per-tag) /       │
│  drop_series / drop_metric_if_series_not_exist / tag_sets / series_n      │
└──────────────────────────────────────────────────────────────────────────────┘

┌───────────────────── metric::Metric ─────┐  ┌── series::Series ──────────┐
│ tag_index: key -> value -> [SeriesId]    │  │ id, key, metric_id, tags   │
│ series_by_id: SeriesId -> Series         │  │ deleted: AtomicBool        │
│ auth_cache: LruCache<SeriesId, bool>     │  └────────────────────────────┘
└───────────────────────────────────────────┘

┌────────────────── predicate::compiler ───┐  ┌── tagset::TagSetGrouper ───┐
│ walk_where_for_series_ids                │  │ compile condition, filter  │
│ metric_names_by_expr                     │  │ by shard overlay, project  │
│ (tag filters, negation/auth truth table) │  │ dimensions, group, sort    │
└───────────────────────────────────────────┘  └────────────────────────────┘

┌────────────────── collab ────────────────┐  ┌── index::sketch ───────────┐
│ trait SeriesFile (external collaborator) │  │ CardinalitySketch (HLL)    │
│ trait Authorizer                         │  │ add / cardinality / merge  │
│ SeriesIdIterator / TagKeyIterator / ...  │  └────────────────────────────┘
└───────────────────────────────────────────┘

registry::IndexRegistry maps index-type names ("inmem") to SharedIndex/
ShardIndex constructors. Built explicitly by the embedding application —
no lazily-initialized global state.
*/
