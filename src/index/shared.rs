use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};

use crate::collab::authorizer::Authorizer;
use crate::collab::series_file::{series_key, SeriesFile};
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::{MetricId, SeriesId};
use crate::index::sketch::CardinalitySketch;
use crate::metric::metric::Metric;
use crate::predicate::expr::Expr;
use crate::series::series::Series;
use crate::series::tags::Tags;

/// Slab of metrics addressed by stable `MetricId`, so a `Series.metric_id`
/// stays valid across a `rebuild()` swap of the `Metric` it points at.
#[derive(Default)]
struct MetricTable {
    slab: Vec<Option<Arc<Metric>>>,
    by_name: HashMap<Bytes, MetricId>,
}

impl MetricTable {
    fn id_by_name(&self, name: &[u8]) -> Option<MetricId> {
        self.by_name.get(name).copied()
    }

    fn get(&self, id: MetricId) -> Option<Arc<Metric>> {
        self.slab.get(id.value() as usize).and_then(|s| s.clone())
    }

    fn insert_new(&mut self, name: Bytes) -> MetricId {
        let id = MetricId(self.slab.len() as u32);
        self.slab.push(Some(Arc::new(Metric::new(id, name.clone()))));
        self.by_name.insert(name, id);
        id
    }

    fn all(&self) -> impl Iterator<Item = &Arc<Metric>> {
        self.slab.iter().filter_map(|s| s.as_ref())
    }

    fn swap(&mut self, id: MetricId, new_metric: Arc<Metric>) {
        if let Some(slot) = self.slab.get_mut(id.value() as usize) {
            *slot = Some(new_metric);
        }
    }

    fn remove_name(&mut self, id: MetricId, name: &[u8]) {
        if let Some(slot) = self.slab.get_mut(id.value() as usize) {
            *slot = None;
        }
        self.by_name.remove(name);
    }
}

/// The database-wide shared metadata index: metric/series tables plus the
/// live/tombstoned cardinality sketches. Protected by one `RwLock` for the
/// metric table and one for the series-key index, plus a dedicated
/// `rebuild_lock` that only serializes rebuilds against each other, never
/// against ordinary readers.
pub struct SharedIndex {
    database: String,
    metrics: RwLock<MetricTable>,
    series_index: RwLock<HashMap<Bytes, (SeriesId, MetricId)>>,
    live_series: Mutex<CardinalitySketch>,
    tombstoned_series: Mutex<CardinalitySketch>,
    live_metrics: Mutex<CardinalitySketch>,
    tombstoned_metrics: Mutex<CardinalitySketch>,
    rebuild_lock: Mutex<()>,
    series_file: Arc<dyn SeriesFile>,
}

impl SharedIndex {
    pub fn new(database: impl Into<String>, series_file: Arc<dyn SeriesFile>) -> Self {
        SharedIndex {
            database: database.into(),
            metrics: RwLock::new(MetricTable::default()),
            series_index: RwLock::new(HashMap::new()),
            live_series: Mutex::new(CardinalitySketch::new()),
            tombstoned_series: Mutex::new(CardinalitySketch::new()),
            live_metrics: Mutex::new(CardinalitySketch::new()),
            tombstoned_metrics: Mutex::new(CardinalitySketch::new()),
            rebuild_lock: Mutex::new(()),
            series_file,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn series_count(&self) -> usize {
        self.series_index.read().len()
    }

    pub fn metric_by_id(&self, id: MetricId) -> Option<Arc<Metric>> {
        self.metrics.read().get(id)
    }

    pub fn metric_by_name(&self, name: &[u8]) -> Option<Arc<Metric>> {
        let metrics = self.metrics.read();
        let id = metrics.id_by_name(name)?;
        metrics.get(id)
    }

    pub fn metric_id_by_name(&self, name: &[u8]) -> Option<MetricId> {
        self.metrics.read().id_by_name(name)
    }

    pub fn metric_names(&self) -> Vec<Bytes> {
        let metrics = self.metrics.read();
        let mut names: Vec<Bytes> =
            metrics.all().filter(|m| !m.is_deleted()).map(|m| m.name.clone()).collect();
        names.sort();
        names
    }

    fn create_metric_index_if_not_exists(&self, name: &Bytes) -> MetricId {
        {
            let metrics = self.metrics.read();
            if let Some(id) = metrics.id_by_name(name) {
                return id;
            }
        }
        let mut metrics = self.metrics.write();
        if let Some(id) = metrics.id_by_name(name) {
            return id;
        }
        let id = metrics.insert_new(name.clone());
        self.live_metrics.lock().add(name);
        debug!("created metric index for {:?}", name);
        id
    }

    /// 1. Pre-flight max-series check under no write lock (an
    ///    intentionally preserved unlocked window — see the design notes
    ///    on the admission overshoot race). 2. Ask the series file for
    ///    ids. 3. Re-check which are already known. 4. Ensure each new
    ///    series' metric exists (double-checked locking). 5. Re-check
    ///    under the write lock for races, then insert.
    pub fn create_series_list_if_not_exists(
        &self,
        names: &[Bytes],
        tags: &[Tags],
        config: &Config,
        ignore_limits: bool,
    ) -> Result<Vec<SeriesId>> {
        if !ignore_limits && config.max_series_per_database > 0 {
            let n = self.series_count() as u64;
            if n + names.len() as u64 > config.max_series_per_database {
                warn!(
                    "database {:?} rejected series creation: {} series already present + {} in batch, limit {}",
                    self.database, n, names.len(), config.max_series_per_database
                );
                return Err(Error::max_series_exceeded(config.max_series_per_database));
            }
        }

        let raw_ids = self.series_file.create_series_list_if_not_exists(names, tags)?;
        let mut result = vec![SeriesId(0); raw_ids.len()];
        let mut new_indices = Vec::new();

        {
            let series_index = self.series_index.read();
            for (i, raw_id) in raw_ids.iter().enumerate() {
                let key = series_key(&names[i], &tags[i]);
                if let Some((existing_id, _)) = series_index.get(&key) {
                    result[i] = *existing_id;
                } else {
                    result[i] = SeriesId(*raw_id);
                    new_indices.push(i);
                }
            }
        }

        for i in new_indices {
            let metric_id = self.create_metric_index_if_not_exists(&names[i]);
            let key = series_key(&names[i], &tags[i]);
            let sid = result[i];

            let already_present = {
                let mut series_index = self.series_index.write();
                match series_index.get(&key) {
                    Some((existing_id, _)) => {
                        result[i] = *existing_id;
                        true
                    }
                    None => {
                        series_index.insert(key.clone(), (sid, metric_id));
                        false
                    }
                }
            };
            if already_present {
                continue;
            }

            if let Some(metric) = self.metrics.read().get(metric_id) {
                metric.add_series(Series::new(sid, key, metric_id, tags[i].clone()));
            }
            self.live_series.lock().add(&sid.value().to_le_bytes());
        }

        Ok(result)
    }

    pub fn drop_series_global(&self, key: &[u8]) -> Result<()> {
        let entry = { self.series_index.write().remove(key) };
        let Some((id, metric_id)) = entry else { return Ok(()) };

        self.tombstoned_series.lock().add(key);
        let metric = self.metrics.read().get(metric_id);
        if let Some(metric) = metric {
            metric.drop_series(id);
            if metric.cardinality() == 0 {
                self.drop_metric(metric_id);
            }
        }
        Ok(())
    }

    pub fn drop_metric(&self, id: MetricId) {
        let name = {
            let Some(metric) = self.metrics.read().get(id) else { return };
            metric.name.clone()
        };
        self.tombstoned_metrics.lock().add(&name);
        let mut metrics = self.metrics.write();
        if let Some(metric) = metrics.get(id) {
            for sid in metric.series_ids() {
                let key = metric.series_keys_by_id(&[sid]);
                if let Some(k) = key.first() {
                    self.series_index.write().remove(k);
                    self.tombstoned_series.lock().add(k);
                }
            }
        }
        metrics.remove_name(id, &name);
        debug!("dropped metric {:?}", name);
    }

    pub fn drop_metric_if_series_not_exist(&self, name: &[u8]) {
        if let Some(metric) = self.metric_by_name(name) {
            if metric.cardinality() == 0 {
                self.drop_metric(metric.id);
            }
        }
    }

    /// Rebuilds each metric sequentially, holding `rebuild_lock` for the
    /// whole operation but only the metric table's write lock for each
    /// individual per-metric swap — readers of metrics not currently being
    /// rebuilt are never blocked.
    pub fn rebuild(&self) {
        let _guard = self.rebuild_lock.lock();
        let names: Vec<Bytes> = self.metric_names();
        debug!("rebuild starting for {} metrics", names.len());
        for name in &names {
            let id = match self.metrics.read().id_by_name(name) {
                Some(id) => id,
                None => continue,
            };
            let rebuilt = {
                let metrics = self.metrics.read();
                metrics.get(id).map(|m| m.rebuild())
            };
            if let Some(rebuilt) = rebuilt {
                let mut metrics = self.metrics.write();
                metrics.swap(id, Arc::new(rebuilt));
            }
        }
        debug!("rebuild finished for {} metrics", names.len());
    }

    pub fn metric_names_by_expr(
        &self,
        expr: &Expr,
        auth: Option<&dyn Authorizer>,
    ) -> Result<Vec<Bytes>> {
        let metrics = self.metrics.read();
        let refs: Vec<&Metric> = metrics.all().map(|m| m.as_ref()).collect();
        crate::predicate::compiler::metric_names_by_expr(&refs, expr, &self.database, auth)
    }

    pub fn live_series_cardinality(&self) -> u64 {
        self.live_series.lock().cardinality()
    }

    pub fn tombstoned_series_cardinality(&self) -> u64 {
        self.tombstoned_series.lock().cardinality()
    }

    pub fn live_metrics_cardinality(&self) -> u64 {
        self.live_metrics.lock().cardinality()
    }

    /// Approximate in-memory footprint, mirroring the series/metric
    /// sketches' own `bytes()` accounting.
    pub fn bytes(&self) -> usize {
        let metrics = self.metrics.read();
        let metric_bytes: usize = metrics.all().map(|m| m.bytes()).sum();
        metric_bytes
            + self.series_index.read().len() * 64
            + self.live_series.lock().bytes()
            + self.tombstoned_series.lock().bytes()
            + self.live_metrics.lock().bytes()
            + self.tombstoned_metrics.lock().bytes()
    }
}
