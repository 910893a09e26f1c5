//! Generation-swapped cluster storage.
//!
//! The visible cluster set is an immutable [`ClusterSnapshot`] behind an
//! `Arc`. A commit clones the snapshot's date map (cheap, every date entry is
//! itself an `Arc`), installs the new date generation and swaps the pointer.
//! Readers holding the previous snapshot keep a complete, consistent view.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use floodgrid_metrics::metric_defs;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Cluster;
use crate::Result;

/// Atomic replace-by-scope storage of finalized clusters.
pub trait ClusterStore: Send + Sync {
    /// Replace the clusters of `batch.date` in `batch.zoom_levels` with `batch.levels`.
    ///
    /// Returns the generation id assigned to the date, or `None` when the
    /// result is empty and the date was removed. Readers never observe a
    /// partially applied batch.
    fn commit(&self, batch: GenerationBatch) -> Result<Option<u64>>;

    /// The currently visible cluster set.
    fn snapshot(&self) -> Arc<ClusterSnapshot>;

    /// Remove every cluster of `date`. Returns whether the date had a generation.
    fn purge_date(&self, date: NaiveDate) -> Result<bool>;
}

/// A complete replacement for one date's clusters over a zoom range.
#[derive(Debug, Clone)]
pub struct GenerationBatch {
    pub date: NaiveDate,
    pub zoom_levels: RangeInclusive<u8>,
    /// Clusters per zoom level. Levels in range but absent here become empty.
    pub levels: BTreeMap<u8, Vec<Cluster>>,
}

/// The committed clusters of one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateGeneration {
    pub generation: u64,
    pub committed_at: DateTime<Utc>,
    /// Clusters per zoom level, each level sorted by geohash.
    pub levels: BTreeMap<u8, Vec<Cluster>>,
}

impl DateGeneration {
    pub fn level(&self, zoom_level: u8) -> &[Cluster] {
        self.levels.get(&zoom_level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Clusters at `zoom_level` whose geohash starts with `prefix`.
    pub fn level_with_prefix(&self, zoom_level: u8, prefix: &str) -> &[Cluster] {
        let level = self.level(zoom_level);
        let start = level.partition_point(|c| c.geohash.as_str() < prefix);
        let len = level[start..].partition_point(|c| c.geohash.starts_with(prefix));
        &level[start..start + len]
    }

    pub fn cluster_count(&self) -> usize {
        self.levels.values().map(Vec::len).sum()
    }
}

/// Immutable view of every committed date generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub dates: BTreeMap<NaiveDate, Arc<DateGeneration>>,
}

impl ClusterSnapshot {
    fn selected(&self, date: Option<NaiveDate>) -> impl Iterator<Item = &Arc<DateGeneration>> + '_ {
        self.dates
            .iter()
            .filter(move |(d, _)| date.map_or(true, |wanted| **d == wanted))
            .map(|(_, generation)| generation)
    }

    /// Clusters at `zoom_level`, optionally restricted to one date, ordered by date then geohash.
    pub fn clusters(&self, zoom_level: u8, date: Option<NaiveDate>) -> impl Iterator<Item = &Cluster> + '_ {
        self.selected(date)
            .flat_map(move |generation| generation.level(zoom_level).iter())
    }

    /// Clusters at `zoom_level` whose geohash starts with `prefix`.
    pub fn clusters_with_prefix<'a>(
        &'a self,
        zoom_level: u8,
        prefix: &'a str,
        date: Option<NaiveDate>,
    ) -> impl Iterator<Item = &'a Cluster> + 'a {
        self.selected(date)
            .flat_map(move |generation| generation.level_with_prefix(zoom_level, prefix).iter())
    }

    /// Every stored cluster.
    pub fn all_clusters(&self) -> impl Iterator<Item = &Cluster> + '_ {
        self.dates
            .values()
            .flat_map(|generation| generation.levels.values().flatten())
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.dates.keys().copied().collect()
    }

    pub fn generation(&self, date: NaiveDate) -> Option<&Arc<DateGeneration>> {
        self.dates.get(&date)
    }

    pub fn cluster_count(&self) -> usize {
        self.dates.values().map(|g| g.cluster_count()).sum()
    }

    /// Highest generation id present, or zero for an empty snapshot.
    pub fn max_generation(&self) -> u64 {
        self.dates.values().map(|g| g.generation).max().unwrap_or(0)
    }
}

/// In-memory [`ClusterStore`] that swaps whole snapshots.
#[derive(Debug)]
pub struct GenerationStore {
    current: RwLock<Arc<ClusterSnapshot>>,
    commit_lock: Mutex<()>,
    last_generation: AtomicU64,
}

impl Default for GenerationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationStore {
    pub fn new() -> Self {
        Self::from_snapshot(ClusterSnapshot::default())
    }

    /// Resume from a previously saved snapshot. New generation ids continue after its highest.
    ///
    /// Levels are re-sorted by geohash, since prefix lookups depend on that order
    /// and a snapshot file may have been produced elsewhere.
    pub fn from_snapshot(mut snapshot: ClusterSnapshot) -> Self {
        for generation in snapshot.dates.values_mut() {
            let unsorted = generation
                .levels
                .values()
                .any(|level| !level.windows(2).all(|w| w[0].geohash <= w[1].geohash));
            if unsorted {
                for level in Arc::make_mut(generation).levels.values_mut() {
                    level.sort_by(|a, b| a.geohash.cmp(&b.geohash));
                }
            }
        }
        let last = snapshot.max_generation();
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            commit_lock: Mutex::new(()),
            last_generation: AtomicU64::new(last),
        }
    }

    fn install(&self, next: ClusterSnapshot) {
        metrics::gauge!(metric_defs::GENERATION_DATES.name).set(next.dates.len() as f64);
        *self.current.write() = Arc::new(next);
    }
}

impl ClusterStore for GenerationStore {
    fn commit(&self, batch: GenerationBatch) -> Result<Option<u64>> {
        let _guard = self.commit_lock.lock();

        let mut next = (**self.current.read()).clone();
        let mut levels: BTreeMap<u8, Vec<Cluster>> = next
            .dates
            .get(&batch.date)
            .map(|existing| {
                existing
                    .levels
                    .iter()
                    .filter(|(zoom, _)| !batch.zoom_levels.contains(*zoom))
                    .map(|(zoom, clusters)| (*zoom, clusters.clone()))
                    .collect()
            })
            .unwrap_or_default();

        for (zoom, mut clusters) in batch.levels {
            if !batch.zoom_levels.contains(&zoom) || clusters.is_empty() {
                continue;
            }
            clusters.sort_by(|a, b| a.geohash.cmp(&b.geohash));
            levels.insert(zoom, clusters);
        }

        if levels.is_empty() {
            if next.dates.remove(&batch.date).is_some() {
                self.install(next);
                debug!(date = %batch.date, "Removed date with no clusters");
            }
            return Ok(None);
        }

        let generation = self.last_generation.fetch_add(1, Ordering::SeqCst) + 1;
        next.dates.insert(
            batch.date,
            Arc::new(DateGeneration {
                generation,
                committed_at: Utc::now(),
                levels,
            }),
        );
        self.install(next);
        debug!(date = %batch.date, generation, "Swapped in new generation");
        Ok(Some(generation))
    }

    fn snapshot(&self) -> Arc<ClusterSnapshot> {
        Arc::clone(&self.current.read())
    }

    fn purge_date(&self, date: NaiveDate) -> Result<bool> {
        let _guard = self.commit_lock.lock();
        let mut next = (**self.current.read()).clone();
        if next.dates.remove(&date).is_none() {
            return Ok(false);
        }
        self.install(next);
        debug!(date = %date, "Purged date generation");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RiskLevel;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn cluster(date: NaiveDate, zoom_level: u8, geohash: &str) -> Cluster {
        Cluster {
            zoom_level,
            geohash: geohash.to_string(),
            center_lat: 0.0,
            center_lon: 0.0,
            date,
            point_count: 1,
            avg_forecast: 0.5,
            max_forecast: 0.5,
            min_forecast: 0.5,
            risk_level: RiskLevel::Low,
        }
    }

    fn batch(date: NaiveDate, zooms: RangeInclusive<u8>, levels: Vec<(u8, Vec<&str>)>) -> GenerationBatch {
        GenerationBatch {
            date,
            zoom_levels: zooms,
            levels: levels
                .into_iter()
                .map(|(zoom, hashes)| (zoom, hashes.into_iter().map(|h| cluster(date, zoom, h)).collect()))
                .collect(),
        }
    }

    #[test]
    fn test_commit_replaces_scope() {
        let store = GenerationStore::new();
        store
            .commit(batch(day(1), 0..=1, vec![(0, vec!["s", "v"]), (1, vec!["s0"])]))
            .unwrap();
        store.commit(batch(day(1), 0..=1, vec![(0, vec!["u"])])).unwrap();

        let snapshot = store.snapshot();
        let zoom0: Vec<&str> = snapshot.clusters(0, Some(day(1))).map(|c| c.geohash.as_str()).collect();
        assert_eq!(zoom0, vec!["u"]);
        assert_eq!(snapshot.clusters(1, Some(day(1))).count(), 0);
    }

    #[test]
    fn test_commit_keeps_levels_outside_range() {
        let store = GenerationStore::new();
        store
            .commit(batch(day(1), 0..=2, vec![(0, vec!["s"]), (2, vec!["s00"])]))
            .unwrap();
        store.commit(batch(day(1), 0..=1, vec![(0, vec!["v"])])).unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.clusters(2, None).count(), 1);
        assert_eq!(snapshot.clusters(0, None).next().unwrap().geohash, "v");
    }

    #[test]
    fn test_generation_ids_increase() {
        let store = GenerationStore::new();
        let first = store.commit(batch(day(1), 0..=0, vec![(0, vec!["s"])])).unwrap();
        let second = store.commit(batch(day(2), 0..=0, vec![(0, vec!["s"])])).unwrap();
        assert!(second > first);

        let snapshot = store.snapshot();
        assert_eq!(Some(snapshot.generation(day(2)).unwrap().generation), second);
        assert_eq!(Some(snapshot.max_generation()), second);

        let resumed = GenerationStore::from_snapshot((*snapshot).clone());
        let third = resumed.commit(batch(day(3), 0..=0, vec![(0, vec!["s"])])).unwrap();
        assert!(third > second);
    }

    #[test]
    fn test_old_snapshot_unchanged_after_commit() {
        let store = GenerationStore::new();
        store.commit(batch(day(1), 0..=0, vec![(0, vec!["s"])])).unwrap();
        let before = store.snapshot();

        store.commit(batch(day(1), 0..=0, vec![(0, vec!["u", "v"])])).unwrap();

        assert_eq!(before.cluster_count(), 1);
        assert_eq!(store.snapshot().cluster_count(), 2);
    }

    #[test]
    fn test_empty_commit_removes_date() {
        let store = GenerationStore::new();
        let first = store.commit(batch(day(1), 0..=0, vec![(0, vec!["s"])])).unwrap();
        assert_eq!(store.commit(batch(day(1), 0..=0, vec![])).unwrap(), None);
        assert!(store.snapshot().dates().is_empty());

        // The empty commit consumed no id
        let next = store.commit(batch(day(2), 0..=0, vec![(0, vec!["s"])])).unwrap();
        assert_eq!(next, first.map(|g| g + 1));
    }

    #[test]
    fn test_purge_date() {
        let store = GenerationStore::new();
        store.commit(batch(day(1), 0..=0, vec![(0, vec!["s"])])).unwrap();
        store.commit(batch(day(2), 0..=0, vec![(0, vec!["s"])])).unwrap();

        assert!(store.purge_date(day(1)).unwrap());
        assert!(!store.purge_date(day(1)).unwrap());
        assert_eq!(store.snapshot().dates(), vec![day(2)]);
    }

    #[test]
    fn test_prefix_lookup() {
        let store = GenerationStore::new();
        store
            .commit(batch(day(1), 1..=1, vec![(1, vec!["u0", "s1", "sz", "s0", "t0"])]))
            .unwrap();
        let snapshot = store.snapshot();

        let hashes: Vec<&str> = snapshot
            .clusters_with_prefix(1, "s", None)
            .map(|c| c.geohash.as_str())
            .collect();
        assert_eq!(hashes, vec!["s0", "s1", "sz"]);
        assert_eq!(snapshot.clusters_with_prefix(1, "v", None).count(), 0);
    }

    #[test]
    fn test_prefix_lookup_on_unsorted_snapshot_file() {
        let json = r#"{"dates": {"2025-01-01": {
            "generation": 4,
            "committed_at": "2025-01-01T00:00:00Z",
            "levels": {"1": [
                {"zoom_level": 1, "geohash": "t0", "center_lat": 0.0, "center_lon": 0.0, "date": "2025-01-01",
                 "point_count": 1, "avg_forecast": 0.5, "max_forecast": 0.5, "min_forecast": 0.5, "risk_level": "low"},
                {"zoom_level": 1, "geohash": "s1", "center_lat": 0.0, "center_lon": 0.0, "date": "2025-01-01",
                 "point_count": 1, "avg_forecast": 0.5, "max_forecast": 0.5, "min_forecast": 0.5, "risk_level": "low"},
                {"zoom_level": 1, "geohash": "u0", "center_lat": 0.0, "center_lon": 0.0, "date": "2025-01-01",
                 "point_count": 1, "avg_forecast": 0.5, "max_forecast": 0.5, "min_forecast": 0.5, "risk_level": "low"},
                {"zoom_level": 1, "geohash": "s0", "center_lat": 0.0, "center_lon": 0.0, "date": "2025-01-01",
                 "point_count": 1, "avg_forecast": 0.5, "max_forecast": 0.5, "min_forecast": 0.5, "risk_level": "low"}
            ]}
        }}}"#;
        let snapshot: ClusterSnapshot = serde_json::from_str(json).unwrap();
        let store = GenerationStore::from_snapshot(snapshot);

        let snapshot = store.snapshot();
        let hashes: Vec<&str> = snapshot
            .clusters_with_prefix(1, "s", None)
            .map(|c| c.geohash.as_str())
            .collect();
        assert_eq!(hashes, vec!["s0", "s1"]);
        assert_eq!(snapshot.max_generation(), 4);
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let store = GenerationStore::new();
        store.commit(batch(day(1), 0..=1, vec![(0, vec!["s"]), (1, vec!["s0"])])).unwrap();
        let snapshot = store.snapshot();

        let json = serde_json::to_string(&*snapshot).unwrap();
        let restored: ClusterSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, *snapshot);
    }
}
