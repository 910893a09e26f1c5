//! Per-cell statistical aggregation of raw points.
//!
//! Points are folded into one [`ClusterAccumulator`] per `(date, geohash prefix)`
//! cell in a single pass. Large inputs are split into fixed-size shards that are
//! accumulated in parallel with rayon and merged afterwards in shard order, so the
//! floating-point sums (and therefore the output) are identical from run to run.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use floodgrid_geohash::encode;
use floodgrid_metrics::metric_defs;
use rayon::prelude::*;
use tracing::debug;

use crate::risk::RiskClassifier;
use crate::types::{Cluster, RawPoint, ReturnPeriodCounts};
use crate::zoom::ZoomPrecisionMap;
use crate::Result;

/// Default number of points per aggregation shard.
pub const DEFAULT_SHARD_SIZE: usize = 65_536;

/// Identifies one aggregation cell.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellKey {
    pub date: NaiveDate,
    pub geohash: String,
}

/// Running statistics for one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAccumulator {
    pub count: u64,
    pub sum_lat: f64,
    pub sum_lon: f64,
    pub sum_forecast: f64,
    pub min_forecast: f64,
    pub max_forecast: f64,
    pub return_periods: ReturnPeriodCounts,
}

impl Default for ClusterAccumulator {
    fn default() -> Self {
        Self {
            count: 0,
            sum_lat: 0.0,
            sum_lon: 0.0,
            sum_forecast: 0.0,
            min_forecast: f64::INFINITY,
            max_forecast: f64::NEG_INFINITY,
            return_periods: ReturnPeriodCounts::default(),
        }
    }
}

impl ClusterAccumulator {
    pub fn add(&mut self, point: &RawPoint) {
        self.count += 1;
        self.sum_lat += point.lat;
        self.sum_lon += point.lon;
        self.sum_forecast += point.forecast_value;
        self.min_forecast = self.min_forecast.min(point.forecast_value);
        self.max_forecast = self.max_forecast.max(point.forecast_value);
        self.return_periods.add(point.return_period);
    }

    /// Fold another accumulator for the same cell into this one.
    ///
    /// Exact for count, min, max and return-period counts. Sums are exact up to
    /// floating-point association.
    pub fn merge(&mut self, other: &ClusterAccumulator) {
        self.count += other.count;
        self.sum_lat += other.sum_lat;
        self.sum_lon += other.sum_lon;
        self.sum_forecast += other.sum_forecast;
        self.min_forecast = self.min_forecast.min(other.min_forecast);
        self.max_forecast = self.max_forecast.max(other.max_forecast);
        self.return_periods.merge(&other.return_periods);
    }

    /// Turn the accumulated statistics into a cluster. Returns `None` for an empty accumulator.
    pub fn finalize(
        &self,
        key: &CellKey,
        zoom_level: u8,
        classifier: &RiskClassifier,
    ) -> Option<Cluster> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        // Rounding in the sum can push the mean just outside [min, max].
        let avg_forecast = (self.sum_forecast / n).clamp(self.min_forecast, self.max_forecast);
        Some(Cluster {
            zoom_level,
            geohash: key.geohash.clone(),
            center_lat: self.sum_lat / n,
            center_lon: self.sum_lon / n,
            date: key.date,
            point_count: self.count,
            avg_forecast,
            max_forecast: self.max_forecast,
            min_forecast: self.min_forecast,
            risk_level: classifier.classify(self.max_forecast, &self.return_periods),
        })
    }
}

/// Points excluded from aggregation, by reason label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclusions(BTreeMap<&'static str, u64>);

impl Exclusions {
    pub fn record(&mut self, reason: &'static str) {
        *self.0.entry(reason).or_insert(0) += 1;
    }

    pub fn merge(&mut self, other: &Exclusions) {
        for (reason, count) in &other.0 {
            *self.0.entry(reason).or_insert(0) += count;
        }
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.0.iter().map(|(reason, count)| (*reason, *count))
    }

    /// Add these exclusions to the `floodgrid.points.excluded` counter.
    pub(crate) fn emit(&self) {
        for (reason, count) in self.iter() {
            metrics::counter!(metric_defs::POINTS_EXCLUDED.name, "reason" => reason).increment(count);
        }
    }
}

/// Accumulators for one shard of input.
#[derive(Debug, Clone, Default)]
pub struct PartialAggregate {
    pub cells: BTreeMap<CellKey, ClusterAccumulator>,
    pub exclusions: Exclusions,
}

impl PartialAggregate {
    pub fn merge(&mut self, other: PartialAggregate) {
        for (key, acc) in other.cells {
            self.cells.entry(key).or_default().merge(&acc);
        }
        self.exclusions.merge(&other.exclusions);
    }
}

/// A cell of a [`Partition`]: its statistics plus the indices of its member points.
#[derive(Debug, Clone, Default)]
pub struct PartitionCell {
    pub accumulator: ClusterAccumulator,
    pub members: Vec<usize>,
}

/// Points grouped by cell, keeping member indices so the next zoom level can
/// be built from each cell's points alone.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub cells: BTreeMap<CellKey, PartitionCell>,
    pub exclusions: Exclusions,
}

impl Partition {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn merge(&mut self, other: Partition) {
        for (key, cell) in other.cells {
            let entry = self.cells.entry(key).or_default();
            entry.accumulator.merge(&cell.accumulator);
            entry.members.extend(cell.members);
        }
        self.exclusions.merge(&other.exclusions);
    }
}

/// Finalized clusters for one zoom level.
#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    pub zoom_level: u8,
    pub precision: usize,
    pub clusters: BTreeMap<CellKey, Cluster>,
    pub aggregated: u64,
    pub excluded: u64,
    pub exclusions: Exclusions,
}

impl AggregateOutcome {
    /// Clusters ordered by `(date, geohash)`.
    pub fn into_clusters(self) -> Vec<Cluster> {
        self.clusters.into_values().collect()
    }

    /// The cluster for `geohash` on `date`, if any.
    pub fn get(&self, date: NaiveDate, geohash: &str) -> Option<&Cluster> {
        self.clusters.get(&CellKey {
            date,
            geohash: geohash.to_string(),
        })
    }
}

/// Groups raw points by geohash prefix and computes per-cell statistics.
#[derive(Debug, Clone)]
pub struct ClusterAggregator {
    zoom_map: ZoomPrecisionMap,
    classifier: RiskClassifier,
    shard_size: usize,
}

impl ClusterAggregator {
    pub fn new(zoom_map: ZoomPrecisionMap, classifier: RiskClassifier) -> Self {
        Self {
            zoom_map,
            classifier,
            shard_size: DEFAULT_SHARD_SIZE,
        }
    }

    /// Set the number of points per shard. Zero is treated as one.
    pub fn with_shard_size(mut self, shard_size: usize) -> Self {
        self.shard_size = shard_size.max(1);
        self
    }

    pub fn zoom_map(&self) -> &ZoomPrecisionMap {
        &self.zoom_map
    }

    pub fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    /// Geohash precision for `zoom_level`.
    pub fn precision(&self, zoom_level: u8) -> Result<usize> {
        self.zoom_map.precision(zoom_level)
    }

    /// Fold one shard of points into per-cell accumulators.
    ///
    /// Points that fail validation or encoding are counted in `exclusions` and skipped.
    pub fn accumulate(&self, points: &[RawPoint], precision: usize) -> PartialAggregate {
        let mut partial = PartialAggregate::default();
        for point in points {
            match cell_key(point, precision) {
                Ok(key) => partial.cells.entry(key).or_default().add(point),
                Err(reason) => partial.exclusions.record(reason),
            }
        }
        partial
    }

    /// Accumulate `points` in parallel shards and merge them in shard order.
    pub fn accumulate_sharded(&self, points: &[RawPoint], precision: usize) -> PartialAggregate {
        if points.len() <= self.shard_size {
            return self.accumulate(points, precision);
        }
        let shards: Vec<PartialAggregate> = points
            .par_chunks(self.shard_size)
            .map(|shard| self.accumulate(shard, precision))
            .collect();
        shards
            .into_iter()
            .fold(PartialAggregate::default(), |mut merged, shard| {
                merged.merge(shard);
                merged
            })
    }

    /// Finalize merged accumulators into clusters at `zoom_level`.
    pub fn finalize(&self, partial: &PartialAggregate, zoom_level: u8, precision: usize) -> AggregateOutcome {
        let clusters: BTreeMap<CellKey, Cluster> = partial
            .cells
            .iter()
            .filter_map(|(key, acc)| {
                acc.finalize(key, zoom_level, &self.classifier)
                    .map(|cluster| (key.clone(), cluster))
            })
            .collect();
        let aggregated: u64 = clusters.values().map(|c| c.point_count).sum();
        self.record_aggregated(zoom_level, aggregated);
        AggregateOutcome {
            zoom_level,
            precision,
            clusters,
            aggregated,
            excluded: partial.exclusions.total(),
            exclusions: partial.exclusions.clone(),
        }
    }

    /// Aggregate `points` into clusters at `zoom_level`.
    ///
    /// Points of different dates never share a cluster.
    pub fn aggregate(&self, points: &[RawPoint], zoom_level: u8) -> Result<AggregateOutcome> {
        let precision = self.precision(zoom_level)?;
        let partial = self.accumulate_sharded(points, precision);
        let outcome = self.finalize(&partial, zoom_level, precision);
        debug!(
            zoom_level,
            precision,
            points = points.len(),
            clusters = outcome.clusters.len(),
            excluded = outcome.excluded,
            "Aggregated zoom level"
        );
        Ok(outcome)
    }

    /// Group the points at `indices` into cells at `precision`, keeping member indices.
    pub fn partition(&self, points: &[RawPoint], indices: &[usize], precision: usize) -> Partition {
        let mut partition = Partition::default();
        for &idx in indices {
            let Some(point) = points.get(idx) else {
                continue;
            };
            match cell_key(point, precision) {
                Ok(key) => {
                    let cell = partition.cells.entry(key).or_default();
                    cell.accumulator.add(point);
                    cell.members.push(idx);
                }
                Err(reason) => partition.exclusions.record(reason),
            }
        }
        partition
    }

    /// Finalize a partition into clusters at `zoom_level`.
    pub fn fold_partition(&self, partition: &Partition, zoom_level: u8, precision: usize) -> AggregateOutcome {
        let mut clusters = BTreeMap::new();
        for (key, cell) in &partition.cells {
            if let Some(cluster) = cell.accumulator.finalize(key, zoom_level, &self.classifier) {
                clusters.insert(key.clone(), cluster);
            }
        }
        let aggregated: u64 = clusters.values().map(|c: &Cluster| c.point_count).sum();
        self.record_aggregated(zoom_level, aggregated);
        AggregateOutcome {
            zoom_level,
            precision,
            clusters,
            aggregated,
            excluded: partition.exclusions.total(),
            exclusions: partition.exclusions.clone(),
        }
    }

    // Exclusions are reported once per date by the caller, not per level.
    fn record_aggregated(&self, zoom_level: u8, aggregated: u64) {
        metrics::counter!(
            metric_defs::POINTS_AGGREGATED.name,
            "zoom_level" => zoom_level.to_string()
        )
        .increment(aggregated);
    }
}

/// Cell a point falls in at `precision`, or the exclusion reason.
fn cell_key(point: &RawPoint, precision: usize) -> std::result::Result<CellKey, &'static str> {
    point.validate().map_err(|e| e.reason())?;
    let geohash = encode(point.lat, point.lon, precision)
        .map_err(|e| crate::error::ValidationError::from(e).reason())?;
    Ok(CellKey {
        date: point.date,
        geohash,
    })
}
