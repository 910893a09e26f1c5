//! Multi-zoom cluster generation.
//!
//! [`HierarchyBuilder`] turns the raw points of each date into clusters at every
//! zoom level from 0 to the configured maximum and commits them to the cluster
//! store as one generation per date. Dates are built concurrently. Nothing is
//! written until a date's full level set is ready, so a failure leaves the
//! date's previous generation visible.
//!
//! Two modes are supported:
//!
//! - **Flat**: every level is aggregated independently from the date's full
//!   point set. Levels run in parallel.
//! - **Hierarchical**: level 0 is partitioned from all points, and each
//!   further level is partitioned from the member points of the previous
//!   level's cells. A child cell is kept only when its points lie inside the
//!   parent's decoded bounds and its prefix extends the parent prefix. A level
//!   with no clusters ends generation for that date.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use floodgrid_geohash::decode_bounds;
use floodgrid_metrics::{metric_defs, ScopeLabels};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregate::{AggregateOutcome, ClusterAggregator, Partition};
use crate::config::FloodgridConfig;
use crate::error::{ClusterError, ValidationError};
use crate::store::{ClusterStore, GenerationBatch, PointSource};
use crate::types::{Cluster, RawPoint};
use crate::Result;

/// How successive zoom levels are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    #[default]
    Flat,
    Hierarchical,
}

impl GenerationMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Flat => "flat",
            GenerationMode::Hierarchical => "hierarchical",
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clusters built for one zoom level of one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelSummary {
    pub zoom_level: u8,
    pub precision: usize,
    pub clusters: usize,
    pub points: u64,
}

/// Result of regenerating one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateSummary {
    pub date: NaiveDate,
    /// Generation id now visible for the date, or `None` when nothing was
    /// built and the date's previous clusters were removed.
    pub generation: Option<u64>,
    pub levels: Vec<LevelSummary>,
    /// Points excluded as invalid.
    pub excluded_points: u64,
    /// Zoom level at which hierarchical generation stopped, if it stopped early.
    pub terminated_at: Option<u8>,
    pub duration_ms: u64,
}

impl DateSummary {
    pub fn cluster_count(&self) -> usize {
        self.levels.iter().map(|l| l.clusters).sum()
    }
}

/// A date whose regeneration failed. Its previous generation is untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationFailure {
    pub date: NaiveDate,
    pub zoom_level: Option<u8>,
    pub message: String,
}

/// Result of a [`HierarchyBuilder::regenerate`] run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub dates: Vec<DateSummary>,
    pub failures: Vec<GenerationFailure>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn cluster_count(&self) -> usize {
        self.dates.iter().map(DateSummary::cluster_count).sum()
    }

    pub fn excluded_points(&self) -> u64 {
        self.dates.iter().map(|d| d.excluded_points).sum()
    }
}

/// Levels built for a date before they are committed.
struct BuiltLevels {
    levels: BTreeMap<u8, AggregateOutcome>,
    terminated_at: Option<u8>,
}

/// Orchestrates aggregation across zoom levels and dates.
pub struct HierarchyBuilder {
    aggregator: ClusterAggregator,
    mode: GenerationMode,
    max_zoom_level: u8,
    source: Arc<dyn PointSource>,
    store: Arc<dyn ClusterStore>,
}

impl HierarchyBuilder {
    /// Create a builder. Invalid configuration is rejected here, before any generation runs.
    pub fn new(
        config: &FloodgridConfig,
        source: Arc<dyn PointSource>,
        store: Arc<dyn ClusterStore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            aggregator: config.aggregator()?,
            mode: config.mode,
            max_zoom_level: config.max_zoom_level,
            source,
            store,
        })
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    pub fn store(&self) -> &Arc<dyn ClusterStore> {
        &self.store
    }

    /// Regenerate one date, or every date the point source knows about.
    ///
    /// Dates are processed concurrently. A failed date is reported in the
    /// summary and keeps its previous generation; other dates still commit.
    pub fn regenerate(&self, date: Option<NaiveDate>) -> Result<RunSummary> {
        let dates = match date {
            Some(date) => vec![date],
            None => self.source.distinct_dates()?,
        };
        info!(
            dates = dates.len(),
            mode = %self.mode,
            max_zoom_level = self.max_zoom_level,
            "Starting cluster generation"
        );

        let results: Vec<Result<DateSummary>> = dates
            .par_iter()
            .map(|&date| self.regenerate_date(date))
            .collect();

        let mut summary = RunSummary::default();
        for result in results {
            match result {
                Ok(date_summary) => summary.dates.push(date_summary),
                Err(ClusterError::Generation {
                    date,
                    zoom_level,
                    source,
                }) => summary.failures.push(GenerationFailure {
                    date,
                    zoom_level,
                    message: source.to_string(),
                }),
                Err(other) => return Err(other),
            }
        }

        info!(
            dates = summary.dates.len(),
            failed = summary.failures.len(),
            clusters = summary.cluster_count(),
            excluded = summary.excluded_points(),
            "Cluster generation finished"
        );
        Ok(summary)
    }

    /// Build and commit every zoom level of `date`.
    ///
    /// Errors are [`ClusterError::Generation`] naming the failed scope.
    pub fn regenerate_date(&self, date: NaiveDate) -> Result<DateSummary> {
        let started = Instant::now();
        let labels = ScopeLabels::new(self.mode.as_str()).to_labels();

        let result = self.build_and_commit(date, started);
        match &result {
            Ok(summary) => {
                metrics::counter!(metric_defs::GENERATION_COMMITTED.name, &labels).increment(1);
                metrics::histogram!(metric_defs::GENERATION_DURATION.name, &labels)
                    .record(summary.duration_ms as f64);
            }
            Err(e) => {
                metrics::counter!(metric_defs::GENERATION_FAILED.name, &labels).increment(1);
                warn!(date = %date, error = %e, "Generation failed; previous generation kept");
            }
        }
        result
    }

    fn build_and_commit(&self, date: NaiveDate, started: Instant) -> Result<DateSummary> {
        let points = self
            .source
            .points_for_date(date)
            .map_err(|e| e.in_scope(date, None))?;

        let built = self.build_date(date, &points)?;

        // Every level sees the same invalid points; report the worst level once.
        let exclusions = built
            .levels
            .values()
            .max_by_key(|o| o.excluded)
            .map(|o| o.exclusions.clone())
            .unwrap_or_default();
        let excluded_points = exclusions.total();
        let levels: Vec<LevelSummary> = built
            .levels
            .values()
            .map(|o| LevelSummary {
                zoom_level: o.zoom_level,
                precision: o.precision,
                clusters: o.clusters.len(),
                points: o.aggregated,
            })
            .collect();

        let batch = GenerationBatch {
            date,
            zoom_levels: 0..=self.max_zoom_level,
            levels: built
                .levels
                .into_iter()
                .map(|(zoom, outcome)| (zoom, outcome.into_clusters()))
                .collect(),
        };
        let generation = self.store.commit(batch).map_err(|e| e.in_scope(date, None))?;

        if excluded_points > 0 {
            warn!(date = %date, excluded = excluded_points, "Excluded invalid points from aggregation");
            exclusions.emit();
        }
        for level in &levels {
            let labels = ScopeLabels::new(self.mode.as_str())
                .with_zoom_level(level.zoom_level)
                .to_labels();
            metrics::counter!(metric_defs::CLUSTERS_GENERATED.name, &labels).increment(level.clusters as u64);
        }

        let summary = DateSummary {
            date,
            generation,
            levels,
            excluded_points,
            terminated_at: built.terminated_at,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            date = %date,
            generation = ?generation,
            zoom_levels = summary.levels.len(),
            clusters = summary.cluster_count(),
            excluded = excluded_points,
            "Committed generation"
        );
        Ok(summary)
    }

    /// Build every level of `date` in memory without touching the store.
    fn build_date(&self, date: NaiveDate, points: &[RawPoint]) -> Result<BuiltLevels> {
        match self.mode {
            GenerationMode::Flat => self.build_flat(date, points),
            GenerationMode::Hierarchical => self.build_hierarchical(date, points),
        }
    }

    fn build_flat(&self, date: NaiveDate, points: &[RawPoint]) -> Result<BuiltLevels> {
        let outcomes: Vec<AggregateOutcome> = (0..=self.max_zoom_level)
            .into_par_iter()
            .map(|zoom| {
                self.aggregator
                    .aggregate(points, zoom)
                    .map_err(|e| e.in_scope(date, Some(zoom)))
            })
            .collect::<Result<_>>()?;

        Ok(BuiltLevels {
            levels: outcomes.into_iter().map(|o| (o.zoom_level, o)).collect(),
            terminated_at: None,
        })
    }

    fn build_hierarchical(&self, date: NaiveDate, points: &[RawPoint]) -> Result<BuiltLevels> {
        let mut levels = BTreeMap::new();
        let mut partition: Option<Partition> = None;

        for zoom in 0..=self.max_zoom_level {
            let precision = self
                .aggregator
                .precision(zoom)
                .map_err(|e| e.in_scope(date, Some(zoom)))?;

            let next = match &partition {
                None => {
                    let all: Vec<usize> = (0..points.len()).collect();
                    self.aggregator.partition(points, &all, precision)
                }
                Some(parent) => self
                    .child_partition(points, parent, precision)
                    .map_err(|e| e.in_scope(date, Some(zoom)))?,
            };

            if next.is_empty() {
                debug!(date = %date, zoom_level = zoom, "No clusters at level; stopping");
                return Ok(BuiltLevels {
                    levels,
                    terminated_at: Some(zoom),
                });
            }

            let outcome = self.aggregator.fold_partition(&next, zoom, precision);
            debug!(
                date = %date,
                zoom_level = zoom,
                precision,
                clusters = outcome.clusters.len(),
                "Built hierarchical level"
            );
            levels.insert(zoom, outcome);
            partition = Some(next);
        }

        Ok(BuiltLevels {
            levels,
            terminated_at: None,
        })
    }

    /// Partition each parent cell's members at `precision`, keeping only children
    /// inside the parent's bounds whose prefix extends the parent prefix.
    fn child_partition(&self, points: &[RawPoint], parent: &Partition, precision: usize) -> Result<Partition> {
        let children: Vec<Partition> = parent
            .cells
            .par_iter()
            .map(|(key, cell)| -> Result<Partition> {
                let bounds = decode_bounds(&key.geohash).map_err(ValidationError::from)?;
                let candidates: Vec<usize> = cell
                    .members
                    .iter()
                    .copied()
                    .filter(|&idx| bounds.contains(points[idx].lat, points[idx].lon))
                    .collect();
                let mut child = self.aggregator.partition(points, &candidates, precision);
                child.cells.retain(|child_key, _| child_key.geohash.starts_with(&key.geohash));
                Ok(child)
            })
            .collect::<Result<_>>()?;

        Ok(children.into_iter().fold(Partition::default(), |mut merged, child| {
            merged.merge(child);
            merged
        }))
    }
}

/// Build the clusters of `points` at every zoom level up to the configured maximum, without a store.
pub fn build_levels(config: &FloodgridConfig, points: &[RawPoint]) -> Result<BTreeMap<u8, Vec<Cluster>>> {
    config.validate()?;
    let aggregator = config.aggregator()?;
    let mut levels = BTreeMap::new();
    for zoom in 0..=config.max_zoom_level {
        levels.insert(zoom, aggregator.aggregate(points, zoom)?.into_clusters());
    }
    Ok(levels)
}
