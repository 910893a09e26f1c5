//! # floodgrid-cluster
//!
//! Geohash-based hierarchical clustering of flood-forecast points.
//!
//! Raw points carry a location, the date the forecast is valid for, a
//! non-negative forecast value and a return period. For every zoom level the
//! engine assigns each point to a geohash cell whose precision comes from the
//! [`ZoomPrecisionMap`], folds the points of each `(date, cell)` into summary
//! statistics and labels the result with a [`RiskLevel`].
//!
//! ## Overview
//!
//! - [`ClusterAggregator`] does a single pass over the points of one level,
//!   optionally sharded across rayon workers.
//! - [`RiskClassifier`] applies either return-period priority (the default) or
//!   configurable `max_forecast` thresholds.
//! - [`HierarchyBuilder`] builds every zoom level of every date and commits each
//!   date as one generation to a [`ClusterStore`].
//! - [`GenerationStore`] is an in-memory store that swaps immutable snapshots,
//!   so readers see either the previous or the new generation, never a mix.
//! - [`ViewportQuery`] serves bounding-box and parent/child drill-down queries.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use chrono::NaiveDate;
//! use floodgrid_cluster::{
//!     FloodgridConfig, GenerationStore, HierarchyBuilder, InMemoryPointStore, RawPoint,
//!     ReturnPeriod, RiskLevel, ViewportQuery, ViewportRequest,
//! };
//!
//! let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
//! let points = Arc::new(InMemoryPointStore::new());
//! points.ingest(vec![
//!     RawPoint::new(date, 10.0, 10.0, 0.5, ReturnPeriod::FiveYear),
//!     RawPoint::new(date, 10.01, 10.01, 0.9, ReturnPeriod::TwentyYear),
//!     RawPoint::new(date, 50.0, 50.0, 0.1, ReturnPeriod::TwoYear),
//! ]);
//!
//! let store = Arc::new(GenerationStore::new());
//! let builder = HierarchyBuilder::new(&FloodgridConfig::default(), points, store.clone())?;
//! builder.regenerate(Some(date))?;
//!
//! let clusters = ViewportQuery::new(store).retrieve(&ViewportRequest::new(0).with_date(date))?;
//! assert_eq!(clusters.len(), 2);
//! assert_eq!(clusters[0].point_count, 2);
//! assert_eq!(clusters[0].risk_level, RiskLevel::High);
//! # Ok::<(), floodgrid_cluster::ClusterError>(())
//! ```

mod aggregate;
mod config;
mod error;
mod hierarchy;
mod query;
mod risk;
mod store;
mod summary;
mod types;
mod zoom;

pub use aggregate::{
    AggregateOutcome, CellKey, ClusterAccumulator, ClusterAggregator, Exclusions, PartialAggregate, Partition,
    PartitionCell, DEFAULT_SHARD_SIZE,
};
pub use config::{load_config, FloodgridConfig};
pub use error::{ClusterError, ValidationError};
pub use hierarchy::{
    build_levels, DateSummary, GenerationFailure, GenerationMode, HierarchyBuilder, LevelSummary, RunSummary,
};
pub use query::{SubClusterRequest, ViewportQuery, ViewportRequest};
pub use risk::{RiskClassifier, RiskPolicy, RiskThresholds};
pub use store::{
    ClusterSnapshot, ClusterStore, DateGeneration, GenerationBatch, GenerationStore, InMemoryPointStore,
    IngestReport, PointFilter, PointSource, Rejection,
};
pub use summary::{ClusterSummary, PointSummary};
pub use types::{
    parse_date, BoundingBox, Cluster, RawPoint, ReturnPeriod, ReturnPeriodCounts, RiskLevel, MAX_ZOOM_LEVEL,
};
pub use zoom::{ZoomPrecisionMap, DEFAULT_FALLBACK_PRECISION};

/// Result type for clustering operations.
pub type Result<T> = std::result::Result<T, ClusterError>;
