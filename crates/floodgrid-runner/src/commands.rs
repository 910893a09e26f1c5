//! CLI command implementations.
//!
//! Each command returns a serializable report; the binary prints it as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use floodgrid_cluster::{
    BoundingBox, Cluster, ClusterStore, ClusterSummary, FloodgridConfig, GenerationMode, GenerationStore,
    HierarchyBuilder, InMemoryPointStore, PointFilter, PointSource, PointSummary, RawPoint, RiskLevel, RunSummary,
    SubClusterRequest, ViewportQuery, ViewportRequest,
};
use floodgrid_geohash::GeohashBounds;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::RunnerError;
use crate::snapshot::{load_points, load_snapshot, save_snapshot};
use crate::Result;

/// Load a configuration file, or the defaults when none is given.
pub fn load_runner_config(path: Option<&Path>) -> Result<FloodgridConfig> {
    match path {
        Some(path) => Ok(floodgrid_cluster::load_config(path)?),
        None => Ok(FloodgridConfig::default()),
    }
}

/// Parse a `north,south,east,west` bounding box.
pub fn parse_bbox(s: &str) -> Result<BoundingBox> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| RunnerError::InvalidArgument(format!("bounding box {:?} is not four numbers", s)))?;
    match parts.as_slice() {
        &[north, south, east, west] => Ok(BoundingBox::new(north, south, east, west)
            .map_err(floodgrid_cluster::ClusterError::from)?),
        _ => Err(RunnerError::InvalidArgument(format!(
            "bounding box {:?} must be north,south,east,west",
            s
        ))),
    }
}

/// Arguments of the `generate` command.
#[derive(Debug, Clone)]
pub struct GenerateArgs {
    pub points: PathBuf,
    pub snapshot: PathBuf,
    pub date: Option<NaiveDate>,
    pub mode: Option<GenerationMode>,
}

/// Ingestion counts reported by `generate`.
#[derive(Debug, Clone, Serialize)]
pub struct IngestCounts {
    pub accepted: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateReport {
    pub ingest: IngestCounts,
    pub run: RunSummary,
}

/// Ingest a points file, regenerate clusters and write the snapshot.
///
/// Dates already in the snapshot but not regenerated are kept. The snapshot is
/// written even when some dates fail, since failed dates keep their previous clusters.
pub fn generate(config: &FloodgridConfig, args: &GenerateArgs) -> Result<GenerateReport> {
    let mut config = config.clone();
    if let Some(mode) = args.mode {
        config.mode = mode;
    }

    let points = InMemoryPointStore::new();
    let report = points.ingest(load_points(&args.points)?);
    for rejection in report.rejections.iter().take(10) {
        warn!(index = rejection.index, error = %rejection.error, "Rejected point");
    }

    let store = Arc::new(GenerationStore::from_snapshot(load_snapshot(&args.snapshot)?));
    let builder = HierarchyBuilder::new(&config, Arc::new(points), store.clone())?;
    let run = builder.regenerate(args.date)?;

    save_snapshot(&args.snapshot, &store.snapshot())?;
    info!(
        dates = run.dates.len(),
        failed = run.failures.len(),
        clusters = run.cluster_count(),
        "Generation complete"
    );

    Ok(GenerateReport {
        ingest: IngestCounts {
            accepted: report.accepted,
            rejected: report.rejected,
        },
        run,
    })
}

fn query_for(snapshot: &Path) -> Result<ViewportQuery> {
    let store = GenerationStore::from_snapshot(load_snapshot(snapshot)?);
    Ok(ViewportQuery::new(Arc::new(store)))
}

/// Viewport query against a snapshot file.
pub fn clusters(
    snapshot: &Path,
    zoom_level: u8,
    bounds: Option<BoundingBox>,
    date: Option<NaiveDate>,
    risk_level: Option<RiskLevel>,
) -> Result<Vec<Cluster>> {
    let request = ViewportRequest {
        zoom_level,
        bounds,
        date,
        risk_level,
    };
    Ok(query_for(snapshot)?.retrieve(&request)?)
}

/// Drill-down query against a snapshot file.
pub fn sub_clusters(snapshot: &Path, request: &SubClusterRequest) -> Result<Vec<Cluster>> {
    Ok(query_for(snapshot)?.retrieve_sub_clusters(request)?)
}

/// Points of a points file matching `filter`. Invalid records are skipped as at ingestion.
pub fn points(path: &Path, filter: &PointFilter) -> Result<Vec<RawPoint>> {
    if let (Some(min), Some(max)) = (filter.min_forecast, filter.max_forecast) {
        if min > max {
            return Err(RunnerError::InvalidArgument(format!(
                "minimum forecast {} is above maximum {}",
                min, max
            )));
        }
    }
    let store = InMemoryPointStore::new();
    store.ingest(load_points(path)?);
    Ok(store.filter_points(filter)?)
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub clusters: ClusterSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<PointSummary>,
}

/// Cluster counts from a snapshot, plus point counts when a points file is given.
pub fn summary(snapshot: &Path, points: Option<&Path>) -> Result<SummaryReport> {
    let clusters = ClusterSummary::from_snapshot(&load_snapshot(snapshot)?);
    let points = match points {
        Some(path) => {
            let store = InMemoryPointStore::new();
            store.ingest(load_points(path)?);
            Some(PointSummary::collect(&store)?)
        }
        None => None,
    };
    Ok(SummaryReport { clusters, points })
}

/// Remove one date's clusters from a snapshot file.
pub fn purge(snapshot: &Path, date: NaiveDate) -> Result<bool> {
    let store = GenerationStore::from_snapshot(load_snapshot(snapshot)?);
    let removed = store.purge_date(date)?;
    if removed {
        save_snapshot(snapshot, &store.snapshot())?;
    }
    Ok(removed)
}

#[derive(Debug, Clone, Serialize)]
pub struct EncodeReport {
    pub geohash: String,
    pub bounds: GeohashBounds,
}

pub fn encode(lat: f64, lon: f64, precision: usize) -> Result<EncodeReport> {
    let geohash = floodgrid_geohash::encode(lat, lon, precision)?;
    let bounds = floodgrid_geohash::decode_bounds(&geohash)?;
    Ok(EncodeReport { geohash, bounds })
}

#[derive(Debug, Clone, Serialize)]
pub struct DecodeReport {
    pub bounds: GeohashBounds,
    pub center_lat: f64,
    pub center_lon: f64,
}

pub fn decode(geohash: &str) -> Result<DecodeReport> {
    let bounds = floodgrid_geohash::decode_bounds(geohash)?;
    let (center_lat, center_lon) = bounds.center();
    Ok(DecodeReport {
        bounds,
        center_lat,
        center_lon,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        let bbox = parse_bbox("10, 0, 20, -5").unwrap();
        assert_eq!(bbox.north, 10.0);
        assert_eq!(bbox.west, -5.0);

        assert!(matches!(parse_bbox("1,2,3"), Err(RunnerError::InvalidArgument(_))));
        assert!(matches!(parse_bbox("a,b,c,d"), Err(RunnerError::InvalidArgument(_))));
        assert!(matches!(parse_bbox("0,10,20,-5"), Err(RunnerError::Cluster(_))));
    }

    #[test]
    fn test_encode_decode() {
        let report = encode(57.64911, 10.40744, 6).unwrap();
        assert_eq!(report.geohash, "u4pruy");
        assert!(report.bounds.contains(57.64911, 10.40744));

        let decoded = decode("s").unwrap();
        assert_eq!(decoded.center_lat, 22.5);
        assert_eq!(decoded.center_lon, 22.5);
        assert!(decode("").is_err());
    }

    #[test]
    fn test_points_rejects_inverted_forecast_range() {
        let filter = PointFilter {
            min_forecast: Some(0.8),
            max_forecast: Some(0.2),
            ..Default::default()
        };
        let result = points(Path::new("unused.json"), &filter);
        assert!(matches!(result, Err(RunnerError::InvalidArgument(_))));
    }

    #[test]
    fn test_default_config_without_file() {
        assert_eq!(load_runner_config(None).unwrap(), FloodgridConfig::default());
    }
}
