//! Viewport and drill-down queries over the committed cluster set.

use std::sync::Arc;

use chrono::NaiveDate;
use floodgrid_geohash::decode_bounds;
use floodgrid_metrics::metric_defs;
use serde::{Deserialize, Serialize};

use crate::error::{ClusterError, ValidationError};
use crate::store::ClusterStore;
use crate::types::{BoundingBox, Cluster, RiskLevel, MAX_ZOOM_LEVEL};
use crate::Result;

/// Clusters at one zoom level, optionally narrowed by area, date and risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportRequest {
    pub zoom_level: u8,
    #[serde(default)]
    pub bounds: Option<BoundingBox>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
}

impl ViewportRequest {
    pub fn new(zoom_level: u8) -> Self {
        Self {
            zoom_level,
            bounds: None,
            date: None,
            risk_level: None,
        }
    }

    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = Some(risk_level);
        self
    }
}

/// Children of a parent cluster at a finer zoom level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubClusterRequest {
    pub parent_geohash: String,
    pub parent_zoom: u8,
    pub child_zoom: u8,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
}

impl SubClusterRequest {
    pub fn new(parent_geohash: impl Into<String>, parent_zoom: u8, child_zoom: u8) -> Self {
        Self {
            parent_geohash: parent_geohash.into(),
            parent_zoom,
            child_zoom,
            date: None,
            risk_level: None,
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = Some(risk_level);
        self
    }
}

/// Read-only query front end for a [`ClusterStore`].
///
/// Each query runs against a single snapshot, so results never mix two
/// generations of the same date.
#[derive(Clone)]
pub struct ViewportQuery {
    store: Arc<dyn ClusterStore>,
}

impl ViewportQuery {
    pub fn new(store: Arc<dyn ClusterStore>) -> Self {
        Self { store }
    }

    /// Clusters at `request.zoom_level` whose centroid lies inside the bounds
    /// (edges inclusive), ordered by date then geohash. No match is an empty list.
    pub fn retrieve(&self, request: &ViewportRequest) -> Result<Vec<Cluster>> {
        if request.zoom_level > MAX_ZOOM_LEVEL {
            return Err(ValidationError::InvalidZoomLevel(request.zoom_level).into());
        }
        let snapshot = self.store.snapshot();
        let clusters: Vec<Cluster> = snapshot
            .clusters(request.zoom_level, request.date)
            .filter(|c| {
                request
                    .bounds
                    .map_or(true, |b| b.contains(c.center_lat, c.center_lon))
            })
            .filter(|c| request.risk_level.map_or(true, |r| c.risk_level == r))
            .cloned()
            .collect();

        metrics::histogram!(metric_defs::QUERY_RESULTS.name, "kind" => "viewport")
            .record(clusters.len() as f64);
        Ok(clusters)
    }

    /// Clusters at `request.child_zoom` under a parent cluster.
    ///
    /// A child qualifies when its geohash starts with the parent geohash and its
    /// centroid lies inside the parent's decoded bounds.
    pub fn retrieve_sub_clusters(&self, request: &SubClusterRequest) -> Result<Vec<Cluster>> {
        if request.child_zoom <= request.parent_zoom {
            return Err(ClusterError::InvalidRange {
                parent_zoom: request.parent_zoom,
                child_zoom: request.child_zoom,
            });
        }
        if request.child_zoom > MAX_ZOOM_LEVEL {
            return Err(ValidationError::InvalidZoomLevel(request.child_zoom).into());
        }
        let bounds = decode_bounds(&request.parent_geohash).map_err(ValidationError::from)?;

        let snapshot = self.store.snapshot();
        let clusters: Vec<Cluster> = snapshot
            .clusters_with_prefix(request.child_zoom, &request.parent_geohash, request.date)
            .filter(|c| bounds.contains(c.center_lat, c.center_lon))
            .filter(|c| request.risk_level.map_or(true, |r| c.risk_level == r))
            .cloned()
            .collect();

        metrics::histogram!(metric_defs::QUERY_RESULTS.name, "kind" => "sub_clusters")
            .record(clusters.len() as f64);
        Ok(clusters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ClusterStore, GenerationBatch, GenerationStore};
    use std::collections::BTreeMap;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn cluster(date: NaiveDate, zoom_level: u8, geohash: &str, lat: f64, lon: f64, risk: RiskLevel) -> Cluster {
        Cluster {
            zoom_level,
            geohash: geohash.to_string(),
            center_lat: lat,
            center_lon: lon,
            date,
            point_count: 1,
            avg_forecast: 0.5,
            max_forecast: 0.5,
            min_forecast: 0.5,
            risk_level: risk,
        }
    }

    fn query() -> ViewportQuery {
        let store = Arc::new(GenerationStore::new());
        let mut levels = BTreeMap::new();
        levels.insert(
            0,
            vec![
                cluster(day(1), 0, "s", 10.0, 10.0, RiskLevel::High),
                cluster(day(1), 0, "v", 50.0, 50.0, RiskLevel::Low),
            ],
        );
        levels.insert(
            1,
            vec![
                cluster(day(1), 1, "s1", 10.0, 10.0, RiskLevel::High),
                cluster(day(1), 1, "s0", 2.0, 2.0, RiskLevel::Low),
                cluster(day(1), 1, "v0", 50.0, 50.0, RiskLevel::Low),
            ],
        );
        store
            .commit(GenerationBatch {
                date: day(1),
                zoom_levels: 0..=1,
                levels,
            })
            .unwrap();
        ViewportQuery::new(store)
    }

    #[test]
    fn test_retrieve_by_zoom() {
        let q = query();
        assert_eq!(q.retrieve(&ViewportRequest::new(0)).unwrap().len(), 2);
        assert_eq!(q.retrieve(&ViewportRequest::new(1)).unwrap().len(), 3);
        assert!(q.retrieve(&ViewportRequest::new(5)).unwrap().is_empty());
    }

    #[test]
    fn test_retrieve_bounds_inclusive() {
        let q = query();
        let bounds = BoundingBox::new(10.0, 0.0, 10.0, 0.0).unwrap();
        let result = q.retrieve(&ViewportRequest::new(0).with_bounds(bounds)).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].geohash, "s");
    }

    #[test]
    fn test_retrieve_date_and_risk_filters() {
        let q = query();
        assert!(q
            .retrieve(&ViewportRequest::new(0).with_date(day(2)))
            .unwrap()
            .is_empty());
        let low = q
            .retrieve(&ViewportRequest::new(1).with_risk_level(RiskLevel::Low))
            .unwrap();
        assert_eq!(low.len(), 2);
    }

    #[test]
    fn test_retrieve_invalid_zoom() {
        assert!(matches!(
            query().retrieve(&ViewportRequest::new(21)),
            Err(ClusterError::Validation(ValidationError::InvalidZoomLevel(21)))
        ));
    }

    #[test]
    fn test_sub_clusters() {
        let q = query();
        let children = q.retrieve_sub_clusters(&SubClusterRequest::new("s", 0, 1)).unwrap();
        let hashes: Vec<&str> = children.iter().map(|c| c.geohash.as_str()).collect();
        assert_eq!(hashes, vec!["s0", "s1"]);

        let high = q
            .retrieve_sub_clusters(&SubClusterRequest::new("s", 0, 1).with_risk_level(RiskLevel::High))
            .unwrap();
        assert_eq!(high.len(), 1);
    }

    #[test]
    fn test_sub_clusters_invalid_range() {
        let q = query();
        assert!(matches!(
            q.retrieve_sub_clusters(&SubClusterRequest::new("s", 1, 1)),
            Err(ClusterError::InvalidRange {
                parent_zoom: 1,
                child_zoom: 1
            })
        ));
        assert!(matches!(
            q.retrieve_sub_clusters(&SubClusterRequest::new("s", 2, 1)),
            Err(ClusterError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_sub_clusters_bad_parent_geohash() {
        assert!(matches!(
            query().retrieve_sub_clusters(&SubClusterRequest::new("sa", 0, 1)),
            Err(ClusterError::Validation(_))
        ));
    }
}
