//! Aggregate statistics over the stored points and clusters.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::store::{ClusterSnapshot, PointSource};
use crate::types::{ReturnPeriod, RiskLevel};
use crate::Result;

/// Counts over a cluster snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub total_clusters: u64,
    pub zoom_breakdown: BTreeMap<u8, u64>,
    pub risk_breakdown: BTreeMap<RiskLevel, u64>,
    pub unique_dates: Vec<NaiveDate>,
}

impl ClusterSummary {
    pub fn from_snapshot(snapshot: &ClusterSnapshot) -> Self {
        let mut summary = ClusterSummary {
            unique_dates: snapshot.dates(),
            ..Default::default()
        };
        for cluster in snapshot.all_clusters() {
            summary.total_clusters += 1;
            *summary.zoom_breakdown.entry(cluster.zoom_level).or_insert(0) += 1;
            *summary.risk_breakdown.entry(cluster.risk_level).or_insert(0) += 1;
        }
        summary
    }
}

/// Counts over the raw points of a [`PointSource`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PointSummary {
    pub total_points: u64,
    pub unique_dates: Vec<NaiveDate>,
    pub return_period_breakdown: BTreeMap<ReturnPeriod, u64>,
}

impl PointSummary {
    pub fn collect(source: &dyn PointSource) -> Result<Self> {
        let mut summary = PointSummary::default();
        let mut dates = BTreeSet::new();
        for date in source.distinct_dates()? {
            let points = source.points_for_date(date)?;
            if points.is_empty() {
                continue;
            }
            dates.insert(date);
            for point in points.iter() {
                summary.total_points += 1;
                *summary
                    .return_period_breakdown
                    .entry(point.return_period)
                    .or_insert(0) += 1;
            }
        }
        summary.unique_dates = dates.into_iter().collect();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FloodgridConfig;
    use crate::hierarchy::HierarchyBuilder;
    use crate::store::{GenerationStore, InMemoryPointStore};
    use crate::types::RawPoint;
    use std::sync::Arc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn points() -> Vec<RawPoint> {
        vec![
            RawPoint::new(day(1), 10.0, 10.0, 0.5, ReturnPeriod::FiveYear),
            RawPoint::new(day(1), 10.01, 10.01, 0.9, ReturnPeriod::TwentyYear),
            RawPoint::new(day(1), 50.0, 50.0, 0.1, ReturnPeriod::TwoYear),
            RawPoint::new(day(2), 50.0, 50.0, 0.1, ReturnPeriod::TwoYear),
        ]
    }

    #[test]
    fn test_point_summary() {
        let store = InMemoryPointStore::new();
        store.ingest(points());
        let summary = PointSummary::collect(&store).unwrap();

        assert_eq!(summary.total_points, 4);
        assert_eq!(summary.unique_dates, vec![day(1), day(2)]);
        assert_eq!(summary.return_period_breakdown[&ReturnPeriod::TwoYear], 2);
        assert_eq!(summary.return_period_breakdown[&ReturnPeriod::TwentyYear], 1);
    }

    #[test]
    fn test_cluster_summary() {
        let source = Arc::new(InMemoryPointStore::new());
        source.ingest(points());
        let config = FloodgridConfig {
            max_zoom_level: 1,
            ..Default::default()
        };
        let builder = HierarchyBuilder::new(&config, source, Arc::new(GenerationStore::new())).unwrap();
        builder.regenerate(None).unwrap();

        let summary = ClusterSummary::from_snapshot(&builder.store().snapshot());
        // Day 1: two cells at each level; day 2: one cell at each level.
        assert_eq!(summary.total_clusters, 6);
        assert_eq!(summary.zoom_breakdown[&0], 3);
        assert_eq!(summary.zoom_breakdown[&1], 3);
        assert_eq!(summary.risk_breakdown[&RiskLevel::High], 2);
        assert_eq!(summary.risk_breakdown[&RiskLevel::Low], 4);
        assert_eq!(summary.unique_dates, vec![day(1), day(2)]);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["risk_breakdown"]["high"], 2);
    }
}
