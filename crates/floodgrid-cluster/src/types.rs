//! Domain types: raw forecast points, clusters, risk labels and bounding boxes.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use floodgrid_geohash::GeohashBounds;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Highest display zoom level a client may request.
pub const MAX_ZOOM_LEVEL: u8 = 20;

/// Recurrence interval attached to a forecast point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReturnPeriod {
    #[serde(rename = "2-year")]
    TwoYear,
    #[serde(rename = "5-year")]
    FiveYear,
    #[serde(rename = "20-year")]
    TwentyYear,
}

impl ReturnPeriod {
    /// All return periods, shortest first.
    pub const ALL: [ReturnPeriod; 3] = [
        ReturnPeriod::TwoYear,
        ReturnPeriod::FiveYear,
        ReturnPeriod::TwentyYear,
    ];

    /// Wire label (`"2-year"`, `"5-year"`, `"20-year"`).
    pub const fn as_str(&self) -> &'static str {
        match self {
            ReturnPeriod::TwoYear => "2-year",
            ReturnPeriod::FiveYear => "5-year",
            ReturnPeriod::TwentyYear => "20-year",
        }
    }

    const fn index(&self) -> usize {
        match self {
            ReturnPeriod::TwoYear => 0,
            ReturnPeriod::FiveYear => 1,
            ReturnPeriod::TwentyYear => 2,
        }
    }
}

impl fmt::Display for ReturnPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReturnPeriod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReturnPeriod::ALL
            .into_iter()
            .find(|rp| rp.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidReturnPeriod(s.to_string()))
    }
}

/// Multiset of return-period labels, stored as one counter per period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnPeriodCounts([u64; 3]);

impl ReturnPeriodCounts {
    /// Record one occurrence of `period`.
    pub fn add(&mut self, period: ReturnPeriod) {
        self.0[period.index()] += 1;
    }

    /// Add every count of `other` into `self`.
    pub fn merge(&mut self, other: &ReturnPeriodCounts) {
        for (mine, theirs) in self.0.iter_mut().zip(other.0.iter()) {
            *mine += theirs;
        }
    }

    /// Number of occurrences of `period`.
    pub fn count(&self, period: ReturnPeriod) -> u64 {
        self.0[period.index()]
    }

    /// Whether at least one occurrence of `period` was recorded.
    pub fn contains(&self, period: ReturnPeriod) -> bool {
        self.count(period) > 0
    }

    /// Total number of labels recorded.
    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }
}

/// Categorical flood risk of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl RiskLevel {
    /// All risk levels, least severe first.
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Extreme,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Extreme => "extreme",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RiskLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidRiskLevel(s.to_string()))
    }
}

/// Parse an ISO-8601 calendar date (`YYYY-MM-DD`).
pub fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate(s.to_string()))
}

/// One flood-forecast sample at a location.
///
/// `date` is the day the forecast is valid for and is the only date used for
/// grouping. `forecast_run_date` records when the forecast was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub date: NaiveDate,
    pub lat: f64,
    pub lon: f64,
    pub forecast_value: f64,
    pub return_period: ReturnPeriod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_run_date: Option<NaiveDate>,
}

impl RawPoint {
    pub fn new(
        date: NaiveDate,
        lat: f64,
        lon: f64,
        forecast_value: f64,
        return_period: ReturnPeriod,
    ) -> Self {
        Self {
            date,
            lat,
            lon,
            forecast_value,
            return_period,
            forecast_run_date: None,
        }
    }

    /// Attach the date the forecast was produced.
    pub fn with_run_date(mut self, run_date: NaiveDate) -> Self {
        self.forecast_run_date = Some(run_date);
        self
    }

    /// Check coordinate ranges and the forecast value.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(floodgrid_geohash::GeohashError::InvalidLatitude(self.lat).into());
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(floodgrid_geohash::GeohashError::InvalidLongitude(self.lon).into());
        }
        if !self.forecast_value.is_finite() || self.forecast_value < 0.0 {
            return Err(ValidationError::InvalidForecastValue(self.forecast_value));
        }
        Ok(())
    }
}

/// Aggregated statistics for all points of one date inside one geohash cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub zoom_level: u8,
    pub geohash: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub date: NaiveDate,
    pub point_count: u64,
    pub avg_forecast: f64,
    pub max_forecast: f64,
    pub min_forecast: f64,
    pub risk_level: RiskLevel,
}

impl Cluster {
    /// Stable identifier, unique within a snapshot.
    pub fn id(&self) -> String {
        format!("{}_{}_{}", self.zoom_level, self.geohash, self.date)
    }
}

/// Query rectangle in WGS84 degrees. Edges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    /// Build a bounding box, rejecting inverted or out-of-range edges.
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self, ValidationError> {
        let reject = |reason| ValidationError::InvalidBoundingBox {
            north,
            south,
            east,
            west,
            reason,
        };
        if !(-90.0..=90.0).contains(&north) || !(-90.0..=90.0).contains(&south) {
            return Err(reject("latitude out of range"));
        }
        if !(-180.0..=180.0).contains(&east) || !(-180.0..=180.0).contains(&west) {
            return Err(reject("longitude out of range"));
        }
        if south > north {
            return Err(reject("south is greater than north"));
        }
        if west > east {
            return Err(reject("west is greater than east"));
        }
        Ok(Self {
            north,
            south,
            east,
            west,
        })
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }
}

impl From<GeohashBounds> for BoundingBox {
    fn from(bounds: GeohashBounds) -> Self {
        Self {
            north: bounds.north,
            south: bounds.south,
            east: bounds.east,
            west: bounds.west,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    #[test]
    fn test_return_period_labels() {
        assert_eq!("20-year".parse::<ReturnPeriod>().unwrap(), ReturnPeriod::TwentyYear);
        assert_eq!(ReturnPeriod::FiveYear.to_string(), "5-year");
        assert!("10-year".parse::<ReturnPeriod>().is_err());

        let json = serde_json::to_string(&ReturnPeriod::TwoYear).unwrap();
        assert_eq!(json, "\"2-year\"");
    }

    #[test]
    fn test_return_period_counts_merge() {
        let mut a = ReturnPeriodCounts::default();
        a.add(ReturnPeriod::TwoYear);
        a.add(ReturnPeriod::TwoYear);
        let mut b = ReturnPeriodCounts::default();
        b.add(ReturnPeriod::TwentyYear);

        a.merge(&b);
        assert_eq!(a.count(ReturnPeriod::TwoYear), 2);
        assert!(a.contains(ReturnPeriod::TwentyYear));
        assert!(!a.contains(ReturnPeriod::FiveYear));
        assert_eq!(a.total(), 3);
    }

    #[test]
    fn test_risk_level_parse() {
        assert_eq!("extreme".parse::<RiskLevel>().unwrap(), RiskLevel::Extreme);
        assert!("severe".parse::<RiskLevel>().is_err());
        assert!(RiskLevel::Low < RiskLevel::High);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2025-01-01").unwrap(), date());
        assert!(matches!(parse_date("01/01/2025"), Err(ValidationError::InvalidDate(_))));
    }

    #[test]
    fn test_raw_point_validation() {
        assert!(RawPoint::new(date(), 10.0, 10.0, 0.5, ReturnPeriod::TwoYear)
            .validate()
            .is_ok());
        assert!(RawPoint::new(date(), 91.0, 10.0, 0.5, ReturnPeriod::TwoYear)
            .validate()
            .is_err());
        assert!(RawPoint::new(date(), 10.0, -181.0, 0.5, ReturnPeriod::TwoYear)
            .validate()
            .is_err());
        assert!(RawPoint::new(date(), 10.0, 10.0, -0.1, ReturnPeriod::TwoYear)
            .validate()
            .is_err());
        assert!(RawPoint::new(date(), 10.0, 10.0, f64::NAN, ReturnPeriod::TwoYear)
            .validate()
            .is_err());
    }

    #[test]
    fn test_raw_point_json_run_date_optional() {
        let json = r#"{"date":"2025-01-01","lat":1.0,"lon":2.0,"forecast_value":0.4,"return_period":"5-year"}"#;
        let point: RawPoint = serde_json::from_str(json).unwrap();
        assert_eq!(point.forecast_run_date, None);
        assert_eq!(point.return_period, ReturnPeriod::FiveYear);

        let run = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        let with_run = point.with_run_date(run);
        let json = serde_json::to_string(&with_run).unwrap();
        assert!(json.contains("\"forecast_run_date\":\"2024-12-30\""));
    }

    #[test]
    fn test_bounding_box_validation() {
        assert!(BoundingBox::new(10.0, 0.0, 10.0, 0.0).is_ok());
        assert!(BoundingBox::new(0.0, 10.0, 10.0, 0.0).is_err());
        assert!(BoundingBox::new(10.0, 0.0, 0.0, 10.0).is_err());
        assert!(BoundingBox::new(95.0, 0.0, 10.0, 0.0).is_err());

        let bbox = BoundingBox::new(10.0, 0.0, 10.0, 0.0).unwrap();
        assert!(bbox.contains(10.0, 0.0));
        assert!(!bbox.contains(10.1, 5.0));
    }
}
