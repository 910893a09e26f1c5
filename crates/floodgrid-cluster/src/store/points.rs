//! Raw forecast point storage.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use floodgrid_metrics::metric_defs;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::types::{BoundingBox, RawPoint};
use crate::Result;

/// Read access to raw points, keyed by the date they are valid for.
pub trait PointSource: Send + Sync {
    /// Every date with at least one stored point, ascending.
    fn distinct_dates(&self) -> Result<Vec<NaiveDate>>;

    /// All points for `date`. Empty when the date has none.
    fn points_for_date(&self, date: NaiveDate) -> Result<Arc<Vec<RawPoint>>>;

    /// Points for `date` whose coordinates lie inside `bounds` (edges inclusive).
    fn points_in_bounds(&self, date: NaiveDate, bounds: &BoundingBox) -> Result<Vec<RawPoint>> {
        Ok(self
            .points_for_date(date)?
            .iter()
            .filter(|p| bounds.contains(p.lat, p.lon))
            .cloned()
            .collect())
    }

    /// Points matching `filter`, ordered by date then storage order.
    fn filter_points(&self, filter: &PointFilter) -> Result<Vec<RawPoint>> {
        let dates = match filter.date {
            Some(date) => vec![date],
            None => self.distinct_dates()?,
        };
        let mut matched = Vec::new();
        for date in dates {
            let candidates = match &filter.bounds {
                Some(bounds) => self.points_in_bounds(date, bounds)?,
                None => self.points_for_date(date)?.to_vec(),
            };
            matched.extend(candidates.into_iter().filter(|p| filter.matches(p)));
        }
        Ok(matched)
    }
}

/// A record refused at ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// Position of the record in the ingested batch.
    pub index: usize,
    pub error: ValidationError,
}

/// Outcome of an ingestion batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: usize,
    pub rejections: Vec<Rejection>,
}

/// Criteria for [`PointSource::filter_points`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointFilter {
    pub date: Option<NaiveDate>,
    pub bounds: Option<BoundingBox>,
    pub min_forecast: Option<f64>,
    pub max_forecast: Option<f64>,
}

impl PointFilter {
    pub fn matches(&self, point: &RawPoint) -> bool {
        self.date.map_or(true, |d| point.date == d)
            && self.bounds.map_or(true, |b| b.contains(point.lat, point.lon))
            && self.min_forecast.map_or(true, |min| point.forecast_value >= min)
            && self.max_forecast.map_or(true, |max| point.forecast_value <= max)
    }
}

/// Thread-safe in-memory point store.
///
/// Each date's points sit behind an `Arc`, so readers hold a stable view of a
/// date while ingestion builds and swaps in a new vector.
#[derive(Debug, Default)]
pub struct InMemoryPointStore {
    dates: RwLock<BTreeMap<NaiveDate, Arc<Vec<RawPoint>>>>,
}

impl InMemoryPointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append points. Invalid records are counted and reported, never stored.
    pub fn ingest(&self, points: impl IntoIterator<Item = RawPoint>) -> IngestReport {
        let mut report = IngestReport::default();
        let mut by_date: BTreeMap<NaiveDate, Vec<RawPoint>> = BTreeMap::new();

        for (index, point) in points.into_iter().enumerate() {
            match point.validate() {
                Ok(()) => {
                    report.accepted += 1;
                    by_date.entry(point.date).or_default().push(point);
                }
                Err(error) => {
                    metrics::counter!(metric_defs::POINTS_REJECTED.name, "reason" => error.reason())
                        .increment(1);
                    report.rejected += 1;
                    report.rejections.push(Rejection { index, error });
                }
            }
        }

        {
            let mut dates = self.dates.write();
            for (date, new_points) in by_date {
                let entry = dates.entry(date).or_default();
                let mut merged = Vec::with_capacity(entry.len() + new_points.len());
                merged.extend(entry.iter().cloned());
                merged.extend(new_points);
                *entry = Arc::new(merged);
            }
        }

        metrics::counter!(metric_defs::POINTS_INGESTED.name).increment(report.accepted as u64);
        if report.rejected > 0 {
            warn!(
                accepted = report.accepted,
                rejected = report.rejected,
                "Rejected invalid points at ingestion"
            );
        } else {
            debug!(accepted = report.accepted, "Ingested points");
        }
        report
    }

    /// Replace every point of `date` with the valid records of `points`.
    ///
    /// Records for other dates are rejected with [`ValidationError::InvalidDate`].
    pub fn replace_date(&self, date: NaiveDate, points: impl IntoIterator<Item = RawPoint>) -> IngestReport {
        let mut report = IngestReport::default();
        let mut kept = Vec::new();
        for (index, point) in points.into_iter().enumerate() {
            let checked = if point.date != date {
                Err(ValidationError::InvalidDate(point.date.to_string()))
            } else {
                point.validate()
            };
            match checked {
                Ok(()) => {
                    report.accepted += 1;
                    kept.push(point);
                }
                Err(error) => {
                    metrics::counter!(metric_defs::POINTS_REJECTED.name, "reason" => error.reason())
                        .increment(1);
                    report.rejected += 1;
                    report.rejections.push(Rejection { index, error });
                }
            }
        }

        let mut dates = self.dates.write();
        if kept.is_empty() {
            dates.remove(&date);
        } else {
            dates.insert(date, Arc::new(kept));
        }
        metrics::counter!(metric_defs::POINTS_INGESTED.name).increment(report.accepted as u64);
        report
    }

    /// Total number of stored points.
    pub fn len(&self) -> usize {
        self.dates.read().values().map(|points| points.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.read().is_empty()
    }
}

impl PointSource for InMemoryPointStore {
    fn distinct_dates(&self) -> Result<Vec<NaiveDate>> {
        Ok(self.dates.read().keys().copied().collect())
    }

    fn points_for_date(&self, date: NaiveDate) -> Result<Arc<Vec<RawPoint>>> {
        Ok(self.dates.read().get(&date).cloned().unwrap_or_default())
    }
}
