//! Risk classification of aggregated clusters.

use serde::{Deserialize, Serialize};

use crate::error::ClusterError;
use crate::types::{ReturnPeriod, ReturnPeriodCounts, RiskLevel};
use crate::Result;

/// Cut points on `max_forecast` for the threshold policy.
///
/// A value at or below `low` is low risk, at or below `medium` is medium,
/// at or below `high` is high, anything above is extreme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: 0.3,
            medium: 0.6,
            high: 0.8,
        }
    }
}

impl RiskThresholds {
    /// Cut points must be finite and strictly increasing.
    pub fn validate(&self) -> Result<()> {
        let finite = self.low.is_finite() && self.medium.is_finite() && self.high.is_finite();
        if !finite || self.low >= self.medium || self.medium >= self.high {
            return Err(ClusterError::Config(format!(
                "risk thresholds must be finite and strictly increasing (low={}, medium={}, high={})",
                self.low, self.medium, self.high
            )));
        }
        Ok(())
    }
}

/// Selectable risk labelling policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskPolicy {
    /// Label by `max_forecast` against configured cut points.
    Threshold(RiskThresholds),
    /// Label by the most severe return period present. Never produces `extreme`.
    #[default]
    ReturnPeriodPriority,
}

impl RiskPolicy {
    pub fn validate(&self) -> Result<()> {
        match self {
            RiskPolicy::Threshold(thresholds) => thresholds.validate(),
            RiskPolicy::ReturnPeriodPriority => Ok(()),
        }
    }
}

/// Maps a cluster's aggregated forecast data to a [`RiskLevel`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RiskClassifier {
    policy: RiskPolicy,
}

impl RiskClassifier {
    /// Create a classifier, rejecting invalid threshold cut points.
    pub fn new(policy: RiskPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    /// Classify a cluster from its maximum forecast and return-period multiset.
    pub fn classify(&self, max_forecast: f64, return_periods: &ReturnPeriodCounts) -> RiskLevel {
        match &self.policy {
            RiskPolicy::Threshold(t) => {
                if max_forecast <= t.low {
                    RiskLevel::Low
                } else if max_forecast <= t.medium {
                    RiskLevel::Medium
                } else if max_forecast <= t.high {
                    RiskLevel::High
                } else {
                    RiskLevel::Extreme
                }
            }
            RiskPolicy::ReturnPeriodPriority => {
                if return_periods.contains(ReturnPeriod::TwentyYear) {
                    RiskLevel::High
                } else if return_periods.contains(ReturnPeriod::FiveYear) {
                    RiskLevel::Medium
                } else {
                    RiskLevel::Low
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(periods: &[ReturnPeriod]) -> ReturnPeriodCounts {
        let mut counts = ReturnPeriodCounts::default();
        for &period in periods {
            counts.add(period);
        }
        counts
    }

    #[test]
    fn test_return_period_priority() {
        let classifier = RiskClassifier::default();
        let any = 0.95;

        assert_eq!(
            classifier.classify(any, &counts(&[ReturnPeriod::TwoYear, ReturnPeriod::TwentyYear])),
            RiskLevel::High
        );
        assert_eq!(
            classifier.classify(any, &counts(&[ReturnPeriod::FiveYear, ReturnPeriod::TwoYear])),
            RiskLevel::Medium
        );
        assert_eq!(
            classifier.classify(any, &counts(&[ReturnPeriod::TwoYear])),
            RiskLevel::Low
        );
    }

    #[test]
    fn test_threshold_policy() {
        let classifier = RiskClassifier::new(RiskPolicy::Threshold(RiskThresholds::default())).unwrap();
        let none = ReturnPeriodCounts::default();

        assert_eq!(classifier.classify(0.0, &none), RiskLevel::Low);
        assert_eq!(classifier.classify(0.3, &none), RiskLevel::Low);
        assert_eq!(classifier.classify(0.31, &none), RiskLevel::Medium);
        assert_eq!(classifier.classify(0.6, &none), RiskLevel::Medium);
        assert_eq!(classifier.classify(0.8, &none), RiskLevel::High);
        assert_eq!(classifier.classify(0.81, &none), RiskLevel::Extreme);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let thresholds = RiskThresholds {
            low: 0.5,
            medium: 0.4,
            high: 0.8,
        };
        assert!(matches!(
            RiskClassifier::new(RiskPolicy::Threshold(thresholds)),
            Err(ClusterError::Config(_))
        ));
    }

    #[test]
    fn test_policy_yaml() {
        let policy: RiskPolicy = serde_yaml::from_str("kind: return_period_priority\n").unwrap();
        assert_eq!(policy, RiskPolicy::ReturnPeriodPriority);

        let policy: RiskPolicy =
            serde_yaml::from_str("kind: threshold\nlow: 0.2\nmedium: 0.5\nhigh: 0.9\n").unwrap();
        assert_eq!(
            policy,
            RiskPolicy::Threshold(RiskThresholds {
                low: 0.2,
                medium: 0.5,
                high: 0.9
            })
        );
    }
}
