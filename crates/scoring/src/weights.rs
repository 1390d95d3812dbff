//! Tunable constants of the health score.

use serde::{Deserialize, Serialize};

/// Weight and normalization factor of every score component.
///
/// A metric contributes `min(weight, value / norm * weight)`, so it
/// reaches its full weight at `value == norm` and never exceeds it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub purchase_weight: f64,
    pub purchase_norm: f64,
    pub login_weight: f64,
    pub login_norm: f64,
    pub session_weight: f64,
    /// Minutes.
    pub session_norm: f64,
    pub sentiment_weight: f64,
    /// Sentiment contribution when no keyword matched at all.
    pub neutral_sentiment: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            purchase_weight: 0.3,
            purchase_norm: 1000.0,
            login_weight: 0.3,
            login_norm: 5000.0,
            session_weight: 0.2,
            session_norm: 30.0,
            sentiment_weight: 0.2,
            neutral_sentiment: 0.1,
        }
    }
}

impl ScoreWeights {
    /// Upper bound of the metrics part.
    pub fn metrics_ceiling(&self) -> f64 {
        self.purchase_weight + self.login_weight + self.session_weight
    }
}

/// Score boundaries for the overall assessment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    pub excellent: f64,
    pub good: f64,
    pub moderate: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            excellent: 0.8,
            good: 0.6,
            moderate: 0.4,
        }
    }
}

/// Overall health band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthBand {
    Excellent,
    Good,
    Moderate,
    Critical,
}

impl HealthThresholds {
    pub fn band(&self, score: f64) -> HealthBand {
        if score >= self.excellent {
            HealthBand::Excellent
        } else if score >= self.good {
            HealthBand::Good
        } else if score >= self.moderate {
            HealthBand::Moderate
        } else {
            HealthBand::Critical
        }
    }
}

impl HealthBand {
    /// Opening line of the recommendation list.
    pub fn assessment(&self) -> &'static str {
        match self {
            HealthBand::Excellent => {
                "OVERALL: Feature is performing excellently. Focus on maintaining current quality and expanding reach."
            }
            HealthBand::Good => {
                "OVERALL: Feature is performing well with room for improvement. Address identified concerns while building on strengths."
            }
            HealthBand::Moderate => {
                "OVERALL: Feature shows moderate performance. Prioritize addressing key issues and improving user experience."
            }
            HealthBand::Critical => {
                "OVERALL: Feature requires immediate attention. Focus on critical issues and user concerns."
            }
        }
    }
}
