//! Rule that fires when an internal metric is zero.

use crate::context::ScoringContext;
use crate::traits::RecommendationRule;

/// Integer metrics a rule can check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Purchases,
    Logins,
}

pub struct ZeroMetricRule {
    metric: Metric,
    message: String,
}

impl ZeroMetricRule {
    pub fn new(metric: Metric, message: impl Into<String>) -> Self {
        Self {
            metric,
            message: message.into(),
        }
    }
}

impl RecommendationRule for ZeroMetricRule {
    fn name(&self) -> &str {
        match self.metric {
            Metric::Purchases => "zero_purchases",
            Metric::Logins => "zero_logins",
        }
    }

    fn evaluate(&self, context: &ScoringContext<'_>) -> Option<String> {
        let value = match self.metric {
            Metric::Purchases => context.metrics.purchase_count,
            Metric::Logins => context.metrics.login_count,
        };
        (value == 0).then(|| self.message.clone())
    }
}
