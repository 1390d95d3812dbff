//! The RecommendationEngine turns a score and its inputs into an ordered
//! list of recommendations.
//!
//! Output order is fixed: the overall assessment, then one bullet per
//! firing rule in rule order, then the raw summaries as an appendix.

use tracing::debug;

use crate::context::ScoringContext;
use crate::rules::standard_rules;
use crate::traits::RecommendationRule;
use crate::weights::HealthThresholds;

/// Chains independent rules behind a threshold-based assessment.
///
/// ## Usage
/// ```ignore
/// let engine = RecommendationEngine::standard();
/// let context = ScoringContext::new(score, &metrics, &texts);
/// let lines = engine.generate(&context, &social_summary, &metrics_summary);
/// ```
pub struct RecommendationEngine {
    thresholds: HealthThresholds,
    rules: Vec<Box<dyn RecommendationRule>>,
}

impl RecommendationEngine {
    /// Engine with no rules.
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self {
            thresholds,
            rules: Vec::new(),
        }
    }

    /// Engine with the standard rule set and default thresholds.
    pub fn standard() -> Self {
        Self::with_standard_rules(HealthThresholds::default())
    }

    pub fn with_standard_rules(thresholds: HealthThresholds) -> Self {
        Self {
            thresholds,
            rules: standard_rules(),
        }
    }

    /// Add a rule after the existing ones (builder pattern).
    pub fn add_rule(mut self, rule: impl RecommendationRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn thresholds(&self) -> &HealthThresholds {
        &self.thresholds
    }

    /// Generate the recommendation list.
    ///
    /// ## Algorithm
    /// 1. Overall assessment from the health band of the score
    /// 2. Evaluate every rule in order, keeping the bullets that fire
    /// 3. Append `Consolidated Social Summary` and `Internal Metrics`
    ///
    /// # Arguments
    /// * `context` - Score, metrics and social texts the rules inspect
    /// * `social_summary` - Rendered social section, copied verbatim
    /// * `metrics_summary` - One-line metrics summary, copied verbatim
    pub fn generate(
        &self,
        context: &ScoringContext<'_>,
        social_summary: &str,
        metrics_summary: &str,
    ) -> Vec<String> {
        let band = self.thresholds.band(context.health_score);
        let mut lines = Vec::with_capacity(self.rules.len() + 3);
        lines.push(band.assessment().to_string());

        for rule in &self.rules {
            if let Some(line) = rule.evaluate(context) {
                debug!("Rule fired: {}", rule.name());
                lines.push(line);
            }
        }

        lines.push(format!("Consolidated Social Summary:\n{}", social_summary));
        lines.push(format!("Internal Metrics: {}", metrics_summary));
        lines
    }
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::standard()
    }
}
