//! Core traits for recommendation generation.
//!
//! This module defines the RecommendationRule trait that allows
//! composable, independent rules to be evaluated against one report.

use crate::context::ScoringContext;

/// One independent recommendation trigger.
///
/// All rules must implement this trait to be used in the
/// RecommendationEngine.
///
/// ## Design Note
/// - `Send + Sync` allows one engine to be shared across requests
/// - Rules never see each other's output; any number may fire
pub trait RecommendationRule: Send + Sync {
    /// Returns the name of this rule (for logging/debugging)
    fn name(&self) -> &str;

    /// Evaluate the rule.
    ///
    /// # Returns
    /// * `Some(line)` - The recommendation bullet when the rule fires
    /// * `None` - The rule does not apply
    fn evaluate(&self, context: &ScoringContext<'_>) -> Option<String>;
}
