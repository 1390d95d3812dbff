//! Rule implementations for the recommendation engine.
//!
//! This module contains the concrete rules that can be composed into a
//! RecommendationEngine, and the standard rule set in evaluation order.

pub mod keyword;
pub mod zero_metric;

// Re-export for convenience
pub use keyword::KeywordRule;
pub use zero_metric::{Metric, ZeroMetricRule};

use crate::traits::RecommendationRule;

/// The standard rules, in the order their bullets appear.
pub fn standard_rules() -> Vec<Box<dyn RecommendationRule>> {
    vec![
        Box::new(KeywordRule::any(
            "performance",
            &["performance", "slow"],
            "- Address performance concerns mentioned in social feedback",
        )),
        Box::new(KeywordRule::any(
            "stability",
            &["bug", "crash", "error"],
            "- Prioritize bug fixes and stability improvements",
        )),
        Box::new(KeywordRule::any(
            "documentation",
            &["documentation", "unclear"],
            "- Improve documentation and user guidance",
        )),
        Box::new(KeywordRule::any(
            "feature_requests",
            &["feature request", "would like"],
            "- Consider implementing frequently requested features",
        )),
        Box::new(
            KeywordRule::any(
                "facebook_marketing",
                &["facebook"],
                "- Increase marketing spend on Facebook based on positive engagement",
            )
            .requiring("positive"),
        ),
        Box::new(
            KeywordRule::any(
                "instagram_campaigns",
                &["instagram"],
                "- Leverage Instagram's positive sentiment for promotional campaigns",
            )
            .requiring("positive"),
        ),
        Box::new(
            KeywordRule::any(
                "reddit_advocacy",
                &["reddit"],
                "- Engage with Reddit community to build advocacy",
            )
            .requiring("active"),
        ),
        Box::new(ZeroMetricRule::new(
            Metric::Purchases,
            "- Focus on conversion optimization to drive purchases",
        )),
        Box::new(ZeroMetricRule::new(
            Metric::Logins,
            "- Investigate adoption: no logins were recorded for this feature",
        )),
    ]
}
