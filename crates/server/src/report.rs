//! Aggregate report types.
//!
//! A report is built once per request and never mutated afterwards. Every
//! dispatched task has exactly one entry in `per_source`, keyed by its
//! stable name, whether it succeeded or not.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sources::{FeatureMetrics, FetchResult, ResultKind, display_name};

/// Why a source produced no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The source returned an error.
    Error,
    /// The source did not finish within its timeout or the overall deadline.
    Timeout,
    /// The source panicked.
    Panicked,
    /// The task was cancelled by the runtime before finishing.
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::Error => "error",
            FailureKind::Timeout => "timeout",
            FailureKind::Panicked => "panicked",
            FailureKind::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Error placeholder recorded in place of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl SourceFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

/// Terminal state of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Success { result: FetchResult },
    Failed { failure: SourceFailure },
}

/// One entry of `AggregateReport::per_source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    /// What the source produces when it succeeds.
    pub kind: ResultKind,
    pub outcome: SourceOutcome,
    pub elapsed_ms: u64,
}

impl SourceReport {
    pub fn success(result: FetchResult, elapsed_ms: u64) -> Self {
        Self {
            kind: result.kind(),
            outcome: SourceOutcome::Success { result },
            elapsed_ms,
        }
    }

    pub fn failure(kind: ResultKind, failure: SourceFailure, elapsed_ms: u64) -> Self {
        Self {
            kind,
            outcome: SourceOutcome::Failed { failure },
            elapsed_ms,
        }
    }

    pub fn result(&self) -> Option<&FetchResult> {
        match &self.outcome {
            SourceOutcome::Success { result } => Some(result),
            SourceOutcome::Failed { .. } => None,
        }
    }

    pub fn failure_info(&self) -> Option<&SourceFailure> {
        match &self.outcome {
            SourceOutcome::Success { .. } => None,
            SourceOutcome::Failed { failure } => Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Success { .. })
    }
}

/// Composite health report for one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub feature_id: String,
    /// Every dispatched source, by name.
    pub per_source: BTreeMap<String, SourceReport>,
    pub social_summary: String,
    /// Metrics used for scoring; zeros when the metrics source failed.
    pub metrics: FeatureMetrics,
    pub metrics_summary: String,
    pub recommendations: Vec<String>,
    /// Always within [0, 1].
    pub health_score: f64,
    pub elapsed_ms: u64,
}

impl AggregateReport {
    /// Names of failed sources, in key order.
    pub fn failures(&self) -> Vec<&str> {
        self.per_source
            .iter()
            .filter(|(_, report)| !report.is_success())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn success_count(&self) -> usize {
        self.per_source.values().filter(|r| r.is_success()).count()
    }
}

/// Text a failed text source contributes to the social summary.
pub fn unavailable_text(name: &str, failure: &SourceFailure) -> String {
    format!("{} analysis unavailable: {}", display_name(name), failure.message)
}

/// Consolidated social summary: one block per text source, in name order.
///
/// ```text
/// === Social Media Analysis ===
///
/// FACEBOOK:
/// <analysis>
///
/// REDDIT:
/// Reddit analysis unavailable: <reason>
/// ```
pub fn render_social_summary(per_source: &BTreeMap<String, SourceReport>) -> String {
    let mut out = String::from("=== Social Media Analysis ===\n");
    for (name, report) in per_source {
        if report.kind != ResultKind::TextAnalysis {
            continue;
        }
        let body = match &report.outcome {
            SourceOutcome::Success { result } => result.as_text().unwrap_or_default().to_string(),
            SourceOutcome::Failed { failure } => unavailable_text(name, failure),
        };
        out.push_str(&format!("\n{}:\n{}\n", name.to_uppercase(), body));
    }
    out
}
