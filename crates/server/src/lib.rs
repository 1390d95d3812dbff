//! Fan-out / fan-in core of the feature health service.
//!
//! This crate provides:
//! - WorkerPool, a bounded executor with caller-runs backpressure
//! - FetchTask, one source call wrapped in a failure boundary
//! - Orchestrator, which runs a request's tasks and aggregates the report
//! - InsightService, the facade wiring sources from `AppConfig`
//!
//! ## Example Usage
//! ```ignore
//! use server::{AnalyzeRequest, AppConfig, InsightService};
//!
//! let config = AppConfig::resolve(None)?;
//! let service = InsightService::from_config(&config)?;
//! let report = service
//!     .analyze(&AnalyzeRequest::new("dark_mode", "Dark Mode"))
//!     .await?;
//! println!("{:.2}", report.health_score);
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pool;
pub mod report;
pub mod service;
pub mod task;

pub use config::AppConfig;
pub use error::{InsightError, Result};
pub use orchestrator::{Orchestrator, RunPhase};
pub use pool::{PoolConfig, PoolStats, TaskHandle, WorkerPool};
pub use report::{AggregateReport, FailureKind, SourceFailure, SourceOutcome, SourceReport};
pub use service::{AnalyzeRequest, InsightService};
pub use task::FetchTask;
