use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use server::config::DEFAULT_CONFIG_FILE;
use server::{AggregateReport, AnalyzeRequest, AppConfig, InsightService, SourceOutcome};
use sources::{FeatureMetrics, FetchResult, ProbeReport};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Feature Pulse - composite feature health reports
#[derive(Parser)]
#[command(name = "feature-pulse")]
#[command(about = "Feature health reports from usage metrics and social feedback", long_about = None)]
struct Cli {
    /// Config file (default: ./feature-pulse.toml when present)
    #[arg(short, long, global = true, env = "PULSE_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging for the workspace crates
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Skip the query engine even if it is enabled in the config
    #[arg(long, global = true)]
    no_metrics: bool,

    /// Deadline for a whole report, in seconds
    #[arg(long, global = true)]
    overall_deadline_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full health report for one feature
    Analyze {
        /// Feature identifier in the metrics store
        #[arg(long)]
        feature_id: String,

        /// Human-readable feature name, also used as a search term
        #[arg(long)]
        feature_name: String,

        /// Extra search terms, comma separated
        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,

        /// Reddit thread to analyze
        #[arg(long)]
        thread_url: Option<String>,

        /// Comments per social source
        #[arg(long)]
        max_results: Option<usize>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Internal usage metrics only
    Metrics {
        #[arg(long)]
        feature_id: String,

        #[arg(long)]
        json: bool,
    },

    /// Feedback analysis from one platform
    Source {
        platform: Platform,

        #[arg(long)]
        feature_name: String,

        /// Defaults to a slug of the feature name
        #[arg(long)]
        feature_id: Option<String>,

        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,

        #[arg(long)]
        thread_url: Option<String>,
    },

    /// Probe every configured subprocess backend
    Health {
        #[arg(long)]
        json: bool,
    },

    /// Write a default config file
    InitConfig {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Platform {
    Facebook,
    Instagram,
    Reddit,
}

impl Platform {
    fn source_name(self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Reddit => "reddit",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays clean
    let default_filter = if cli.verbose {
        "info,server=debug,sources=debug,query_client=debug,scoring=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Commands::InitConfig { path, force } = &cli.command {
        return handle_init_config(path, *force);
    }

    let mut config = AppConfig::resolve(cli.config.as_deref())?;
    if cli.no_metrics {
        config.query_engine.enabled = false;
    }
    if let Some(secs) = cli.overall_deadline_secs {
        config.executor.overall_deadline_secs = Some(secs);
    }

    let service = InsightService::from_config(&config).context("Failed to set up the service")?;

    let outcome = match cli.command {
        Commands::Analyze {
            feature_id,
            feature_name,
            keywords,
            thread_url,
            max_results,
            json,
        } => {
            let mut request = AnalyzeRequest::new(feature_id, feature_name).with_keywords(keywords);
            request.thread_url = thread_url;
            request.max_results = max_results;
            handle_analyze(&service, &request, json).await
        }
        Commands::Metrics { feature_id, json } => handle_metrics(&service, &feature_id, json).await,
        Commands::Source {
            platform,
            feature_name,
            feature_id,
            keywords,
            thread_url,
        } => {
            let feature_id = feature_id.unwrap_or_else(|| slug(&feature_name));
            let mut request = AnalyzeRequest::new(feature_id, feature_name).with_keywords(keywords);
            request.thread_url = thread_url;
            handle_source(&service, platform, &request).await
        }
        Commands::Health { json } => handle_health(&service, json).await,
        Commands::InitConfig { .. } => Ok(()),
    };

    service.shutdown().await;
    outcome
}

/// Handle the 'analyze' command
async fn handle_analyze(service: &InsightService, request: &AnalyzeRequest, json: bool) -> Result<()> {
    let start = Instant::now();
    let report = service.analyze(request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
        println!(
            "\n{} Report built in {:?}",
            "✓".green(),
            start.elapsed()
        );
    }
    Ok(())
}

/// Handle the 'metrics' command
async fn handle_metrics(service: &InsightService, feature_id: &str, json: bool) -> Result<()> {
    let metrics = service.metrics(feature_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    } else {
        print_metrics(&metrics);
    }
    Ok(())
}

/// Handle the 'source' command
async fn handle_source(service: &InsightService, platform: Platform, request: &AnalyzeRequest) -> Result<()> {
    let result = service.source(platform.source_name(), request).await?;
    match result {
        FetchResult::TextAnalysis(text) => {
            println!("{}", format!("{} feedback:", platform.source_name()).bold().blue());
            println!("{}", text);
        }
        FetchResult::Metrics(metrics) => print_metrics(&metrics),
    }
    Ok(())
}

/// Handle the 'health' command
async fn handle_health(service: &InsightService, json: bool) -> Result<()> {
    let reports = service.health().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    if reports.is_empty() {
        println!("No subprocess backends are enabled.");
        return Ok(());
    }
    for report in &reports {
        print_probe(report);
    }
    let unhealthy = reports.iter().filter(|r| !r.healthy).count();
    if unhealthy > 0 {
        anyhow::bail!("{} of {} backends are unhealthy", unhealthy, reports.len());
    }
    Ok(())
}

/// Handle the 'init-config' command
fn handle_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let content = AppConfig::default_toml()?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{} Wrote {}", "✓".green(), path.display());
    Ok(())
}

fn print_report(report: &AggregateReport) {
    println!("{}", format!("Feature Health Report: {}", report.feature_id).bold().blue());
    println!("Health score: {}", colored_score(report.health_score));
    println!("{}", report.metrics_summary);

    println!("\n{}", "Sources:".bold());
    for (name, source) in &report.per_source {
        match &source.outcome {
            SourceOutcome::Success { .. } => {
                println!("  {} {} ({} ms)", "✓".green(), name, source.elapsed_ms)
            }
            SourceOutcome::Failed { failure } => {
                println!("  {} {}: {}", "✗".red(), name, failure)
            }
        }
    }

    println!("\n{}", "Recommendations:".bold());
    for line in &report.recommendations {
        println!("{}", line);
    }
}

fn print_metrics(metrics: &FeatureMetrics) {
    println!("{}", format!("Metrics for {}:", metrics.feature_id).bold().blue());
    println!("{}Purchases: {}", "• ".green(), metrics.purchase_count);
    println!("{}Logins: {}", "• ".green(), metrics.login_count);
    println!("{}Avg session: {:.2} min", "• ".green(), metrics.avg_session_minutes);
    if let Some(description) = &metrics.dataset_description {
        println!("{}Dataset: {}", "• ".cyan(), description);
    }
}

fn print_probe(report: &ProbeReport) {
    if report.healthy {
        println!("{} {} ({} ms)", "✓".green(), report.backend, report.latency_ms);
    } else {
        println!(
            "{} {}: {}",
            "✗".red(),
            report.backend,
            report.error.as_deref().unwrap_or("unhealthy")
        );
    }
}

fn colored_score(score: f64) -> colored::ColoredString {
    let text = format!("{:.2}", score);
    if score >= 0.8 {
        text.green()
    } else if score >= 0.6 {
        text.cyan()
    } else if score >= 0.4 {
        text.yellow()
    } else {
        text.red()
    }
}

/// `Dark Mode v2` -> `dark_mode_v2`
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}
