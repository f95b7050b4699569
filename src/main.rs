use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[cfg(feature = "colored-output")]
use colored::Colorize;

use wazuh_log_report::pipeline::{Pipeline, RunSummary};
use wazuh_log_report::reports::{ReportStatus, CATALOGUE};
use wazuh_log_report::sources::resolve_inputs;
use wazuh_log_report::{PipelineArgs, ReportConfig, SvgChartRenderer};

/// Filter used when `RUST_LOG` is unset; covers the library and this binary
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "wazuh_log_report=debug,wazuh_report=debug"
    } else {
        "wazuh_log_report=info,wazuh_report=info"
    }
}

fn init_tracing(verbose: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[cfg(feature = "colored-output")]
fn status_label(status: ReportStatus) -> String {
    match status {
        ReportStatus::Rendered => "rendered".green().to_string(),
        ReportStatus::Skipped => "skipped".yellow().to_string(),
        ReportStatus::Disabled => "disabled".dimmed().to_string(),
        ReportStatus::Failed => "failed".red().bold().to_string(),
    }
}

#[cfg(not(feature = "colored-output"))]
fn status_label(status: ReportStatus) -> String {
    let label = match status {
        ReportStatus::Rendered => "rendered",
        ReportStatus::Skipped => "skipped",
        ReportStatus::Disabled => "disabled",
        ReportStatus::Failed => "failed",
    };
    label.to_string()
}

fn print_summary(summary: &RunSummary) {
    println!("Total logs: {}", summary.total_records);
    if summary.malformed_records > 0 {
        println!("Malformed lines skipped: {}", summary.malformed_records);
    }

    println!("\nLogs by rule.level:");
    for (level, count) in &summary.level_counts {
        println!("  {:>3}  {}", level, count);
    }
    println!(
        "\nNetwork devices: {}  Endpoints: {}",
        summary.network_rows, summary.endpoint_rows
    );

    if let Some(listing) = summary.message_listing() {
        println!("\nGeneric event messages:\n{}", listing);
    }

    println!("\nReports:");
    for outcome in &summary.reports {
        let detail = match (&outcome.chart, &outcome.error) {
            (Some(chart), _) => chart.display().to_string(),
            (None, Some(error)) => error.message.clone(),
            (None, None) => String::new(),
        };
        println!(
            "  {:<30} {:<10} {}",
            outcome.key,
            status_label(outcome.status),
            detail
        );
    }
    println!(
        "\n{} of {} charts written",
        summary.rendered(),
        summary.reports.len()
    );
}

fn main() -> Result<()> {
    let args = PipelineArgs::parse();
    init_tracing(args.verbose);

    let config = match &args.config {
        Some(path) => ReportConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ReportConfig::default(),
    };
    tracing::debug!("{}", config);

    let timestamp_column = args
        .timestamp_column()
        .context("Invalid --timestamp-column")?;
    let inputs = resolve_inputs(&args.inputs).context("Failed to resolve inputs")?;
    tracing::info!("Reading {} input files", inputs.len());

    let renderer = SvgChartRenderer;
    let pipeline = Pipeline::new(&config, &renderer).with_timestamp_column(timestamp_column);
    let summary = pipeline
        .run(&inputs, CATALOGUE, &args.output_dir)
        .context("Report run failed")?;

    print_summary(&summary);

    if let Some(path) = &args.summary {
        let json =
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(())
}
