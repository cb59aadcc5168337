//! Data mart exporter - Main entry point.
//!
//! Exports the analytical data marts of the sales warehouse as CSV files.

use datamart_export::catalog::QueryCatalog;
use datamart_export::config::Config;
use datamart_export::export::{Exporter, SummaryFormat, format_preview, render_summary};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(format!("{},sqlx=warn", config.log_level))
            .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"))
    });

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    // Initialize logging
    init_tracing(&config);

    info!("Starting datamart-export v{}", env!("CARGO_PKG_VERSION"));

    let conn_config = match config.connection_config() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Invalid connection configuration");
            return ExitCode::from(1);
        }
    };

    let catalog = match &config.queries_dir {
        Some(dir) => QueryCatalog::builtin().load_overrides(dir),
        None => Ok(QueryCatalog::builtin()),
    };
    let catalog = match catalog {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to load query definitions");
            return ExitCode::from(1);
        }
    };

    let exporter = Exporter::new(conn_config, config.output_dir.clone())
        .with_executor(config.query_executor())
        .with_connect_timeout(config.connect_timeout_duration())
        .with_preview_rows(config.preview_rows)
        .with_strict(config.strict);

    let summary = match exporter.run_all(&catalog).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, suggestion = ?e.suggestion(), "Export could not start");
            return ExitCode::from(1);
        }
    };

    println!("{}", render_summary(&summary, config.summary_format));
    // Keep stdout machine-readable in JSON mode
    if config.summary_format == SummaryFormat::Text && summary.exported_count() > 0 {
        println!("{}", format_preview(&summary));
    }

    info!(
        output_dir = %summary.output_dir.display(),
        failed = summary.failed_count(),
        "Data mart export complete"
    );
    ExitCode::from(summary.exit_code())
}
