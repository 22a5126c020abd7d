mod cli;

use fetcharr::{config, health::HealthMonitor, service::Service};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::time::Duration;

async fn start_service(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if config.shows.is_empty() {
        tracing::warn!("No shows configured; the service will idle between checks");
    }

    let service = Service::new(config, config_path.map(|p| p.to_path_buf()))?;

    tokio::select! {
        result = service.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received interrupt, shutting down");
            service.shutdown();
            Ok(())
        }
    }
}

async fn run_check(config_path: Option<&Path>, dry_run: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let downloads = config.downloads.clone();
    let service = Service::new(config, config_path.map(|p| p.to_path_buf()))?;

    if dry_run {
        let report = service.preview_once().await;
        println!(
            "Checked {} shows ({} failed): {} items seen, {} would be downloaded",
            report.shows_checked, report.shows_failed, report.items_seen, report.items_enqueued
        );
        return Ok(());
    }

    let report = service.check_once().await;
    println!(
        "Checked {} shows ({} failed): {} items seen, {} enqueued",
        report.shows_checked, report.shows_failed, report.items_seen, report.items_enqueued
    );

    if report.items_enqueued == 0 {
        return Ok(());
    }

    // Worst case every entry burns its full retry budget.
    let per_entry = downloads.fetch_timeout() + downloads.retry_delay();
    let budget = per_entry * (downloads.max_retries + 1) * report.items_enqueued as u32
        + Duration::from_secs(30);

    let snapshot = service.wait_for_idle(budget).await;
    println!(
        "Done: {} completed, {} failed",
        snapshot.completed, snapshot.failed
    );
    for entry in &snapshot.failed_entries {
        println!(
            "  failed: {} ({})",
            entry.title,
            entry.last_error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}

async fn run_health(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let monitor = HealthMonitor::new(config, config_path.map(|p| p.to_path_buf()));
    let report = monitor.check().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for (name, check) in &report.checks {
        let status = if check.healthy { "✓" } else { "✗" };
        println!("{} {}: {}", status, name, check.message);
        if let Some(ref error) = check.error {
            println!("    {}", error);
        }
    }

    println!();
    println!("Overall: {:?}", report.overall);
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Schedule: {}", config.service.check_schedule);
            println!("  Output dir: {}", config.downloads.output_dir.display());
            println!("  Max concurrent: {}", config.downloads.max_concurrent);
            println!("  Shows: {}", config.shows.len());
            println!(
                "    With metadata matching: {}",
                config
                    .shows
                    .iter()
                    .filter(|s| s.metadata_url.is_some())
                    .count()
            );
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Schedule: {}", config.service.check_schedule);
            println!("  Output dir: {}", config.downloads.output_dir.display());
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on the
    // verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "fetcharr=trace".to_string()
        } else {
            "fetcharr=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_service(cli.config.as_deref()))
        }
        Commands::Check { dry_run } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_check(cli.config.as_deref(), dry_run))
        }
        Commands::Health { json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_health(cli.config.as_deref(), json))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("fetcharr {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
