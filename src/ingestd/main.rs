// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

use clap::Parser;
use dailycommuter::config::IngestConfig;
use dailycommuter::db_tools::{apply_schema, make_pool};
use dailycommuter::fetcher::HttpFeedSource;
use dailycommuter::orchestrator::{Orchestrator, RunReport};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file; the environment is used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Run a single polling cycle and exit
    #[arg(long)]
    once: bool,
    /// Override the poll interval from the config
    #[arg(long)]
    interval_ms: Option<u64>,
}

fn log_report(report: &RunReport) {
    let elapsed_ms = (report.finished_at - report.started_at).num_milliseconds();

    tracing::info!(
        feeds = report.feeds.len(),
        failed = report.failed_feeds(),
        elapsed_ms,
        "polling cycle finished"
    );

    if let Ok(json) = serde_json::to_string(report) {
        tracing::debug!("{}", json);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => IngestConfig::from_json_file(path)?,
        None => IngestConfig::from_env()?,
    };

    if let Some(interval_ms) = args.interval_ms {
        anyhow::ensure!(interval_ms > 0, "--interval-ms must be greater than zero");
        config.poll_interval_ms = interval_ms;
    }

    if config.trip_feeds.is_empty() && config.alert_feeds.is_empty() {
        tracing::warn!("no feed endpoints configured");
    }

    tracing::info!(
        database_url = config.database_url.as_str(),
        trip_feeds = config.trip_feeds.len(),
        alert_feeds = config.alert_feeds.len(),
        "starting ingestd"
    );

    let pool = make_pool(&config.database_url).await?;
    apply_schema(&pool).await?;

    let source = HttpFeedSource::new(Duration::from_millis(config.fetch_timeout_ms))?;
    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let mut orchestrator = Orchestrator::new(config, source, pool.clone());

    if args.once {
        let report = orchestrator.run_once().await;
        log_report(&report);
        pool.close().await;
        return Ok(());
    }

    let mut interval = tokio::time::interval(poll_interval);
    // a slow cycle delays the next one instead of triggering a burst
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = orchestrator.run_once().await;
                log_report(&report);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    pool.close().await;

    Ok(())
}
