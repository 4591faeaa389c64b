//! Entry point for fleetwatch. Parses args, resolves settings and performs one run.

use std::env;

use fleetwatch::config::{parse_args, Settings};
use fleetwatch::monitor::Monitor;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = match parse_args(env::args()) {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            // plain usage means --help was asked for
            if msg.starts_with("Usage:") {
                return Ok(());
            }
            std::process::exit(2);
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::resolve(&args)?;
    info!(
        inventory = %settings.inventory_url,
        state_dir = %settings.state_dir.display(),
        cycles = settings.cycles,
        dry_run = settings.dry_run,
        "starting fleetwatch"
    );

    let report = Monitor::from_settings(&settings)?.run().await?;
    info!(
        roster = report.roster_size,
        polled = report.polled,
        skipped = report.skipped,
        new_machines = report.diff.len(),
        tickets = report.tickets.len(),
        "run complete"
    );
    Ok(())
}
