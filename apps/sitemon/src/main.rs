use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use sitemon::sites::load_sites;
use sitemon::{HttpChecker, MonitoringScheduler, Settings, StateStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logger::init_tracing();

    info!("Starting Site Monitor");
    let settings = Settings::load_or_default();
    info!("{settings}");

    let sites = load_sites(&settings.paths.sites);
    let store = StateStore::new(&settings.paths.state);
    let state = store.load();
    match state.last_check {
        Some(last) => info!("Previous sweep finished at {} ({} sites)", last.to_rfc3339(), state.sites.len()),
        None => info!("No previous sweep recorded"),
    }

    let checker = HttpChecker::new(settings.http.timeout(), &settings.http.user_agent)
        .context("Failed to build HTTP client")?;

    info!(
        "Will check {} sites every {}s with a {}ms pause between checks",
        sites.len(),
        settings.schedule.interval_seconds,
        settings.schedule.pacing_delay_ms
    );

    MonitoringScheduler::new(Arc::new(checker), store, sites, settings.schedule).run(state).await;

    Ok(())
}
