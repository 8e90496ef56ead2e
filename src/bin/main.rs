//! Wires the core up as a standalone process: loads configuration, starts
//! logging, registers the enabled sources already in the store, and runs
//! the scheduler until shutdown.

use std::sync::Arc;

use anyhow::Error;
use crawlcore::{CoreConfig, CrawlManager, PoliteFetcher, Scheduler, Store};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = CoreConfig::from_env();
    crawlcore::init_logging(&config)?;

    info!("crawlcore starting up");

    let store = Arc::new(Store::new());
    let reconciled = store.reconcile_stale_running();
    if reconciled > 0 {
        info!(reconciled, "reconciled sources left running by a prior process");
    }

    let fetcher = Arc::new(PoliteFetcher::with_delay(config.crawler_user_agent.clone(), config.crawler_delay));
    let crawl_manager = Arc::new(CrawlManager::new(store.clone(), fetcher));
    let scheduler = Arc::new(Scheduler::new(store.clone(), crawl_manager));

    let scheduled = scheduler.load_all_sources()?;
    info!(scheduled, "loaded enabled sources into the scheduler");

    scheduler.start();

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    scheduler.shutdown(true);

    Ok(())
}
