mod scenario;

use std::sync::Arc;

use clap::Parser;
use futures::future::join_all;
use log::{error, info};
use stable_asset_engine::clock::ManualClock;
use stable_asset_engine::engine::PoolEngine;
use stable_asset_engine::ledger::InMemoryLedger;
use stable_asset_engine::repo::{InMemoryPoolRepo, PoolRepoWithTracing};
use stable_asset_engine::xcm::XcmPoolEngine;

use crate::scenario::{run_pool, Scenario};

#[tokio::main]
async fn main() {
    let args = AppArgs::parse();

    log4rs::init_file(args.log4rs_path, Default::default()).unwrap();

    let raw_config = std::fs::File::open(args.config_path).expect("Cannot load scenario file");
    let scenario: Scenario = serde_json::from_reader(raw_config).expect("Invalid scenario file");

    let ledger = Arc::new(InMemoryLedger::new());
    let clock = Arc::new(ManualClock::new(scenario.start_time));
    let engine = PoolEngine::new(
        ledger.clone(),
        PoolRepoWithTracing::wrap(InMemoryPoolRepo::new()),
        clock,
        scenario.engine.clone(),
    );
    let xcm = Arc::new(XcmPoolEngine::new(engine));

    for grant in &scenario.balances {
        ledger
            .deposit(grant.asset, &grant.account, grant.amount)
            .expect("Invalid initial balance");
    }
    for quota in &scenario.quotas {
        if let Err(err) = xcm.update_limit(quota.chain, quota.period_length, quota.used, quota.limit) {
            error!("Cannot set quota of chain {}: {}", quota.chain, err);
        }
    }

    // Pools share no state, so each one is replayed on its own blocking task.
    let runs = scenario.pools.into_iter().map(|pool_scenario| {
        let xcm = xcm.clone();
        tokio::task::spawn_blocking(move || run_pool(&xcm, pool_scenario))
    });
    for run in join_all(runs).await {
        match run {
            Ok(Ok(report)) => info!("{}", report),
            Ok(Err(err)) => error!("Pool could not be created: {}", err),
            Err(err) => error!("Pool run aborted: {}", err),
        }
    }

    let engine = xcm.engine();
    for pool_id in engine.pool_ids() {
        if let Ok(pool) = engine.pool(pool_id) {
            info!(
                "Final state of pool {}: {}",
                pool_id,
                serde_json::to_string(&pool).unwrap_or_default()
            );
        }
    }
}

#[derive(Parser)]
#[command(name = "stable-asset-sim")]
#[command(version = "0.1.0")]
#[command(about = "Replays stable asset pool scenarios", long_about = None)]
struct AppArgs {
    /// Path to the JSON scenario file.
    #[arg(long, short)]
    config_path: String,
    /// Path to the log4rs YAML configuration file.
    #[arg(long, short)]
    log4rs_path: String,
}
