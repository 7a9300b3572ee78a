use derive_more::Display;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use stable_asset_engine::clock::{Clock, ManualClock};
use stable_asset_engine::config::EngineConfig;
use stable_asset_engine::error::EngineError;
use stable_asset_engine::ledger::AssetLedger;
use stable_asset_engine::pool::CreatePool;
use stable_asset_engine::repo::PoolRepo;
use stable_asset_engine::types::{AccountId, AssetId, ChainId, PoolId};
use stable_asset_engine::xcm::XcmPoolEngine;
use stable_asset_math::Balance;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default)]
    pub engine: EngineConfig,
    pub start_time: u64,
    #[serde(default)]
    pub balances: Vec<Grant>,
    #[serde(default)]
    pub quotas: Vec<QuotaOverride>,
    pub pools: Vec<PoolScenario>,
}

/// Initial holdings of an account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    pub account: AccountId,
    pub asset: AssetId,
    pub amount: Balance,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaOverride {
    pub chain: ChainId,
    pub period_length: u64,
    #[serde(default)]
    pub used: Balance,
    pub limit: Balance,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolScenario {
    pub create: CreatePool,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Step {
    #[serde(rename_all = "camelCase")]
    Mint {
        who: AccountId,
        amounts: Vec<Balance>,
        #[serde(default)]
        min_mint_amount: Balance,
    },
    #[serde(rename_all = "camelCase")]
    Swap {
        who: AccountId,
        input_index: usize,
        output_index: usize,
        input_amount: Balance,
        #[serde(default)]
        min_output_amount: Balance,
    },
    #[serde(rename_all = "camelCase")]
    RedeemProportion {
        who: AccountId,
        share_amount: Balance,
        min_amounts: Vec<Balance>,
    },
    #[serde(rename_all = "camelCase")]
    RedeemSingle {
        who: AccountId,
        share_amount: Balance,
        output_index: usize,
        #[serde(default)]
        min_output_amount: Balance,
    },
    #[serde(rename_all = "camelCase")]
    RedeemMulti {
        who: AccountId,
        amounts: Vec<Balance>,
        max_redeem_amount: Balance,
    },
    CollectYield,
    #[serde(rename_all = "camelCase")]
    RampAmplification { future_a: u128, future_time: u64 },
    #[serde(rename_all = "camelCase")]
    MintFromChain {
        chain: ChainId,
        who: AccountId,
        amounts: Vec<Balance>,
        #[serde(default)]
        min_mint_amount: Balance,
    },
    #[serde(rename_all = "camelCase")]
    RedeemProportionToChain {
        chain: ChainId,
        who: AccountId,
        share_amount: Balance,
        min_amounts: Vec<Balance>,
    },
    #[serde(rename_all = "camelCase")]
    RedeemSingleToChain {
        chain: ChainId,
        who: AccountId,
        share_amount: Balance,
        output_index: usize,
        #[serde(default)]
        min_output_amount: Balance,
    },
    AdvanceClock { seconds: u64 },
}

#[derive(Debug, Clone, Serialize, Display)]
#[display("pool {pool_id}: {committed} committed, {rejected} rejected")]
pub struct RunReport {
    pub pool_id: PoolId,
    pub committed: usize,
    pub rejected: usize,
}

fn render<T: Serialize>(outcome: &T) -> String {
    serde_json::to_string(outcome).unwrap_or_default()
}

/// Create the pool of `scenario` and replay its steps in order.
pub fn run_pool<L, R>(
    xcm: &XcmPoolEngine<L, R, std::sync::Arc<ManualClock>>,
    scenario: PoolScenario,
) -> Result<RunReport, EngineError>
where
    L: AssetLedger,
    R: PoolRepo,
{
    let engine = xcm.engine();
    let pool = engine.create_pool(scenario.create)?;
    let pool_id = pool.pool_id;
    let asset_length = pool.n_assets();
    let mut report = RunReport {
        pool_id,
        committed: 0,
        rejected: 0,
    };
    for (n, step) in scenario.steps.into_iter().enumerate() {
        let result = match step {
            Step::Mint {
                who,
                amounts,
                min_mint_amount,
            } => engine
                .mint(&who, pool_id, &amounts, min_mint_amount)
                .map(|o| render(&o)),
            Step::Swap {
                who,
                input_index,
                output_index,
                input_amount,
                min_output_amount,
            } => engine
                .swap(
                    &who,
                    pool_id,
                    input_index,
                    output_index,
                    input_amount,
                    min_output_amount,
                    asset_length,
                )
                .map(|o| render(&o)),
            Step::RedeemProportion {
                who,
                share_amount,
                min_amounts,
            } => engine
                .redeem_proportion(&who, pool_id, share_amount, &min_amounts)
                .map(|o| render(&o)),
            Step::RedeemSingle {
                who,
                share_amount,
                output_index,
                min_output_amount,
            } => engine
                .redeem_single(
                    &who,
                    pool_id,
                    share_amount,
                    output_index,
                    min_output_amount,
                    asset_length,
                )
                .map(|o| render(&o)),
            Step::RedeemMulti {
                who,
                amounts,
                max_redeem_amount,
            } => engine
                .redeem_multi(&who, pool_id, &amounts, max_redeem_amount)
                .map(|o| render(&o)),
            Step::CollectYield => engine.collect_yield(pool_id).map(|o| render(&o)),
            Step::RampAmplification {
                future_a,
                future_time,
            } => engine
                .ramp_amplification(pool_id, future_a, future_time)
                .map(|o| render(&o)),
            Step::MintFromChain {
                chain,
                who,
                amounts,
                min_mint_amount,
            } => xcm
                .mint_from_chain(chain, &who, pool_id, &amounts, min_mint_amount)
                .map(|o| render(&o)),
            Step::RedeemProportionToChain {
                chain,
                who,
                share_amount,
                min_amounts,
            } => xcm
                .redeem_proportion_to_chain(chain, &who, pool_id, share_amount, &min_amounts)
                .map(|o| render(&o)),
            Step::RedeemSingleToChain {
                chain,
                who,
                share_amount,
                output_index,
                min_output_amount,
            } => xcm
                .redeem_single_to_chain(
                    chain,
                    &who,
                    pool_id,
                    share_amount,
                    output_index,
                    min_output_amount,
                    asset_length,
                )
                .map(|o| render(&o)),
            Step::AdvanceClock { seconds } => {
                engine.clock().advance(seconds);
                Ok(format!("{{\"now\":{}}}", engine.clock().now()))
            }
        };
        match result {
            Ok(outcome) => {
                info!("pool {} step {}: {}", pool_id, n, outcome);
                report.committed += 1;
            }
            Err(err) => {
                warn!("pool {} step {} failed: {}", pool_id, n, err);
                report.rejected += 1;
            }
        }
    }
    Ok(report)
}
