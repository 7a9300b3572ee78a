use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;
use stable_asset_math::Balance;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::ledger::AssetLedger;
use crate::pool::{
    AmplificationSchedule, CreatePool, MintOutcome, RedeemOutcome, StablePool, SwapOutcome, Transition,
    YieldOutcome,
};
use crate::repo::PoolRepo;
use crate::types::{AccountId, PoolId};

/// Owns pool state and runs every pool transition as
/// load -> plan -> settle -> commit under the pool's lock.
pub struct PoolEngine<Ledger, Repo, Time> {
    ledger: Ledger,
    repo: Repo,
    clock: Time,
    config: EngineConfig,
    locks: Mutex<HashMap<PoolId, Arc<Mutex<()>>>>,
}

impl<Ledger, Repo, Time> PoolEngine<Ledger, Repo, Time>
where
    Ledger: AssetLedger,
    Repo: PoolRepo,
    Time: Clock,
{
    pub fn new(ledger: Ledger, repo: Repo, clock: Time, config: EngineConfig) -> Self {
        Self {
            ledger,
            repo,
            clock,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn clock(&self) -> &Time {
        &self.clock
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pool(&self, pool_id: PoolId) -> Result<StablePool, EngineError> {
        self.repo.get(pool_id).ok_or(EngineError::PoolNotFound(pool_id))
    }

    pub fn pool_ids(&self) -> Vec<PoolId> {
        self.repo.ids()
    }

    /// Lock of an existing pool. Unknown ids never get an entry.
    fn pool_lock(&self, pool_id: PoolId) -> Result<Arc<Mutex<()>>, EngineError> {
        let mut locks = self.locks.lock();
        if let Some(lock) = locks.get(&pool_id) {
            return Ok(lock.clone());
        }
        if !self.repo.contains(pool_id) {
            return Err(EngineError::PoolNotFound(pool_id));
        }
        Ok(locks.entry(pool_id).or_default().clone())
    }

    pub fn create_pool(&self, req: CreatePool) -> Result<StablePool, EngineError> {
        let pool_id = req.pool_id;
        // The lock table is held so that creation and first use of an id are serialized.
        let mut locks = self.locks.lock();
        let result = if self.repo.contains(pool_id) {
            Err(EngineError::PoolAlreadyExists(pool_id))
        } else {
            StablePool::create(req, self.config.max_pool_assets, self.clock.now())
        };
        match result {
            Ok(pool) => {
                info!(
                    "Created pool {} over assets {:?} with precisions {:?}",
                    pool_id, pool.assets, pool.precisions
                );
                self.repo.put(pool.clone());
                locks.entry(pool_id).or_default();
                Ok(pool)
            }
            Err(err) => {
                warn!("create_pool {} rejected: {}", pool_id, err);
                Err(err)
            }
        }
    }

    /// Run one transition of `pool_id` atomically: nothing is written unless
    /// both the plan and the ledger settlement succeed.
    fn execute<Outcome, Plan>(&self, pool_id: PoolId, op: &str, plan: Plan) -> Result<Outcome, EngineError>
    where
        Outcome: Debug,
        Plan: FnOnce(&StablePool, u64) -> Result<Transition<Outcome>, EngineError>,
    {
        let result = self.pool_lock(pool_id).and_then(|lock| {
            let _guard = lock.lock();
            let pool = self.pool(pool_id)?;
            let now = self.clock.now();
            let Transition {
                pool,
                settlement,
                outcome,
            } = plan(&pool, now)?;
            debug!("{} on pool {}: settling {:?}", op, pool_id, settlement.movements());
            self.ledger.settle(&settlement)?;
            self.repo.put(pool);
            Ok(outcome)
        });
        match &result {
            Ok(outcome) => info!("{} on pool {} committed: {:?}", op, pool_id, outcome),
            Err(EngineError::ConvergenceFailure { .. }) => {}
            Err(err) => warn!("{} on pool {} rejected: {}", op, pool_id, err),
        }
        result
    }

    pub fn mint(
        &self,
        who: &AccountId,
        pool_id: PoolId,
        amounts: &[Balance],
        min_mint_amount: Balance,
    ) -> Result<MintOutcome, EngineError> {
        self.execute(pool_id, "mint", |pool, now| {
            pool.plan_mint(who, amounts, min_mint_amount, now)
        })
    }

    pub fn swap(
        &self,
        who: &AccountId,
        pool_id: PoolId,
        input_index: usize,
        output_index: usize,
        input_amount: Balance,
        min_output_amount: Balance,
        asset_length: usize,
    ) -> Result<SwapOutcome, EngineError> {
        self.execute(pool_id, "swap", |pool, now| {
            pool.plan_swap(
                who,
                input_index,
                output_index,
                input_amount,
                min_output_amount,
                asset_length,
                now,
            )
        })
    }

    pub fn redeem_proportion(
        &self,
        who: &AccountId,
        pool_id: PoolId,
        share_amount: Balance,
        min_amounts: &[Balance],
    ) -> Result<RedeemOutcome, EngineError> {
        self.execute(pool_id, "redeem_proportion", |pool, _| {
            pool.plan_redeem_proportion(who, share_amount, min_amounts)
        })
    }

    pub fn redeem_single(
        &self,
        who: &AccountId,
        pool_id: PoolId,
        share_amount: Balance,
        output_index: usize,
        min_output_amount: Balance,
        asset_length: usize,
    ) -> Result<RedeemOutcome, EngineError> {
        self.execute(pool_id, "redeem_single", |pool, now| {
            pool.plan_redeem_single(
                who,
                share_amount,
                output_index,
                min_output_amount,
                asset_length,
                now,
            )
        })
    }

    pub fn redeem_multi(
        &self,
        who: &AccountId,
        pool_id: PoolId,
        amounts: &[Balance],
        max_redeem_amount: Balance,
    ) -> Result<RedeemOutcome, EngineError> {
        self.execute(pool_id, "redeem_multi", |pool, now| {
            pool.plan_redeem_multi(who, amounts, max_redeem_amount, now)
        })
    }

    /// Mint shares for value that accrued in the custodial account outside of
    /// pool operations.
    pub fn collect_yield(&self, pool_id: PoolId) -> Result<YieldOutcome, EngineError> {
        self.execute(pool_id, "collect_yield", |pool, now| {
            let holdings: Vec<Balance> = pool
                .assets
                .iter()
                .map(|asset| self.ledger.balance(*asset, &pool.custodial_account))
                .collect();
            pool.plan_collect_yield(&holdings, now)
        })
    }

    pub fn ramp_amplification(
        &self,
        pool_id: PoolId,
        future_a: u128,
        future_time: u64,
    ) -> Result<AmplificationSchedule, EngineError> {
        self.execute(pool_id, "ramp_amplification", |pool, now| {
            pool.plan_ramp(future_a, future_time, now)
        })
    }
}
