use log::{info, warn};
use parking_lot::Mutex;
use stable_asset_math::fixed_point::to_internal;
use stable_asset_math::Balance;

use crate::clock::Clock;
use crate::engine::PoolEngine;
use crate::error::EngineError;
use crate::ledger::AssetLedger;
use crate::pool::{MintOutcome, RedeemOutcome};
use crate::quota::{QuotaLimiter, QuotaWindow};
use crate::repo::PoolRepo;
use crate::types::{AccountId, ChainId, PoolId};

/// [PoolEngine] for liquidity that enters from or leaves to a remote chain.
/// Every such operation is bounded by the quota of that chain.
pub struct XcmPoolEngine<Ledger, Repo, Time> {
    engine: PoolEngine<Ledger, Repo, Time>,
    quota: Mutex<QuotaLimiter>,
}

impl<Ledger, Repo, Time> XcmPoolEngine<Ledger, Repo, Time>
where
    Ledger: AssetLedger,
    Repo: PoolRepo,
    Time: Clock,
{
    pub fn new(engine: PoolEngine<Ledger, Repo, Time>) -> Self {
        let quota = QuotaLimiter::new(engine.config().quota);
        Self {
            engine,
            quota: Mutex::new(quota),
        }
    }

    pub fn engine(&self) -> &PoolEngine<Ledger, Repo, Time> {
        &self.engine
    }

    pub fn window(&self, chain: ChainId) -> Option<QuotaWindow> {
        self.quota.lock().window(chain)
    }

    pub fn update_limit(
        &self,
        chain: ChainId,
        period_length: u64,
        used: Balance,
        limit: Balance,
    ) -> Result<QuotaWindow, EngineError> {
        let now = self.engine.clock().now();
        let window = self
            .quota
            .lock()
            .update_limit(chain, period_length, used, limit, now)?;
        info!("Quota of chain {} set to {:?}", chain, window);
        Ok(window)
    }

    /// Reserve `value` of the quota of `chain`, run `op`, then charge the
    /// reservation only if `op` succeeded. The limiter is not locked while `op`
    /// runs, so metered operations on different pools proceed in parallel.
    fn gated<Outcome, Op>(&self, chain: ChainId, value: Balance, op: Op) -> Result<Outcome, EngineError>
    where
        Op: FnOnce(&PoolEngine<Ledger, Repo, Time>) -> Result<Outcome, EngineError>,
    {
        let now = self.engine.clock().now();
        self.quota.lock().reserve(chain, value, now).map_err(|err| {
            warn!("Chain {} quota rejected value {}: {}", chain, value, err);
            err
        })?;
        let result = op(&self.engine);
        self.quota.lock().settle(chain, value, result.is_ok(), now);
        result
    }

    /// Mint against assets arriving from `source`. Quota value is the sum of
    /// the deposit in internal units.
    pub fn mint_from_chain(
        &self,
        source: ChainId,
        who: &AccountId,
        pool_id: PoolId,
        amounts: &[Balance],
        min_mint_amount: Balance,
    ) -> Result<MintOutcome, EngineError> {
        let pool = self.engine.pool(pool_id)?;
        if amounts.len() != pool.n_assets() {
            return Err(EngineError::ArgumentsMismatch);
        }
        let value = amounts
            .iter()
            .zip(&pool.precisions)
            .try_fold(0 as Balance, |acc, (amount, precision)| {
                let internal = to_internal(*amount, *precision)?;
                acc.checked_add(internal).ok_or(EngineError::Overflow)
            })?;
        let outcome = self.gated(source, value, |engine| {
            engine.mint(who, pool_id, amounts, min_mint_amount)
        })?;
        info!(
            "Minted {} shares of pool {} for assets from chain {}",
            outcome.minted, pool_id, source
        );
        Ok(outcome)
    }

    /// Proportional redemption whose proceeds leave to `destination`.
    pub fn redeem_proportion_to_chain(
        &self,
        destination: ChainId,
        who: &AccountId,
        pool_id: PoolId,
        share_amount: Balance,
        min_amounts: &[Balance],
    ) -> Result<RedeemOutcome, EngineError> {
        let outcome = self.gated(destination, share_amount, |engine| {
            engine.redeem_proportion(who, pool_id, share_amount, min_amounts)
        })?;
        info!(
            "Redeemed {} shares of pool {} to chain {}",
            share_amount, pool_id, destination
        );
        Ok(outcome)
    }

    /// Single-asset redemption whose proceeds leave to `destination`.
    pub fn redeem_single_to_chain(
        &self,
        destination: ChainId,
        who: &AccountId,
        pool_id: PoolId,
        share_amount: Balance,
        output_index: usize,
        min_output_amount: Balance,
        asset_length: usize,
    ) -> Result<RedeemOutcome, EngineError> {
        let outcome = self.gated(destination, share_amount, |engine| {
            engine.redeem_single(
                who,
                pool_id,
                share_amount,
                output_index,
                min_output_amount,
                asset_length,
            )
        })?;
        info!(
            "Redeemed {} shares of pool {} as asset index {} to chain {}",
            share_amount, pool_id, output_index, destination
        );
        Ok(outcome)
    }
}
