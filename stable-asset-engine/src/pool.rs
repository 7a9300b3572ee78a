use std::collections::HashSet;

use log::debug;
use serde::{Deserialize, Serialize};
use stable_asset_math::fees::FeeConfig;
use stable_asset_math::fixed_point::{scale, scale_ceil, to_external, to_internal};
use stable_asset_math::invariant::{solve_d, solve_y};
use stable_asset_math::Balance;

use crate::error::EngineError;
use crate::ledger::Settlement;
use crate::types::{AccountId, AssetId, PoolId};

/// Linear ramp of the amplification coefficient between two points in time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmplificationSchedule {
    pub initial_a: u128,
    pub initial_time: u64,
    pub future_a: u128,
    pub future_time: u64,
}

impl AmplificationSchedule {
    pub fn fixed(a: u128, now: u64) -> Self {
        Self {
            initial_a: a,
            initial_time: now,
            future_a: a,
            future_time: now,
        }
    }

    /// Effective coefficient at `now`.
    pub fn at(&self, now: u64) -> Result<u128, EngineError> {
        if now >= self.future_time || self.future_time <= self.initial_time {
            return Ok(self.future_a);
        }
        if now <= self.initial_time {
            return Ok(self.initial_a);
        }
        let elapsed = (now - self.initial_time) as u128;
        let span = (self.future_time - self.initial_time) as u128;
        if self.future_a >= self.initial_a {
            let step = scale(self.future_a - self.initial_a, elapsed, span)?;
            Ok(self.initial_a + step)
        } else {
            let step = scale(self.initial_a - self.future_a, elapsed, span)?;
            Ok(self.initial_a - step)
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmplificationRamp {
    pub future_a: u128,
    pub future_time: u64,
}

/// Parameters of a new pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePool {
    pub pool_id: PoolId,
    pub pool_asset: AssetId,
    pub assets: Vec<AssetId>,
    pub precisions: Vec<Balance>,
    pub ampl_coefficient: u128,
    #[serde(default)]
    pub ramp: Option<AmplificationRamp>,
    #[serde(default)]
    pub fees: FeeConfig,
    pub fee_recipient: AccountId,
    pub yield_recipient: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StablePool {
    pub pool_id: PoolId,
    /// Share token minted to depositors.
    pub pool_asset: AssetId,
    pub assets: Vec<AssetId>,
    pub precisions: Vec<Balance>,
    /// Internal-unit balances, index-aligned with `assets`.
    pub balances: Vec<Balance>,
    pub total_supply: Balance,
    pub amplification: AmplificationSchedule,
    pub fees: FeeConfig,
    pub fee_recipient: AccountId,
    pub yield_recipient: AccountId,
    pub custodial_account: AccountId,
}

/// Would-be next state of a pool together with the ledger movements that
/// realise it and the externally observable outcome.
#[derive(Debug, Clone)]
pub struct Transition<Outcome> {
    pub pool: StablePool,
    pub settlement: Settlement,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MintOutcome {
    /// Shares credited to the depositor.
    pub minted: Balance,
    /// Mint fee in shares.
    pub fee: Balance,
    /// Part of `fee` minted to the fee recipient.
    pub admin_fee: Balance,
    /// Internal-unit imbalance fee per asset.
    pub imbalance_fees: Vec<Balance>,
    pub total_supply: Balance,
    pub balances: Vec<Balance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapOutcome {
    pub input_index: usize,
    pub output_index: usize,
    pub input_amount: Balance,
    /// Amount credited to the swapper, net of fees.
    pub output_amount: Balance,
    pub fee: Balance,
    pub admin_fee: Balance,
    pub balances: Vec<Balance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemOutcome {
    /// External amounts paid out, index-aligned with the pool assets.
    pub amounts: Vec<Balance>,
    /// Shares taken from the redeemer, fee included.
    pub share_amount: Balance,
    /// Redeem fee in shares.
    pub fee: Balance,
    pub admin_fee: Balance,
    pub total_supply: Balance,
    pub balances: Vec<Balance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldOutcome {
    pub minted: Balance,
    pub total_supply: Balance,
    pub balances: Vec<Balance>,
}

fn sub_each(balances: &[Balance], fees: &[Balance]) -> Result<Vec<Balance>, EngineError> {
    balances
        .iter()
        .zip(fees)
        .map(|(b, f)| b.checked_sub(*f).ok_or(EngineError::InsufficientBalance))
        .collect()
}

fn checked_sub(a: Balance, b: Balance) -> Result<Balance, EngineError> {
    a.checked_sub(b).ok_or(EngineError::InsufficientBalance)
}

fn checked_add(a: Balance, b: Balance) -> Result<Balance, EngineError> {
    a.checked_add(b).ok_or(EngineError::Overflow)
}

impl StablePool {
    pub fn create(req: CreatePool, max_assets: usize, now: u64) -> Result<Self, EngineError> {
        let n_assets = req.assets.len();
        if n_assets < 2 || n_assets > max_assets {
            return Err(EngineError::InvalidAssetList);
        }
        let distinct: HashSet<AssetId> = req.assets.iter().copied().collect();
        if distinct.len() != n_assets || distinct.contains(&req.pool_asset) {
            return Err(EngineError::InvalidAssetList);
        }
        if req.precisions.len() != n_assets {
            return Err(EngineError::ArgumentsMismatch);
        }
        if req.precisions.iter().any(|p| *p == 0) {
            return Err(EngineError::InvalidPrecision);
        }
        if req.ampl_coefficient == 0 {
            return Err(EngineError::InvalidAmplification);
        }
        if !req.fees.is_valid() {
            return Err(EngineError::InvalidFeeConfig);
        }
        let amplification = match req.ramp {
            None => AmplificationSchedule::fixed(req.ampl_coefficient, now),
            Some(ramp) if ramp.future_a > 0 && ramp.future_time > now => AmplificationSchedule {
                initial_a: req.ampl_coefficient,
                initial_time: now,
                future_a: ramp.future_a,
                future_time: ramp.future_time,
            },
            Some(_) => return Err(EngineError::InvalidAmplification),
        };
        Ok(Self {
            pool_id: req.pool_id,
            pool_asset: req.pool_asset,
            assets: req.assets,
            precisions: req.precisions,
            balances: vec![0; n_assets],
            total_supply: 0,
            amplification,
            fees: req.fees,
            fee_recipient: req.fee_recipient,
            yield_recipient: req.yield_recipient,
            custodial_account: AccountId::custodial(req.pool_id),
        })
    }

    pub fn n_assets(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_supply == 0
    }

    pub fn ampl(&self, now: u64) -> Result<u128, EngineError> {
        self.amplification.at(now)
    }

    /// Invariant of the current balances.
    pub fn invariant(&self, now: u64) -> Result<Balance, EngineError> {
        Ok(solve_d(&self.balances, self.ampl(now)?)?)
    }

    fn check_len(&self, len: usize) -> Result<(), EngineError> {
        if len != self.n_assets() {
            return Err(EngineError::ArgumentsMismatch);
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<(), EngineError> {
        if index >= self.n_assets() {
            return Err(EngineError::IndexOutOfRange {
                index,
                len: self.n_assets(),
            });
        }
        Ok(())
    }

    fn check_redeemable(&self, share_amount: Balance) -> Result<(), EngineError> {
        if self.is_empty() {
            return Err(EngineError::PoolEmpty);
        }
        if share_amount == 0 {
            return Err(EngineError::InvalidAmount);
        }
        if share_amount > self.total_supply {
            return Err(EngineError::InsufficientBalance);
        }
        Ok(())
    }

    /// Sends the admin part of per-asset imbalance fees to the fee recipient.
    /// Only whole external units leave the pool.
    fn route_admin_fees(
        &self,
        imbalance_fees: &[Balance],
        balances: &mut [Balance],
        settlement: &mut Settlement,
    ) -> Result<(), EngineError> {
        for (i, fee) in imbalance_fees.iter().enumerate() {
            let admin = to_external(self.fees.admin_share(*fee)?, self.precisions[i])?;
            balances[i] = checked_sub(balances[i], to_internal(admin, self.precisions[i])?)?;
            settlement.transfer(self.assets[i], &self.custodial_account, &self.fee_recipient, admin);
        }
        Ok(())
    }

    fn with_state(&self, balances: Vec<Balance>, total_supply: Balance) -> Self {
        Self {
            balances,
            total_supply,
            ..self.clone()
        }
    }

    /// Deposit `amounts` (external units) and mint shares to `who`.
    ///
    /// The first deposit must cover every asset and mints `D` shares. Later
    /// deposits pay the imbalance fee on their deviation from the current
    /// proportions and mint `total_supply * (D2 - D0) / D0`, where `D2` is the
    /// invariant of the fee-adjusted balances.
    pub fn plan_mint(
        &self,
        who: &AccountId,
        amounts: &[Balance],
        min_mint_amount: Balance,
        now: u64,
    ) -> Result<Transition<MintOutcome>, EngineError> {
        self.check_len(amounts.len())?;
        let genesis = self.is_empty();
        if amounts.iter().all(|x| *x == 0) || (genesis && amounts.iter().any(|x| *x == 0)) {
            return Err(EngineError::InvalidAmount);
        }
        let a = self.ampl(now)?;
        let mut new_balances = Vec::with_capacity(self.n_assets());
        for (i, amount) in amounts.iter().enumerate() {
            let dx = to_internal(*amount, self.precisions[i])?;
            new_balances.push(checked_add(self.balances[i], dx)?);
        }
        let d0 = solve_d(&self.balances, a)?;
        let d1 = solve_d(&new_balances, a)?;
        if d1 <= d0 {
            return Err(EngineError::InvalidAmount);
        }
        let (gross, imbalance_fees) = if genesis {
            (d1, vec![0; self.n_assets()])
        } else {
            let imbalance_fees = self.fees.imbalance_fees(&self.balances, &new_balances, d0, d1)?;
            let d2 = solve_d(&sub_each(&new_balances, &imbalance_fees)?, a)?;
            if d2 <= d0 {
                return Err(EngineError::InvalidAmount);
            }
            (scale(self.total_supply, d2 - d0, d0)?, imbalance_fees)
        };
        debug!(
            "plan_mint: pool {} d0 = {}, d1 = {}, gross shares = {}",
            self.pool_id, d0, d1, gross
        );
        let split = self.fees.mint_fee(gross)?;
        if split.net == 0 {
            return Err(EngineError::InvalidAmount);
        }
        if split.net < min_mint_amount {
            return Err(EngineError::MintAmountBelowMinimum {
                minted: split.net,
                min: min_mint_amount,
            });
        }

        let mut settlement = Settlement::new();
        for (i, amount) in amounts.iter().enumerate() {
            settlement.transfer(self.assets[i], who, &self.custodial_account, *amount);
        }
        let mut balances = new_balances;
        self.route_admin_fees(&imbalance_fees, &mut balances, &mut settlement)?;
        settlement.mint(self.pool_asset, who, split.net);
        settlement.mint(self.pool_asset, &self.fee_recipient, split.admin);
        let total_supply = checked_add(checked_add(self.total_supply, split.net)?, split.admin)?;

        Ok(Transition {
            pool: self.with_state(balances.clone(), total_supply),
            settlement,
            outcome: MintOutcome {
                minted: split.net,
                fee: split.fee,
                admin_fee: split.admin,
                imbalance_fees,
                total_supply,
                balances,
            },
        })
    }

    /// Exchange `input_amount` of asset `input_index` for asset `output_index`
    /// keeping the invariant. The swap fee is charged on the output.
    pub fn plan_swap(
        &self,
        who: &AccountId,
        input_index: usize,
        output_index: usize,
        input_amount: Balance,
        min_output_amount: Balance,
        asset_length: usize,
        now: u64,
    ) -> Result<Transition<SwapOutcome>, EngineError> {
        if input_index == output_index {
            return Err(EngineError::SameAsset);
        }
        self.check_len(asset_length)?;
        self.check_index(input_index)?;
        self.check_index(output_index)?;
        if input_amount == 0 {
            return Err(EngineError::InvalidAmount);
        }
        if self.is_empty() {
            return Err(EngineError::PoolEmpty);
        }
        let a = self.ampl(now)?;
        let d = solve_d(&self.balances, a)?;
        let mut balances = self.balances.clone();
        let dx = to_internal(input_amount, self.precisions[input_index])?;
        balances[input_index] = checked_add(balances[input_index], dx)?;
        let y = solve_y(&balances, output_index, d, a)?;
        // one unit stays in the pool to cover solver rounding
        let dy = checked_sub(checked_sub(balances[output_index], y)?, 1)?;
        let output = to_external(dy, self.precisions[output_index])?;
        debug!(
            "plan_swap: pool {} d = {}, y = {}, raw output = {}",
            self.pool_id, d, y, output
        );
        if output == 0 {
            return Err(EngineError::InvalidAmount);
        }
        let split = self.fees.swap_fee(output)?;
        if split.net < min_output_amount {
            return Err(EngineError::SwapUnderMinimum {
                output: split.net,
                min: min_output_amount,
            });
        }
        let paid = to_internal(checked_add(split.net, split.admin)?, self.precisions[output_index])?;
        balances[output_index] = checked_sub(balances[output_index], paid)?;

        let mut settlement = Settlement::new();
        settlement.transfer(self.assets[input_index], who, &self.custodial_account, input_amount);
        settlement.transfer(self.assets[output_index], &self.custodial_account, who, split.net);
        settlement.transfer(
            self.assets[output_index],
            &self.custodial_account,
            &self.fee_recipient,
            split.admin,
        );

        Ok(Transition {
            pool: self.with_state(balances.clone(), self.total_supply),
            settlement,
            outcome: SwapOutcome {
                input_index,
                output_index,
                input_amount,
                output_amount: split.net,
                fee: split.fee,
                admin_fee: split.admin,
                balances,
            },
        })
    }

    /// Burn `share_amount` for a proportional slice of every balance.
    /// Redeeming the last outstanding shares returns the whole pool.
    pub fn plan_redeem_proportion(
        &self,
        who: &AccountId,
        share_amount: Balance,
        min_amounts: &[Balance],
    ) -> Result<Transition<RedeemOutcome>, EngineError> {
        self.check_len(min_amounts.len())?;
        self.check_redeemable(share_amount)?;
        let split = self.fees.redeem_fee(share_amount)?;
        let burned = share_amount - split.admin;
        let total_supply = checked_sub(self.total_supply, burned)?;

        let mut balances = self.balances.clone();
        let mut amounts = Vec::with_capacity(self.n_assets());
        for (i, min) in min_amounts.iter().enumerate() {
            let share_of_balance = if total_supply == 0 {
                balances[i]
            } else {
                scale(balances[i], split.net, self.total_supply)?
            };
            let amount = to_external(share_of_balance, self.precisions[i])?;
            if amount < *min {
                return Err(EngineError::RedeemUnderMinimum {
                    index: i,
                    amount,
                    min: *min,
                });
            }
            balances[i] = checked_sub(balances[i], to_internal(amount, self.precisions[i])?)?;
            amounts.push(amount);
        }
        if amounts.iter().all(|x| *x == 0) {
            return Err(EngineError::InvalidAmount);
        }

        let mut settlement = Settlement::new();
        settlement.transfer(self.pool_asset, who, &self.fee_recipient, split.admin);
        settlement.burn(self.pool_asset, who, burned);
        for (i, amount) in amounts.iter().enumerate() {
            settlement.transfer(self.assets[i], &self.custodial_account, who, *amount);
        }

        Ok(Transition {
            pool: self.with_state(balances.clone(), total_supply),
            settlement,
            outcome: RedeemOutcome {
                amounts,
                share_amount,
                fee: split.fee,
                admin_fee: split.admin,
                total_supply,
                balances,
            },
        })
    }

    /// Burn `share_amount` for asset `output_index` only.
    ///
    /// The invariant is reduced in proportion to the shares net of the redeem
    /// fee, then the output balance is solved twice: once to price the
    /// imbalance fee and once on the fee-reduced balances to get the payout.
    pub fn plan_redeem_single(
        &self,
        who: &AccountId,
        share_amount: Balance,
        output_index: usize,
        min_output_amount: Balance,
        asset_length: usize,
        now: u64,
    ) -> Result<Transition<RedeemOutcome>, EngineError> {
        self.check_len(asset_length)?;
        self.check_index(output_index)?;
        self.check_redeemable(share_amount)?;
        let split = self.fees.redeem_fee(share_amount)?;
        let burned = share_amount - split.admin;
        let total_supply = checked_sub(self.total_supply, burned)?;
        if total_supply == 0 {
            return Err(EngineError::InvalidAmount);
        }

        let a = self.ampl(now)?;
        let d0 = solve_d(&self.balances, a)?;
        let d1 = checked_sub(d0, scale_ceil(d0, split.net, self.total_supply)?)?;
        let y = solve_y(&self.balances, output_index, d1, a)?;
        let mut expected = self.balances.clone();
        expected[output_index] = y;
        let imbalance_fees = self.fees.imbalance_fees(&self.balances, &expected, d0, d1)?;
        let reduced = sub_each(&self.balances, &imbalance_fees)?;
        let y_reduced = solve_y(&reduced, output_index, d1, a)?;
        let dy = checked_sub(checked_sub(reduced[output_index], y_reduced)?, 1)?;
        let precision = self.precisions[output_index];
        let amount = to_external(dy, precision)?;
        debug!(
            "plan_redeem_single: pool {} d0 = {}, d1 = {}, payout = {}",
            self.pool_id, d0, d1, amount
        );
        if amount == 0 {
            return Err(EngineError::InvalidAmount);
        }
        if amount < min_output_amount {
            return Err(EngineError::RedeemUnderMinimum {
                index: output_index,
                amount,
                min: min_output_amount,
            });
        }
        let fee_paid = self.balances[output_index].saturating_sub(y).saturating_sub(dy);
        let admin_asset = to_external(self.fees.admin_share(fee_paid)?, precision)?;

        let mut balances = self.balances.clone();
        let paid = to_internal(checked_add(amount, admin_asset)?, precision)?;
        balances[output_index] = checked_sub(balances[output_index], paid)?;

        let asset = self.assets[output_index];
        let mut settlement = Settlement::new();
        settlement.transfer(self.pool_asset, who, &self.fee_recipient, split.admin);
        settlement.burn(self.pool_asset, who, burned);
        settlement.transfer(asset, &self.custodial_account, who, amount);
        settlement.transfer(asset, &self.custodial_account, &self.fee_recipient, admin_asset);

        let mut amounts = vec![0; self.n_assets()];
        amounts[output_index] = amount;
        Ok(Transition {
            pool: self.with_state(balances.clone(), total_supply),
            settlement,
            outcome: RedeemOutcome {
                amounts,
                share_amount,
                fee: split.fee,
                admin_fee: split.admin,
                total_supply,
                balances,
            },
        })
    }

    /// Withdraw exact `amounts`, burning as many shares as the withdrawal is
    /// worth plus the imbalance and redeem fees.
    pub fn plan_redeem_multi(
        &self,
        who: &AccountId,
        amounts: &[Balance],
        max_redeem_amount: Balance,
        now: u64,
    ) -> Result<Transition<RedeemOutcome>, EngineError> {
        self.check_len(amounts.len())?;
        if self.is_empty() {
            return Err(EngineError::PoolEmpty);
        }
        if amounts.iter().all(|x| *x == 0) {
            return Err(EngineError::InvalidAmount);
        }
        let a = self.ampl(now)?;
        let mut new_balances = Vec::with_capacity(self.n_assets());
        for (i, amount) in amounts.iter().enumerate() {
            let dx = to_internal(*amount, self.precisions[i])?;
            new_balances.push(checked_sub(self.balances[i], dx)?);
        }
        let d0 = solve_d(&self.balances, a)?;
        let d1 = solve_d(&new_balances, a)?;
        let (d2, imbalance_fees) = if d1 == 0 {
            (0, vec![0; self.n_assets()])
        } else {
            let imbalance_fees = self.fees.imbalance_fees(&self.balances, &new_balances, d0, d1)?;
            (solve_d(&sub_each(&new_balances, &imbalance_fees)?, a)?, imbalance_fees)
        };
        if d2 >= d0 {
            return Err(EngineError::InvalidAmount);
        }
        let burn = scale_ceil(self.total_supply, d0 - d2, d0)?;
        let required = self.fees.gross_up_redeem(burn)?;
        debug!(
            "plan_redeem_multi: pool {} d0 = {}, d2 = {}, required shares = {}",
            self.pool_id, d0, d2, required
        );
        if required > max_redeem_amount {
            return Err(EngineError::RedeemOverMaximum {
                required,
                max: max_redeem_amount,
            });
        }
        if required > self.total_supply {
            return Err(EngineError::InsufficientBalance);
        }
        let fee = required - burn;
        let admin_fee = self.fees.admin_share(fee)?;
        let burned = required - admin_fee;
        let total_supply = self.total_supply - burned;

        let mut settlement = Settlement::new();
        settlement.transfer(self.pool_asset, who, &self.fee_recipient, admin_fee);
        settlement.burn(self.pool_asset, who, burned);
        for (i, amount) in amounts.iter().enumerate() {
            settlement.transfer(self.assets[i], &self.custodial_account, who, *amount);
        }
        let mut balances = new_balances;
        self.route_admin_fees(&imbalance_fees, &mut balances, &mut settlement)?;
        if (total_supply == 0) != balances.iter().all(|b| *b == 0) {
            return Err(EngineError::InvalidAmount);
        }

        Ok(Transition {
            pool: self.with_state(balances.clone(), total_supply),
            settlement,
            outcome: RedeemOutcome {
                amounts: amounts.to_vec(),
                share_amount: required,
                fee,
                admin_fee,
                total_supply,
                balances,
            },
        })
    }

    /// Resynchronise balances with the custodial `holdings` (external units)
    /// and mint the invariant growth to the yield recipient.
    pub fn plan_collect_yield(
        &self,
        holdings: &[Balance],
        now: u64,
    ) -> Result<Transition<YieldOutcome>, EngineError> {
        self.check_len(holdings.len())?;
        if self.is_empty() {
            return Ok(Transition {
                pool: self.clone(),
                settlement: Settlement::new(),
                outcome: YieldOutcome {
                    minted: 0,
                    total_supply: 0,
                    balances: self.balances.clone(),
                },
            });
        }
        let a = self.ampl(now)?;
        let balances = holdings
            .iter()
            .zip(&self.precisions)
            .map(|(h, p)| to_internal(*h, *p))
            .collect::<Result<Vec<_>, _>>()?;
        let d_old = solve_d(&self.balances, a)?;
        let d_new = solve_d(&balances, a)?;
        if d_new < d_old {
            return Err(EngineError::InvalidPoolValue);
        }
        let minted = scale(self.total_supply, d_new - d_old, d_old)?;
        let total_supply = checked_add(self.total_supply, minted)?;
        let mut settlement = Settlement::new();
        settlement.mint(self.pool_asset, &self.yield_recipient, minted);

        Ok(Transition {
            pool: self.with_state(balances.clone(), total_supply),
            settlement,
            outcome: YieldOutcome {
                minted,
                total_supply,
                balances,
            },
        })
    }

    /// Start a new ramp from the coefficient effective at `now`.
    pub fn plan_ramp(
        &self,
        future_a: u128,
        future_time: u64,
        now: u64,
    ) -> Result<Transition<AmplificationSchedule>, EngineError> {
        if future_a == 0 || future_time <= now {
            return Err(EngineError::InvalidAmplification);
        }
        let schedule = AmplificationSchedule {
            initial_a: self.ampl(now)?,
            initial_time: now,
            future_a,
            future_time,
        };
        Ok(Transition {
            pool: Self {
                amplification: schedule,
                ..self.clone()
            },
            settlement: Settlement::new(),
            outcome: schedule,
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use stable_asset_math::fees::FeeConfig;
    use stable_asset_math::Balance;

    use crate::error::EngineError;
    use crate::ledger::Movement;
    use crate::pool::{AmplificationRamp, AmplificationSchedule, CreatePool, StablePool};
    use crate::types::{AccountId, AssetId, PoolId};

    fn request(precisions: Vec<Balance>, a: u128, fees: FeeConfig) -> CreatePool {
        CreatePool {
            pool_id: PoolId::from(1),
            pool_asset: AssetId::from(100),
            assets: (0..precisions.len() as u32).map(AssetId::from).collect(),
            precisions,
            ampl_coefficient: a,
            ramp: None,
            fees,
            fee_recipient: AccountId::new("fees"),
            yield_recipient: AccountId::new("yield"),
        }
    }

    fn seeded_pool(precisions: Vec<Balance>, a: u128, fees: FeeConfig, deposit: &[Balance]) -> StablePool {
        let pool = StablePool::create(request(precisions, a, fees), 8, 0).unwrap();
        pool.plan_mint(&AccountId::new("seed"), deposit, 0, 0).unwrap().pool
    }

    #[test]
    fn create_validates_assets() {
        let fees = FeeConfig::default();
        assert_eq!(
            StablePool::create(request(vec![1], 100, fees), 8, 0),
            Err(EngineError::InvalidAssetList)
        );
        let mut dup = request(vec![1, 1], 100, fees);
        dup.assets = vec![AssetId::from(5), AssetId::from(5)];
        assert_eq!(StablePool::create(dup, 8, 0), Err(EngineError::InvalidAssetList));
        let mut share_as_asset = request(vec![1, 1], 100, fees);
        share_as_asset.pool_asset = AssetId::from(0);
        assert_eq!(
            StablePool::create(share_as_asset, 8, 0),
            Err(EngineError::InvalidAssetList)
        );
        assert_eq!(
            StablePool::create(request(vec![1; 3], 100, fees), 2, 0),
            Err(EngineError::InvalidAssetList)
        );
    }

    #[test]
    fn create_validates_parameters() {
        let fees = FeeConfig::default();
        assert_eq!(
            StablePool::create(request(vec![1, 0], 100, fees), 8, 0),
            Err(EngineError::InvalidPrecision)
        );
        assert_eq!(
            StablePool::create(request(vec![1, 1], 0, fees), 8, 0),
            Err(EngineError::InvalidAmplification)
        );
        assert_eq!(
            StablePool::create(request(vec![1, 1], 100, FeeConfig::new(0, 10_000, 0, 0)), 8, 0),
            Err(EngineError::InvalidFeeConfig)
        );
        let mut ramp_in_past = request(vec![1, 1], 100, fees);
        ramp_in_past.ramp = Some(AmplificationRamp {
            future_a: 200,
            future_time: 10,
        });
        assert_eq!(
            StablePool::create(ramp_in_past, 8, 10),
            Err(EngineError::InvalidAmplification)
        );
        let mut mismatch = request(vec![1, 1], 100, fees);
        mismatch.precisions = vec![1];
        assert_eq!(StablePool::create(mismatch, 8, 0), Err(EngineError::ArgumentsMismatch));
    }

    #[test]
    fn new_pool_is_empty() {
        let pool = StablePool::create(request(vec![1, 1, 1], 100, FeeConfig::default()), 8, 0).unwrap();
        assert!(pool.is_empty());
        assert_eq!(pool.balances, vec![0, 0, 0]);
        assert_eq!(pool.custodial_account, AccountId::custodial(PoolId::from(1)));
        assert_eq!(pool.invariant(0), Ok(0));
    }

    #[test]
    fn amplification_ramps_linearly() {
        let up = AmplificationSchedule {
            initial_a: 100,
            initial_time: 1_000,
            future_a: 200,
            future_time: 2_000,
        };
        assert_eq!(up.at(500), Ok(100));
        assert_eq!(up.at(1_500), Ok(150));
        assert_eq!(up.at(1_999), Ok(199));
        assert_eq!(up.at(5_000), Ok(200));
        let down = AmplificationSchedule {
            initial_a: 200,
            initial_time: 0,
            future_a: 100,
            future_time: 100,
        };
        assert_eq!(down.at(25), Ok(175));
        assert_eq!(AmplificationSchedule::fixed(42, 7).at(0), Ok(42));
    }

    #[test]
    fn genesis_mint_requires_every_asset() {
        let pool = StablePool::create(request(vec![1, 1], 100, FeeConfig::default()), 8, 0).unwrap();
        let who = AccountId::new("alice");
        assert_eq!(
            pool.plan_mint(&who, &[10, 0], 0, 0).map(|t| t.outcome),
            Err(EngineError::InvalidAmount)
        );
        assert_eq!(
            pool.plan_mint(&who, &[10], 0, 0).map(|t| t.outcome),
            Err(EngineError::ArgumentsMismatch)
        );
    }

    #[test]
    fn genesis_mint_of_balanced_deposit_mints_its_sum() {
        let pool = StablePool::create(request(vec![1, 1, 1], 500, FeeConfig::default()), 8, 0).unwrap();
        let who = AccountId::new("alice");
        let transition = pool.plan_mint(&who, &[1_000_000; 3], 0, 0).unwrap();
        assert_eq!(transition.outcome.minted, 3_000_000);
        assert_eq!(transition.pool.total_supply, 3_000_000);
        assert_eq!(transition.pool.balances, vec![1_000_000; 3]);
        assert!(transition.settlement.movements().contains(&Movement::Mint {
            asset: AssetId::from(100),
            to: who,
            amount: 3_000_000
        }));
    }

    #[test]
    fn mint_below_minimum_is_rejected() {
        let pool = StablePool::create(request(vec![1, 1], 100, FeeConfig::default()), 8, 0).unwrap();
        let res = pool.plan_mint(&AccountId::new("alice"), &[100, 100], 201, 0);
        assert_eq!(
            res.map(|t| t.outcome),
            Err(EngineError::MintAmountBelowMinimum { minted: 200, min: 201 })
        );
    }

    #[test]
    fn mint_fee_goes_partly_to_fee_recipient() {
        let fees = FeeConfig::new(100, 0, 0, 5_000);
        let pool = StablePool::create(request(vec![1, 1], 100, fees), 8, 0).unwrap();
        let outcome = pool
            .plan_mint(&AccountId::new("alice"), &[500_000, 500_000], 0, 0)
            .unwrap()
            .outcome;
        assert_eq!(outcome.fee, 10_000);
        assert_eq!(outcome.admin_fee, 5_000);
        assert_eq!(outcome.minted, 990_000);
        assert_eq!(outcome.total_supply, 995_000);
    }

    #[test]
    fn skewed_mint_pays_imbalance_fee() {
        let fees = FeeConfig::new(0, 30, 0, 0);
        let pool = seeded_pool(vec![1, 1], 100, fees, &[1_000_000_000, 1_000_000_000]);
        let who = AccountId::new("alice");
        let skewed = pool.plan_mint(&who, &[200_000_000, 0], 0, 0).unwrap().outcome;
        assert!(skewed.imbalance_fees.iter().all(|f| *f > 0));
        let balanced = pool
            .plan_mint(&who, &[100_000_000, 100_000_000], 0, 0)
            .unwrap()
            .outcome;
        assert_eq!(balanced.imbalance_fees, vec![0, 0]);
        assert!(skewed.minted < balanced.minted);
    }

    #[test]
    fn swap_argument_checks() {
        let pool = seeded_pool(vec![1, 1], 100, FeeConfig::default(), &[1_000, 1_000]);
        let who = AccountId::new("alice");
        assert_eq!(
            pool.plan_swap(&who, 0, 0, 10, 0, 2, 0).map(|t| t.outcome),
            Err(EngineError::SameAsset)
        );
        assert_eq!(
            pool.plan_swap(&who, 1, 1, 10, 0, 3, 0).map(|t| t.outcome),
            Err(EngineError::SameAsset)
        );
        assert_eq!(
            pool.plan_swap(&who, 0, 2, 10, 0, 2, 0).map(|t| t.outcome),
            Err(EngineError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            pool.plan_swap(&who, 0, 1, 10, 0, 3, 0).map(|t| t.outcome),
            Err(EngineError::ArgumentsMismatch)
        );
        let empty = StablePool::create(request(vec![1, 1], 100, FeeConfig::default()), 8, 0).unwrap();
        assert_eq!(
            empty.plan_swap(&who, 0, 1, 10, 0, 2, 0).map(|t| t.outcome),
            Err(EngineError::PoolEmpty)
        );
    }

    #[test]
    fn swap_between_assets_of_different_decimals() {
        let unit_6 = 1_000_000u128;
        let unit_18 = 1_000_000_000_000_000_000u128;
        let pool = seeded_pool(
            vec![1_000_000_000_000, 1],
            100,
            FeeConfig::default(),
            &[1_000_000 * unit_6, 1_000_000 * unit_18],
        );
        let outcome = pool
            .plan_swap(&AccountId::new("alice"), 0, 1, unit_6, 0, 2, 0)
            .unwrap()
            .outcome;
        assert!(outcome.output_amount < unit_18);
        assert!(outcome.output_amount > unit_18 / 1_000 * 999);
        assert_eq!(outcome.balances[0] % 1_000_000_000_000, 0);
    }

    #[test]
    fn swap_fee_reduces_output_and_pays_admin() {
        let deposit = [10_000_000u128, 10_000_000];
        let free = seeded_pool(vec![1, 1], 200, FeeConfig::default(), &deposit);
        let paid = seeded_pool(vec![1, 1], 200, FeeConfig::new(0, 100, 0, 5_000), &deposit);
        let who = AccountId::new("alice");
        let free_out = free.plan_swap(&who, 0, 1, 1_000_000, 0, 2, 0).unwrap().outcome;
        let paid_out = paid.plan_swap(&who, 0, 1, 1_000_000, 0, 2, 0).unwrap().outcome;
        assert!(paid_out.output_amount < free_out.output_amount);
        assert_eq!(paid_out.fee, free_out.output_amount / 100);
        assert_eq!(paid_out.admin_fee, paid_out.fee / 2);
        assert_eq!(
            paid.plan_swap(&who, 0, 1, 1_000_000, free_out.output_amount, 2, 0)
                .map(|t| t.outcome),
            Err(EngineError::SwapUnderMinimum {
                output: paid_out.output_amount,
                min: free_out.output_amount
            })
        );
    }

    #[test]
    fn zero_fee_swaps_keep_invariant() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut pool = seeded_pool(
            vec![1, 1, 1],
            1_000,
            FeeConfig::default(),
            &[5_000_000_000_000, 6_000_000_000_000, 7_000_000_000_000],
        );
        let who = AccountId::new("alice");
        let d_start = pool.invariant(0).unwrap();
        for _ in 0..100 {
            let i = rng.gen_range(0..3);
            let j = (i + rng.gen_range(1..3)) % 3;
            let dx = rng.gen_range(1_000_000..100_000_000_000u128);
            let d_before = pool.invariant(0).unwrap();
            pool = pool.plan_swap(&who, i, j, dx, 0, 3, 0).unwrap().pool;
            let d_after = pool.invariant(0).unwrap();
            assert!(d_after + 2 >= d_before);
        }
        let d_end = pool.invariant(0).unwrap();
        let drift = if d_end > d_start { d_end - d_start } else { d_start - d_end };
        assert!(drift * 1_000_000_000 <= d_start);
    }

    #[test]
    fn proportional_redeem_of_everything_empties_pool() {
        let pool = seeded_pool(vec![1, 10], 100, FeeConfig::default(), &[7_000, 3_000]);
        let seed = AccountId::new("seed");
        let transition = pool
            .plan_redeem_proportion(&seed, pool.total_supply, &[7_000, 3_000])
            .unwrap();
        assert_eq!(transition.outcome.amounts, vec![7_000, 3_000]);
        assert_eq!(transition.pool.balances, vec![0, 0]);
        assert!(transition.pool.is_empty());
    }

    #[test]
    fn proportional_redeem_checks_minimums() {
        let pool = seeded_pool(vec![1, 1], 100, FeeConfig::default(), &[1_000, 1_000]);
        let res = pool.plan_redeem_proportion(&AccountId::new("seed"), pool.total_supply / 2, &[0, 501]);
        assert_eq!(
            res.map(|t| t.outcome),
            Err(EngineError::RedeemUnderMinimum {
                index: 1,
                amount: 500,
                min: 501
            })
        );
        assert_eq!(
            pool.plan_redeem_proportion(&AccountId::new("seed"), pool.total_supply + 1, &[0, 0])
                .map(|t| t.outcome),
            Err(EngineError::InsufficientBalance)
        );
    }

    #[test]
    fn redeem_fee_is_split_between_burn_and_admin() {
        let fees = FeeConfig::new(0, 0, 200, 5_000);
        let pool = seeded_pool(vec![1, 1], 100, fees, &[1_000_000, 1_000_000]);
        let transition = pool
            .plan_redeem_proportion(&AccountId::new("seed"), 100_000, &[0, 0])
            .unwrap();
        assert_eq!(transition.outcome.fee, 2_000);
        assert_eq!(transition.outcome.admin_fee, 1_000);
        assert_eq!(transition.outcome.amounts, vec![49_000, 49_000]);
        assert_eq!(transition.pool.total_supply, 2_000_000 - 99_000);
    }

    #[test]
    fn single_redeem_cannot_empty_pool() {
        let pool = seeded_pool(vec![1, 1], 100, FeeConfig::default(), &[1_000, 1_000]);
        assert_eq!(
            pool.plan_redeem_single(&AccountId::new("seed"), pool.total_supply, 0, 0, 2, 0)
                .map(|t| t.outcome),
            Err(EngineError::InvalidAmount)
        );
    }

    #[test]
    fn single_redeem_pays_less_than_proportional_value() {
        let pool = seeded_pool(vec![1, 1], 100, FeeConfig::default(), &[1_000_000_000, 1_000_000_000]);
        let outcome = pool
            .plan_redeem_single(&AccountId::new("seed"), 100_000_000, 1, 0, 2, 0)
            .unwrap()
            .outcome;
        assert_eq!(outcome.amounts[0], 0);
        assert!(outcome.amounts[1] < 100_000_000);
        assert!(outcome.amounts[1] > 99_000_000);
    }

    #[test]
    fn multi_redeem_is_capped_by_maximum() {
        let fees = FeeConfig::new(0, 30, 50, 0);
        let pool = seeded_pool(vec![1, 1], 100, fees, &[1_000_000_000, 1_000_000_000]);
        let who = AccountId::new("seed");
        let quote = pool
            .plan_redeem_multi(&who, &[100_000_000, 10_000_000], Balance::MAX, 0)
            .unwrap()
            .outcome;
        assert!(quote.share_amount > 110_000_000);
        assert_eq!(
            pool.plan_redeem_multi(&who, &[100_000_000, 10_000_000], quote.share_amount - 1, 0)
                .map(|t| t.outcome),
            Err(EngineError::RedeemOverMaximum {
                required: quote.share_amount,
                max: quote.share_amount - 1
            })
        );
    }

    #[test]
    fn yield_mints_invariant_growth() {
        let pool = seeded_pool(vec![1, 1], 100, FeeConfig::default(), &[1_000_000, 1_000_000]);
        let transition = pool.plan_collect_yield(&[1_100_000, 1_100_000], 0).unwrap();
        assert_eq!(transition.outcome.minted, 200_000);
        assert_eq!(transition.pool.total_supply, 2_200_000);
        assert_eq!(
            pool.plan_collect_yield(&[900_000, 1_000_000], 0).map(|t| t.outcome),
            Err(EngineError::InvalidPoolValue)
        );
    }

    #[test]
    fn ramp_restarts_from_current_coefficient() {
        let mut req = request(vec![1, 1], 100, FeeConfig::default());
        req.ramp = Some(AmplificationRamp {
            future_a: 300,
            future_time: 200,
        });
        let pool = StablePool::create(req, 8, 0).unwrap();
        assert_eq!(pool.ampl(100), Ok(200));
        let ramped = pool.plan_ramp(50, 300, 100).unwrap().pool;
        assert_eq!(ramped.ampl(100), Ok(200));
        assert_eq!(ramped.ampl(200), Ok(125));
        assert_eq!(ramped.ampl(400), Ok(50));
        assert_eq!(
            pool.plan_ramp(50, 100, 100).map(|t| t.outcome),
            Err(EngineError::InvalidAmplification)
        );
    }
}
