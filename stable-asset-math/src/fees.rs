use primitive_types::U512;
use serde::{Deserialize, Serialize};

use crate::fixed_point::{abs_diff, mul, mul_div, narrow, scale, scale_ceil, sub, widen, Balance};
use crate::math_error::MathError;

/// All fee rates are expressed in basis points of this denominator.
pub const FEE_DENOMINATOR: u128 = 10_000;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeConfig {
    pub mint_fee_bps: u128,
    pub swap_fee_bps: u128,
    pub redeem_fee_bps: u128,
    /// Part of every collected fee that is routed to the fee recipient.
    pub admin_fee_bps: u128,
}

/// Result of charging a flat fee on some base amount.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct FeeSplit {
    /// Total fee taken from the base amount.
    pub fee: Balance,
    /// Part of `fee` owed to the fee recipient.
    pub admin: Balance,
    /// `base - fee`.
    pub net: Balance,
}

impl FeeConfig {
    pub fn new(mint_fee_bps: u128, swap_fee_bps: u128, redeem_fee_bps: u128, admin_fee_bps: u128) -> Self {
        Self {
            mint_fee_bps,
            swap_fee_bps,
            redeem_fee_bps,
            admin_fee_bps,
        }
    }

    pub fn is_valid(&self) -> bool {
        [
            self.mint_fee_bps,
            self.swap_fee_bps,
            self.redeem_fee_bps,
            self.admin_fee_bps,
        ]
        .iter()
        .all(|bps| *bps < FEE_DENOMINATOR)
    }

    pub fn swap_fee(&self, output: Balance) -> Result<FeeSplit, MathError> {
        self.split(output, self.swap_fee_bps)
    }

    pub fn mint_fee(&self, shares: Balance) -> Result<FeeSplit, MathError> {
        self.split(shares, self.mint_fee_bps)
    }

    pub fn redeem_fee(&self, shares: Balance) -> Result<FeeSplit, MathError> {
        self.split(shares, self.redeem_fee_bps)
    }

    /// Admin part of an already computed fee.
    pub fn admin_share(&self, fee: Balance) -> Result<Balance, MathError> {
        scale(fee, self.admin_fee_bps, FEE_DENOMINATOR)
    }

    fn split(&self, base: Balance, rate_bps: u128) -> Result<FeeSplit, MathError> {
        let fee = scale(base, rate_bps, FEE_DENOMINATOR)?;
        let admin = self.admin_share(fee)?;
        let net = base.checked_sub(fee).ok_or(MathError::InsufficientBalance)?;
        Ok(FeeSplit { fee, admin, net })
    }

    /// Shares a redeemer must offer so that `shares` remain after the redeem fee,
    /// `ceil(shares * FEE_DENOMINATOR / (FEE_DENOMINATOR - redeem_fee_bps))`.
    pub fn gross_up_redeem(&self, shares: Balance) -> Result<Balance, MathError> {
        let den = FEE_DENOMINATOR
            .checked_sub(self.redeem_fee_bps)
            .ok_or(MathError::InsufficientBalance)?;
        scale_ceil(shares, FEE_DENOMINATOR, den)
    }

    /// Per-asset fee on a liquidity action that skews the pool away from its
    /// current proportions.
    /// \
    /// Ideal balances keep the old proportions at the new invariant:
    /// \
    /// `ideal_i = d1 * old_i / d0`
    /// \
    /// and each asset pays the swap rate, scaled by `N / (4 * (N - 1))`, on its
    /// deviation from the ideal:
    /// \
    /// `fee_i = |ideal_i - new_i| * swap_fee_bps * N / (FEE_DENOMINATOR * 4 * (N - 1))`.
    ///
    /// # Arguments
    /// * `old_balances` - Internal balances before the action;
    /// * `new_balances` - Internal balances after the action, before fees;
    /// * `d0` - Invariant of `old_balances`;
    /// * `d1` - Invariant of `new_balances`.
    ///
    /// # Outputs
    /// * `fees` - Internal-unit fee per asset, index-aligned with the balances.
    pub fn imbalance_fees(
        &self,
        old_balances: &[Balance],
        new_balances: &[Balance],
        d0: Balance,
        d1: Balance,
    ) -> Result<Vec<Balance>, MathError> {
        let n_assets = old_balances.len();
        if new_balances.len() != n_assets {
            return Err(MathError::IndexOutOfRange {
                index: new_balances.len(),
                len: n_assets,
            });
        }
        if n_assets < 2 {
            return Ok(vec![0; n_assets]);
        }
        let n = widen(n_assets as u128);
        let rate_num = mul(widen(self.swap_fee_bps), n)?;
        let rate_den = mul(widen(FEE_DENOMINATOR * 4), sub(n, U512::one())?)?;
        old_balances
            .iter()
            .zip(new_balances)
            .map(|(old, new)| {
                let ideal = mul_div(widen(d1), widen(*old), widen(d0))?;
                let diff = abs_diff(ideal, widen(*new));
                narrow(mul_div(diff, rate_num, rate_den)?)
            })
            .collect()
    }
}
