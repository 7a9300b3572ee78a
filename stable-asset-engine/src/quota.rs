use std::collections::HashMap;

use log::trace;
use serde::{Deserialize, Serialize};
use stable_asset_math::Balance;

use crate::config::QuotaConfig;
use crate::error::EngineError;
use crate::types::ChainId;

/// Value moved to or from one remote chain within the current period.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaWindow {
    pub period_length: u64,
    pub period_start: u64,
    pub used: Balance,
    pub limit: Balance,
}

impl QuotaWindow {
    /// Fresh window aligned to the period boundary that covers `now`.
    pub fn aligned(period_length: u64, limit: Balance, now: u64) -> Self {
        let period_start = match now.checked_rem(period_length) {
            Some(offset) => now - offset,
            None => now,
        };
        Self {
            period_length,
            period_start,
            used: 0,
            limit,
        }
    }

    /// The window as of `now`: once the period is over `used` drops to zero
    /// and the start advances by whole periods.
    pub fn rolled(&self, now: u64) -> Self {
        let elapsed = now.saturating_sub(self.period_start);
        if self.period_length == 0 || elapsed < self.period_length {
            return *self;
        }
        Self {
            period_start: self.period_start + elapsed / self.period_length * self.period_length,
            used: 0,
            ..*self
        }
    }

    /// Consume `value` on top of `in_flight` value that is reserved but not yet
    /// committed. Only `value` is added to `used` of the returned window.
    fn consumed(&self, chain: ChainId, value: Balance, in_flight: Balance, now: u64) -> Result<Self, EngineError> {
        let window = self.rolled(now);
        let pending = window.used.saturating_add(in_flight);
        match pending.checked_add(value) {
            Some(total) if total <= window.limit => Ok(Self {
                used: window.used + value,
                ..window
            }),
            _ => Err(EngineError::QuotaExceeded {
                chain,
                used: pending,
                value,
                limit: window.limit,
            }),
        }
    }
}

/// Per-chain quota windows.
///
/// Value can be reserved before the operation it meters runs and settled
/// afterwards, so the limiter does not have to stay locked while the
/// operation is in progress. Reserved value counts against the limit.
#[derive(Debug, Clone)]
pub struct QuotaLimiter {
    defaults: QuotaConfig,
    windows: HashMap<ChainId, QuotaWindow>,
    reserved: HashMap<ChainId, Balance>,
}

impl QuotaLimiter {
    pub fn new(defaults: QuotaConfig) -> Self {
        Self {
            defaults,
            windows: HashMap::new(),
            reserved: HashMap::new(),
        }
    }

    /// Value of `chain` reserved by operations still in progress.
    pub fn in_flight(&self, chain: ChainId) -> Balance {
        self.reserved.get(&chain).copied().unwrap_or(0)
    }

    pub fn window(&self, chain: ChainId) -> Option<QuotaWindow> {
        self.windows.get(&chain).copied()
    }

    fn window_or_default(&self, chain: ChainId, now: u64) -> QuotaWindow {
        self.window(chain)
            .unwrap_or_else(|| QuotaWindow::aligned(self.defaults.period_length, self.defaults.limit, now))
    }

    /// Window that consuming `value` at `now` would produce. Nothing is stored.
    /// A window without a period never rolls and is rejected.
    pub fn check(&self, chain: ChainId, value: Balance, now: u64) -> Result<QuotaWindow, EngineError> {
        let window = self.window_or_default(chain, now);
        if window.period_length == 0 {
            return Err(EngineError::InvalidQuotaWindow);
        }
        window.consumed(chain, value, self.in_flight(chain), now)
    }

    pub fn commit(&mut self, chain: ChainId, window: QuotaWindow) {
        trace!("QuotaLimiter::commit(chain: {}, window: {:?})", chain, window);
        self.windows.insert(chain, window);
    }

    pub fn check_and_consume(
        &mut self,
        chain: ChainId,
        value: Balance,
        now: u64,
    ) -> Result<QuotaWindow, EngineError> {
        let window = self.check(chain, value, now)?;
        self.commit(chain, window);
        Ok(window)
    }

    /// Hold `value` of the quota of `chain` until [QuotaLimiter::settle].
    /// Windows are not touched, so a reservation that is released leaves no trace.
    pub fn reserve(&mut self, chain: ChainId, value: Balance, now: u64) -> Result<QuotaWindow, EngineError> {
        let window = self.check(chain, value, now)?;
        trace!("QuotaLimiter::reserve(chain: {}, value: {})", chain, value);
        *self.reserved.entry(chain).or_insert(0) += value;
        Ok(window)
    }

    /// Drop the reservation of `value`; when the metered operation succeeded
    /// the value is charged to the window covering `now`.
    pub fn settle(&mut self, chain: ChainId, value: Balance, succeeded: bool, now: u64) -> Option<QuotaWindow> {
        if let Some(in_flight) = self.reserved.get_mut(&chain) {
            *in_flight = in_flight.saturating_sub(value);
            if *in_flight == 0 {
                self.reserved.remove(&chain);
            }
        }
        if !succeeded {
            return None;
        }
        let current = self.window_or_default(chain, now).rolled(now);
        let window = QuotaWindow {
            used: current.used.saturating_add(value),
            ..current
        };
        self.commit(chain, window);
        Some(window)
    }

    /// Overwrite the window of `chain`. An existing window keeps the start of
    /// the period covering `now` under the new length, a new one is aligned to `now`.
    pub fn update_limit(
        &mut self,
        chain: ChainId,
        period_length: u64,
        used: Balance,
        limit: Balance,
        now: u64,
    ) -> Result<QuotaWindow, EngineError> {
        if period_length == 0 {
            return Err(EngineError::InvalidQuotaWindow);
        }
        let period_start = match self.window(chain) {
            Some(existing) => {
                QuotaWindow {
                    period_length,
                    ..existing
                }
                .rolled(now)
                .period_start
            }
            None => QuotaWindow::aligned(period_length, limit, now).period_start,
        };
        let window = QuotaWindow {
            period_length,
            period_start,
            used,
            limit,
        };
        self.commit(chain, window);
        Ok(window)
    }
}
