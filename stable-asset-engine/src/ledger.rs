use std::collections::HashMap;

use log::trace;
use parking_lot::RwLock;
use stable_asset_math::Balance;

use crate::error::EngineError;
use crate::types::{AccountId, AssetId};

/// Single movement of value on the asset ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Movement {
    Transfer {
        asset: AssetId,
        from: AccountId,
        to: AccountId,
        amount: Balance,
    },
    Mint {
        asset: AssetId,
        to: AccountId,
        amount: Balance,
    },
    Burn {
        asset: AssetId,
        from: AccountId,
        amount: Balance,
    },
}

/// Ordered batch of movements produced by one pool transition.
/// Zero-amount movements are dropped on insertion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Settlement(Vec<Movement>);

impl Settlement {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn transfer(&mut self, asset: AssetId, from: &AccountId, to: &AccountId, amount: Balance) {
        if amount > 0 {
            self.0.push(Movement::Transfer {
                asset,
                from: from.clone(),
                to: to.clone(),
                amount,
            });
        }
    }

    pub fn mint(&mut self, asset: AssetId, to: &AccountId, amount: Balance) {
        if amount > 0 {
            self.0.push(Movement::Mint {
                asset,
                to: to.clone(),
                amount,
            });
        }
    }

    pub fn burn(&mut self, asset: AssetId, from: &AccountId, amount: Balance) {
        if amount > 0 {
            self.0.push(Movement::Burn {
                asset,
                from: from.clone(),
                amount,
            });
        }
    }

    pub fn movements(&self) -> &[Movement] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub trait AssetLedger {
    fn balance(&self, asset: AssetId, account: &AccountId) -> Balance;

    /// Apply all movements of the settlement or none of them.
    fn settle(&self, settlement: &Settlement) -> Result<(), EngineError>;
}

impl<L: AssetLedger> AssetLedger for std::sync::Arc<L> {
    fn balance(&self, asset: AssetId, account: &AccountId) -> Balance {
        self.as_ref().balance(asset, account)
    }

    fn settle(&self, settlement: &Settlement) -> Result<(), EngineError> {
        self.as_ref().settle(settlement)
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    holdings: HashMap<(AssetId, AccountId), Balance>,
    issuance: HashMap<AssetId, Balance>,
}

/// Staged view over [LedgerState]: reads fall through to the committed state,
/// writes stay local until [Staged::commit].
struct Staged<'a> {
    base: &'a LedgerState,
    holdings: HashMap<(AssetId, AccountId), Balance>,
    issuance: HashMap<AssetId, Balance>,
}

impl<'a> Staged<'a> {
    fn new(base: &'a LedgerState) -> Self {
        Self {
            base,
            holdings: HashMap::new(),
            issuance: HashMap::new(),
        }
    }

    fn holding(&self, asset: AssetId, account: &AccountId) -> Balance {
        let key = (asset, account.clone());
        self.holdings
            .get(&key)
            .or_else(|| self.base.holdings.get(&key))
            .copied()
            .unwrap_or(0)
    }

    fn issued(&self, asset: AssetId) -> Balance {
        self.issuance
            .get(&asset)
            .or_else(|| self.base.issuance.get(&asset))
            .copied()
            .unwrap_or(0)
    }

    fn credit(&mut self, asset: AssetId, account: &AccountId, amount: Balance) -> Result<(), EngineError> {
        let next = self
            .holding(asset, account)
            .checked_add(amount)
            .ok_or(EngineError::Overflow)?;
        self.holdings.insert((asset, account.clone()), next);
        Ok(())
    }

    fn debit(&mut self, asset: AssetId, account: &AccountId, amount: Balance) -> Result<(), EngineError> {
        let next = self
            .holding(asset, account)
            .checked_sub(amount)
            .ok_or_else(|| EngineError::InsufficientFunds {
                asset,
                account: account.clone(),
                required: amount,
            })?;
        self.holdings.insert((asset, account.clone()), next);
        Ok(())
    }

    fn apply(&mut self, movement: &Movement) -> Result<(), EngineError> {
        match movement {
            Movement::Transfer {
                asset,
                from,
                to,
                amount,
            } => {
                self.debit(*asset, from, *amount)?;
                self.credit(*asset, to, *amount)
            }
            Movement::Mint { asset, to, amount } => {
                let issued = self.issued(*asset).checked_add(*amount).ok_or(EngineError::Overflow)?;
                self.issuance.insert(*asset, issued);
                self.credit(*asset, to, *amount)
            }
            Movement::Burn { asset, from, amount } => {
                self.debit(*asset, from, *amount)?;
                let issued = self
                    .issued(*asset)
                    .checked_sub(*amount)
                    .ok_or(EngineError::InsufficientBalance)?;
                self.issuance.insert(*asset, issued);
                Ok(())
            }
        }
    }

    fn into_writes(self) -> (HashMap<(AssetId, AccountId), Balance>, HashMap<AssetId, Balance>) {
        (self.holdings, self.issuance)
    }
}

/// Process-local ledger.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit freshly issued units of `asset` to `account`.
    pub fn deposit(&self, asset: AssetId, account: &AccountId, amount: Balance) -> Result<(), EngineError> {
        let mut settlement = Settlement::new();
        settlement.mint(asset, account, amount);
        self.settle(&settlement)
    }

    pub fn total_issuance(&self, asset: AssetId) -> Balance {
        self.state.read().issuance.get(&asset).copied().unwrap_or(0)
    }
}

impl AssetLedger for InMemoryLedger {
    fn balance(&self, asset: AssetId, account: &AccountId) -> Balance {
        self.state
            .read()
            .holdings
            .get(&(asset, account.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn settle(&self, settlement: &Settlement) -> Result<(), EngineError> {
        let mut state = self.state.write();
        let (holdings, issuance) = {
            let mut staged = Staged::new(&state);
            for movement in settlement.movements() {
                trace!("InMemoryLedger::settle({:?})", movement);
                staged.apply(movement)?;
            }
            staged.into_writes()
        };
        state.holdings.extend(holdings);
        state.issuance.extend(issuance);
        Ok(())
    }
}
