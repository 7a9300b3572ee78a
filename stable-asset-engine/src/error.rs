use stable_asset_math::{Balance, MathError};

use crate::types::{AccountId, AssetId, ChainId, PoolId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("pool {0} already exists")]
    PoolAlreadyExists(PoolId),

    #[error("pool {0} not found")]
    PoolNotFound(PoolId),

    #[error("invalid asset list")]
    InvalidAssetList,

    #[error("invalid fee config")]
    InvalidFeeConfig,

    #[error("input and output assets are the same")]
    SameAsset,

    #[error("asset index {index} out of range for {len} assets")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("arithmetic overflow")]
    Overflow,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("account {account} holds less than {required} of asset {asset}")]
    InsufficientFunds {
        asset: AssetId,
        account: AccountId,
        required: Balance,
    },

    #[error("solver did not converge within {iterations} iterations")]
    ConvergenceFailure { iterations: usize },

    #[error("minted {minted} shares, below minimum {min}")]
    MintAmountBelowMinimum { minted: Balance, min: Balance },

    #[error("swap output {output} below minimum {min}")]
    SwapUnderMinimum { output: Balance, min: Balance },

    #[error("redeemed {amount} of asset index {index}, below minimum {min}")]
    RedeemUnderMinimum { index: usize, amount: Balance, min: Balance },

    #[error("redemption requires {required} shares, above maximum {max}")]
    RedeemOverMaximum { required: Balance, max: Balance },

    #[error("quota of chain {chain} exceeded: used {used} + {value} > limit {limit}")]
    QuotaExceeded {
        chain: ChainId,
        used: Balance,
        value: Balance,
        limit: Balance,
    },

    #[error("arguments do not match the pool layout")]
    ArgumentsMismatch,

    #[error("invalid amount")]
    InvalidAmount,

    #[error("invalid precision")]
    InvalidPrecision,

    #[error("invalid amplification coefficient")]
    InvalidAmplification,

    #[error("invalid quota window")]
    InvalidQuotaWindow,

    #[error("pool is empty")]
    PoolEmpty,

    #[error("pool value decreased")]
    InvalidPoolValue,

    #[error("division by zero")]
    DivisionByZero,
}

impl From<MathError> for EngineError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::Overflow => EngineError::Overflow,
            MathError::InsufficientBalance => EngineError::InsufficientBalance,
            MathError::DivisionByZero => EngineError::DivisionByZero,
            MathError::ZeroAmplification => EngineError::InvalidAmplification,
            MathError::IndexOutOfRange { index, len } => EngineError::IndexOutOfRange { index, len },
            MathError::ConvergenceFailure { iterations } => EngineError::ConvergenceFailure { iterations },
        }
    }
}
