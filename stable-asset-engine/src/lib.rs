pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod pool;
pub mod quota;
pub mod repo;
pub mod types;
pub mod xcm;

pub use stable_asset_math::Balance;
