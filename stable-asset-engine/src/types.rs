use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, From, Into, Display, Serialize, Deserialize,
)]
pub struct PoolId(u32);

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, From, Into, Display, Serialize, Deserialize,
)]
pub struct AssetId(u32);

/// Identifier of a remote chain that assets enter from or leave to.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, From, Into, Display, Serialize, Deserialize,
)]
pub struct ChainId(u32);

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, From, Into, Display, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Account that exclusively holds the underlying assets of the given pool.
    pub fn custodial(pool_id: PoolId) -> Self {
        Self(format!("stable-asset/pool/{}", pool_id))
    }
}

impl From<&str> for AccountId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
