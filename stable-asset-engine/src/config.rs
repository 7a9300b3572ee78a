use serde::{Deserialize, Serialize};
use stable_asset_math::Balance;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default = "default_max_pool_assets")]
    pub max_pool_assets: usize,
    #[serde(default)]
    pub quota: QuotaConfig,
}

/// Parameters of lazily created quota windows.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaConfig {
    pub period_length: u64,
    pub limit: Balance,
}

fn default_max_pool_assets() -> usize {
    8
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pool_assets: default_max_pool_assets(),
            quota: QuotaConfig::default(),
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            period_length: 86_400,
            limit: 0,
        }
    }
}
