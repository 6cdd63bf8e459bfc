use crate::error::BalanceResult;
use crate::utils::asset::Asset;
use crate::utils::numbers::deserialize_u64;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Native balance breakdown of an address.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDetails {
    #[serde(default)]
    pub address: String,
    #[serde(default, deserialize_with = "deserialize_u64")]
    pub regular: u64,
    #[serde(default, deserialize_with = "deserialize_u64")]
    pub generating: u64,
    #[serde(deserialize_with = "deserialize_u64")]
    pub available: u64,
    #[serde(default, deserialize_with = "deserialize_u64")]
    pub effective: u64,
}

impl BalanceDetails {
    pub fn with_available(available: u64) -> Self {
        Self { available, ..Self::default() }
    }
}

/// Raw balance of one token held by an address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub asset_id: String,
    #[serde(deserialize_with = "deserialize_u64")]
    pub balance: u64,
}

impl TokenBalance {
    pub fn new(asset_id: impl Into<String>, balance: u64) -> Self {
        Self { asset_id: asset_id.into(), balance }
    }
}

/// Batch lookup of asset metadata.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Returns one entry per requested id, in request order; `None` for ids the
    /// service does not know. A transport error fails the whole batch.
    async fn fetch_assets(&self, ids: &[String]) -> BalanceResult<Vec<Option<Asset>>>;
}

/// Node endpoints used by one refresh cycle and by fee quotes.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn fetch_balance_details(&self, address: &str) -> BalanceResult<BalanceDetails>;

    async fn fetch_token_balances(&self, address: &str) -> BalanceResult<Vec<TokenBalance>>;

    /// Fee in native-asset coins required for `tx`.
    async fn fetch_fee(&self, tx: &serde_json::Value) -> BalanceResult<u64>;
}
