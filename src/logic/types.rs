use crate::constants::NATIVE_ASSET_ID;
use crate::utils::asset::AssetWrapper;
use crate::utils::money::Money;
use std::collections::BTreeMap;

/// Complete balance state of one address: asset id -> amount.
pub type BalanceSnapshot = BTreeMap<String, Money>;

/// Entries that changed between two snapshots. Removed assets carry a zero amount.
pub type BalanceDiff = BTreeMap<String, Money>;

/// State published by a reconciler. Replaced as a whole, never edited in place.
#[derive(Clone, Debug, Default)]
pub struct BalanceState {
    pub balances: BalanceSnapshot,
    /// Balances a fee can be paid in: the native asset first, then sponsored assets.
    pub fee_list: Vec<Money>,
    pub native_asset: Option<AssetWrapper>,
    /// Set once the first reconciliation succeeded.
    pub has_data: bool,
}

impl BalanceState {
    pub fn new(balances: BalanceSnapshot, native_asset: Option<AssetWrapper>) -> Self {
        let fee_list = fee_eligible(&balances);
        Self { balances, fee_list, native_asset, has_data: true }
    }

    pub fn native_balance(&self) -> Option<&Money> {
        self.balances.get(NATIVE_ASSET_ID)
    }
}

/// Native entry first, then every sponsored asset in snapshot order.
pub fn fee_eligible(balances: &BalanceSnapshot) -> Vec<Money> {
    let native = balances.get(NATIVE_ASSET_ID).cloned();
    let sponsored = balances
        .values()
        .filter(|money| !money.get_asset().is_native() && money.get_asset().is_fee_eligible())
        .cloned();
    native.into_iter().chain(sponsored).collect()
}
