use crate::utils::asset::AssetWrapper;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

/// An amount of one asset, kept as integer minimal units ("coins").
///
/// The token view is `coins / 10^precision` and is only derived for display;
/// every comparison and every fee computation works on coins.
#[derive(Clone, Debug)]
pub struct Money {
    coins: u64,
    asset: AssetWrapper,
}

impl Money {
    pub fn new(coins: u64, asset: AssetWrapper) -> Self {
        Self { coins, asset }
    }

    /// Zero balance of `asset`, used to mark an asset that disappeared.
    pub fn zero(asset: AssetWrapper) -> Self {
        Self::new(0, asset)
    }

    pub fn clone_with_coins(&self, coins: u64) -> Self {
        Self::new(coins, Arc::clone(&self.asset))
    }

    pub fn get_coins(&self) -> u64 {
        self.coins
    }

    pub fn get_asset(&self) -> &AssetWrapper {
        &self.asset
    }

    pub fn asset_id(&self) -> &str {
        self.asset.get_id()
    }

    pub fn is_zero(&self) -> bool {
        self.coins == 0
    }

    /// Display amount; `None` only when the precision exceeds what `Decimal` can scale (28).
    pub fn get_tokens(&self) -> Option<Decimal> {
        let precision = u32::from(self.asset.get_precision());
        Decimal::try_from_i128_with_scale(i128::from(self.coins), precision).ok()
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.coins == other.coins && self.asset_id() == other.asset_id()
    }
}

impl Eq for Money {}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ticker = self.asset.get_ticker().unwrap_or_else(|| self.asset.get_name());
        match self.get_tokens() {
            Some(tokens) => write!(f, "{} {}", tokens, ticker),
            None => write!(f, "{} coins of {}", self.coins, self.asset_id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::asset::Asset;
    use std::str::FromStr;

    #[test]
    fn test_tokens_from_coins() {
        let waves = Arc::new(Asset::builder("WAVES").precision(8).ticker("WAVES").build());
        let money = Money::new(150_000_000, waves);
        assert_eq!(money.get_tokens(), Some(Decimal::from_str("1.5").unwrap()));
        assert_eq!(money.to_string(), "1.50000000 WAVES");
    }

    #[test]
    fn test_zero_precision_tokens_equal_coins() {
        let token = Arc::new(Asset::builder("T").precision(0).build());
        let money = Money::new(100, token);
        assert_eq!(money.get_tokens(), Some(Decimal::from(100)));
    }

    #[test]
    fn test_equality_requires_same_asset_and_coins() {
        let a = Arc::new(Asset::builder("A").build());
        let b = Arc::new(Asset::builder("B").build());

        assert_eq!(Money::new(5, a.clone()), Money::new(5, a.clone()));
        assert_ne!(Money::new(5, a.clone()), Money::new(6, a.clone()));
        assert_ne!(Money::new(5, a.clone()), Money::new(5, b));
        assert!(Money::zero(a.clone()).is_zero());
        assert_eq!(Money::new(5, a).clone_with_coins(7).get_coins(), 7);
    }
}
