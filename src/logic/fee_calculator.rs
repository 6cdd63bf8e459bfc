use crate::constants::DEFAULT_FEE_UNIT;
use crate::utils::money::Money;
use tracing::debug;

/// Fee quotes for every asset that could pay, plus the eligible assets that
/// were dropped because their balance does not cover the quote.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeeConversion {
    pub payable: Vec<Money>,
    pub insufficient: Vec<Money>,
}

/// Converts a native-asset fee into equivalent sponsored-asset fees.
///
/// One fee unit is [`DEFAULT_FEE_UNIT`] native coins and costs
/// `min_sponsored_fee` coins of a sponsored asset. The unit count is rounded
/// up so a quote never underpays.
#[derive(Clone, Copy, Debug)]
pub struct FeeCalculator {
    fee_unit: u64,
}

impl Default for FeeCalculator {
    fn default() -> Self {
        Self { fee_unit: DEFAULT_FEE_UNIT }
    }
}

impl FeeCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fee_unit(&self) -> u64 {
        self.fee_unit
    }

    /// Number of fee units `base_fee` is worth, rounded up.
    pub fn unit_count(&self, base_fee: &Money) -> u64 {
        base_fee.get_coins().div_ceil(self.fee_unit)
    }

    /// Fee in every eligible asset whose balance covers it, in input order.
    pub fn convert(&self, fee_eligible: &[Money], base_fee: &Money) -> Vec<Money> {
        self.convert_detailed(fee_eligible, base_fee).payable
    }

    pub fn convert_detailed(&self, fee_eligible: &[Money], base_fee: &Money) -> FeeConversion {
        let unit_count = self.unit_count(base_fee);
        let mut conversion = FeeConversion::default();

        for balance in fee_eligible {
            let asset = balance.get_asset();
            if asset.is_native() {
                conversion.payable.push(base_fee.clone());
                continue;
            }

            let Some(min_fee) = asset.get_min_sponsored_fee().filter(|fee| *fee > 0) else {
                debug!(asset = asset.get_id(), "skipping asset without sponsorship");
                continue;
            };

            // An overflowing quote can never be covered by a u64 balance.
            match min_fee.checked_mul(unit_count) {
                Some(fee) if fee <= balance.get_coins() => conversion.payable.push(balance.clone_with_coins(fee)),
                Some(fee) => conversion.insufficient.push(balance.clone_with_coins(fee)),
                None => conversion.insufficient.push(balance.clone_with_coins(u64::MAX)),
            }
        }

        conversion
    }
}
