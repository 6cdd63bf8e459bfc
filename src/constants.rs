/// Asset id of the chain's native coin.
pub const NATIVE_ASSET_ID: &str = "WAVES";

/// Native-asset minimal units per fee unit.
pub const DEFAULT_FEE_UNIT: u64 = 100_000;

pub const DEFAULT_NODE_URL: &str = "https://nodes.waves.exchange";
pub const DEFAULT_DATA_SERVICE_URL: &str = "https://waves.exchange/api/v1";
pub const DEFAULT_ICON_URL: &str = "https://waves.exchange/static/icons/assets";

/// Delay between retries and between poll cycles when nothing else is configured.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;
