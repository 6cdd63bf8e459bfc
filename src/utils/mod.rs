pub mod asset;
pub mod asset_cache;
pub mod config_loader;
pub mod money;
pub mod numbers;

pub use asset::{Asset, AssetBuilder, AssetDecoration, AssetRecord, AssetWrapper, VerifiedStatus};
pub use asset_cache::{AssetCache, CacheStats};
pub use config_loader::{LoadConfigError, load_from_file, load_from_file_sync};
pub use money::Money;
