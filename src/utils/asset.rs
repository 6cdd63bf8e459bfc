use crate::constants::NATIVE_ASSET_ID;
use crate::utils::numbers::{deserialize_opt_u64, deserialize_u64};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use strum_macros::{Display, EnumIter, FromRepr};

/// Verification level reported by the data service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, FromRepr)]
#[repr(i8)]
pub enum VerifiedStatus {
    Suspicious = -1,
    #[default]
    Unknown = 0,
    Verified = 1,
    Detailed = 2,
}

impl VerifiedStatus {
    /// Unknown codes are treated as unverified rather than rejected.
    pub fn from_code(code: i64) -> Self {
        i8::try_from(code).ok().and_then(Self::from_repr).unwrap_or_default()
    }
}

/// Base asset record as published by the data service.
#[derive(Clone, Debug, Deserialize)]
pub struct AssetRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub height: u64,
    pub precision: u8,
    #[serde(deserialize_with = "deserialize_u64")]
    pub quantity: u64,
    pub reissuable: bool,
    pub sender: String,
    pub ticker: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub has_script: bool,
    #[serde(default, deserialize_with = "deserialize_opt_u64")]
    pub min_sponsored_fee: Option<u64>,
}

/// Presentation fields layered on top of an [`AssetRecord`].
#[derive(Clone, Debug, Default)]
pub struct AssetDecoration {
    pub verified_status: VerifiedStatus,
    pub has_image: bool,
    pub icon: Option<String>,
}

impl AssetDecoration {
    /// Icon urls follow `{icon_base}/{id}.svg` and only exist for assets with an image.
    pub fn new(asset_id: &str, verified_status: VerifiedStatus, has_image: bool, icon_base: &str) -> Self {
        let icon = has_image.then(|| format!("{}/{}.svg", icon_base.trim_end_matches('/'), asset_id));
        Self { verified_status, has_image, icon }
    }
}

/// Immutable asset metadata, shared by reference between every balance and
/// fee that points at the same id.
#[derive(Clone, Debug, Serialize)]
pub struct Asset {
    id: String,
    name: String,
    description: String,
    height: u64,
    precision: u8,
    quantity: u64,
    reissuable: bool,
    sender: String,
    ticker: Option<String>,
    timestamp: DateTime<Utc>,
    has_script: bool,
    min_sponsored_fee: Option<u64>,
    verified_status: VerifiedStatus,
    has_image: bool,
    icon: Option<String>,
}

pub type AssetWrapper = Arc<Asset>;

impl Hash for Asset {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl PartialEq for Asset {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Asset {}

impl Asset {
    /// Combine a base record with its decoration into a new value.
    pub fn compose(record: AssetRecord, decoration: AssetDecoration) -> Asset {
        Asset {
            id: record.id,
            name: record.name,
            description: record.description,
            height: record.height,
            precision: record.precision,
            quantity: record.quantity,
            reissuable: record.reissuable,
            sender: record.sender,
            ticker: record.ticker,
            timestamp: record.timestamp,
            has_script: record.has_script,
            min_sponsored_fee: record.min_sponsored_fee,
            verified_status: decoration.verified_status,
            has_image: decoration.has_image,
            icon: decoration.icon,
        }
    }

    pub fn builder(id: impl Into<String>) -> AssetBuilder {
        AssetBuilder::new(id)
    }

    pub fn get_id(&self) -> &str {
        &self.id
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_description(&self) -> &str {
        &self.description
    }

    pub fn get_height(&self) -> u64 {
        self.height
    }

    pub fn get_precision(&self) -> u8 {
        self.precision
    }

    pub fn get_quantity(&self) -> u64 {
        self.quantity
    }

    pub fn is_reissuable(&self) -> bool {
        self.reissuable
    }

    pub fn get_sender(&self) -> &str {
        &self.sender
    }

    pub fn get_ticker(&self) -> Option<&str> {
        self.ticker.as_deref()
    }

    pub fn get_timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn has_script(&self) -> bool {
        self.has_script
    }

    /// Minimum sponsored fee in this asset's minimal units, if sponsorship is enabled.
    pub fn get_min_sponsored_fee(&self) -> Option<u64> {
        self.min_sponsored_fee
    }

    pub fn get_verified_status(&self) -> VerifiedStatus {
        self.verified_status
    }

    pub fn has_image(&self) -> bool {
        self.has_image
    }

    pub fn get_icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn is_native(&self) -> bool {
        self.id == NATIVE_ASSET_ID
    }

    pub fn is_sponsored(&self) -> bool {
        self.min_sponsored_fee.is_some_and(|fee| fee > 0)
    }

    /// Native asset or a sponsored one: something a fee can be paid in.
    pub fn is_fee_eligible(&self) -> bool {
        self.is_native() || self.is_sponsored()
    }
}

/// Builder for assets that do not come from the data service (tests, fixtures,
/// locally known native asset).
#[derive(Clone, Debug)]
pub struct AssetBuilder {
    asset: Asset,
}

impl AssetBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            asset: Asset {
                name: id.clone(),
                id,
                description: String::new(),
                height: 0,
                precision: 8,
                quantity: 0,
                reissuable: false,
                sender: String::new(),
                ticker: None,
                timestamp: DateTime::<Utc>::UNIX_EPOCH,
                has_script: false,
                min_sponsored_fee: None,
                verified_status: VerifiedStatus::Unknown,
                has_image: false,
                icon: None,
            },
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.asset.name = name.into();
        self
    }

    pub fn precision(mut self, precision: u8) -> Self {
        self.asset.precision = precision;
        self
    }

    pub fn quantity(mut self, quantity: u64) -> Self {
        self.asset.quantity = quantity;
        self
    }

    pub fn ticker(mut self, ticker: impl Into<String>) -> Self {
        self.asset.ticker = Some(ticker.into());
        self
    }

    pub fn min_sponsored_fee(mut self, fee: u64) -> Self {
        self.asset.min_sponsored_fee = Some(fee);
        self
    }

    pub fn verified_status(mut self, status: VerifiedStatus) -> Self {
        self.asset.verified_status = status;
        self
    }

    pub fn build(self) -> Asset {
        self.asset
    }
}
