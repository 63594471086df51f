use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{ChainKey, ConfigKey, TokenKey};
use crate::timestamp::UnixTimestamp;

/// Fee schedule for one (chain, token) pair.
///
/// The most recently updated active row for a pair is the one in force.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeConfig {
    pub id: ConfigKey,
    pub chain: ChainKey,
    pub token: TokenKey,
    /// Percentage of the amount, `0.5` meaning half a percent.
    pub platform_fee_percent: Decimal,
    pub fixed_base_fee: Decimal,
    pub min_fee: Decimal,
    /// No upper bound when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee: Option<Decimal>,
    pub is_active: bool,
    pub updated_at: UnixTimestamp,
}
