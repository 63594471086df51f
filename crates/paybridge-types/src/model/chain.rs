use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::amount::{self, AmountError};
use crate::chain::{ChainFamily, ChainId};
use crate::model::{ChainKey, TokenKey};
use crate::timestamp::UnixTimestamp;

/// A chain the router can move value between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    pub id: ChainKey,
    /// CAIP-2 identifier used at API boundaries.
    pub chain_id: ChainId,
    pub name: String,
    pub family: ChainFamily,
    pub is_active: bool,
    #[serde(default)]
    pub rpc_endpoints: Vec<RpcEndpoint>,
}

/// One RPC endpoint of a chain, with the bookkeeping used for failover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcEndpoint {
    pub url: Url,
    /// Lower values are tried first.
    pub priority: u32,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_at: Option<UnixTimestamp>,
    /// Requests per second, unlimited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
}

impl Chain {
    /// Endpoints in the order they should be dialed.
    ///
    /// Sorted by priority, then by error count, then endpoints that failed longest
    /// ago (or never) first.
    pub fn rpc_failover_order(&self) -> Vec<&RpcEndpoint> {
        let mut endpoints: Vec<&RpcEndpoint> = self.rpc_endpoints.iter().collect();
        endpoints.sort_by_key(|e| (e.priority, e.error_count, e.last_error_at));
        endpoints
    }
}

/// A fungible asset deployed on exactly one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: TokenKey,
    pub chain: ChainKey,
    pub symbol: String,
    pub decimals: u8,
    /// Contract address; `None` for the chain's native asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub is_stablecoin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<Decimal>,
    pub is_active: bool,
}

impl Token {
    pub fn is_native(&self) -> bool {
        self.address.is_none()
    }

    /// Checks `amount` against the token's decimals and transfer bounds.
    pub fn check_amount(&self, amount: Decimal) -> Result<Decimal, AmountError> {
        amount::ensure_positive(amount)?;
        amount::ensure_precision(amount, self.decimals)?;
        if let Some(min) = self.min_amount
            && amount < min
        {
            return Err(AmountError::BelowMinimum { amount, min });
        }
        if let Some(max) = self.max_amount
            && amount > max
        {
            return Err(AmountError::AboveMaximum { amount, max });
        }
        Ok(amount)
    }
}
