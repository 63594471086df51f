//! Registry configuration: the Config Store contents a deployment starts with.
//!
//! Chains are keyed by their CAIP-2 identifier; the chain family follows from the
//! namespace. Every other table is a list of rows referring to chains, tokens and
//! bridges by internal id.
//!
//! ```json
//! {
//!   "chains": {
//!     "eip155:8453": {
//!       "id": 2,
//!       "name": "Base",
//!       "rpc": [
//!         { "http": "$BASE_RPC_URL", "rateLimit": 50 },
//!         { "http": "https://mainnet.base.org" }
//!       ]
//!     }
//!   },
//!   "routePolicies": [
//!     { "id": 1, "sourceChain": 1, "destChain": 2, "defaultBridgeType": 1,
//!       "fallbackMode": "auto_fallback", "fallbackOrder": [1, 2, 0] }
//!   ]
//! }
//! ```

use paybridge_types::chain::{ChainFamily, ChainId};
use paybridge_types::config::LiteralOrEnv;
use paybridge_types::model::{
    BridgeConfig, BridgeType, Chain, ChainKey, ConfigKey, FallbackMode, FallbackOrder, FeeConfig,
    LayerZeroConfig, PaymentBridge, RoutePolicy, RpcEndpoint, SmartContract, Token,
};
use paybridge_types::store::StoreError;
use paybridge_types::timestamp::UnixTimestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

use crate::memory_store::MemoryStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    #[serde(default)]
    pub chains: BTreeMap<ChainId, ChainEntry>,
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub bridges: Vec<PaymentBridge>,
    #[serde(default)]
    pub bridge_configs: Vec<BridgeConfig>,
    #[serde(default)]
    pub layer_zero_configs: Vec<LayerZeroConfig>,
    #[serde(default)]
    pub route_policies: Vec<RoutePolicyEntry>,
    #[serde(default)]
    pub fee_configs: Vec<FeeConfig>,
    #[serde(default)]
    pub smart_contracts: Vec<SmartContract>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainEntry {
    pub id: ChainKey,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Endpoints in the order given; list position is the failover priority
    /// unless `priority` is set.
    #[serde(default)]
    pub rpc: Vec<RpcEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcEntry {
    pub http: LiteralOrEnv<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
}

/// A route policy as written in configuration. Mode and order may be omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePolicyEntry {
    pub id: ConfigKey,
    pub source_chain: ChainKey,
    pub dest_chain: ChainKey,
    pub default_bridge_type: BridgeType,
    #[serde(default)]
    pub fallback_mode: FallbackMode,
    #[serde(default)]
    pub fallback_order: FallbackOrder,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "UnixTimestamp::now")]
    pub updated_at: UnixTimestamp,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Chain {0} has an unsupported namespace")]
    UnsupportedChain(ChainId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ChainEntry {
    fn into_chain(self, chain_id: ChainId) -> Result<Chain, RegistryError> {
        let family = chain_id
            .family()
            .ok_or_else(|| RegistryError::UnsupportedChain(chain_id.clone()))?;
        let rpc_endpoints = self
            .rpc
            .into_iter()
            .enumerate()
            .map(|(position, entry)| RpcEndpoint {
                url: entry.http.into_inner(),
                priority: entry.priority.unwrap_or(position as u32),
                error_count: 0,
                last_error_at: None,
                rate_limit: entry.rate_limit,
            })
            .collect();
        Ok(Chain {
            id: self.id,
            chain_id,
            name: self.name,
            family,
            is_active: self.is_active,
            rpc_endpoints,
        })
    }
}

impl Registry {
    /// Builds an in-memory store holding every row of the registry.
    ///
    /// Chains are inserted before tokens so token chain references resolve.
    pub async fn into_store(self) -> Result<MemoryStore, RegistryError> {
        let store = MemoryStore::new();
        for (chain_id, entry) in self.chains {
            let chain = entry.into_chain(chain_id)?;
            if chain.family != ChainFamily::Evm {
                tracing::info!(chain = %chain.chain_id, family = ?chain.family, "Chain registered without revert probing");
            }
            store.insert_chain(chain).await?;
        }
        for token in self.tokens {
            store.insert_token(token).await?;
        }
        for bridge in self.bridges {
            store.insert_bridge(bridge).await?;
        }
        for config in self.bridge_configs {
            store.insert_bridge_config(config).await?;
        }
        for config in self.layer_zero_configs {
            store.insert_layerzero_config(config).await?;
        }
        for entry in self.route_policies {
            let policy = RoutePolicy {
                source_chain: entry.source_chain,
                dest_chain: entry.dest_chain,
                default_bridge_type: entry.default_bridge_type,
                fallback_mode: entry.fallback_mode,
                fallback_order: entry.fallback_order,
            };
            store
                .insert_route_policy(entry.id, policy, entry.is_active, entry.updated_at)
                .await?;
        }
        for config in self.fee_configs {
            store.insert_fee_config(config).await?;
        }
        for contract in self.smart_contracts {
            store.insert_smart_contract(contract).await?;
        }
        tracing::info!(chains = store.chains().await.len(), "Registry loaded");
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{CreatePayment, PaymentLifecycle};
    use paybridge_types::model::{TokenKey, UserKey};
    use paybridge_types::store::ConfigStore;
    use rust_decimal::dec;
    use serde_json::json;
    use std::sync::Arc;

    fn registry_json() -> serde_json::Value {
        json!({
            "chains": {
                "eip155:1": {
                    "id": 1,
                    "name": "Ethereum",
                    "rpc": [
                        { "http": "https://eth.example/rpc" },
                        { "http": "https://eth-backup.example/rpc", "rateLimit": 10 }
                    ]
                },
                "eip155:8453": { "id": 2, "name": "Base", "rpc": [{ "http": "https://mainnet.base.org" }] }
            },
            "tokens": [
                { "id": 1, "chain": 1, "symbol": "USDC", "decimals": 6, "isActive": true },
                { "id": 2, "chain": 2, "symbol": "USDC", "decimals": 6, "isActive": true }
            ],
            "bridges": [
                { "id": 1, "name": "CCIP", "bridgeType": 1, "isActive": true }
            ],
            "bridgeConfigs": [
                {
                    "id": 1, "bridge": 1, "sourceChain": 1, "destChain": 2,
                    "routerAddress": "0x80226fc0Ee2b096224EeAc085Bb9a8cba1146f7D",
                    "feePercentage": "0.1", "isActive": true, "updatedAt": 1
                }
            ],
            "routePolicies": [
                { "id": 1, "sourceChain": 1, "destChain": 2, "defaultBridgeType": 1 }
            ],
            "feeConfigs": [
                {
                    "id": 1, "chain": 1, "token": 1, "platformFeePercent": "0.5",
                    "fixedBaseFee": "1", "minFee": "1", "isActive": true, "updatedAt": 1
                }
            ],
            "smartContracts": [
                { "id": 1, "chain": 1, "contractType": "ADAPTER_CCIP", "address": "0x01", "isActive": true, "updatedAt": 1 },
                { "id": 2, "chain": 2, "contractType": "ADAPTER_CCIP", "address": "0x02", "isActive": true, "updatedAt": 1 }
            ]
        })
    }

    #[tokio::test]
    async fn test_registry_seeds_a_routable_store() {
        let registry: Registry = serde_json::from_value(registry_json()).unwrap();
        let store = Arc::new(registry.into_store().await.unwrap());

        let base = store
            .chain_by_chain_id(&"eip155:8453".parse().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(base.id, ChainKey(2));
        assert_eq!(base.family, ChainFamily::Evm);

        let ethereum = store.chain(ChainKey(1)).await.unwrap().unwrap();
        assert_eq!(ethereum.rpc_endpoints.len(), 2);
        assert_eq!(ethereum.rpc_endpoints[1].priority, 1);
        assert_eq!(ethereum.rpc_endpoints[1].rate_limit, Some(10));

        let lifecycle = PaymentLifecycle::new(store.clone(), store);
        let created = lifecycle
            .create_payment(CreatePayment {
                sender: UserKey(1),
                merchant: None,
                source_chain: "eip155:1".parse().unwrap(),
                dest_chain: "eip155:8453".parse().unwrap(),
                source_token: TokenKey(1),
                dest_token: TokenKey(2),
                sender_address: "0xsender".into(),
                receiver_address: "0xreceiver".into(),
                amount: dec!(1000),
                source_tx_hash: None,
                cross_chain_message_id: None,
            })
            .await
            .unwrap();
        assert_eq!(created.fees.platform_fee, dec!(6));
        assert_eq!(created.fees.bridge_fee, dec!(1));
    }

    #[tokio::test]
    async fn test_policy_defaults_to_strict() {
        let registry: Registry = serde_json::from_value(registry_json()).unwrap();
        let store = registry.into_store().await.unwrap();
        let policy = store
            .active_route_policy(ChainKey(1), ChainKey(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(policy.fallback_mode, FallbackMode::Strict);
        assert_eq!(policy.fallback_order, FallbackOrder(vec![BridgeType(1)]));
    }

    #[tokio::test]
    async fn test_rejects_unknown_namespace() {
        let registry: Registry = serde_json::from_value(json!({
            "chains": { "cosmos:cosmoshub-4": { "id": 1, "name": "Cosmos Hub" } }
        }))
        .unwrap();
        let err = registry.into_store().await.unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedChain(_)));
    }

    #[tokio::test]
    async fn test_token_on_unknown_chain() {
        let registry: Registry = serde_json::from_value(json!({
            "tokens": [{ "id": 1, "chain": 9, "symbol": "USDC", "decimals": 6, "isActive": true }]
        }))
        .unwrap();
        let err = registry.into_store().await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Store(StoreError::NotFound { entity: "chain", .. })
        ));
    }
}
