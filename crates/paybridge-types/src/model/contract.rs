use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{ChainKey, ContractKey};
use crate::timestamp::UnixTimestamp;

/// Role of a deployed contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractType {
    #[serde(rename = "GATEWAY")]
    Gateway,
    #[serde(rename = "ROUTER")]
    Router,
    #[serde(rename = "VAULT")]
    Vault,
    #[serde(rename = "ADAPTER_CCIP")]
    AdapterCcip,
    #[serde(rename = "ADAPTER_HYPERBRIDGE")]
    AdapterHyperbridge,
    #[serde(rename = "ADAPTER_LAYERZERO")]
    AdapterLayerZero,
    #[serde(rename = "RECEIVER_LAYERZERO")]
    ReceiverLayerZero,
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContractType::Gateway => "GATEWAY",
            ContractType::Router => "ROUTER",
            ContractType::Vault => "VAULT",
            ContractType::AdapterCcip => "ADAPTER_CCIP",
            ContractType::AdapterHyperbridge => "ADAPTER_HYPERBRIDGE",
            ContractType::AdapterLayerZero => "ADAPTER_LAYERZERO",
            ContractType::ReceiverLayerZero => "RECEIVER_LAYERZERO",
        };
        f.write_str(name)
    }
}

/// A contract deployed on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartContract {
    pub id: ContractKey,
    pub chain: ChainKey,
    pub contract_type: ContractType,
    pub address: String,
    pub is_active: bool,
    pub updated_at: UnixTimestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_type_wire_names() {
        for ty in [
            ContractType::Gateway,
            ContractType::AdapterCcip,
            ContractType::AdapterLayerZero,
            ContractType::ReceiverLayerZero,
        ] {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{ty}\""));
            let back: ContractType = serde_json::from_str(&json).unwrap();
            assert_eq!(back, ty);
        }
    }
}
