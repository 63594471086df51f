use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::{BridgeKey, ChainKey, ConfigKey, ContractType};
use crate::timestamp::UnixTimestamp;

/// Small integer code identifying a bridge provider.
///
/// Codes are what route policies store in their fallback order. A code does not
/// have to match any registered [`PaymentBridge`]; such codes are simply never ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BridgeType(pub u32);

impl BridgeType {
    pub fn protocol(&self) -> Option<BridgeProtocol> {
        BridgeProtocol::from_code(*self)
    }
}

impl fmt::Display for BridgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bridge protocols the router knows how to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BridgeProtocol {
    Hyperbridge,
    Ccip,
    LayerZero,
}

impl BridgeProtocol {
    pub fn from_code(code: BridgeType) -> Option<Self> {
        match code.0 {
            0 => Some(BridgeProtocol::Hyperbridge),
            1 => Some(BridgeProtocol::Ccip),
            2 => Some(BridgeProtocol::LayerZero),
            _ => None,
        }
    }

    pub fn code(&self) -> BridgeType {
        match self {
            BridgeProtocol::Hyperbridge => BridgeType(0),
            BridgeProtocol::Ccip => BridgeType(1),
            BridgeProtocol::LayerZero => BridgeType(2),
        }
    }

    /// Contract type of the adapter that must be deployed on both ends of a route.
    pub fn adapter_contract(&self) -> ContractType {
        match self {
            BridgeProtocol::Hyperbridge => ContractType::AdapterHyperbridge,
            BridgeProtocol::Ccip => ContractType::AdapterCcip,
            BridgeProtocol::LayerZero => ContractType::AdapterLayerZero,
        }
    }

    /// Prefix used for operator-facing diagnostic codes, e.g. `CCIP_NOT_CONFIGURED`.
    pub fn code_prefix(&self) -> &'static str {
        match self {
            BridgeProtocol::Hyperbridge => "HYPERBRIDGE",
            BridgeProtocol::Ccip => "CCIP",
            BridgeProtocol::LayerZero => "LAYERZERO",
        }
    }

    /// What a missing route configuration means for this protocol.
    pub fn missing_route_hint(&self) -> &'static str {
        match self {
            BridgeProtocol::Hyperbridge => "missing state machine id or destination contract",
            BridgeProtocol::Ccip => "missing chain selector or destination adapter",
            BridgeProtocol::LayerZero => "missing destination endpoint id or peer",
        }
    }
}

impl fmt::Display for BridgeProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BridgeProtocol::Hyperbridge => "Hyperbridge",
            BridgeProtocol::Ccip => "CCIP",
            BridgeProtocol::LayerZero => "LayerZero",
        };
        f.write_str(name)
    }
}

/// A registered bridge provider, unique by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBridge {
    pub id: BridgeKey,
    pub name: String,
    pub bridge_type: BridgeType,
    pub is_active: bool,
}

/// Generic per-(bridge, source, destination) routing parameters.
///
/// Several rows may exist for one route over time; the active row with the most
/// recent `updated_at` is the one in force.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    pub id: ConfigKey,
    pub bridge: BridgeKey,
    pub source_chain: ChainKey,
    pub dest_chain: ChainKey,
    pub router_address: String,
    pub fee_percentage: Decimal,
    #[serde(default)]
    pub config: serde_json::Value,
    pub is_active: bool,
    pub updated_at: UnixTimestamp,
}

/// LayerZero-specific routing parameters for a (source, destination) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerZeroConfig {
    pub id: ConfigKey,
    pub source_chain: ChainKey,
    pub dest_chain: ChainKey,
    /// Destination endpoint id.
    pub dst_eid: u32,
    pub peer_hex: String,
    pub options_hex: String,
    pub is_active: bool,
    pub updated_at: UnixTimestamp,
}

/// How a route picks among bridges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    /// Only the default bridge is attempted.
    #[default]
    Strict,
    /// Bridges are attempted in fallback order.
    AutoFallback,
}

impl FallbackMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackMode::Strict => "strict",
            FallbackMode::AutoFallback => "auto_fallback",
        }
    }
}

impl fmt::Display for FallbackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown fallback mode '{0}'")]
pub struct FallbackModeParseError(String);

impl FromStr for FallbackMode {
    type Err = FallbackModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(FallbackMode::Strict),
            "auto_fallback" => Ok(FallbackMode::AutoFallback),
            other => Err(FallbackModeParseError(other.to_string())),
        }
    }
}

/// Ordered list of bridge type codes to try under [`FallbackMode::AutoFallback`].
///
/// Persisted in compact form, `[2,1,0]`. Order is significant and duplicates
/// are kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FallbackOrder(pub Vec<BridgeType>);

impl FallbackOrder {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BridgeType> {
        self.0.iter()
    }

    /// Returns this order, or `[default]` when it is empty.
    pub fn or_default_bridge(self, default: BridgeType) -> Self {
        if self.0.is_empty() {
            FallbackOrder(vec![default])
        } else {
            self
        }
    }
}

impl fmt::Display for FallbackOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, code) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{code}")?;
        }
        f.write_str("]")
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid fallback order '{0}'")]
pub struct FallbackOrderParseError(String);

impl FromStr for FallbackOrder {
    type Err = FallbackOrderParseError;

    /// Parses `[2,1,0]`. An empty string or `[]` parses to an empty order.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(FallbackOrder::default());
        }
        let inner = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| FallbackOrderParseError(s.to_string()))?;
        if inner.trim().is_empty() {
            return Ok(FallbackOrder::default());
        }
        inner
            .split(',')
            .map(|item| item.trim().parse::<u32>().map(BridgeType))
            .collect::<Result<Vec<_>, _>>()
            .map(FallbackOrder)
            .map_err(|_| FallbackOrderParseError(s.to_string()))
    }
}

/// Decision policy for one (source, destination) route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePolicy {
    pub source_chain: ChainKey,
    pub dest_chain: ChainKey,
    pub default_bridge_type: BridgeType,
    pub fallback_mode: FallbackMode,
    pub fallback_order: FallbackOrder,
}

impl RoutePolicy {
    /// The policy in force for a route that has none stored.
    pub fn implicit(source_chain: ChainKey, dest_chain: ChainKey) -> Self {
        Self {
            source_chain,
            dest_chain,
            default_bridge_type: BridgeType(0),
            fallback_mode: FallbackMode::Strict,
            fallback_order: FallbackOrder(vec![BridgeType(0)]),
        }
    }

    /// Resolves the policy to apply: the stored one (with its fallback order
    /// defaulted), or the implicit policy.
    pub fn effective(
        stored: Option<RoutePolicy>,
        source_chain: ChainKey,
        dest_chain: ChainKey,
    ) -> Self {
        match stored {
            Some(policy) => policy.normalized(),
            None => Self::implicit(source_chain, dest_chain),
        }
    }

    /// Guarantees a non-empty fallback order.
    pub fn normalized(self) -> Self {
        let fallback_order = self.fallback_order.or_default_bridge(self.default_bridge_type);
        Self {
            fallback_order,
            ..self
        }
    }

    /// Bridge types to evaluate, in order.
    ///
    /// Strict policies yield exactly the default bridge, whatever the fallback order holds.
    pub fn candidates(&self) -> Vec<BridgeType> {
        match self.fallback_mode {
            FallbackMode::Strict => vec![self.default_bridge_type],
            FallbackMode::AutoFallback => {
                if self.fallback_order.is_empty() {
                    vec![self.default_bridge_type]
                } else {
                    self.fallback_order.0.clone()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(mode: FallbackMode, order: &[u32]) -> RoutePolicy {
        RoutePolicy {
            source_chain: ChainKey(1),
            dest_chain: ChainKey(2),
            default_bridge_type: BridgeType(1),
            fallback_mode: mode,
            fallback_order: FallbackOrder(order.iter().copied().map(BridgeType).collect()),
        }
    }

    #[test]
    fn test_fallback_order_compact_roundtrip_preserves_order() {
        let order = FallbackOrder(vec![BridgeType(2), BridgeType(1), BridgeType(0)]);
        let compact = order.to_string();
        assert_eq!(compact, "[2,1,0]");
        assert_eq!(compact.parse::<FallbackOrder>().unwrap(), order);
    }

    #[test]
    fn test_fallback_order_parse_empty_forms() {
        assert!("".parse::<FallbackOrder>().unwrap().is_empty());
        assert!("[]".parse::<FallbackOrder>().unwrap().is_empty());
        assert_eq!(
            "[ 1, 1 ,2]".parse::<FallbackOrder>().unwrap(),
            FallbackOrder(vec![BridgeType(1), BridgeType(1), BridgeType(2)])
        );
        assert!("1,2".parse::<FallbackOrder>().is_err());
        assert!("[1,x]".parse::<FallbackOrder>().is_err());
        assert!("[-1]".parse::<FallbackOrder>().is_err());
        assert_eq!(
            "[300,1]".parse::<FallbackOrder>().unwrap(),
            FallbackOrder(vec![BridgeType(300), BridgeType(1)])
        );
    }

    #[test]
    fn test_fallback_order_json_is_array() {
        let order = FallbackOrder(vec![BridgeType(0), BridgeType(2)]);
        assert_eq!(serde_json::to_string(&order).unwrap(), "[0,2]");
    }

    #[test]
    fn test_fallback_mode_literals() {
        assert_eq!(FallbackMode::AutoFallback.to_string(), "auto_fallback");
        assert_eq!("strict".parse::<FallbackMode>().unwrap(), FallbackMode::Strict);
        assert!("fallback".parse::<FallbackMode>().is_err());
        assert_eq!(
            serde_json::to_string(&FallbackMode::AutoFallback).unwrap(),
            "\"auto_fallback\""
        );
    }

    #[test]
    fn test_strict_policy_has_single_candidate() {
        for order in [&[][..], &[2, 1, 0][..], &[0][..], &[7, 7][..]] {
            assert_eq!(policy(FallbackMode::Strict, order).candidates(), vec![BridgeType(1)]);
        }
    }

    #[test]
    fn test_auto_fallback_candidates_keep_stored_order() {
        let candidates = policy(FallbackMode::AutoFallback, &[2, 2, 9, 0]).candidates();
        assert_eq!(
            candidates,
            vec![BridgeType(2), BridgeType(2), BridgeType(9), BridgeType(0)]
        );
    }

    #[test]
    fn test_normalized_defaults_empty_order() {
        let normalized = policy(FallbackMode::AutoFallback, &[]).normalized();
        assert_eq!(normalized.fallback_order, FallbackOrder(vec![BridgeType(1)]));
    }

    #[test]
    fn test_effective_policy_without_stored_row() {
        let effective = RoutePolicy::effective(None, ChainKey(1), ChainKey(2));
        assert_eq!(effective.default_bridge_type, BridgeType(0));
        assert_eq!(effective.fallback_mode, FallbackMode::Strict);
        assert_eq!(effective.fallback_order.to_string(), "[0]");
        assert_eq!(effective.candidates(), vec![BridgeType(0)]);
    }

    #[test]
    fn test_protocol_catalogue() {
        assert_eq!(BridgeType(1).protocol(), Some(BridgeProtocol::Ccip));
        assert_eq!(BridgeType(9).protocol(), None);
        assert_eq!(
            BridgeProtocol::LayerZero.adapter_contract(),
            ContractType::AdapterLayerZero
        );
        for protocol in [
            BridgeProtocol::Hyperbridge,
            BridgeProtocol::Ccip,
            BridgeProtocol::LayerZero,
        ] {
            assert_eq!(protocol.code().protocol(), Some(protocol));
        }
    }
}
