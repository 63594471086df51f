//! CAIP-2 chain identifiers.
//!
//! Chains cross the external boundary as [CAIP-2](https://standards.chainagnostic.org/CAIPs/caip-2)
//! strings of the form `namespace:reference`, for example `eip155:8453` for Base.
//! Internally every record refers to a chain by its opaque [`ChainKey`](crate::model::ChainKey);
//! the CAIP-2 form is only used to look chains up and to report them back.
//!
//! ```
//! use paybridge_types::chain::{ChainFamily, ChainId};
//!
//! let base: ChainId = "eip155:8453".parse().unwrap();
//! assert_eq!(base.reference(), "8453");
//! assert_eq!(base.family(), Some(ChainFamily::Evm));
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::str::FromStr;

/// A CAIP-2 compliant blockchain identifier.
///
/// Serializes to and from the colon-separated string form: `"eip155:8453"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId {
    /// The blockchain namespace (e.g., `eip155` for EVM chains, `solana` for Solana).
    pub namespace: String,
    /// The chain-specific reference (e.g., `8453` for Base, `137` for Polygon).
    pub reference: String,
}

impl ChainId {
    pub fn new<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        Self {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Returns the chain family implied by the namespace, if it is one we route through.
    pub fn family(&self) -> Option<ChainFamily> {
        ChainFamily::from_namespace(&self.namespace)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

impl From<ChainId> for String {
    fn from(value: ChainId) -> Self {
        value.to_string()
    }
}

/// Error returned when parsing an invalid chain ID string.
///
/// A valid chain ID must be in the format `namespace:reference` where both
/// components are non-empty.
#[derive(Debug, thiserror::Error)]
#[error("Invalid chain id format {0}")]
pub struct ChainIdFormatError(String);

impl FromStr for ChainId {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((namespace, reference)) if !namespace.is_empty() && !reference.is_empty() => {
                Ok(ChainId::new(namespace, reference))
            }
            _ => Err(ChainIdFormatError(s.into())),
        }
    }
}

impl Serialize for ChainId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ChainId::from_str(&s).map_err(de::Error::custom)
    }
}

/// The execution environment family of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChainFamily {
    Evm,
    Svm,
    Substrate,
}

impl ChainFamily {
    pub const EIP155_NAMESPACE: &'static str = "eip155";
    pub const SOLANA_NAMESPACE: &'static str = "solana";
    pub const POLKADOT_NAMESPACE: &'static str = "polkadot";

    pub fn from_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            Self::EIP155_NAMESPACE => Some(ChainFamily::Evm),
            Self::SOLANA_NAMESPACE => Some(ChainFamily::Svm),
            Self::POLKADOT_NAMESPACE => Some(ChainFamily::Substrate),
            _ => None,
        }
    }

    pub fn namespace(&self) -> &'static str {
        match self {
            ChainFamily::Evm => Self::EIP155_NAMESPACE,
            ChainFamily::Svm => Self::SOLANA_NAMESPACE,
            ChainFamily::Substrate => Self::POLKADOT_NAMESPACE,
        }
    }
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChainFamily::Evm => "EVM",
            ChainFamily::Svm => "SVM",
            ChainFamily::Substrate => "SUBSTRATE",
        };
        f.write_str(s)
    }
}
