//! Records owned by the Config Store and the Payment Store.
//!
//! Every record is keyed by an opaque integer id. CAIP-2 identifiers only appear
//! on [`Chain`] itself; everything else refers to chains by [`ChainKey`].

mod bridge;
mod chain;
mod contract;
mod fee;
mod payment;

pub use bridge::*;
pub use chain::*;
pub use contract::*;
pub use fee::*;
pub use payment::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! record_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map($name)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                $name(value)
            }
        }
    };
}

record_key!(
    /// Internal id of a [`Chain`] row.
    ChainKey
);
record_key!(
    /// Internal id of a [`Token`] row.
    TokenKey
);
record_key!(
    /// Internal id of a [`PaymentBridge`] row.
    BridgeKey
);
record_key!(ContractKey);
record_key!(ConfigKey);
record_key!(
    /// Internal id of a [`Payment`].
    PaymentKey
);
record_key!(PaymentEventKey);
record_key!(UserKey);
record_key!(MerchantKey);
