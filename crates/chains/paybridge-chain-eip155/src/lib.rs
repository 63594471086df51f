//! EIP-155 (EVM) chain support for cross-chain payment diagnostics.
//!
//! When a source or destination transaction fails on an EVM chain, operators need
//! more than "execution reverted". This crate recovers and decodes the revert
//! payload.
//!
//! - [`revert`] - selector dispatch over raw revert bytes, covering the standard
//!   `Error(string)` and `Panic(uint256)` encodings plus custom errors with a
//!   leading string argument.
//! - [`probe`] - replays a mined, reverted transaction through `eth_call` on a
//!   fallback JSON-RPC client built from the chain's registered endpoints.
//!
//! # Feature Flags
//!
//! - `telemetry` - tracing of RPC client construction and replay failures

pub mod probe;
pub mod revert;

pub use probe::{Eip155RevertProbe, ProbeError, ProbeOutcome, RevertProbe};
pub use revert::{DecodedRevert, RevertError, decode_revert_bytes, decode_revert_reason};
