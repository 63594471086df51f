//! Chain identity.
//!
//! - [`ChainId`] - A CAIP-2 compliant chain identifier (e.g., `eip155:8453` for Base)
//! - [`ChainFamily`] - The execution environment a chain belongs to (EVM, SVM, Substrate)

mod chain_id;

pub use chain_id::*;
