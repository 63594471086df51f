#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Cross-chain payment routing core.
//!
//! A payment from chain A to chain B goes through four steps:
//!
//! 1. **Route resolution** ([`resolver`]): the route's policy names candidate bridges
//!    (Hyperbridge, CCIP, LayerZero); the first one whose adapters, route config and
//!    fee quote are all in place is selected.
//! 2. **Fee computation** ([`fees`]): platform fee from the token's fee schedule, the
//!    bridge's percentage fee and a gas estimate, checked against the amount.
//! 3. **Lifecycle** ([`lifecycle`]): the payment is persisted as `PENDING` and moved
//!    through `PROCESSING` to a terminal state, each step audited.
//! 4. **Diagnostics** ([`diagnostics`]): when a payment fails on chain, the revert
//!    payload of its transaction is decoded for operators.
//!
//! Persistence is abstracted behind [`paybridge_types::store`]; [`memory_store`]
//! provides an in-process implementation seeded from a [`registry::Registry`].
//!
//! # Example
//!
//! ```ignore
//! use paybridge_router::{handlers, registry::Registry};
//! use std::sync::Arc;
//!
//! let store = Arc::new(registry.into_store().await?);
//! let lifecycle = PaymentLifecycle::with_collaborators(
//!     store.clone() as Arc<dyn ConfigStore>,
//!     store as Arc<dyn PaymentStore>,
//!     Arc::new(AlwaysHealthy) as Arc<dyn FeeQuoter>,
//!     Arc::new(NoGasFee) as Arc<dyn GasEstimator>,
//! );
//! let state = handlers::AppState::new(Arc::new(lifecycle), Arc::new(Eip155RevertProbe::new()));
//! let app = axum::Router::new().merge(handlers::routes().with_state(state));
//! ```

pub mod diagnostics;
pub mod fees;
pub mod handlers;
pub mod lifecycle;
pub mod memory_store;
pub mod registry;
pub mod resolver;
pub mod sweeper;
pub mod util;

pub use diagnostics::{PaymentDiagnostics, RevertDiagnostics};
pub use fees::{FeeBreakdown, FeeCalculator, GasEstimator};
pub use lifecycle::{CreatePayment, LifecycleError, PaymentLifecycle};
pub use memory_store::MemoryStore;
pub use resolver::{FeeQuoter, ResolvedRoute, RouteError, RoutePreflight, RouteResolver};
pub use sweeper::ExpirySweeper;
