//! Store interfaces consumed by the routing core.
//!
//! [`ConfigStore`] is read-only from the core's point of view: every lookup returns
//! the single row in force ("most recent active row wins") or `None`. A `None` is a
//! not-found condition the caller interprets; it is never an error.
//!
//! [`PaymentStore`] owns the write path. Each method is one atomic unit: a payment
//! row and its audit event are committed together or not at all, and a transition
//! only commits if the payment's `revision` is still the one the caller read.

use std::sync::Arc;

use crate::chain::ChainId;
use crate::model::{
    BridgeConfig, BridgeKey, BridgeType, Chain, ChainKey, ContractType, FeeConfig,
    LayerZeroConfig, NewPayment, NewPaymentEvent, Payment, PaymentBridge, PaymentEvent,
    PaymentEventType, PaymentKey, RoutePolicy, SmartContract, Token, TokenKey,
};
use crate::timestamp::UnixTimestamp;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A transition lost a race: the payment changed since it was read.
    #[error("Payment {id} was modified concurrently (expected revision {expected}, found {found})")]
    Conflict {
        id: PaymentKey,
        expected: u64,
        found: u64,
    },
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },
    #[error("Duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },
    #[error("Corrupt {entity} row: {reason}")]
    Corrupt { entity: &'static str, reason: String },
    #[error("Store backend failure: {0}")]
    Backend(String),
}

/// Read access to chains, tokens, bridges and their routing configuration.
#[async_trait::async_trait]
pub trait ConfigStore: Send + Sync {
    async fn chain(&self, id: ChainKey) -> Result<Option<Chain>, StoreError>;

    async fn chain_by_chain_id(&self, chain_id: &ChainId) -> Result<Option<Chain>, StoreError>;

    async fn token(&self, id: TokenKey) -> Result<Option<Token>, StoreError>;

    async fn bridge_by_type(&self, bridge_type: BridgeType)
    -> Result<Option<PaymentBridge>, StoreError>;

    async fn active_route_policy(
        &self,
        source: ChainKey,
        dest: ChainKey,
    ) -> Result<Option<RoutePolicy>, StoreError>;

    async fn active_bridge_config(
        &self,
        bridge: BridgeKey,
        source: ChainKey,
        dest: ChainKey,
    ) -> Result<Option<BridgeConfig>, StoreError>;

    async fn active_layerzero_config(
        &self,
        source: ChainKey,
        dest: ChainKey,
    ) -> Result<Option<LayerZeroConfig>, StoreError>;

    async fn active_fee_config(
        &self,
        chain: ChainKey,
        token: TokenKey,
    ) -> Result<Option<FeeConfig>, StoreError>;

    async fn active_smart_contract(
        &self,
        chain: ChainKey,
        contract_type: ContractType,
    ) -> Result<Option<SmartContract>, StoreError>;
}

/// Transactional persistence of payments and their audit trail.
#[async_trait::async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts a `PENDING` payment together with its first event.
    async fn insert_payment(
        &self,
        payment: NewPayment,
        event: NewPaymentEvent,
    ) -> Result<Payment, StoreError>;

    async fn payment(&self, id: PaymentKey) -> Result<Option<Payment>, StoreError>;

    /// Replaces the stored payment with `payment` and appends `event`, provided the
    /// stored revision still equals `payment.revision`.
    ///
    /// Returns the committed row with its revision bumped, or [`StoreError::Conflict`].
    async fn commit_transition(
        &self,
        payment: Payment,
        event: Option<NewPaymentEvent>,
    ) -> Result<Payment, StoreError>;

    /// Events of a payment, oldest first.
    async fn payment_events(&self, id: PaymentKey) -> Result<Vec<PaymentEvent>, StoreError>;

    /// The newest event of a payment, optionally restricted to one type.
    async fn latest_payment_event(
        &self,
        id: PaymentKey,
        event_type: Option<PaymentEventType>,
    ) -> Result<Option<PaymentEvent>, StoreError>;

    /// Ids of `PENDING` payments whose `expires_at` is before `now`.
    async fn expired_pending_payments(
        &self,
        now: UnixTimestamp,
        limit: usize,
    ) -> Result<Vec<PaymentKey>, StoreError>;
}

#[async_trait::async_trait]
impl<T: ConfigStore + ?Sized> ConfigStore for Arc<T> {
    async fn chain(&self, id: ChainKey) -> Result<Option<Chain>, StoreError> {
        (**self).chain(id).await
    }

    async fn chain_by_chain_id(&self, chain_id: &ChainId) -> Result<Option<Chain>, StoreError> {
        (**self).chain_by_chain_id(chain_id).await
    }

    async fn token(&self, id: TokenKey) -> Result<Option<Token>, StoreError> {
        (**self).token(id).await
    }

    async fn bridge_by_type(
        &self,
        bridge_type: BridgeType,
    ) -> Result<Option<PaymentBridge>, StoreError> {
        (**self).bridge_by_type(bridge_type).await
    }

    async fn active_route_policy(
        &self,
        source: ChainKey,
        dest: ChainKey,
    ) -> Result<Option<RoutePolicy>, StoreError> {
        (**self).active_route_policy(source, dest).await
    }

    async fn active_bridge_config(
        &self,
        bridge: BridgeKey,
        source: ChainKey,
        dest: ChainKey,
    ) -> Result<Option<BridgeConfig>, StoreError> {
        (**self).active_bridge_config(bridge, source, dest).await
    }

    async fn active_layerzero_config(
        &self,
        source: ChainKey,
        dest: ChainKey,
    ) -> Result<Option<LayerZeroConfig>, StoreError> {
        (**self).active_layerzero_config(source, dest).await
    }

    async fn active_fee_config(
        &self,
        chain: ChainKey,
        token: TokenKey,
    ) -> Result<Option<FeeConfig>, StoreError> {
        (**self).active_fee_config(chain, token).await
    }

    async fn active_smart_contract(
        &self,
        chain: ChainKey,
        contract_type: ContractType,
    ) -> Result<Option<SmartContract>, StoreError> {
        (**self).active_smart_contract(chain, contract_type).await
    }
}

#[async_trait::async_trait]
impl<T: PaymentStore + ?Sized> PaymentStore for Arc<T> {
    async fn insert_payment(
        &self,
        payment: NewPayment,
        event: NewPaymentEvent,
    ) -> Result<Payment, StoreError> {
        (**self).insert_payment(payment, event).await
    }

    async fn payment(&self, id: PaymentKey) -> Result<Option<Payment>, StoreError> {
        (**self).payment(id).await
    }

    async fn commit_transition(
        &self,
        payment: Payment,
        event: Option<NewPaymentEvent>,
    ) -> Result<Payment, StoreError> {
        (**self).commit_transition(payment, event).await
    }

    async fn payment_events(&self, id: PaymentKey) -> Result<Vec<PaymentEvent>, StoreError> {
        (**self).payment_events(id).await
    }

    async fn latest_payment_event(
        &self,
        id: PaymentKey,
        event_type: Option<PaymentEventType>,
    ) -> Result<Option<PaymentEvent>, StoreError> {
        (**self).latest_payment_event(id, event_type).await
    }

    async fn expired_pending_payments(
        &self,
        now: UnixTimestamp,
        limit: usize,
    ) -> Result<Vec<PaymentKey>, StoreError> {
        (**self).expired_pending_payments(now, limit).await
    }
}
