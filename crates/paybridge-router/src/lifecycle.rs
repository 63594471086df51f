//! Payment lifecycle.
//!
//! ```text
//! PENDING ──> PROCESSING ──> COMPLETED ──> REFUNDED
//!    │            │    └───> FAILED          ▲
//!    │            └──────────────────────────┘
//!    └──> COMPLETED | FAILED
//! ```
//!
//! Every transition commits the payment row and its audit event in one store call.
//! A transition is computed against the revision the lifecycle read; if another
//! writer committed in between, the store rejects it and the caller sees
//! [`LifecycleError::StaleState`].

use paybridge_types::amount::{self, AmountError};
use paybridge_types::chain::ChainId;
use paybridge_types::model::{
    ChainKey, MerchantKey, NewPayment, NewPaymentEvent, Payment, PaymentEvent, PaymentEventType,
    PaymentKey, PaymentStatus, Token, TokenKey, UserKey,
};
use paybridge_types::store::{ConfigStore, PaymentStore, StoreError};
use paybridge_types::timestamp::UnixTimestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use crate::fees::{FeeBreakdown, FeeCalculator, FeeError, GasEstimator, NoGasFee};
use crate::resolver::{AlwaysHealthy, FeeQuoter, RouteError, RoutePreflight, RouteResolver};

/// Default lifetime of a `PENDING` payment.
pub const DEFAULT_PAYMENT_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayment {
    pub sender: UserKey,
    #[serde(default)]
    pub merchant: Option<MerchantKey>,
    pub source_chain: ChainId,
    pub dest_chain: ChainId,
    pub source_token: TokenKey,
    pub dest_token: TokenKey,
    pub sender_address: String,
    pub receiver_address: String,
    pub amount: Decimal,
    #[serde(default)]
    pub source_tx_hash: Option<String>,
    #[serde(default)]
    pub cross_chain_message_id: Option<String>,
}

/// A freshly created payment with the fees it was priced at.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPayment {
    pub payment: Payment,
    pub fees: FeeBreakdown,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },
    #[error("No viable route from {} to {}", .0.source_chain, .0.dest_chain)]
    NotReady(Box<RoutePreflight>),
    #[error("Payment {id} cannot move to {attempted}: it is {current}")]
    InvalidTransition {
        id: PaymentKey,
        attempted: PaymentStatus,
        current: PaymentStatus,
    },
    #[error("Payment {0} was modified concurrently")]
    StaleState(PaymentKey),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("No active fee config for token {token} on {chain}")]
    Unpriced { chain: ChainId, token: TokenKey },
    #[error("Insufficient funds after fees: amount {amount}, fees {total_fee}")]
    InsufficientFundsAfterFees { amount: Decimal, total_fee: Decimal },
    #[error(transparent)]
    Store(StoreError),
}

impl LifecycleError {
    fn payment_not_found(id: PaymentKey) -> Self {
        LifecycleError::NotFound {
            entity: "payment",
            key: id.to_string(),
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { id, .. } => LifecycleError::StaleState(id),
            StoreError::NotFound { entity, key } => LifecycleError::NotFound { entity, key },
            other => LifecycleError::Store(other),
        }
    }
}

impl From<RouteError> for LifecycleError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::IdenticalChains(_) | RouteError::ChainInactive(_) => {
                LifecycleError::InvalidInput(err.to_string())
            }
            RouteError::ChainNotFound(chain_id) => LifecycleError::NotFound {
                entity: "chain",
                key: chain_id.to_string(),
            },
            RouteError::NoViableRoute(preflight) => LifecycleError::NotReady(preflight),
            RouteError::Store(err) => err.into(),
        }
    }
}

impl From<FeeError> for LifecycleError {
    fn from(err: FeeError) -> Self {
        match err {
            FeeError::Unpriced { chain, token } => LifecycleError::Unpriced { chain, token },
            FeeError::InsufficientFundsAfterFees { amount, total_fee } => {
                LifecycleError::InsufficientFundsAfterFees { amount, total_fee }
            }
            FeeError::Amount(err) => err.into(),
            FeeError::Store(err) => err.into(),
        }
    }
}

impl From<AmountError> for LifecycleError {
    fn from(err: AmountError) -> Self {
        LifecycleError::InvalidInput(err.to_string())
    }
}

/// Creates payments on resolved routes and drives them through their states.
#[derive(Debug, Clone)]
pub struct PaymentLifecycle<C, P, Q = AlwaysHealthy, G = NoGasFee> {
    resolver: RouteResolver<C, Q>,
    fees: FeeCalculator<C, G>,
    payments: P,
    payment_ttl_secs: u64,
}

impl<C, P> PaymentLifecycle<C, P>
where
    C: ConfigStore + Clone,
    P: PaymentStore,
{
    pub fn new(config: C, payments: P) -> Self {
        Self::with_collaborators(config, payments, AlwaysHealthy, NoGasFee)
    }
}

impl<C, P, Q, G> PaymentLifecycle<C, P, Q, G>
where
    C: ConfigStore + Clone,
    P: PaymentStore,
    Q: FeeQuoter,
    G: GasEstimator,
{
    pub fn with_collaborators(config: C, payments: P, quoter: Q, gas: G) -> Self {
        Self {
            resolver: RouteResolver::with_quoter(config.clone(), quoter),
            fees: FeeCalculator::with_gas_estimator(config, gas),
            payments,
            payment_ttl_secs: DEFAULT_PAYMENT_TTL_SECS,
        }
    }

    pub fn with_payment_ttl(mut self, secs: u64) -> Self {
        self.payment_ttl_secs = secs;
        self
    }

    pub fn resolver(&self) -> &RouteResolver<C, Q> {
        &self.resolver
    }

    pub fn config_store(&self) -> &C {
        self.resolver.store()
    }

    /// Resolves a route, prices it and persists a `PENDING` payment with its
    /// `CREATED` event.
    ///
    /// Tokens are checked against their chains before the route is evaluated.
    /// Nothing is written unless every step succeeds.
    #[instrument(skip_all, fields(source = %input.source_chain, dest = %input.dest_chain))]
    pub async fn create_payment(
        &self,
        input: CreatePayment,
    ) -> Result<CreatedPayment, LifecycleError> {
        if input.sender_address.trim().is_empty() || input.receiver_address.trim().is_empty() {
            return Err(LifecycleError::InvalidInput(
                "sender and receiver addresses are required".to_string(),
            ));
        }
        amount::ensure_positive(input.amount)?;

        let (source_chain, dest_chain) = self
            .resolver
            .load_chains(&input.source_chain, &input.dest_chain)
            .await?;
        let source_token = self.load_token(input.source_token, source_chain.id).await?;
        let dest_token = self.load_token(input.dest_token, dest_chain.id).await?;
        let amount = source_token.check_amount(input.amount)?;

        let route = self
            .resolver
            .resolve_route(&input.source_chain, &input.dest_chain, Some(source_token.id))
            .await?;
        let fees = self
            .fees
            .compute_fee(&route, source_token.id, amount)
            .await?;

        let payment = NewPayment {
            sender: input.sender,
            merchant: input.merchant,
            bridge: route.bridge.id,
            bridge_type: route.bridge_type(),
            source_chain: route.source.id,
            dest_chain: route.dest.id,
            source_token: source_token.id,
            dest_token: dest_token.id,
            source_token_address: source_token.address.clone(),
            dest_token_address: dest_token.address.clone(),
            sender_address: input.sender_address,
            receiver_address: input.receiver_address,
            source_amount: amount,
            fee_amount: fees.total_fee,
            total_charged: amount,
            source_tx_hash: input.source_tx_hash.clone(),
            cross_chain_message_id: input.cross_chain_message_id,
            expires_at: UnixTimestamp::now() + self.payment_ttl_secs,
        };
        let mut event = NewPaymentEvent::new(PaymentEventType::Created)
            .on_chain(route.source.id)
            .with_metadata(json!({
                "bridgeType": route.bridge_type(),
                "bridgeName": route.bridge.name,
                "fees": fees,
            }));
        if let Some(tx_hash) = input.source_tx_hash {
            event = event.with_tx_hash(tx_hash);
        }

        let payment = self.payments.insert_payment(payment, event).await?;
        tracing::info!(
            payment = %payment.id,
            bridge = %route.bridge.name,
            amount = %amount,
            "Payment created"
        );
        Ok(CreatedPayment { payment, fees })
    }

    async fn load_token(&self, id: TokenKey, chain: ChainKey) -> Result<Token, LifecycleError> {
        let token = self
            .config_store()
            .token(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound {
                entity: "token",
                key: id.to_string(),
            })?;
        if token.chain != chain {
            return Err(LifecycleError::InvalidInput(format!(
                "token {id} does not belong to chain {chain}"
            )));
        }
        if !token.is_active {
            return Err(LifecycleError::InvalidInput(format!("token {id} is not active")));
        }
        Ok(token)
    }

    pub async fn payment(&self, id: PaymentKey) -> Result<Payment, LifecycleError> {
        self.payments
            .payment(id)
            .await?
            .ok_or_else(|| LifecycleError::payment_not_found(id))
    }

    /// Audit trail of a payment, oldest first.
    pub async fn events(&self, id: PaymentKey) -> Result<Vec<PaymentEvent>, LifecycleError> {
        self.payment(id).await?;
        Ok(self.payments.payment_events(id).await?)
    }

    pub async fn latest_event(
        &self,
        id: PaymentKey,
        event_type: Option<PaymentEventType>,
    ) -> Result<Option<PaymentEvent>, LifecycleError> {
        Ok(self.payments.latest_payment_event(id, event_type).await?)
    }

    /// Records the destination transaction and moves the payment to `PROCESSING`.
    ///
    /// Recording the hash already stored is a no-op. A different hash replaces the
    /// stored one and is audited.
    #[instrument(skip_all, fields(payment = %id))]
    pub async fn record_destination_tx_hash(
        &self,
        id: PaymentKey,
        tx_hash: &str,
        block_number: Option<u64>,
    ) -> Result<Payment, LifecycleError> {
        let tx_hash = tx_hash.trim();
        if tx_hash.is_empty() {
            return Err(LifecycleError::InvalidInput(
                "destination tx hash is required".to_string(),
            ));
        }
        let mut payment = self.payment(id).await?;
        ensure_transition(&payment, PaymentStatus::Processing, |status| {
            matches!(status, PaymentStatus::Pending | PaymentStatus::Processing)
        })?;
        let unchanged = payment.dest_tx_hash.as_deref() == Some(tx_hash);
        if unchanged && payment.status == PaymentStatus::Processing {
            return Ok(payment);
        }

        let event = (!unchanged).then(|| {
            let mut event = NewPaymentEvent::new(PaymentEventType::DestinationTxHash)
                .on_chain(payment.dest_chain)
                .with_tx_hash(tx_hash);
            event.block_number = block_number;
            if let Some(previous) = &payment.dest_tx_hash {
                event = event.with_metadata(json!({ "previousTxHash": previous }));
            }
            event
        });
        payment.dest_tx_hash = Some(tx_hash.to_string());
        payment.status = PaymentStatus::Processing;
        let payment = self.commit(payment, event).await?;
        tracing::info!(tx_hash, "Destination transaction recorded");
        Ok(payment)
    }

    /// Moves a non-terminal payment to `COMPLETED`.
    #[instrument(skip_all, fields(payment = %id))]
    pub async fn mark_completed(
        &self,
        id: PaymentKey,
        dest_amount: Option<Decimal>,
    ) -> Result<Payment, LifecycleError> {
        let mut payment = self.payment(id).await?;
        ensure_transition(&payment, PaymentStatus::Completed, |status| !status.is_terminal())?;
        if let Some(dest_amount) = dest_amount {
            amount::ensure_positive(dest_amount)?;
            payment.dest_amount = Some(dest_amount);
        }
        let mut event =
            NewPaymentEvent::new(PaymentEventType::Completed).on_chain(payment.dest_chain);
        if let Some(tx_hash) = &payment.dest_tx_hash {
            event = event.with_tx_hash(tx_hash.clone());
        }
        payment.status = PaymentStatus::Completed;
        let payment = self.commit(payment, Some(event)).await?;
        tracing::info!("Payment completed");
        Ok(payment)
    }

    /// Moves a non-terminal payment to `FAILED`, keeping `reason` in the audit event.
    #[instrument(skip_all, fields(payment = %id))]
    pub async fn mark_failed(
        &self,
        id: PaymentKey,
        reason: &str,
    ) -> Result<Payment, LifecycleError> {
        let mut payment = self.payment(id).await?;
        ensure_transition(&payment, PaymentStatus::Failed, |status| !status.is_terminal())?;
        let chain = if payment.dest_tx_hash.is_some() {
            payment.dest_chain
        } else {
            payment.source_chain
        };
        let event = NewPaymentEvent::new(PaymentEventType::Failed)
            .on_chain(chain)
            .with_metadata(json!({ "reason": reason }));
        payment.status = PaymentStatus::Failed;
        let payment = self.commit(payment, Some(event)).await?;
        tracing::info!(reason, "Payment failed");
        Ok(payment)
    }

    /// Refunds a `PROCESSING` or `COMPLETED` payment.
    #[instrument(skip_all, fields(payment = %id))]
    pub async fn mark_refunded(
        &self,
        id: PaymentKey,
        refund_tx_hash: Option<String>,
    ) -> Result<Payment, LifecycleError> {
        let mut payment = self.payment(id).await?;
        ensure_transition(&payment, PaymentStatus::Refunded, |status| {
            matches!(status, PaymentStatus::Processing | PaymentStatus::Completed)
        })?;
        let mut event =
            NewPaymentEvent::new(PaymentEventType::Refunded).on_chain(payment.source_chain);
        if let Some(tx_hash) = &refund_tx_hash {
            event = event.with_tx_hash(tx_hash.clone());
        }
        payment.status = PaymentStatus::Refunded;
        payment.refunded_at = Some(UnixTimestamp::now());
        payment.refund_tx_hash = refund_tx_hash;
        let payment = self.commit(payment, Some(event)).await?;
        tracing::info!("Payment refunded");
        Ok(payment)
    }

    async fn commit(
        &self,
        payment: Payment,
        event: Option<NewPaymentEvent>,
    ) -> Result<Payment, LifecycleError> {
        let id = payment.id;
        self.payments
            .commit_transition(payment, event)
            .await
            .map_err(|err| {
                if matches!(err, StoreError::Conflict { .. }) {
                    tracing::warn!(payment = %id, "Stale payment state, transition rejected");
                }
                LifecycleError::from(err)
            })
    }
}

fn ensure_transition(
    payment: &Payment,
    attempted: PaymentStatus,
    allowed_from: impl Fn(PaymentStatus) -> bool,
) -> Result<(), LifecycleError> {
    if allowed_from(payment.status) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition {
            id: payment.id,
            attempted,
            current: payment.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use crate::memory_store::test_fixtures::{self as fx, BASE, ETHEREUM};
    use paybridge_types::model::{BridgeType, ConfigKey, FallbackMode, FeeConfig};
    use rust_decimal::dec;
    use std::sync::Arc;

    type Lifecycle = PaymentLifecycle<Arc<MemoryStore>, Arc<MemoryStore>>;

    async fn lifecycle() -> (Arc<MemoryStore>, Lifecycle) {
        let store = Arc::new(fx::registry().await);
        fx::ready_ccip(&store).await;
        fx::policy(&store, 1, FallbackMode::Strict, &[]).await;
        (store.clone(), PaymentLifecycle::new(store.clone(), store))
    }

    fn request(amount: Decimal) -> CreatePayment {
        CreatePayment {
            sender: UserKey(7),
            merchant: Some(MerchantKey(3)),
            source_chain: ETHEREUM.parse().unwrap(),
            dest_chain: BASE.parse().unwrap(),
            source_token: fx::USDC_ETH,
            dest_token: fx::USDC_BASE,
            sender_address: "0x1111111111111111111111111111111111111111".into(),
            receiver_address: "0x2222222222222222222222222222222222222222".into(),
            amount,
            source_tx_hash: None,
            cross_chain_message_id: None,
        }
    }

    async fn created(lifecycle: &Lifecycle) -> Payment {
        lifecycle
            .create_payment(request(dec!(1000)))
            .await
            .unwrap()
            .payment
    }

    #[tokio::test]
    async fn test_create_payment() {
        let (_, lifecycle) = lifecycle().await;
        let created = lifecycle.create_payment(request(dec!(1000))).await.unwrap();
        let payment = &created.payment;
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.bridge_type, BridgeType(1));
        assert_eq!(payment.fee_amount, dec!(7));
        assert_eq!(payment.total_charged, dec!(1000));
        assert_eq!(payment.dest_amount, None);
        assert_eq!(created.fees.net_amount, dec!(993));
        assert!(payment.expires_at.is_after(payment.created_at));

        let events = lifecycle.events(payment.id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, PaymentEventType::Created);
        assert_eq!(events[0].metadata["bridgeName"], "CCIP");
    }

    #[tokio::test]
    async fn test_not_ready_route_persists_nothing() {
        let store = Arc::new(fx::registry().await);
        fx::adapters(&store, paybridge_types::model::ContractType::AdapterCcip).await;
        fx::adapters(&store, paybridge_types::model::ContractType::AdapterLayerZero).await;
        fx::policy(&store, 0, FallbackMode::AutoFallback, &[1, 2, 0]).await;
        let lifecycle: Lifecycle = PaymentLifecycle::new(store.clone(), store.clone());

        let err = lifecycle.create_payment(request(dec!(1000))).await.unwrap_err();
        let LifecycleError::NotReady(preflight) = err else {
            panic!("expected not ready, got {err:?}");
        };
        assert_eq!(preflight.candidates.len(), 3);
        assert!(preflight.candidates.iter().all(|c| !c.checks.route_configured));
        assert!(lifecycle.payment(PaymentKey(1)).await.is_err());
        assert!(
            store
                .expired_pending_payments(UnixTimestamp::from_secs(u64::MAX), 10)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let (_, lifecycle) = lifecycle().await;
        let err = lifecycle.create_payment(request(dec!(0))).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidInput(_)));

        let err = lifecycle.create_payment(request(dec!(0.0000001))).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidInput(_)));

        let mut same_chain = request(dec!(10));
        same_chain.dest_chain = same_chain.source_chain.clone();
        let err = lifecycle.create_payment(same_chain).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidInput(_)));

        let mut wrong_token = request(dec!(10));
        wrong_token.source_token = fx::USDC_BASE;
        let err = lifecycle.create_payment(wrong_token).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidInput(_)), "got {err:?}");

        let mut wrong_dest_token = request(dec!(10));
        wrong_dest_token.dest_token = fx::USDC_ETH;
        let err = lifecycle.create_payment(wrong_dest_token).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidInput(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_fee_overflow_is_invalid_input() {
        let (store, lifecycle) = lifecycle().await;
        let unbounded = TokenKey(3);
        store
            .insert_token(Token {
                id: unbounded,
                chain: fx::ETH,
                symbol: "WETH".into(),
                decimals: 18,
                address: None,
                is_stablecoin: false,
                min_amount: None,
                max_amount: None,
                is_active: true,
            })
            .await
            .unwrap();
        store
            .insert_fee_config(FeeConfig {
                id: ConfigKey(101),
                chain: fx::ETH,
                token: unbounded,
                platform_fee_percent: dec!(2),
                fixed_base_fee: Decimal::ZERO,
                min_fee: Decimal::ZERO,
                max_fee: None,
                is_active: true,
                updated_at: UnixTimestamp::from_secs(1),
            })
            .await
            .unwrap();

        let mut huge = request(Decimal::MAX);
        huge.source_token = unbounded;
        let err = lifecycle.create_payment(huge).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidInput(_)), "got {err:?}");
        assert!(lifecycle.payment(PaymentKey(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_insufficient_funds_after_fees() {
        let (_, lifecycle) = lifecycle().await;
        let err = lifecycle.create_payment(request(dec!(1))).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InsufficientFundsAfterFees { .. }));
    }

    #[tokio::test]
    async fn test_record_destination_tx_hash_is_idempotent() {
        let (_, lifecycle) = lifecycle().await;
        let payment = created(&lifecycle).await;

        let first = lifecycle
            .record_destination_tx_hash(payment.id, "0xaaa", Some(12))
            .await
            .unwrap();
        assert_eq!(first.status, PaymentStatus::Processing);
        let again = lifecycle
            .record_destination_tx_hash(payment.id, "0xaaa", Some(12))
            .await
            .unwrap();
        assert_eq!(again.revision, first.revision);

        let replaced = lifecycle
            .record_destination_tx_hash(payment.id, "0xbbb", None)
            .await
            .unwrap();
        assert_eq!(replaced.dest_tx_hash.as_deref(), Some("0xbbb"));

        let events = lifecycle.events(payment.id).await.unwrap();
        let hashes: Vec<_> = events
            .iter()
            .filter(|e| e.event_type == PaymentEventType::DestinationTxHash)
            .map(|e| e.tx_hash.clone().unwrap())
            .collect();
        assert_eq!(hashes, vec!["0xaaa".to_string(), "0xbbb".to_string()]);
        assert_eq!(events[1].block_number, Some(12));
    }

    #[tokio::test]
    async fn test_double_completion_is_rejected() {
        let (_, lifecycle) = lifecycle().await;
        let payment = created(&lifecycle).await;
        lifecycle
            .record_destination_tx_hash(payment.id, "0xaaa", None)
            .await
            .unwrap();
        lifecycle.mark_completed(payment.id, Some(dec!(993))).await.unwrap();

        let err = lifecycle.mark_completed(payment.id, None).await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                attempted: PaymentStatus::Completed,
                current: PaymentStatus::Completed,
                ..
            }
        ));
        let stored = lifecycle.payment(payment.id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert_eq!(stored.dest_amount, Some(dec!(993)));
        let completions = lifecycle
            .events(payment.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.event_type == PaymentEventType::Completed)
            .count();
        assert_eq!(completions, 1);
    }

    #[tokio::test]
    async fn test_terminal_states_reject_transitions() {
        let (_, lifecycle) = lifecycle().await;
        let payment = created(&lifecycle).await;
        let failed = lifecycle.mark_failed(payment.id, "source reverted").await.unwrap();
        assert_eq!(failed.status, PaymentStatus::Failed);

        assert!(matches!(
            lifecycle.mark_completed(payment.id, None).await,
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(matches!(
            lifecycle.record_destination_tx_hash(payment.id, "0xaaa", None).await,
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(matches!(
            lifecycle.mark_refunded(payment.id, None).await,
            Err(LifecycleError::InvalidTransition { .. })
        ));
        let latest = lifecycle
            .latest_event(payment.id, Some(PaymentEventType::Failed))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.metadata["reason"], "source reverted");
    }

    #[tokio::test]
    async fn test_refund() {
        let (_, lifecycle) = lifecycle().await;
        let payment = created(&lifecycle).await;
        assert!(matches!(
            lifecycle.mark_refunded(payment.id, None).await,
            Err(LifecycleError::InvalidTransition {
                current: PaymentStatus::Pending,
                ..
            })
        ));
        lifecycle
            .record_destination_tx_hash(payment.id, "0xaaa", None)
            .await
            .unwrap();
        let refunded = lifecycle
            .mark_refunded(payment.id, Some("0xrefund".into()))
            .await
            .unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
        assert!(refunded.refunded_at.is_some());
        assert_eq!(refunded.refund_tx_hash.as_deref(), Some("0xrefund"));
        let latest = lifecycle.latest_event(payment.id, None).await.unwrap().unwrap();
        assert_eq!(latest.event_type, PaymentEventType::Refunded);
    }

    #[tokio::test]
    async fn test_unknown_payment() {
        let (_, lifecycle) = lifecycle().await;
        let err = lifecycle.mark_completed(PaymentKey(404), None).await.unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { entity: "payment", .. }));
        assert!(lifecycle.events(PaymentKey(404)).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_terminal_transitions() {
        let (_, lifecycle) = lifecycle().await;
        let lifecycle = Arc::new(lifecycle);
        let payment = created(&lifecycle).await;

        let completing = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.mark_completed(payment.id, None).await })
        };
        let failing = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.mark_failed(payment.id, "timeout").await })
        };
        let results = [completing.await.unwrap(), failing.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(LifecycleError::InvalidTransition { .. } | LifecycleError::StaleState(_))
        )));
        let terminal_events = lifecycle
            .events(payment.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| {
                matches!(
                    e.event_type,
                    PaymentEventType::Completed | PaymentEventType::Failed
                )
            })
            .count();
        assert_eq!(terminal_events, 1);
    }
}
