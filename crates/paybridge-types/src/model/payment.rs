use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{
    BridgeKey, BridgeType, ChainKey, MerchantKey, PaymentEventKey, PaymentKey, TokenKey, UserKey,
};
use crate::timestamp::UnixTimestamp;

/// Lifecycle state of a [`Payment`].
///
/// `PENDING -> PROCESSING -> {COMPLETED, FAILED}`, and `PROCESSING | COMPLETED -> REFUNDED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// No chain-driven transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Refunded
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        };
        f.write_str(s)
    }
}

/// One cross-chain transfer attempt.
///
/// Payments are only mutated through lifecycle transitions and are never deleted.
/// `revision` increases by one on every committed transition and is used by the
/// store to reject concurrent writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentKey,
    pub revision: u64,
    pub sender: UserKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant: Option<MerchantKey>,
    pub bridge: BridgeKey,
    pub bridge_type: BridgeType,
    pub source_chain: ChainKey,
    pub dest_chain: ChainKey,
    pub source_token: TokenKey,
    pub dest_token: TokenKey,
    pub source_token_address: Option<String>,
    pub dest_token_address: Option<String>,
    pub sender_address: String,
    pub receiver_address: String,
    pub source_amount: Decimal,
    pub dest_amount: Option<Decimal>,
    pub fee_amount: Decimal,
    pub total_charged: Decimal,
    pub status: PaymentStatus,
    pub source_tx_hash: Option<String>,
    pub dest_tx_hash: Option<String>,
    pub refund_tx_hash: Option<String>,
    pub cross_chain_message_id: Option<String>,
    pub expires_at: UnixTimestamp,
    pub refunded_at: Option<UnixTimestamp>,
    pub created_at: UnixTimestamp,
    pub updated_at: UnixTimestamp,
}

/// A payment as handed to the store for insertion; the store assigns id and revision.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub sender: UserKey,
    pub merchant: Option<MerchantKey>,
    pub bridge: BridgeKey,
    pub bridge_type: BridgeType,
    pub source_chain: ChainKey,
    pub dest_chain: ChainKey,
    pub source_token: TokenKey,
    pub dest_token: TokenKey,
    pub source_token_address: Option<String>,
    pub dest_token_address: Option<String>,
    pub sender_address: String,
    pub receiver_address: String,
    pub source_amount: Decimal,
    pub fee_amount: Decimal,
    pub total_charged: Decimal,
    pub source_tx_hash: Option<String>,
    pub cross_chain_message_id: Option<String>,
    pub expires_at: UnixTimestamp,
}

impl NewPayment {
    /// Materializes the row as first persisted: `PENDING`, revision 0.
    pub fn into_payment(self, id: PaymentKey, now: UnixTimestamp) -> Payment {
        Payment {
            id,
            revision: 0,
            sender: self.sender,
            merchant: self.merchant,
            bridge: self.bridge,
            bridge_type: self.bridge_type,
            source_chain: self.source_chain,
            dest_chain: self.dest_chain,
            source_token: self.source_token,
            dest_token: self.dest_token,
            source_token_address: self.source_token_address,
            dest_token_address: self.dest_token_address,
            sender_address: self.sender_address,
            receiver_address: self.receiver_address,
            source_amount: self.source_amount,
            dest_amount: None,
            fee_amount: self.fee_amount,
            total_charged: self.total_charged,
            status: PaymentStatus::Pending,
            source_tx_hash: self.source_tx_hash,
            dest_tx_hash: None,
            refund_tx_hash: None,
            cross_chain_message_id: self.cross_chain_message_id,
            expires_at: self.expires_at,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentEventType {
    Created,
    DestinationTxHash,
    Completed,
    Failed,
    Refunded,
}

impl fmt::Display for PaymentEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentEventType::Created => "CREATED",
            PaymentEventType::DestinationTxHash => "DESTINATION_TX_HASH",
            PaymentEventType::Completed => "COMPLETED",
            PaymentEventType::Failed => "FAILED",
            PaymentEventType::Refunded => "REFUNDED",
        };
        f.write_str(s)
    }
}

/// Append-only audit record of a payment. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    pub id: PaymentEventKey,
    pub payment: PaymentKey,
    pub event_type: PaymentEventType,
    pub chain: Option<ChainKey>,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub metadata: serde_json::Value,
    pub created_at: UnixTimestamp,
}

/// An event as handed to the store; the store assigns id, payment and time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPaymentEvent {
    pub event_type: PaymentEventType,
    pub chain: Option<ChainKey>,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub metadata: serde_json::Value,
}

impl NewPaymentEvent {
    pub fn new(event_type: PaymentEventType) -> Self {
        Self {
            event_type,
            chain: None,
            tx_hash: None,
            block_number: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn on_chain(mut self, chain: ChainKey) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn with_tx_hash(mut self, tx_hash: impl Into<String>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn into_event(
        self,
        id: PaymentEventKey,
        payment: PaymentKey,
        now: UnixTimestamp,
    ) -> PaymentEvent {
        PaymentEvent {
            id,
            payment,
            event_type: self.event_type,
            chain: self.chain,
            tx_hash: self.tx_hash,
            block_number: self.block_number,
            metadata: self.metadata,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(!PaymentStatus::Processing.is_terminal());
        assert!(PaymentStatus::Completed.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Refunded.is_terminal());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_string(&PaymentEventType::DestinationTxHash).unwrap(),
            "\"DESTINATION_TX_HASH\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Processing).unwrap(),
            "\"PROCESSING\""
        );
        assert_eq!(PaymentEventType::DestinationTxHash.to_string(), "DESTINATION_TX_HASH");
    }

    #[test]
    fn test_event_builder() {
        let event = NewPaymentEvent::new(PaymentEventType::Failed)
            .on_chain(ChainKey(3))
            .with_tx_hash("0xabc")
            .with_metadata(serde_json::json!({"reason": "expired"}))
            .into_event(PaymentEventKey(9), PaymentKey(4), UnixTimestamp::from_secs(10));
        assert_eq!(event.payment, PaymentKey(4));
        assert_eq!(event.chain, Some(ChainKey(3)));
        assert_eq!(event.tx_hash.as_deref(), Some("0xabc"));
        assert_eq!(event.metadata["reason"], "expired");
    }
}
