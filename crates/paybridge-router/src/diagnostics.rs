//! On-chain failure diagnostics for payments.
//!
//! The destination transaction is probed when one is recorded, the source
//! transaction otherwise. A revert that carries no decodable payload yields a
//! report with empty revert fields; that is an answer, not an error.

use paybridge_chain_eip155::{
    DecodedRevert, Eip155RevertProbe, ProbeError, ProbeOutcome, RevertProbe,
};
use paybridge_types::chain::ChainId;
use paybridge_types::model::{Payment, PaymentKey};
use paybridge_types::store::{ConfigStore, StoreError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    NotFound,
    Pending,
    Succeeded,
    Reverted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDiagnostics {
    pub payment_id: PaymentKey,
    pub chain_id: ChainId,
    pub tx_hash: String,
    pub tx_status: TxStatus,
    /// Reason recorded when the payment was marked failed.
    pub failure_reason: Option<String>,
    #[serde(flatten)]
    pub revert: DecodedRevert,
}

#[derive(Debug, thiserror::Error)]
pub enum DiagnosticsError {
    #[error("Payment {0} has no on-chain transaction to diagnose")]
    NoTransaction(PaymentKey),
    #[error("Chain of payment {0} is no longer registered")]
    UnknownChain(PaymentKey),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Default)]
pub struct RevertDiagnostics<R = Eip155RevertProbe> {
    probe: R,
}

impl<R: RevertProbe> RevertDiagnostics<R> {
    pub fn new(probe: R) -> Self {
        Self { probe }
    }

    pub async fn diagnose<C: ConfigStore>(
        &self,
        config: &C,
        payment: &Payment,
        failure_reason: Option<String>,
    ) -> Result<PaymentDiagnostics, DiagnosticsError> {
        let (chain_key, tx_hash) = match (&payment.dest_tx_hash, &payment.source_tx_hash) {
            (Some(tx_hash), _) => (payment.dest_chain, tx_hash),
            (None, Some(tx_hash)) => (payment.source_chain, tx_hash),
            (None, None) => return Err(DiagnosticsError::NoTransaction(payment.id)),
        };
        let chain = config
            .chain(chain_key)
            .await?
            .ok_or(DiagnosticsError::UnknownChain(payment.id))?;

        let outcome = self.probe.probe(&chain, tx_hash).await?;
        tracing::debug!(payment = %payment.id, chain = %chain.chain_id, ?outcome, "Probed transaction");
        let (tx_status, revert) = match outcome {
            ProbeOutcome::NotFound => (TxStatus::NotFound, None),
            ProbeOutcome::Pending => (TxStatus::Pending, None),
            ProbeOutcome::Succeeded => (TxStatus::Succeeded, None),
            ProbeOutcome::Reverted(decoded) => (TxStatus::Reverted, decoded),
        };
        Ok(PaymentDiagnostics {
            payment_id: payment.id,
            chain_id: chain.chain_id,
            tx_hash: tx_hash.clone(),
            tx_status,
            failure_reason,
            revert: revert.unwrap_or_default(),
        })
    }
}
