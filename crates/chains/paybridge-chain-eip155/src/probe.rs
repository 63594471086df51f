//! Replays failed transactions to recover their revert payload.
//!
//! A mined transaction's receipt only says that it reverted, not why. The probe
//! re-executes the transaction with `eth_call` against the state of its parent
//! block, which makes the node return the revert data as an RPC error, and hands
//! that error to [`decode_revert_reason`].

use alloy_primitives::B256;
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::BlockId;
use alloy_transport::TransportError;
use alloy_transport::layers::{FallbackLayer, ThrottleLayer};
use alloy_transport_http::Http;
use dashmap::DashMap;
use paybridge_types::chain::{ChainFamily, ChainId};
use paybridge_types::model::Chain;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tower::ServiceBuilder;

use crate::revert::{DecodedRevert, decode_revert_reason};

/// What a probe learned about a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The node does not know the transaction.
    NotFound,
    /// Known, but not mined yet.
    Pending,
    Succeeded,
    /// Mined and reverted. `None` when the replay carried no decodable payload.
    Reverted(Option<DecodedRevert>),
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Chain {0} is not an EVM chain")]
    UnsupportedChain(ChainId),
    #[error("Chain {0} has no HTTP RPC endpoint")]
    NoRpcEndpoint(ChainId),
    #[error("Invalid transaction hash {0}")]
    InvalidTxHash(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Looks up why an on-chain transaction failed.
#[async_trait::async_trait]
pub trait RevertProbe: Send + Sync {
    async fn probe(&self, chain: &Chain, tx_hash: &str) -> Result<ProbeOutcome, ProbeError>;
}

#[async_trait::async_trait]
impl<T: RevertProbe + ?Sized> RevertProbe for Arc<T> {
    async fn probe(&self, chain: &Chain, tx_hash: &str) -> Result<ProbeOutcome, ProbeError> {
        (**self).probe(chain, tx_hash).await
    }
}

/// [`RevertProbe`] over JSON-RPC, one lazily built client per chain.
///
/// Each client spreads requests over the chain's endpoints in failover order,
/// throttled per endpoint.
#[derive(Debug, Default)]
pub struct Eip155RevertProbe {
    providers: DashMap<ChainId, RootProvider>,
}

impl Eip155RevertProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn rpc_client(chain: &Chain) -> Result<RpcClient, ProbeError> {
        let transports = chain
            .rpc_failover_order()
            .into_iter()
            .filter(|endpoint| matches!(endpoint.url.scheme(), "http" | "https"))
            .map(|endpoint| {
                #[cfg(feature = "telemetry")]
                tracing::info!(chain=%chain.chain_id, rpc_url=%endpoint.url, priority=endpoint.priority, "Using HTTP transport");
                ServiceBuilder::new()
                    .layer(ThrottleLayer::new(endpoint.rate_limit.unwrap_or(u32::MAX)))
                    .service(Http::new(endpoint.url.clone()))
            })
            .collect::<Vec<_>>();
        let active = NonZeroUsize::new(transports.len())
            .ok_or_else(|| ProbeError::NoRpcEndpoint(chain.chain_id.clone()))?;
        let fallback = ServiceBuilder::new()
            .layer(FallbackLayer::default().with_active_transport_count(active))
            .service(transports);
        Ok(RpcClient::new(fallback, false))
    }

    fn provider(&self, chain: &Chain) -> Result<RootProvider, ProbeError> {
        if chain.family != ChainFamily::Evm {
            return Err(ProbeError::UnsupportedChain(chain.chain_id.clone()));
        }
        if let Some(provider) = self.providers.get(&chain.chain_id) {
            return Ok(provider.clone());
        }
        let provider = RootProvider::new(Self::rpc_client(chain)?);
        self.providers
            .insert(chain.chain_id.clone(), provider.clone());
        Ok(provider)
    }
}

#[async_trait::async_trait]
impl RevertProbe for Eip155RevertProbe {
    async fn probe(&self, chain: &Chain, tx_hash: &str) -> Result<ProbeOutcome, ProbeError> {
        let hash: B256 = tx_hash
            .parse()
            .map_err(|_| ProbeError::InvalidTxHash(tx_hash.to_string()))?;
        let provider = self.provider(chain)?;

        let Some(receipt) = provider.get_transaction_receipt(hash).await? else {
            let known = provider.get_transaction_by_hash(hash).await?.is_some();
            return Ok(if known {
                ProbeOutcome::Pending
            } else {
                ProbeOutcome::NotFound
            });
        };
        if receipt.status() {
            return Ok(ProbeOutcome::Succeeded);
        }
        let Some(transaction) = provider.get_transaction_by_hash(hash).await? else {
            return Ok(ProbeOutcome::Reverted(None));
        };

        let mut call = provider.call(transaction.into_request());
        if let Some(block_number) = receipt.block_number {
            call = call.block(BlockId::number(block_number.saturating_sub(1)));
        }
        let decoded = match call.await {
            Ok(_) => None,
            Err(err) => {
                #[cfg(feature = "telemetry")]
                tracing::debug!(chain=%chain.chain_id, tx=%tx_hash, error=%err, "Replay reverted");
                decode_revert_reason(&err)
            }
        };
        Ok(ProbeOutcome::Reverted(decoded))
    }
}
