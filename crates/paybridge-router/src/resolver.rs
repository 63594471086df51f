//! Route resolution: picking a ready bridge for a (source, destination) chain pair.
//!
//! The resolver loads the route's effective [`RoutePolicy`], expands it into an
//! ordered list of candidate bridge types, and evaluates three readiness checks for
//! each candidate:
//!
//! - `adapterRegistered`: the bridge's adapter contract is active on both chains,
//! - `routeConfigured`: an active route config exists (`LayerZeroConfig` for
//!   LayerZero, `BridgeConfig` for everything else),
//! - `feeQuoteHealthy`: an active `FeeConfig` exists for the token on the source
//!   chain and the [`FeeQuoter`] reports the bridge healthy.
//!
//! All three checks are always computed so a failing candidate can explain itself.
//! The first candidate passing all of them wins.

use paybridge_types::chain::ChainId;
use paybridge_types::model::{
    BridgeConfig, BridgeProtocol, BridgeType, Chain, ChainKey, LayerZeroConfig, PaymentBridge,
    RoutePolicy, TokenKey,
};
use paybridge_types::store::{ConfigStore, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// Live fee-quote health of a bridge on a route.
///
/// Bridge-specific quote calls live outside the router. The default
/// implementation, [`AlwaysHealthy`], leaves the decision to fee configuration alone.
#[async_trait::async_trait]
pub trait FeeQuoter: Send + Sync {
    async fn is_healthy(&self, bridge_type: BridgeType, source: ChainKey, dest: ChainKey) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysHealthy;

#[async_trait::async_trait]
impl FeeQuoter for AlwaysHealthy {
    async fn is_healthy(
        &self,
        _bridge_type: BridgeType,
        _source: ChainKey,
        _dest: ChainKey,
    ) -> bool {
        true
    }
}

#[async_trait::async_trait]
impl<T: FeeQuoter + ?Sized> FeeQuoter for Arc<T> {
    async fn is_healthy(&self, bridge_type: BridgeType, source: ChainKey, dest: ChainKey) -> bool {
        (**self).is_healthy(bridge_type, source, dest).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateChecks {
    pub adapter_registered: bool,
    pub route_configured: bool,
    pub fee_quote_healthy: bool,
}

impl CandidateChecks {
    pub fn all_passed(&self) -> bool {
        self.adapter_registered && self.route_configured && self.fee_quote_healthy
    }
}

/// Readiness of one candidate bridge, as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateReport {
    pub bridge_type: BridgeType,
    pub bridge_name: String,
    pub ready: bool,
    pub checks: CandidateChecks,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// Outcome of evaluating a route's policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePreflight {
    pub source_chain: ChainId,
    pub dest_chain: ChainId,
    pub policy: RoutePolicy,
    pub selected_bridge_type: Option<BridgeType>,
    pub candidates: Vec<CandidateReport>,
}

/// A route with a ready bridge, plus the config rows the fee step needs.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub source: Chain,
    pub dest: Chain,
    pub bridge: PaymentBridge,
    pub bridge_config: Option<BridgeConfig>,
    pub layerzero_config: Option<LayerZeroConfig>,
    pub preflight: RoutePreflight,
}

impl ResolvedRoute {
    pub fn bridge_type(&self) -> BridgeType {
        self.bridge.bridge_type
    }

    pub fn protocol(&self) -> Option<BridgeProtocol> {
        self.bridge.bridge_type.protocol()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Source and destination chain are both {0}")]
    IdenticalChains(ChainId),
    #[error("Chain {0} not found")]
    ChainNotFound(ChainId),
    #[error("Chain {0} is not active")]
    ChainInactive(ChainId),
    #[error("No viable route from {} to {}", .0.source_chain, .0.dest_chain)]
    NoViableRoute(Box<RoutePreflight>),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One candidate, evaluated.
struct Evaluation {
    report: CandidateReport,
    bridge: Option<PaymentBridge>,
    bridge_config: Option<BridgeConfig>,
    layerzero_config: Option<LayerZeroConfig>,
}

#[derive(Debug, Clone)]
pub struct RouteResolver<C, Q = AlwaysHealthy> {
    store: C,
    quoter: Q,
}

impl<C: ConfigStore> RouteResolver<C> {
    pub fn new(store: C) -> Self {
        Self {
            store,
            quoter: AlwaysHealthy,
        }
    }
}

impl<C, Q> RouteResolver<C, Q>
where
    C: ConfigStore,
    Q: FeeQuoter,
{
    pub fn with_quoter(store: C, quoter: Q) -> Self {
        Self { store, quoter }
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    /// Selects the first ready bridge for the route.
    ///
    /// Candidates after the selected one are not evaluated. When none is ready the
    /// error carries a report for every candidate.
    #[instrument(skip_all, fields(source = %source, dest = %dest))]
    pub async fn resolve_route(
        &self,
        source: &ChainId,
        dest: &ChainId,
        token: Option<TokenKey>,
    ) -> Result<ResolvedRoute, RouteError> {
        let (source, dest) = self.load_chains(source, dest).await?;
        let policy = self.effective_policy(&source, &dest).await?;

        let mut reports = Vec::new();
        let mut selected = None;
        for bridge_type in policy.candidates() {
            let evaluation = self.evaluate(&source, &dest, bridge_type, token).await?;
            reports.push(evaluation.report.clone());
            if evaluation.report.ready {
                selected = Some(evaluation);
                break;
            }
        }

        let preflight = RoutePreflight {
            source_chain: source.chain_id.clone(),
            dest_chain: dest.chain_id.clone(),
            selected_bridge_type: selected.as_ref().map(|e| e.report.bridge_type),
            policy,
            candidates: reports,
        };
        match selected {
            Some(Evaluation {
                bridge: Some(bridge),
                bridge_config,
                layerzero_config,
                ..
            }) => {
                tracing::info!(bridge_type = %bridge.bridge_type, bridge = %bridge.name, "Route resolved");
                Ok(ResolvedRoute {
                    source,
                    dest,
                    bridge,
                    bridge_config,
                    layerzero_config,
                    preflight,
                })
            }
            _ => {
                tracing::warn!(candidates = preflight.candidates.len(), "No viable route");
                Err(RouteError::NoViableRoute(Box::new(preflight)))
            }
        }
    }

    /// Evaluates every candidate of the route's policy without stopping at the
    /// first ready one.
    #[instrument(skip_all, fields(source = %source, dest = %dest))]
    pub async fn preflight(
        &self,
        source: &ChainId,
        dest: &ChainId,
        token: Option<TokenKey>,
    ) -> Result<RoutePreflight, RouteError> {
        let (source, dest) = self.load_chains(source, dest).await?;
        let policy = self.effective_policy(&source, &dest).await?;
        let mut candidates = Vec::new();
        for bridge_type in policy.candidates() {
            let evaluation = self.evaluate(&source, &dest, bridge_type, token).await?;
            candidates.push(evaluation.report);
        }
        let selected_bridge_type = candidates.iter().find(|c| c.ready).map(|c| c.bridge_type);
        Ok(RoutePreflight {
            source_chain: source.chain_id,
            dest_chain: dest.chain_id,
            policy,
            selected_bridge_type,
            candidates,
        })
    }

    /// Looks up both ends of a route, rejecting identical, unknown or inactive chains.
    pub async fn load_chains(
        &self,
        source: &ChainId,
        dest: &ChainId,
    ) -> Result<(Chain, Chain), RouteError> {
        if source == dest {
            return Err(RouteError::IdenticalChains(source.clone()));
        }
        let source = self.load_chain(source).await?;
        let dest = self.load_chain(dest).await?;
        Ok((source, dest))
    }

    async fn load_chain(&self, chain_id: &ChainId) -> Result<Chain, RouteError> {
        let chain = self
            .store
            .chain_by_chain_id(chain_id)
            .await?
            .ok_or_else(|| RouteError::ChainNotFound(chain_id.clone()))?;
        if !chain.is_active {
            return Err(RouteError::ChainInactive(chain_id.clone()));
        }
        Ok(chain)
    }

    async fn effective_policy(
        &self,
        source: &Chain,
        dest: &Chain,
    ) -> Result<RoutePolicy, RouteError> {
        let stored = self.store.active_route_policy(source.id, dest.id).await?;
        Ok(RoutePolicy::effective(stored, source.id, dest.id))
    }

    async fn evaluate(
        &self,
        source: &Chain,
        dest: &Chain,
        bridge_type: BridgeType,
        token: Option<TokenKey>,
    ) -> Result<Evaluation, RouteError> {
        let protocol = bridge_type.protocol();
        let bridge = self
            .store
            .bridge_by_type(bridge_type)
            .await?
            .filter(|bridge| bridge.is_active);

        let mut missing_adapter = None;
        if let Some(protocol) = protocol {
            let adapter = protocol.adapter_contract();
            for chain in [source, dest] {
                let found = self.store.active_smart_contract(chain.id, adapter).await?;
                if found.is_none() && missing_adapter.is_none() {
                    missing_adapter =
                        Some(format!("no active {adapter} contract on {}", chain.chain_id));
                }
            }
        }
        let adapter_registered = protocol.is_some() && missing_adapter.is_none();

        let (bridge_config, layerzero_config) = match (protocol, &bridge) {
            (Some(BridgeProtocol::LayerZero), _) => {
                let config = self.store.active_layerzero_config(source.id, dest.id).await?;
                (None, config)
            }
            (_, Some(bridge)) => {
                let config = self
                    .store
                    .active_bridge_config(bridge.id, source.id, dest.id)
                    .await?;
                (config, None)
            }
            (_, None) => (None, None),
        };
        let route_configured = bridge_config.is_some() || layerzero_config.is_some();

        let fee_configured = match token {
            Some(token) => self.store.active_fee_config(source.id, token).await?.is_some(),
            None => true,
        };
        let quote_healthy = self.quoter.is_healthy(bridge_type, source.id, dest.id).await;
        let fee_quote_healthy = fee_configured && quote_healthy;

        let checks = CandidateChecks {
            adapter_registered,
            route_configured,
            fee_quote_healthy,
        };
        let failure = match (protocol, &bridge) {
            (Some(protocol), Some(_)) => {
                if let Some(message) = missing_adapter {
                    Some((format!("{}_ADAPTER_MISSING", protocol.code_prefix()), message))
                } else if !route_configured {
                    Some((
                        format!("{}_NOT_CONFIGURED", protocol.code_prefix()),
                        protocol.missing_route_hint().to_string(),
                    ))
                } else if !fee_configured {
                    Some((
                        "FEE_QUOTE_UNAVAILABLE".to_string(),
                        format!("no active fee config on {}", source.chain_id),
                    ))
                } else if !quote_healthy {
                    Some((
                        "FEE_QUOTE_UNAVAILABLE".to_string(),
                        format!("{protocol} fee quote unavailable"),
                    ))
                } else {
                    None
                }
            }
            _ => Some((
                "BRIDGE_NOT_REGISTERED".to_string(),
                format!("bridge type {bridge_type} has no active payment bridge"),
            )),
        };

        let bridge_name = bridge
            .as_ref()
            .map(|bridge| bridge.name.clone())
            .or_else(|| protocol.map(|protocol| protocol.to_string()))
            .unwrap_or_else(|| format!("unknown({bridge_type})"));
        let ready = failure.is_none() && checks.all_passed();
        if !ready {
            tracing::debug!(%bridge_type, ?checks, "Candidate not ready");
        }
        let (error_code, error_message) = match failure {
            Some((code, message)) => (Some(code), Some(message)),
            None => (None, None),
        };
        Ok(Evaluation {
            report: CandidateReport {
                bridge_type,
                bridge_name,
                ready,
                checks,
                error_code,
                error_message,
            },
            bridge,
            bridge_config,
            layerzero_config,
        })
    }
}
