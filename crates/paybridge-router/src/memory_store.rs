//! In-process implementation of [`ConfigStore`] and [`PaymentStore`].
//!
//! Tables are plain vectors behind async read-write locks. Configuration rows keep
//! their history: a lookup filters the active rows for the key and takes the one
//! with the latest `updated_at` (insertion order breaks ties). Route policies are
//! kept in their persisted form, the fallback mode as `strict`/`auto_fallback` and
//! the fallback order as a compact `[2,1,0]` string, and parsed on read.
//!
//! Every payment write happens under a single write lock, so a payment row and
//! its audit event are committed together.

use paybridge_types::chain::ChainId;
use paybridge_types::model::{
    BridgeConfig, BridgeKey, BridgeType, Chain, ChainKey, ConfigKey, ContractType, FallbackMode,
    FallbackOrder, FeeConfig, LayerZeroConfig, NewPayment, NewPaymentEvent, Payment,
    PaymentBridge, PaymentEvent, PaymentEventKey, PaymentEventType, PaymentKey, PaymentStatus,
    RoutePolicy, SmartContract, Token, TokenKey,
};
use paybridge_types::store::{ConfigStore, PaymentStore, StoreError};
use paybridge_types::timestamp::UnixTimestamp;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// A route policy row as persisted.
#[derive(Debug, Clone)]
struct RoutePolicyRow {
    id: ConfigKey,
    source_chain: ChainKey,
    dest_chain: ChainKey,
    default_bridge_type: BridgeType,
    fallback_mode: String,
    fallback_order: String,
    is_active: bool,
    updated_at: UnixTimestamp,
}

impl RoutePolicyRow {
    fn parse(&self) -> Result<RoutePolicy, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            entity: "route policy",
            reason,
        };
        let fallback_mode: FallbackMode = self
            .fallback_mode
            .parse()
            .map_err(|e| corrupt(format!("{e}")))?;
        let fallback_order: FallbackOrder = self
            .fallback_order
            .parse()
            .map_err(|e| corrupt(format!("{e}")))?;
        Ok(RoutePolicy {
            source_chain: self.source_chain,
            dest_chain: self.dest_chain,
            default_bridge_type: self.default_bridge_type,
            fallback_mode,
            fallback_order,
        }
        .normalized())
    }
}

#[derive(Debug, Default)]
struct ConfigTables {
    chains: Vec<Chain>,
    tokens: Vec<Token>,
    bridges: Vec<PaymentBridge>,
    route_policies: Vec<RoutePolicyRow>,
    bridge_configs: Vec<BridgeConfig>,
    layerzero_configs: Vec<LayerZeroConfig>,
    fee_configs: Vec<FeeConfig>,
    contracts: Vec<SmartContract>,
}

#[derive(Debug, Default)]
struct PaymentTables {
    payments: BTreeMap<PaymentKey, Payment>,
    events: Vec<PaymentEvent>,
    next_payment: u64,
    next_event: u64,
}

impl PaymentTables {
    fn append_event(&mut self, payment: PaymentKey, event: NewPaymentEvent, now: UnixTimestamp) {
        self.next_event += 1;
        let event = event.into_event(PaymentEventKey(self.next_event), payment, now);
        self.events.push(event);
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    config: RwLock<ConfigTables>,
    payments: RwLock<PaymentTables>,
}

/// Picks the active row with the latest update among `rows`.
fn most_recent<'a, T: 'a>(
    rows: impl Iterator<Item = &'a T>,
    activity: impl Fn(&T) -> (bool, UnixTimestamp),
) -> Option<&'a T> {
    rows.enumerate()
        .filter(|(_, row)| activity(row).0)
        .max_by_key(|(position, row)| (activity(row).1, *position))
        .map(|(_, row)| row)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_chain(&self, chain: Chain) -> Result<(), StoreError> {
        let mut tables = self.config.write().await;
        if tables
            .chains
            .iter()
            .any(|c| c.id == chain.id || c.chain_id == chain.chain_id)
        {
            return Err(StoreError::Duplicate {
                entity: "chain",
                key: chain.chain_id.to_string(),
            });
        }
        tables.chains.push(chain);
        Ok(())
    }

    pub async fn insert_token(&self, token: Token) -> Result<(), StoreError> {
        let mut tables = self.config.write().await;
        if tables.tokens.iter().any(|t| t.id == token.id) {
            return Err(StoreError::Duplicate {
                entity: "token",
                key: token.id.to_string(),
            });
        }
        if !tables.chains.iter().any(|c| c.id == token.chain) {
            return Err(StoreError::NotFound {
                entity: "chain",
                key: token.chain.to_string(),
            });
        }
        tables.tokens.push(token);
        Ok(())
    }

    /// Registers a bridge provider. Names and type codes are unique.
    pub async fn insert_bridge(&self, bridge: PaymentBridge) -> Result<(), StoreError> {
        let mut tables = self.config.write().await;
        if tables.bridges.iter().any(|b| {
            b.id == bridge.id || b.name == bridge.name || b.bridge_type == bridge.bridge_type
        }) {
            return Err(StoreError::Duplicate {
                entity: "bridge",
                key: bridge.name,
            });
        }
        tables.bridges.push(bridge);
        Ok(())
    }

    /// Persists a route policy. An empty fallback order is stored as `[default]`.
    pub async fn insert_route_policy(
        &self,
        id: ConfigKey,
        policy: RoutePolicy,
        is_active: bool,
        updated_at: UnixTimestamp,
    ) -> Result<(), StoreError> {
        let policy = policy.normalized();
        let row = RoutePolicyRow {
            id,
            source_chain: policy.source_chain,
            dest_chain: policy.dest_chain,
            default_bridge_type: policy.default_bridge_type,
            fallback_mode: policy.fallback_mode.to_string(),
            fallback_order: policy.fallback_order.to_string(),
            is_active,
            updated_at,
        };
        let mut tables = self.config.write().await;
        if tables.route_policies.iter().any(|r| r.id == id) {
            return Err(StoreError::Duplicate {
                entity: "route policy",
                key: id.to_string(),
            });
        }
        tables.route_policies.push(row);
        Ok(())
    }

    pub async fn insert_bridge_config(&self, config: BridgeConfig) -> Result<(), StoreError> {
        self.config.write().await.bridge_configs.push(config);
        Ok(())
    }

    pub async fn insert_layerzero_config(&self, config: LayerZeroConfig) -> Result<(), StoreError> {
        self.config.write().await.layerzero_configs.push(config);
        Ok(())
    }

    pub async fn insert_fee_config(&self, config: FeeConfig) -> Result<(), StoreError> {
        self.config.write().await.fee_configs.push(config);
        Ok(())
    }

    pub async fn insert_smart_contract(&self, contract: SmartContract) -> Result<(), StoreError> {
        self.config.write().await.contracts.push(contract);
        Ok(())
    }

    pub async fn chains(&self) -> Vec<Chain> {
        self.config.read().await.chains.clone()
    }
}

#[async_trait::async_trait]
impl ConfigStore for MemoryStore {
    async fn chain(&self, id: ChainKey) -> Result<Option<Chain>, StoreError> {
        let tables = self.config.read().await;
        Ok(tables.chains.iter().find(|c| c.id == id).cloned())
    }

    async fn chain_by_chain_id(&self, chain_id: &ChainId) -> Result<Option<Chain>, StoreError> {
        let tables = self.config.read().await;
        Ok(tables.chains.iter().find(|c| &c.chain_id == chain_id).cloned())
    }

    async fn token(&self, id: TokenKey) -> Result<Option<Token>, StoreError> {
        let tables = self.config.read().await;
        Ok(tables.tokens.iter().find(|t| t.id == id).cloned())
    }

    async fn bridge_by_type(
        &self,
        bridge_type: BridgeType,
    ) -> Result<Option<PaymentBridge>, StoreError> {
        let tables = self.config.read().await;
        Ok(tables
            .bridges
            .iter()
            .find(|b| b.bridge_type == bridge_type)
            .cloned())
    }

    async fn active_route_policy(
        &self,
        source: ChainKey,
        dest: ChainKey,
    ) -> Result<Option<RoutePolicy>, StoreError> {
        let tables = self.config.read().await;
        let row = most_recent(
            tables
                .route_policies
                .iter()
                .filter(|r| r.source_chain == source && r.dest_chain == dest),
            |r: &RoutePolicyRow| (r.is_active, r.updated_at),
        );
        row.map(RoutePolicyRow::parse).transpose()
    }

    async fn active_bridge_config(
        &self,
        bridge: BridgeKey,
        source: ChainKey,
        dest: ChainKey,
    ) -> Result<Option<BridgeConfig>, StoreError> {
        let tables = self.config.read().await;
        Ok(most_recent(
            tables
                .bridge_configs
                .iter()
                .filter(|c| c.bridge == bridge && c.source_chain == source && c.dest_chain == dest),
            |c: &BridgeConfig| (c.is_active, c.updated_at),
        )
        .cloned())
    }

    async fn active_layerzero_config(
        &self,
        source: ChainKey,
        dest: ChainKey,
    ) -> Result<Option<LayerZeroConfig>, StoreError> {
        let tables = self.config.read().await;
        Ok(most_recent(
            tables
                .layerzero_configs
                .iter()
                .filter(|c| c.source_chain == source && c.dest_chain == dest),
            |c: &LayerZeroConfig| (c.is_active, c.updated_at),
        )
        .cloned())
    }

    async fn active_fee_config(
        &self,
        chain: ChainKey,
        token: TokenKey,
    ) -> Result<Option<FeeConfig>, StoreError> {
        let tables = self.config.read().await;
        Ok(most_recent(
            tables
                .fee_configs
                .iter()
                .filter(|c| c.chain == chain && c.token == token),
            |c: &FeeConfig| (c.is_active, c.updated_at),
        )
        .cloned())
    }

    async fn active_smart_contract(
        &self,
        chain: ChainKey,
        contract_type: ContractType,
    ) -> Result<Option<SmartContract>, StoreError> {
        let tables = self.config.read().await;
        Ok(most_recent(
            tables
                .contracts
                .iter()
                .filter(|c| c.chain == chain && c.contract_type == contract_type),
            |c: &SmartContract| (c.is_active, c.updated_at),
        )
        .cloned())
    }
}

#[async_trait::async_trait]
impl PaymentStore for MemoryStore {
    async fn insert_payment(
        &self,
        payment: NewPayment,
        event: NewPaymentEvent,
    ) -> Result<Payment, StoreError> {
        let now = UnixTimestamp::now();
        let mut tables = self.payments.write().await;
        tables.next_payment += 1;
        let id = PaymentKey(tables.next_payment);
        let payment = payment.into_payment(id, now);
        tables.payments.insert(id, payment.clone());
        tables.append_event(id, event, now);
        Ok(payment)
    }

    async fn payment(&self, id: PaymentKey) -> Result<Option<Payment>, StoreError> {
        Ok(self.payments.read().await.payments.get(&id).cloned())
    }

    async fn commit_transition(
        &self,
        mut payment: Payment,
        event: Option<NewPaymentEvent>,
    ) -> Result<Payment, StoreError> {
        let now = UnixTimestamp::now();
        let mut tables = self.payments.write().await;
        let stored = tables
            .payments
            .get(&payment.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "payment",
                key: payment.id.to_string(),
            })?;
        if stored.revision != payment.revision {
            return Err(StoreError::Conflict {
                id: payment.id,
                expected: payment.revision,
                found: stored.revision,
            });
        }
        payment.revision += 1;
        payment.updated_at = now;
        tables.payments.insert(payment.id, payment.clone());
        if let Some(event) = event {
            tables.append_event(payment.id, event, now);
        }
        Ok(payment)
    }

    async fn payment_events(&self, id: PaymentKey) -> Result<Vec<PaymentEvent>, StoreError> {
        let tables = self.payments.read().await;
        let mut events: Vec<PaymentEvent> = tables
            .events
            .iter()
            .filter(|e| e.payment == id)
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.created_at, e.id));
        Ok(events)
    }

    async fn latest_payment_event(
        &self,
        id: PaymentKey,
        event_type: Option<PaymentEventType>,
    ) -> Result<Option<PaymentEvent>, StoreError> {
        let tables = self.payments.read().await;
        Ok(tables
            .events
            .iter()
            .filter(|e| e.payment == id)
            .filter(|e| event_type.is_none_or(|t| e.event_type == t))
            .max_by_key(|e| (e.created_at, e.id))
            .cloned())
    }

    async fn expired_pending_payments(
        &self,
        now: UnixTimestamp,
        limit: usize,
    ) -> Result<Vec<PaymentKey>, StoreError> {
        let tables = self.payments.read().await;
        Ok(tables
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Pending && now.is_after(p.expires_at))
            .map(|p| p.id)
            .take(limit)
            .collect())
    }
}
