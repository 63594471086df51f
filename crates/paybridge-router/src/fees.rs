//! Fee computation on a resolved route.

use paybridge_types::amount::{AmountError, checked_sum, percent_of};
use paybridge_types::chain::ChainId;
use paybridge_types::model::{BridgeProtocol, BridgeType, Chain, ChainKey, FeeConfig, TokenKey};
use paybridge_types::store::{ConfigStore, StoreError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::resolver::ResolvedRoute;

/// Gas cost estimate for executing a transfer, in source token units.
///
/// Estimation belongs to chain clients; the calculator only adds the figure in.
#[async_trait::async_trait]
pub trait GasEstimator: Send + Sync {
    async fn estimate(&self, chain: &Chain, bridge_type: BridgeType) -> Decimal;
}

/// Charges no gas.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGasFee;

#[async_trait::async_trait]
impl GasEstimator for NoGasFee {
    async fn estimate(&self, _chain: &Chain, _bridge_type: BridgeType) -> Decimal {
        Decimal::ZERO
    }
}

/// A flat gas charge per source chain, zero for chains not listed.
#[derive(Debug, Clone, Default)]
pub struct FixedGasFee(pub HashMap<ChainKey, Decimal>);

#[async_trait::async_trait]
impl GasEstimator for FixedGasFee {
    async fn estimate(&self, chain: &Chain, _bridge_type: BridgeType) -> Decimal {
        self.0.get(&chain.id).copied().unwrap_or(Decimal::ZERO)
    }
}

#[async_trait::async_trait]
impl<T: GasEstimator + ?Sized> GasEstimator for Arc<T> {
    async fn estimate(&self, chain: &Chain, bridge_type: BridgeType) -> Decimal {
        (**self).estimate(chain, bridge_type).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    pub platform_fee: Decimal,
    pub bridge_fee: Decimal,
    pub gas_fee: Decimal,
    pub total_fee: Decimal,
    pub net_amount: Decimal,
}

#[derive(Debug, thiserror::Error)]
pub enum FeeError {
    /// The route is viable but nothing prices it.
    #[error("No active fee config for token {token} on {chain}")]
    Unpriced { chain: ChainId, token: TokenKey },
    #[error("Insufficient funds after fees: amount {amount}, fees {total_fee}")]
    InsufficientFundsAfterFees { amount: Decimal, total_fee: Decimal },
    #[error(transparent)]
    Amount(#[from] AmountError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// `clamp(fixedBaseFee + amount * platformFeePercent / 100, minFee, maxFee)`.
///
/// With no `maxFee` the fee is unbounded above.
pub fn platform_fee(config: &FeeConfig, amount: Decimal) -> Result<Decimal, AmountError> {
    let variable = percent_of(amount, config.platform_fee_percent)?;
    let fee = checked_sum(&[config.fixed_base_fee, variable])?.max(config.min_fee);
    Ok(match config.max_fee {
        Some(max_fee) => fee.min(max_fee),
        None => fee,
    })
}

/// Percentage fee charged by the bridge itself.
///
/// LayerZero has no percentage fee model.
pub fn bridge_fee(route: &ResolvedRoute, amount: Decimal) -> Result<Decimal, AmountError> {
    if route.protocol() == Some(BridgeProtocol::LayerZero) {
        return Ok(Decimal::ZERO);
    }
    match &route.bridge_config {
        Some(config) => percent_of(amount, config.fee_percentage),
        None => Ok(Decimal::ZERO),
    }
}

#[derive(Debug, Clone)]
pub struct FeeCalculator<C, G = NoGasFee> {
    store: C,
    gas: G,
}

impl<C: ConfigStore> FeeCalculator<C> {
    pub fn new(store: C) -> Self {
        Self {
            store,
            gas: NoGasFee,
        }
    }
}

impl<C, G> FeeCalculator<C, G>
where
    C: ConfigStore,
    G: GasEstimator,
{
    pub fn with_gas_estimator(store: C, gas: G) -> Self {
        Self { store, gas }
    }

    /// Prices a transfer of `amount` of `token` on `route`'s source chain.
    pub async fn compute_fee(
        &self,
        route: &ResolvedRoute,
        token: TokenKey,
        amount: Decimal,
    ) -> Result<FeeBreakdown, FeeError> {
        let chain = &route.source;
        let config = self
            .store
            .active_fee_config(chain.id, token)
            .await?
            .ok_or_else(|| FeeError::Unpriced {
                chain: chain.chain_id.clone(),
                token,
            })?;

        let platform_fee = platform_fee(&config, amount)?;
        let bridge_fee = bridge_fee(route, amount)?;
        let gas_fee = self.gas.estimate(chain, route.bridge_type()).await;
        let total_fee = checked_sum(&[platform_fee, bridge_fee, gas_fee])?;
        let net_amount = match amount.checked_sub(total_fee) {
            Some(net) if net >= Decimal::ZERO => net,
            _ => return Err(FeeError::InsufficientFundsAfterFees { amount, total_fee }),
        };
        Ok(FeeBreakdown {
            platform_fee,
            bridge_fee,
            gas_fee,
            total_fee,
            net_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use crate::memory_store::test_fixtures::{self as fx, BASE, ETHEREUM};
    use crate::resolver::RouteResolver;
    use paybridge_types::model::{ConfigKey, FallbackMode};
    use paybridge_types::timestamp::UnixTimestamp;
    use rust_decimal::dec;

    fn fee_config(max_fee: Option<Decimal>) -> FeeConfig {
        FeeConfig {
            id: ConfigKey(1),
            chain: ChainKey(1),
            token: TokenKey(1),
            platform_fee_percent: dec!(0.5),
            fixed_base_fee: dec!(1),
            min_fee: dec!(1),
            max_fee,
            is_active: true,
            updated_at: UnixTimestamp::from_secs(0),
        }
    }

    #[test]
    fn test_platform_fee() {
        assert_eq!(platform_fee(&fee_config(None), dec!(1000)), Ok(dec!(6)));
        assert_eq!(platform_fee(&fee_config(Some(dec!(4))), dec!(1000)), Ok(dec!(4)));
    }

    #[test]
    fn test_platform_fee_overflow_is_an_error() {
        let config = FeeConfig {
            platform_fee_percent: dec!(2),
            ..fee_config(None)
        };
        assert_eq!(
            platform_fee(&config, Decimal::MAX),
            Err(AmountError::Overflow(Decimal::MAX))
        );
    }

    #[test]
    fn test_platform_fee_clamps_to_minimum() {
        let config = FeeConfig {
            fixed_base_fee: Decimal::ZERO,
            ..fee_config(None)
        };
        assert_eq!(platform_fee(&config, dec!(10)), Ok(dec!(1)));
        // With the base fee included the minimum no longer binds.
        assert_eq!(platform_fee(&fee_config(None), dec!(10)), Ok(dec!(1.05)));
    }

    async fn resolved(store: &Arc<MemoryStore>, bridge: u32) -> ResolvedRoute {
        fx::policy(store, bridge, FallbackMode::Strict, &[]).await;
        RouteResolver::new(store.clone())
            .resolve_route(&ETHEREUM.parse().unwrap(), &BASE.parse().unwrap(), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_breakdown_sums_components() {
        let store = Arc::new(fx::registry().await);
        fx::ready_ccip(&store).await;
        let route = resolved(&store, 1).await;
        let gas = FixedGasFee(HashMap::from([(ChainKey(1), dec!(0.25))]));
        let calculator = FeeCalculator::with_gas_estimator(store, gas);

        let fees = calculator.compute_fee(&route, fx::USDC_ETH, dec!(1000)).await.unwrap();
        assert_eq!(fees.platform_fee, dec!(6));
        assert_eq!(fees.bridge_fee, dec!(1));
        assert_eq!(fees.gas_fee, dec!(0.25));
        assert_eq!(fees.total_fee, dec!(7.25));
        assert_eq!(fees.net_amount, dec!(992.75));
    }

    #[tokio::test]
    async fn test_layerzero_has_no_bridge_fee() {
        let store = Arc::new(fx::registry().await);
        fx::ready_layerzero(&store).await;
        let route = resolved(&store, 2).await;
        let fees = FeeCalculator::new(store)
            .compute_fee(&route, fx::USDC_ETH, dec!(1000))
            .await
            .unwrap();
        assert_eq!(fees.bridge_fee, Decimal::ZERO);
        assert_eq!(fees.total_fee, dec!(6));
    }

    #[tokio::test]
    async fn test_unpriced_route() {
        let store = Arc::new(fx::registry().await);
        fx::ready_ccip(&store).await;
        let route = resolved(&store, 1).await;
        let err = FeeCalculator::new(store)
            .compute_fee(&route, fx::USDC_BASE, dec!(1000))
            .await
            .unwrap_err();
        assert!(matches!(err, FeeError::Unpriced { token, .. } if token == fx::USDC_BASE));
    }

    #[tokio::test]
    async fn test_negative_net_amount_fails() {
        let store = Arc::new(fx::registry().await);
        fx::ready_ccip(&store).await;
        let route = resolved(&store, 1).await;
        let err = FeeCalculator::new(store)
            .compute_fee(&route, fx::USDC_ETH, dec!(0.5))
            .await
            .unwrap_err();
        assert!(matches!(err, FeeError::InsufficientFundsAfterFees { .. }));
    }
}
