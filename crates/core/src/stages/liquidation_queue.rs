//! Liquidation queue: match collateral against standing bids, asset by asset.

use futures::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use waterfall_api::{LiquidationQueueQuery, QueueFill, QueueRequest};

use super::{bounded, non_negative, to_native_precision};
use crate::error::SimulationError;
use crate::position::{CollateralAsset, CreditAsset};
use crate::result::{ItemFailure, QueueMatch, StageItem, StageKind, StageResult};

const KIND: StageKind = StageKind::LiquidationQueue;

/// Split `remaining` across the assets with a positive weight.
pub fn debt_shares(remaining: Decimal, collateral: &[CollateralAsset]) -> Vec<(&CollateralAsset, Decimal)> {
    collateral
        .iter()
        .filter(|a| a.is_weighted())
        .map(|a| (a, remaining * a.weight))
        .collect()
}

/// Routes each asset's share of the remaining debt to the liquidation queue.
///
/// Collateral the queue cannot match is counted as the stage cost for that
/// asset, valued at the asset price.
#[derive(Debug, Clone)]
pub struct LiquidationQueueStage {
    query: Arc<dyn LiquidationQueueQuery>,
    timeout: Duration,
}

impl LiquidationQueueStage {
    pub fn new(query: Arc<dyn LiquidationQueueQuery>, timeout: Duration) -> Self {
        Self { query, timeout }
    }

    #[instrument(skip(self, collateral, credit), fields(credit = %credit.denom))]
    pub async fn run(
        &self,
        remaining: Decimal,
        collateral: &[CollateralAsset],
        credit: &CreditAsset,
    ) -> StageResult {
        if remaining.is_zero() {
            debug!("Nothing to cover, skipping liquidation queue");
            return StageResult::skipped(KIND);
        }

        let credit_price = match credit.price {
            Some(price) if price > Decimal::ZERO => price,
            _ => {
                warn!(credit = %credit.denom, "No credit price, liquidation queue cannot be simulated");
                return StageResult::no_data(
                    KIND,
                    remaining,
                    SimulationError::MissingInput(format!("price for {}", credit.denom)),
                    Vec::new(),
                    Vec::new(),
                );
            }
        };

        let shares = debt_shares(remaining, collateral);
        if shares.is_empty() {
            return StageResult::no_data(
                KIND,
                remaining,
                SimulationError::MissingInput("no collateral asset with a positive weight".to_string()),
                Vec::new(),
                Vec::new(),
            );
        }

        let queries = shares.iter().map(|&(asset, debt_share)| async move {
            let result = self.match_asset(asset, debt_share, &credit.denom, credit_price).await;
            (asset, debt_share, result)
        });
        let results = join_all(queries).await;

        let mut total_repaid = Decimal::ZERO;
        let mut total_cost = Decimal::ZERO;
        let mut items = Vec::with_capacity(results.len());
        let mut failures = Vec::new();

        for (asset, debt_share, result) in results {
            match result {
                Ok((collateral_amount, fill)) => {
                    let debt_repaid = non_negative(fill.debt_repaid, "queue debt repaid");
                    let leftover = non_negative(fill.leftover_collateral, "queue leftover collateral");
                    let cost = leftover * asset.price;

                    total_repaid += debt_repaid;
                    total_cost += cost;
                    items.push(StageItem::Queue(QueueMatch {
                        denom: asset.denom.clone(),
                        weight: asset.weight,
                        debt_share,
                        collateral_amount,
                        debt_repaid,
                        leftover_collateral: leftover,
                        cost,
                    }));
                }
                Err(error) => {
                    warn!(denom = %asset.denom, error = %error, "Queue query failed, excluding asset");
                    failures.push(ItemFailure {
                        key: asset.denom.clone(),
                        error,
                    });
                }
            }
        }

        if items.is_empty() {
            warn!("Every liquidation queue query failed");
            return StageResult::no_data(
                KIND,
                remaining,
                SimulationError::StageFailed("every liquidation queue query failed".to_string()),
                items,
                failures,
            );
        }

        debug!(
            repaid = %total_repaid,
            cost = %total_cost,
            failed = failures.len(),
            "Liquidation queue computed"
        );
        StageResult::computed(KIND, remaining, total_repaid, total_cost, items, failures)
    }

    /// Query the queue for one asset. Returns the collateral amount routed and
    /// the queue's answer.
    async fn match_asset(
        &self,
        asset: &CollateralAsset,
        debt_share: Decimal,
        credit_denom: &str,
        credit_price: Decimal,
    ) -> Result<(Decimal, QueueFill), SimulationError> {
        if asset.price <= Decimal::ZERO {
            return Err(SimulationError::MissingInput(format!("price for {}", asset.denom)));
        }

        let required = (debt_share * credit_price)
            .checked_div(asset.price)
            .map(|amount| to_native_precision(amount, asset.decimals))
            .ok_or_else(|| SimulationError::MissingInput(format!("price for {}", asset.denom)))?;

        let request = QueueRequest {
            asset_denom: asset.denom.clone(),
            collateral_amount: required,
            asset_price: asset.price,
            credit_denom: credit_denom.to_string(),
            credit_price,
        };
        let fill = bounded(self.timeout, self.query.check_liquidatable(&request)).await?;

        Ok((required, fill))
    }
}
