//! CosmWasm smart-query client over the LCD REST endpoint.
//!
//! Serves the oracle, venue and liquidation-queue capabilities. Every query
//! is a `GET /cosmwasm/wasm/v1/contract/{addr}/smart/{base64(json)}` whose
//! response wraps the contract answer in a `data` field.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::capability::{
    LiquidationQueueQuery, PriceLookup, QueueFill, QueueRequest, VenueRetrievalQuery,
};

/// LCD smart-query client.
#[derive(Clone)]
pub struct ContractQueryClient {
    client: reqwest::Client,
    lcd_url: String,
    /// Oracle contract answering price queries
    oracle: Option<String>,
    /// Liquidation queue contract
    liquidation_queue: Option<String>,
}

impl std::fmt::Debug for ContractQueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractQueryClient")
            .field("lcd_url", &self.lcd_url)
            .field("oracle", &self.oracle)
            .field("liquidation_queue", &self.liquidation_queue)
            .finish()
    }
}

impl ContractQueryClient {
    /// Create a client for the given LCD base URL.
    pub fn new(lcd_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            lcd_url: lcd_url.into().trim_end_matches('/').to_string(),
            oracle: None,
            liquidation_queue: None,
        }
    }

    /// Use a client with a request timeout applied at the HTTP layer.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(self)
    }

    /// Set the oracle contract address.
    pub fn with_oracle(mut self, oracle: impl Into<String>) -> Self {
        self.oracle = Some(oracle.into());
        self
    }

    /// Set the liquidation queue contract address.
    pub fn with_liquidation_queue(mut self, queue: impl Into<String>) -> Self {
        self.liquidation_queue = Some(queue.into());
        self
    }

    /// Build the smart-query URL for a contract and message.
    fn query_url<Q: Serialize>(&self, contract: &str, msg: &Q) -> Result<String> {
        let json = serde_json::to_vec(msg).context("Failed to encode query message")?;
        Ok(format!(
            "{}/cosmwasm/wasm/v1/contract/{}/smart/{}",
            self.lcd_url,
            contract,
            STANDARD.encode(json)
        ))
    }

    /// Run a smart query. Returns `Ok(None)` when the LCD answers 404.
    async fn smart_query<Q, R>(&self, contract: &str, msg: &Q) -> Result<Option<R>>
    where
        Q: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.query_url(contract, msg)?;
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("LCD query to {} failed: {} - {}", contract, status, body);
        }

        let wrapped: SmartQueryResponse<R> = response
            .json()
            .await
            .with_context(|| format!("Malformed smart query response from {}", contract))?;
        Ok(Some(wrapped.data))
    }
}

#[async_trait]
impl PriceLookup for ContractQueryClient {
    #[instrument(skip(self))]
    async fn price(&self, denom: &str) -> Result<Option<Decimal>> {
        let oracle = self
            .oracle
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Oracle contract not configured"))?;

        let msg = OracleQueryMsg::Price {
            denom: denom.to_string(),
        };
        let response: Option<PriceResponse> = self.smart_query(oracle, &msg).await?;

        debug!(denom, price = ?response.as_ref().map(|p| p.price), "Oracle price");
        Ok(response.map(|p| p.price))
    }
}

#[async_trait]
impl VenueRetrievalQuery for ContractQueryClient {
    #[instrument(skip(self))]
    async fn retrievable(&self, venue: &str, user: &str) -> Result<Decimal> {
        let msg = VenueQueryMsg::RetrievableAmount {
            user: user.to_string(),
        };
        let response: RetrievableResponse = self
            .smart_query(venue, &msg)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Venue {} not found", venue))?;
        Ok(response.amount)
    }
}

#[async_trait]
impl LiquidationQueueQuery for ContractQueryClient {
    #[instrument(skip(self, request), fields(asset = %request.asset_denom))]
    async fn check_liquidatable(&self, request: &QueueRequest) -> Result<QueueFill> {
        let queue = self
            .liquidation_queue
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Liquidation queue contract not configured"))?;

        let msg = QueueQueryMsg::CheckLiquidatible {
            bid_for: request.asset_denom.clone(),
            collateral_amount: request.collateral_amount,
            collateral_price: request.asset_price,
            credit_info: request.credit_denom.clone(),
            credit_price: request.credit_price,
        };
        let response: LiquidatibleResponse = self
            .smart_query(queue, &msg)
            .await?
            .ok_or_else(|| anyhow::anyhow!("No queue for {}", request.asset_denom))?;

        Ok(QueueFill {
            debt_repaid: response.total_debt_repaid,
            leftover_collateral: response.leftover_collateral,
        })
    }
}

// Contract message and response types

#[derive(Debug, Deserialize)]
struct SmartQueryResponse<T> {
    data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum OracleQueryMsg {
    Price { denom: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum VenueQueryMsg {
    RetrievableAmount { user: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum QueueQueryMsg {
    CheckLiquidatible {
        bid_for: String,
        collateral_amount: Decimal,
        collateral_price: Decimal,
        credit_info: String,
        credit_price: Decimal,
    },
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct RetrievableResponse {
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct LiquidatibleResponse {
    total_debt_repaid: Decimal,
    leftover_collateral: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_query_url_encoding() {
        let client = ContractQueryClient::new("https://lcd.example.com/");
        let msg = VenueQueryMsg::RetrievableAmount {
            user: "osmo1user".to_string(),
        };

        let url = client.query_url("osmo1venue", &msg).unwrap();
        let encoded = url.rsplit('/').next().unwrap();
        let decoded = STANDARD.decode(encoded).unwrap();

        assert!(url.starts_with("https://lcd.example.com/cosmwasm/wasm/v1/contract/osmo1venue/smart/"));
        assert_eq!(
            String::from_utf8(decoded).unwrap(),
            r#"{"retrievable_amount":{"user":"osmo1user"}}"#
        );
    }

    #[test]
    fn test_queue_message_shape() {
        let msg = QueueQueryMsg::CheckLiquidatible {
            bid_for: "uatom".to_string(),
            collateral_amount: dec!(1.5),
            collateral_price: dec!(10),
            credit_info: "ucdt".to_string(),
            credit_price: dec!(1),
        };

        let json = serde_json::to_value(&msg).unwrap();
        let inner = &json["check_liquidatible"];
        assert_eq!(inner["bid_for"], "uatom");
        assert_eq!(inner["collateral_amount"], "1.5");
    }

    #[test]
    fn test_deserialize_liquidatible_response() {
        let json = r#"{"data": {"total_debt_repaid": "12.5", "leftover_collateral": "0.25"}}"#;
        let response: SmartQueryResponse<LiquidatibleResponse> = serde_json::from_str(json).unwrap();
        assert_eq!(response.data.total_debt_repaid, dec!(12.5));
        assert_eq!(response.data.leftover_collateral, dec!(0.25));
    }

    #[tokio::test]
    async fn test_price_without_oracle_fails() {
        let client = ContractQueryClient::new("https://lcd.example.com");
        assert!(client.price("uosmo").await.is_err());
    }
}
