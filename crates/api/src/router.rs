//! Route simulation API client for market sale previews.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, instrument};

use crate::capability::{AssetRoute, RouteHop, RouteSaleSimulation, SaleQuote, SellOrder};

/// HTTP client for a swap-route simulation service.
#[derive(Clone)]
pub struct RouteSimulatorClient {
    client: reqwest::Client,
    base_url: String,
    /// Whether intermediate hops are allowed
    multi_hop: bool,
}

impl std::fmt::Debug for RouteSimulatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSimulatorClient")
            .field("base_url", &self.base_url)
            .field("multi_hop", &self.multi_hop)
            .finish()
    }
}

impl RouteSimulatorClient {
    /// Create a client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            multi_hop: true,
        }
    }

    /// Set multi-hop preference.
    pub fn with_multi_hop(mut self, multi_hop: bool) -> Self {
        self.multi_hop = multi_hop;
        self
    }

    /// Convert API response to a [`SaleQuote`].
    fn convert_response(response: RouteApiResponse) -> Result<SaleQuote> {
        if !response.success {
            let msg = response
                .message
                .unwrap_or_else(|| "no liquidity path".to_string());
            anyhow::bail!("Route simulation failed: {}", msg);
        }

        let total_input_value = response
            .total_input_value
            .ok_or_else(|| anyhow::anyhow!("Missing totalInputValue in response"))?;
        let total_output_value = response
            .total_output_value
            .ok_or_else(|| anyhow::anyhow!("Missing totalOutputValue in response"))?;

        let routes = response.routes.map(|routes| {
            routes
                .into_iter()
                .map(|r| AssetRoute {
                    denom: r.denom,
                    amount_in: r.amount_in,
                    input_value: r.input_value,
                    output_value: r.output_value,
                    hops: r
                        .hops
                        .into_iter()
                        .map(|h| RouteHop {
                            venue: h.venue,
                            token_in: h.token_in,
                            token_out: h.token_out,
                            amount_in: h.amount_in,
                            amount_out: h.amount_out,
                        })
                        .collect::<SmallVec<_>>(),
                })
                .collect()
        });

        Ok(SaleQuote {
            total_input_value,
            total_output_value,
            slippage_cost: response
                .slippage
                .unwrap_or(total_input_value - total_output_value),
            routes,
        })
    }
}

#[async_trait]
impl RouteSaleSimulation for RouteSimulatorClient {
    #[instrument(skip(self, sell), fields(orders = sell.len()))]
    async fn simulate_sale(&self, sell: &[SellOrder], target: &str) -> Result<SaleQuote> {
        let url = format!("{}/v1/simulate", self.base_url);
        let request = RouteApiRequest {
            sell,
            target,
            multi_hop: self.multi_hop,
        };

        debug!(target, "Requesting route simulation");

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Route API error: {} - {}", status, body);
        }

        let api_response: RouteApiResponse = response
            .json()
            .await
            .context("Malformed route simulation response")?;
        let quote = Self::convert_response(api_response)?;

        debug!(
            input = %quote.total_input_value,
            output = %quote.total_output_value,
            "Got route simulation"
        );

        Ok(quote)
    }
}

// API request/response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteApiRequest<'a> {
    sell: &'a [SellOrder],
    target: &'a str,
    multi_hop: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteApiResponse {
    pub success: bool,
    pub total_input_value: Option<Decimal>,
    pub total_output_value: Option<Decimal>,
    pub slippage: Option<Decimal>,
    pub routes: Option<Vec<ApiRoute>>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRoute {
    pub denom: String,
    pub amount_in: Decimal,
    pub input_value: Decimal,
    pub output_value: Decimal,
    #[serde(default)]
    pub hops: Vec<ApiHop>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHop {
    pub venue: String,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
}
