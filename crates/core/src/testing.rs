//! Mock capabilities and fixtures shared by the unit tests.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use waterfall_api::{
    LiquidationQueueQuery, PriceLookup, QueueFill, QueueRequest, RouteSaleSimulation, SaleQuote,
    SellOrder, VenueRetrievalQuery,
};

use crate::position::{CollateralAsset, CreditAsset, Position, SimulationInput, Venue};

/// Canned response of a mock query.
#[derive(Debug, Clone)]
pub enum MockReply<T> {
    Ok(T),
    Fail(String),
    /// Never answers within any test timeout
    Hang,
}

impl<T: Clone> MockReply<T> {
    async fn resolve(&self) -> Result<T> {
        match self {
            Self::Ok(value) => Ok(value.clone()),
            Self::Fail(msg) => Err(anyhow::anyhow!("{}", msg)),
            Self::Hang => {
                tokio::time::sleep(Duration::from_secs(10)).await;
                anyhow::bail!("hung query woke up")
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MockVenues {
    replies: HashMap<String, MockReply<Decimal>>,
    calls: AtomicUsize,
}

impl MockVenues {
    pub fn with(mut self, venue: &str, reply: MockReply<Decimal>) -> Self {
        self.replies.insert(venue.to_string(), reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VenueRetrievalQuery for MockVenues {
    async fn retrievable(&self, venue: &str, _user: &str) -> Result<Decimal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.get(venue) {
            Some(reply) => reply.resolve().await,
            None => anyhow::bail!("unknown venue {}", venue),
        }
    }
}

#[derive(Debug, Default)]
pub struct MockQueue {
    replies: HashMap<String, MockReply<QueueFill>>,
    requests: Mutex<Vec<QueueRequest>>,
}

impl MockQueue {
    pub fn with(mut self, denom: &str, reply: MockReply<QueueFill>) -> Self {
        self.replies.insert(denom.to_string(), reply);
        self
    }

    pub fn requests(&self) -> Vec<QueueRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LiquidationQueueQuery for MockQueue {
    async fn check_liquidatable(&self, request: &QueueRequest) -> Result<QueueFill> {
        self.requests.lock().push(request.clone());
        match self.replies.get(&request.asset_denom) {
            Some(reply) => reply.resolve().await,
            None => anyhow::bail!("no queue for {}", request.asset_denom),
        }
    }
}

#[derive(Debug)]
pub struct MockRouter {
    reply: MockReply<SaleQuote>,
    calls: AtomicUsize,
    last: Mutex<Option<(Vec<SellOrder>, String)>>,
}

impl MockRouter {
    pub fn new(reply: MockReply<SaleQuote>) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_sell(&self) -> Option<Vec<SellOrder>> {
        self.last.lock().as_ref().map(|(sell, _)| sell.clone())
    }

    pub fn last_target(&self) -> Option<String> {
        self.last.lock().as_ref().map(|(_, target)| target.clone())
    }
}

#[async_trait]
impl RouteSaleSimulation for MockRouter {
    async fn simulate_sale(&self, sell: &[SellOrder], target: &str) -> Result<SaleQuote> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some((sell.to_vec(), target.to_string()));
        self.reply.resolve().await
    }
}

#[derive(Debug, Default)]
pub struct MockPrices {
    prices: HashMap<String, Decimal>,
}

impl MockPrices {
    pub fn with(mut self, denom: &str, price: Decimal) -> Self {
        self.prices.insert(denom.to_string(), price);
        self
    }
}

#[async_trait]
impl PriceLookup for MockPrices {
    async fn price(&self, denom: &str) -> Result<Option<Decimal>> {
        Ok(self.prices.get(denom).copied())
    }
}

pub fn venue(address: &str) -> Venue {
    Venue {
        address: address.to_string(),
        deployed: Decimal::ZERO,
    }
}

pub fn quote(input: Decimal, output: Decimal) -> SaleQuote {
    SaleQuote {
        total_input_value: input,
        total_output_value: output,
        slippage_cost: input - output,
        routes: None,
    }
}

pub fn credit() -> CreditAsset {
    CreditAsset {
        denom: "ucdt".to_string(),
        price: Some(dec!(1)),
    }
}

/// Three assets worth 1000 in total, weighted .5/.3/.2.
pub fn collateral() -> Vec<CollateralAsset> {
    vec![
        CollateralAsset {
            denom: "uatom".to_string(),
            amount: dec!(5),
            price: dec!(100),
            decimals: 6,
            weight: dec!(0.5),
        },
        CollateralAsset {
            denom: "uosmo".to_string(),
            amount: dec!(300),
            price: dec!(1),
            decimals: 6,
            weight: dec!(0.3),
        },
        CollateralAsset {
            denom: "utia".to_string(),
            amount: dec!(20),
            price: dec!(10),
            decimals: 6,
            weight: dec!(0.2),
        },
    ]
}

/// Reference position: 1000 collateral, 80% liquidation LTV, 70% borrow LTV,
/// two venues.
pub fn scenario_input() -> SimulationInput {
    SimulationInput::new(
        "osmo1user",
        Position {
            collateral: collateral(),
            credit: credit(),
            debt_amount: dec!(800),
            liquidation_ltv: dec!(80),
            borrow_ltv: dec!(70),
            venues: vec![venue("v1"), venue("v2")],
        },
    )
}
