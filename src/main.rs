//! Liquidation Waterfall Simulator
//!
//! Previews how an undercollateralized position would be unwound:
//! - Capital recall from deposit venues
//! - Liquidation queue fills per collateral asset
//! - Routed market sale of what remains
//!
//! Usage: `waterfall-sim [--json] [--single-hop] <USER>` (or `USER_ADDRESS` in the environment)

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use waterfall_api::{
    ContractQueryClient, LiquidationQueueQuery, PositionRead, PriceLookup, QueryCache,
    RouteSaleSimulation, RouteSimulatorClient, SnapshotFileReader, VenueRetrievalQuery,
};
use waterfall_core::{Report, SimulationRunner, Simulator, SimulatorConfig, SnapshotLoader};

/// Environment variable names.
mod env {
    pub const LCD_URL: &str = "LCD_URL";
    pub const ROUTER_URL: &str = "ROUTER_URL";
    pub const ORACLE_CONTRACT: &str = "ORACLE_CONTRACT";
    pub const LIQ_QUEUE_CONTRACT: &str = "LIQ_QUEUE_CONTRACT";
    pub const POSITION_FILE: &str = "POSITION_FILE";
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    if !args.json {
        print_banner();
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,waterfall_core=debug,waterfall_api=debug")),
        )
        .init();

    // WATERFALL_CONFIG names a TOML file; otherwise WATERFALL_PROFILE picks a preset
    let sim_config = SimulatorConfig::load()?;
    sim_config.log_config();

    let config = load_config(args.user, !args.single_hop)?;
    let capabilities = build_capabilities(&config, &sim_config)?;

    let simulator = Arc::new(Simulator::new(
        capabilities.venues,
        capabilities.queue,
        capabilities.router,
        &sim_config.queries,
    ));
    let loader = Arc::new(SnapshotLoader::new(
        capabilities.positions,
        capabilities.prices,
        &sim_config,
    ));
    let runner = SimulationRunner::new(simulator).with_loader(loader);

    info!(user = %config.user, "Running liquidation waterfall");

    let mut rx = runner.subscribe();
    let generation = runner.refresh(config.user.clone());
    let output = loop {
        rx.changed()
            .await
            .context("Simulation runner stopped before publishing")?;
        let latest = rx.borrow_and_update().clone();
        if let Some(output) = latest.filter(|o| o.generation == generation) {
            break output;
        }
    };

    let result = output
        .result
        .with_context(|| format!("Failed to simulate position of {}", config.user))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(result.as_ref())?);
    } else {
        print!("{}", Report::from_result(&result));
    }

    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "waterfall-sim")]
#[command(about = "Preview the liquidation waterfall of a position")]
struct Args {
    /// Address of the position owner
    #[arg(env = "USER_ADDRESS")]
    user: String,

    /// Print the full result as JSON instead of the report table
    #[arg(long)]
    json: bool,

    /// Restrict market sale routes to direct swaps
    #[arg(long)]
    single_hop: bool,
}

/// Endpoints loaded from environment.
struct Config {
    lcd_url: String,
    router_url: String,
    oracle: String,
    liquidation_queue: String,
    position_file: String,
    user: String,
    multi_hop: bool,
}

fn load_config(user: String, multi_hop: bool) -> Result<Config> {
    let get_env = |name: &str| -> Result<String> {
        std::env::var(name).map_err(|_| anyhow::anyhow!("Missing env var: {}", name))
    };

    Ok(Config {
        lcd_url: get_env(env::LCD_URL)
            .unwrap_or_else(|_| "https://lcd.osmosis.zone".to_string()),
        router_url: get_env(env::ROUTER_URL)?,
        oracle: get_env(env::ORACLE_CONTRACT)?,
        liquidation_queue: get_env(env::LIQ_QUEUE_CONTRACT)?,
        position_file: get_env(env::POSITION_FILE)?,
        user,
        multi_hop,
    })
}

/// Capability handles shared by the loader and the simulator.
struct Capabilities {
    positions: Arc<dyn PositionRead>,
    prices: Arc<dyn PriceLookup>,
    venues: Arc<dyn VenueRetrievalQuery>,
    queue: Arc<dyn LiquidationQueueQuery>,
    router: Arc<dyn RouteSaleSimulation>,
}

fn build_capabilities(config: &Config, sim_config: &SimulatorConfig) -> Result<Capabilities> {
    let positions = Arc::new(
        SnapshotFileReader::from_file(&config.position_file)
            .with_context(|| format!("Failed to load positions from {}", config.position_file))?,
    );

    // The HTTP timeout is a backstop; per-query timeouts are enforced by the stages
    let contracts = ContractQueryClient::new(&config.lcd_url)
        .with_http_timeout(sim_config.queries.route_timeout())?
        .with_oracle(&config.oracle)
        .with_liquidation_queue(&config.liquidation_queue);
    let router =
        RouteSimulatorClient::with_base_url(&config.router_url).with_multi_hop(config.multi_hop);

    info!(
        lcd = %config.lcd_url,
        router = %config.router_url,
        oracle = %config.oracle,
        queue = %config.liquidation_queue,
        multi_hop = config.multi_hop,
        "Query clients configured"
    );

    if sim_config.cache.enabled {
        let ttl = sim_config.cache.ttl();
        let contracts = Arc::new(QueryCache::new(contracts, ttl));
        let router = Arc::new(QueryCache::new(router, ttl));
        info!(ttl_ms = sim_config.cache.ttl_ms, "Query cache enabled");

        return Ok(Capabilities {
            positions,
            prices: contracts.clone(),
            venues: contracts.clone(),
            queue: contracts,
            router,
        });
    }

    let contracts = Arc::new(contracts);
    Ok(Capabilities {
        positions,
        prices: contracts.clone(),
        venues: contracts.clone(),
        queue: contracts,
        router: Arc::new(router),
    })
}

/// Print startup banner.
fn print_banner() {
    println!(r#"
    ╦ ╦┌─┐┌┬┐┌─┐┬─┐┌─┐┌─┐┬  ┬
    ║║║├─┤ │ ├┤ ├┬┘├┤ ├─┤│  │
    ╚╩╝┴ ┴ ┴ └─┘┴└─└  ┴ ┴┴─┘┴─┘
    Liquidation Waterfall Simulator v0.1.0
    "#);
}
