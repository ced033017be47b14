use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Client;
use market_search::cache::token_store::TokenStore;
use market_search::resilience::fetch_coordinator::FetchCoordinator;
use market_search::resilience::retry::RetrySettings;
use market_search::server;
use market_search::sources::identity::IdentityClient;
use market_search::sources::search::{ItemCondition, SearchClient, SearchParams};
use market_search::utils::config_loader;
use market_search::utils::logging;
use market_search::utils::logging::LogLevel;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "market-search.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the search API (default)
    Serve,
    /// Run one search and print the raw marketplace JSON
    Search {
        query: String,
        #[arg(long, value_enum, default_value = "all")]
        condition: ItemCondition,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, init logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level.to_owned());

    // -------------------------------
    // 2. Create request client
    // -------------------------------

    let client = Client::builder()
        .build()
        .context("cannot build HTTP client")?;

    // -------------------------------
    // 3. Token store + fetch coordinator
    // -------------------------------

    let token_store = TokenStore::new(IdentityClient::new(client.clone(), service_config.identity.clone()));
    let search_client = SearchClient::new(client, service_config.search.clone());
    let retry = RetrySettings::from_config(&service_config.settings.retry);
    let coordinator = Arc::new(FetchCoordinator::new(token_store, search_client, retry));

    // -------------------------------
    // 4. Run
    // -------------------------------

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Service starting...");
            server::server::start(&service_config.settings, coordinator).await
        }
        Command::Search { query, condition, page, limit } => {
            let params = SearchParams::checked(query, condition, page, limit)
                .map_err(|e| anyhow!("invalid search arguments: {}", e))?;
            let result = coordinator.execute(&params).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}
