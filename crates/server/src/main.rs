//! Bubbles maintenance entry point.
//!
//! Usage:
//!   bubbles migrate
//!   bubbles resolve <creator-id> '{"bucket_ids": ["..."]}'
//!   bubbles purge <bucket|tag|assignee> <id>
//!
//! Configuration is read from `config/default.toml`, `config/{BUBBLES_ENV}.toml`
//! and `BUBBLES__*` environment variables (a `.env` file is honored).

use std::sync::Arc;

use anyhow::Context;
use bubbles_common::Config;
use bubbles_common::config::LogConfig;
use bubbles_core::FilterService;
use bubbles_db::entities::filter::ResourceKind;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "bubbles")]
#[command(about = "Maintenance commands for bubble filters")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run pending database migrations
    Migrate,
    /// Find or create a filter and print its params
    Resolve {
        /// User owning the filter
        creator_id: String,
        /// Filter params as a JSON object
        params: String,
    },
    /// Remove a deleted record from every filter referencing it
    Purge {
        /// bucket, tag or assignee
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,
        /// ID of the deleted record
        id: String,
    },
}

fn parse_kind(s: &str) -> Result<ResourceKind, String> {
    s.parse()
}

fn init_tracing(log: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let registry = tracing_subscriber::registry().with(filter);

    if log.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = Config::load().context("Failed to load configuration")?;
    init_tracing(&config.log);

    let db = bubbles_db::init(&config)
        .await
        .context("Failed to connect to database")?;
    info!("Connected to database");

    info!("Running database migrations...");
    bubbles_db::migrate(&db).await?;
    info!("Migrations completed");

    let service = FilterService::from_db(Arc::new(db));

    match args.command {
        Command::Migrate => {}
        Command::Resolve { creator_id, params } => {
            let params: serde_json::Value =
                serde_json::from_str(&params).context("Params are not valid JSON")?;
            let filter = service.resolve_json(params, &creator_id).await?;
            info!(filter_id = %filter.id(), savable = filter.savable(), "Resolved filter");
            println!("{}", serde_json::to_string_pretty(&filter.to_params())?);
        }
        Command::Purge { kind, id } => {
            let changed = service.resource_removed(kind, &id).await?;
            println!("{changed} filter(s) updated");
        }
    }

    Ok(())
}
