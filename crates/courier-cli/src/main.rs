use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use courier_core::{
    load_merchants, render_query_result, AppConfig, MerchantLocation, QueryEngine, QueryRequest,
    QueryResult, SnapshotStore, SystemClock,
};
use tracing_subscriber::EnvFilter;

const DEFAULT_MERCHANTS_PATH: &str = "./config/merchants.yaml";

#[derive(Debug, Parser)]
#[command(name = "courier-cli")]
#[command(about = "Courier merchant discovery command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Find merchants that can deliver to a coordinate
    Query {
        #[arg(long, allow_negative_numbers = true)]
        latitude: f64,
        #[arg(long, allow_negative_numbers = true)]
        longitude: f64,
        /// Search radius in meters; defaults to the largest delivery radius
        #[arg(long)]
        radius: Option<f64>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        offset: i64,
        /// List ineligible merchants with the reason
        #[arg(long)]
        include_ineligible: bool,
        /// Treat merchants that are not accepting orders as eligible
        #[arg(long)]
        any_status: bool,
        /// Query a YAML fixture instead of the database
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print the resolved configuration (secrets redacted)
    Config,
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Apply pending migrations
    Migrate,
    /// Upsert merchants from a YAML fixture
    Seed {
        #[arg(long, default_value = DEFAULT_MERCHANTS_PATH)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let config = courier_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Db { command }) => run_db(&config, command).await?,
        Some(Commands::Query {
            latitude,
            longitude,
            radius,
            limit,
            offset,
            include_ineligible,
            any_status,
            file,
        }) => {
            let limit = limit
                .unwrap_or(i64::try_from(config.default_page_size).unwrap_or(i64::MAX))
                .min(i64::try_from(config.max_page_size).unwrap_or(i64::MAX));
            let request = QueryRequest::new(
                latitude,
                longitude,
                radius,
                limit,
                offset,
                config.max_search_radius_meters,
            )?
            .require_accepting_orders(!any_status)
            .include_ineligible(include_ineligible);

            let merchants = match file {
                Some(path) => merchants_from_file(&path)?,
                None => merchants_from_db(&config).await?,
            };
            let result = run_query(&config, merchants, &request)?;
            println!("{}", serde_json::to_string_pretty(&render_result(result))?);
        }
        Some(Commands::Config) => println!("{config:#?}"),
        None => println!("courier-cli: try --help"),
    }

    Ok(())
}

async fn connect(config: &AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = courier_db::PoolConfig::from_app_config(config);
    Ok(courier_db::connect_pool(config.require_database_url()?, pool_config).await?)
}

async fn run_db(config: &AppConfig, command: DbCommands) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    match command {
        DbCommands::Migrate => {
            let applied = courier_db::run_migrations(&pool).await?;
            tracing::info!(applied, "migrations complete");
        }
        DbCommands::Seed { file } => {
            let merchants = merchants_from_file(&file)?;
            let count = courier_db::seed_merchants(&pool, &merchants).await?;
            tracing::info!(count, file = %file.display(), "merchants seeded");
        }
    }
    Ok(())
}

fn merchants_from_file(path: &Path) -> anyhow::Result<Vec<MerchantLocation>> {
    Ok(load_merchants(path)?.merchants)
}

async fn merchants_from_db(config: &AppConfig) -> anyhow::Result<Vec<MerchantLocation>> {
    let pool = connect(config).await?;
    let rows = courier_db::list_merchant_locations(&pool).await?;
    let mut merchants = Vec::with_capacity(rows.len());
    for row in rows {
        match row.into_merchant() {
            Ok(merchant) => merchants.push(merchant),
            Err(e) => tracing::warn!(error = %e, "skipping unreadable merchant row"),
        }
    }
    Ok(merchants)
}

fn run_query(
    config: &AppConfig,
    merchants: Vec<MerchantLocation>,
    request: &QueryRequest,
) -> anyhow::Result<QueryResult> {
    let store = SnapshotStore::new();
    let (snapshot, rejected) = store.rebuild(config.grid_cell_size_degrees, merchants)?;
    for merchant in &rejected {
        tracing::warn!(merchant_id = %merchant.id, reason = %merchant.reason, "merchant left out of snapshot");
    }

    let engine = QueryEngine::new(Arc::new(config.query_settings()), Arc::new(SystemClock));
    Ok(engine.execute(&snapshot, request, None)?)
}

/// Same envelope as `GET /merchants-by-location`.
fn render_result(result: QueryResult) -> serde_json::Value {
    let (data, meta) = render_query_result(result, uuid::Uuid::new_v4().to_string());
    serde_json::json!({
        "success": true,
        "data": data,
        "meta": meta,
    })
}
