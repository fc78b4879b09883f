use building_finance::{
    config::{database, engine},
    core::{
        dashboard::generate_financial_dashboard,
        model::{FinanceRequest, Period},
        report,
    },
    errors::{Error, Result},
    stores::{JsonSnapshotStore, SeaOrmLocalStore},
};
use chrono::{Datelike, Utc};
use dotenvy::dotenv;
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_SNAPSHOT_PATH: &str = "data/external_snapshot.json";

/// The requested period from `PERIOD`, or the current calendar month.
fn requested_period() -> Result<Period> {
    match env::var("PERIOD") {
        Ok(raw) => raw.parse(),
        Err(env::VarError::NotPresent) => {
            let today = Utc::now().date_naive();
            Period::month(today.year(), today.month())
        }
        Err(e) => Err(Error::EnvVar(e)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible). Logs go to stderr, the dashboard to stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // 2. Load .env file
    dotenv().ok(); // Make it non-fatal, env vars can be set externally
    info!("Attempted to load .env file.");

    // 3. Load the engine configuration
    let config = match env::var("FINANCE_CONFIG") {
        Ok(path) => engine::load_config(path)?,
        Err(_) => engine::load_default_config()?,
    };

    // 4. Connect the local ledger
    let db = database::create_connection()
        .await
        .inspect(|_| info!("Connected to {}", database::get_database_url()))
        .inspect_err(|e| error!("Failed to connect to the ledger database: {}", e))?;
    database::create_tables(&db).await?;

    let snapshot_path =
        env::var("EXTERNAL_SNAPSHOT").unwrap_or_else(|_| DEFAULT_SNAPSHOT_PATH.to_string());
    let local = SeaOrmLocalStore::new(db);
    let external = JsonSnapshotStore::new(snapshot_path);
    info!("Reading external sync export from {}", external.path().display());

    // 5. Build the request
    let building_id = env::var("BUILDING_ID")
        .inspect_err(|e| error!("BUILDING_ID not set: {}", e))
        .map_err(Error::EnvVar)?;
    let request = FinanceRequest::new(building_id, requested_period()?)?;

    // 6. Generate and print
    let dashboard = generate_financial_dashboard(&local, &external, &request, &config).await;
    for line in report::format_summary(&dashboard.summary, &config.currency_symbol) {
        info!("{line}");
    }
    println!("{}", serde_json::to_string_pretty(&dashboard)?);

    Ok(())
}
