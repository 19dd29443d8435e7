use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use clinic_core::config::{load_seed_items, table_names_from_env_values};
use clinic_core::{AllowLists, CoreConfig, Stores, TracingEventSink};

/// Main entry point for the clinic backend
///
/// Resolves configuration once, builds the store handles and serves the REST API.
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `USERS_TABLE_NAME`, `APPOINTMENTS_TABLE_NAME`, `HEALTH_INDEX_TABLE_NAME`: table names
///   (defaults: "users", "appointments", "health-index")
/// - `CLINIC_API_KEY`: gateway key required in `x-api-key` (optional)
/// - `CLINIC_SEED_USERS`: JSON file of user items loaded at startup (optional)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - configuration is invalid or the seed file cannot be loaded,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic=info".parse()?)
                .add_directive("clinic_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CLINIC_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let tables = table_names_from_env_values(
        std::env::var("USERS_TABLE_NAME").ok(),
        std::env::var("APPOINTMENTS_TABLE_NAME").ok(),
        std::env::var("HEALTH_INDEX_TABLE_NAME").ok(),
    );
    let cfg = Arc::new(CoreConfig::new(
        tables,
        AllowLists::standard(),
        std::env::var("CLINIC_API_KEY").ok(),
    )?);

    let stores = Stores::in_memory(cfg.tables(), Arc::new(TracingEventSink));
    if let Ok(seed) = std::env::var("CLINIC_SEED_USERS") {
        let items = load_seed_items(Path::new(&seed))?;
        let count = items.len();
        for item in items {
            stores.users.put(item)?;
        }
        tracing::info!("-- Seeded {} users from {}", count, seed);
    }

    if cfg.api_key().is_none() {
        tracing::warn!("CLINIC_API_KEY not set; API routes accept requests without a key");
    }
    tracing::info!("++ Starting clinic REST on {}", rest_addr);

    let app = api_rest::router(AppState::new(cfg, stores));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
