//! HTTP server for the payroll engine.

use std::env;
use std::error::Error;

use tracing::info;
use tracing_subscriber::EnvFilter;

use payroll_engine::api::{create_router, AppState};
use payroll_engine::config::ConfigLoader;

const DEFAULT_CONFIG_DIR: &str = "./config/default";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

fn init_tracing(log_level: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level)?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .try_init()
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let config_dir = env::var("PAYROLL_CONFIG_DIR").unwrap_or_else(|_| DEFAULT_CONFIG_DIR.to_string());
    let bind_addr = env::var("PAYROLL_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

    let config = ConfigLoader::load(&config_dir)?;
    init_tracing(&config.settings().log_level)?;
    info!(
        config_dir = %config_dir,
        mappings = config.field_mappings().len(),
        rules = config.rule_book().rules().len(),
        employees = config.employees().len(),
        "Configuration loaded"
    );

    let app = create_router(AppState::new(config));
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "Payroll engine listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
