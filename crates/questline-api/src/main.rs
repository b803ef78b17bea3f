//! Questline API server entry point.

use std::sync::Arc;

use questline_acts::application::driver::ConversationDriver;
use questline_acts::domain::machine::ActStateMachine;
use questline_acts::domain::script::QuestScript;
use questline_api::config::{AppConfig, LogFormat};
use questline_api::error::AppError;
use questline_api::state::AppState;
use questline_core::clock::SystemClock;
use questline_store::PgProgressStore;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    tracing::info!("Starting Questline API server");

    // Create database connection pool.
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    let store = PgProgressStore::new(pool);
    store.migrate().await?;

    let script = match &config.quest_script_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading quest script");
            QuestScript::from_path(path)?
        }
        None => QuestScript::embedded()?,
    };

    let driver = ConversationDriver::new(
        ActStateMachine::new(script),
        Arc::new(store),
        Arc::new(SystemClock),
    );
    let app = questline_api::app(AppState::new(driver));

    let addr = config.socket_addr()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}
