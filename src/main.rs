use anyhow::{Context, Result};
use tracing::info;
use translation_manager::config::Config;
use translation_manager::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translation_manager=info".parse()?),
        )
        .init();

    // Load configuration from environment
    let config = Config::from_env()?;
    info!("Starting translation manager ({})", config.environment);
    if config.openai_api_key.is_none() {
        info!("OPENAI_API_KEY not set, suggestions will fail");
    }

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let state = AppState::from_config(config).await?;
    server::serve(listener, state).await
}
