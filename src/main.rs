use comicforge::config::Config;
use comicforge::routes;
use comicforge::services::llm::LLMClient;
use comicforge::services::renderer::{Captioner, PollinationsClient};
use comicforge::state::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::from_env()?;
    tokio::fs::create_dir_all(&config.data_dir).await?;

    // Create the hosted model clients
    let llm_client = Arc::new(LLMClient::new(&config)?);
    let image_client = Arc::new(PollinationsClient::new(&config)?);
    let captioner = Captioner::from_config(&config)?;

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!(data_dir = %config.data_dir.display(), model = %config.text_model, "Starting comic studio");

    // Create the application state
    let app_state = AppState::new(config, llm_client, image_client, captioner);
    let app = routes::router(app_state);

    // Run our application
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
