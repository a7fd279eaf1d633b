use anyhow::Context;
use db::DBService;
use server::{routes, state::AppState};
use services::services::{chat_api::ChatApiClient, config::Config, monitor::LogRouter};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;

    if let Some(parent) = std::path::Path::new(
        config.database_url.trim_start_matches("sqlite:"),
    )
    .parent()
    {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let db = DBService::new(&config.database_url)
        .await
        .context("connecting to database")?;

    let logs = LogRouter::new(config.logs_dir.clone());

    let chat = match ChatApiClient::from_config(&config.chat) {
        Ok(client) => Some(client),
        Err(e) => {
            warn!("chat api disabled: {e}");
            None
        }
    };

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(db, logs, config, chat);
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutting down");
        })
        .await?;

    Ok(())
}
