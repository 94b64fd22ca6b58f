use actix_web::{web, App, HttpServer};
use anyhow::Context;

use hub::Hub;

mod config;
mod connection;

use config::Config;
use connection::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting competition hub");

    let config = Config::from_env().context("Failed to load hub configuration")?;
    tracing::info!("Configuration loaded successfully");

    let hub = Hub::new();
    hub.set_local_files_dir(&config.local_files_dir);
    hub.set_local_url_prefix(&config.local_url_prefix);

    hub::resources::ensure_layout(&config.local_files_dir)
        .context("Failed to prepare local files directory")?;
    tracing::info!(
        "Local resources at {} served under {}",
        config.local_files_dir.display(),
        config.local_url_prefix
    );

    if let Some(dir) = &config.gamx_data_dir {
        hub::scoring::gamx::set_gamx_data_dir(dir);
        tracing::info!("GAMX coefficient tables from {}", dir.display());
    }

    if config.update_key.is_some() {
        tracing::info!("Producer authentication enabled");
    } else {
        tracing::warn!("No UPDATE_KEY configured; accepting any producer");
    }

    let state = web::Data::new(AppState {
        hub: hub.clone(),
        update_key: config.update_key.clone(),
        producer: connection::ProducerSlot::new(),
    });

    let bind_address = format!("{}:{}", config.host, config.port);
    let ws_path = config.ws_path.clone();
    tracing::info!(
        "Accepting producer connections at ws://{}{}",
        bind_address,
        ws_path
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route(&ws_path, web::get().to(connection::ws_handler))
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
