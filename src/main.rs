use anyhow::{Context, Result};
use tracing::info;

use photo_gallery::{app::build_app, config::GalleryConfig, telemetry::setup_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = GalleryConfig::from_env().context("invalid configuration")?;
    setup_tracing(config.log_format);

    let router = build_app(&config)?;
    let tcp_listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;

    info!(
        "Photo gallery server started at http://{} (public url {})",
        config.listen_addr, config.public_url
    );

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
