mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use blog_api::uploads::Uploads;
use blog_api::{AppState, AppStateInner, WebConfig};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "blog=debug,blog_api=debug,blog_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::load()?;

    // Init database
    let db = blog_db::Database::open(&config.database_url)?;
    if !config.admins.is_empty() {
        db.promote_admins(&config.admins)?;
    }

    let uploads = Uploads::new(config.upload_dir.clone(), &config.upload_url()?).await?;

    let state: AppState = Arc::new(AppStateInner { db, uploads });

    let web = WebConfig {
        public_dir: config.public_dir.clone(),
        session_hours: config.session_hours,
        secure_cookies: config.secure_cookies,
    };
    let app = blog_api::app(state, &web);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Blog listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Blog stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
