use anyhow::Result;
use std::sync::Arc;

use tapaal::config::Config;
use tapaal::services::chat_service::ChatClient;
use tapaal::{db, routes, telemetry, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let config = Config::from_env()?;
    let pool = db::connect(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&pool).await?;
    tracing::info!(database = %config.database_url, "database ready");

    let chat = Arc::new(ChatClient::new(&config.chat)?);
    if !chat.is_configured() {
        tracing::warn!("GEMINI_API_KEY not set, /api/chat will fail");
    }

    let state = AppState {
        pool: pool.clone(),
        chat,
    };
    let app = routes::app(state, config.cors_allow_origin.as_deref());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let term = async {
        if let Ok(mut s) = signal::unix::signal(signal::unix::SignalKind::terminate()) {
            s.recv().await;
        }
    };
    #[cfg(not(unix))]
    let term = std::future::pending::<()>();
    tokio::select! { _ = ctrl_c => {}, _ = term => {} }
}
