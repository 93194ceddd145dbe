mod config;
mod gate;
mod routes;
mod state;

use std::sync::Arc;

use supabase::{SupabaseClient, SupabaseConfig, SystemClock};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // A missing .env is normal outside local development.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::GateConfig::from_env().expect("invalid gate configuration");
    let supabase_config = SupabaseConfig::from_env().expect("auth service configuration required");
    let auth = SupabaseClient::new(supabase_config).expect("auth service client init failed");
    let port = config.port;

    tracing::info!(
        supabase_url = %auth.config().url,
        site_dir = %config.site_dir.display(),
        cookie_secure = config.cookie_secure,
        cooldown_secs = config.policy.cooldown.as_secs(),
        lead_secs = config.policy.lead_time.as_secs(),
        "session gate configured"
    );

    let state = state::AppState::new(config, Arc::new(auth), Arc::new(SystemClock));
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "helpconnect listening");
    axum::serve(listener, app).await.expect("server failed");
}
