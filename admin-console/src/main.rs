use admin_console::config::get_configuration;
use admin_console::observability::init_tracing;
use admin_console::services::metrics::init_metrics;
use admin_console::startup::build_router;
use admin_console::AppState;
use dotenvy::dotenv;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing("admin-console", &configuration.log_level);
    init_metrics().map_err(|e| anyhow::anyhow!("Failed to register metrics: {}", e))?;

    let state = AppState::from_settings(&configuration)?;
    if let Some(admin) = state.session.current_admin().await {
        info!(admin = %admin.email, "Restored persisted admin session");
    }

    let app = build_router(state);

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!(
        backend = %configuration.backend.url,
        "Starting admin-console on {}", address
    );
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
