//! services/app/src/bin/app.rs

use app_lib::{config::Config, error::AppError, store::AppContext};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting workspace runtime...");

    // --- 2. Build the Application Context ---
    let context = AppContext::initialize(config).await?;
    if let Some(session) = context.auth.session().await {
        let project_count = context.projects.snapshot().await.len();
        info!(user = %session.user.email, projects = project_count, "Workspace ready");
    } else {
        info!("Workspace ready (no signed-in user)");
    }

    // --- 3. Idle Until Shutdown ---
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    context.shutdown().await;

    Ok(())
}
