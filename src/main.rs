mod admin;
mod auth;
mod db;
mod error;
mod mailer;
mod meeting;
mod memory;
mod middleware;
mod notification;
mod reminder;
mod routes;
mod state;
mod task;
mod user;
mod websocket;

use anyhow::Context;
use db::{create_pool, run_migrations};
use mailer::LogMailer;
use notification::start_notification_jobs;
use routes::create_router;
use state::{AppState, Config, Stores};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,task_notify=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env()?);

    let stores = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let db = create_pool(database_url)
                .await
                .context("failed to connect to the database")?;

            tracing::info!("Running migrations...");
            run_migrations(&db).await?;

            Stores::postgres(db)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store, data will not survive a restart");
            Stores::in_memory()
        }
    };

    let mailer = Arc::new(LogMailer::new(&config.mail_from));
    let state = AppState::new(config.clone(), stores, mailer);

    // Dropping the scheduler stops the jobs.
    let _scheduler = start_notification_jobs(state.clone()).await?;

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
