//! Standup Backend
//!
//! Tracks daily team status updates and delivers reminder and digest
//! emails on each team's configured weekdays, in a fixed business
//! timezone, through an asynchronous job queue with bounded retries.

mod api;
mod clock;
mod config;
mod db;
mod errors;
mod mailer;
mod models;
mod queue;
mod tasks;
mod templates;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clock::BusinessClock;
use config::Config;
use db::Repository;
use mailer::MandrillMailer;
use queue::InProcessQueue;
use tasks::TaskContext;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<TaskContext>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Standup Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Business UTC offset: {}", config.business_utc_offset);

    if config.mandrill_api_key.is_empty() {
        tracing::warn!("No Mandrill API key configured (MANDRILL_API_KEY). Outgoing email will fail!");
    }
    if config.domain.is_none() {
        tracing::warn!("No public domain configured (STANDUP_DOMAIN). Email links will be omitted.");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Repository::new(pool);

    // Wire the task context: repository, transport, queue, clock
    let mailer = Arc::new(MandrillMailer::new(
        &config.mandrill_api_url,
        &config.mandrill_api_key,
    ));
    let (job_queue, job_rx) = InProcessQueue::new();
    let ctx = Arc::new(TaskContext {
        repo,
        mailer,
        queue: Arc::new(job_queue),
        clock: BusinessClock::new(config.business_utc_offset),
        domain: config.domain.clone(),
    });

    // Start the queue worker and the scheduler tick loop
    queue::spawn_worker(ctx.clone(), job_rx);
    tasks::spawn_scheduler(ctx.clone(), config.scheduler_interval_secs);
    tracing::info!(
        "Scheduler started (tick every {}s)",
        config.scheduler_interval_secs
    );

    // Build router
    let state = AppState { ctx };
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        .route("/teams", get(api::list_teams))
        .route("/webhooks/inbound", post(api::receive_inbound));

    // Health check
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
