//! Taxi Loan Service - Main Application Entry Point
//!
//! REST API for a taxi-driver micro-lending desk. Borrowers apply for
//! flat-rate loans repaid weekly; staff review applications, fund loans,
//! record repayments and import historical records.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key with SHA-256 hashing, staff or borrower role
//! - **Money**: integer cents in storage, `rust_decimal` at the edges
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Ensure the bootstrap staff key, if configured
//! 5. Build HTTP router with routes and middleware
//! 6. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod state;

use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{services::api_key_service, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG, defaults to "info"
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!(
        rate = %config.default_interest_rate_percent,
        terms = ?config.allowed_terms_weeks,
        "Configuration loaded"
    );

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    if let Some(ref key) = config.bootstrap_staff_api_key {
        api_key_service::ensure_staff_key(&pool, key, "bootstrap").await?;
    }

    let state = AppState::new(pool.clone(), config.loan_settings());

    let authenticated_routes = Router::new()
        // Profiles and keys
        .route(
            "/api/v1/profiles",
            post(handlers::profiles::create_profile).get(handlers::profiles::list_profiles),
        )
        .route("/api/v1/profiles/{id}", get(handlers::profiles::get_profile))
        .route(
            "/api/v1/profiles/{id}/api-keys",
            post(handlers::profiles::issue_api_key),
        )
        .route("/api/v1/me", get(handlers::profiles::get_me))
        // Application workflow
        .route(
            "/api/v1/applications",
            post(handlers::applications::submit_application)
                .get(handlers::applications::list_applications),
        )
        .route(
            "/api/v1/applications/{id}",
            get(handlers::applications::get_application),
        )
        .route(
            "/api/v1/applications/{id}/review",
            post(handlers::applications::review_application),
        )
        .route(
            "/api/v1/applications/{id}/cancel",
            post(handlers::applications::cancel_application),
        )
        .route(
            "/api/v1/applications/{id}/fund",
            post(handlers::applications::fund_application),
        )
        // Loans and payments
        .route("/api/v1/loans", get(handlers::loans::list_loans))
        .route("/api/v1/loans/{id}", get(handlers::loans::get_loan))
        .route(
            "/api/v1/loans/{id}/payments",
            get(handlers::loans::list_loan_payments).post(handlers::loans::record_payment),
        )
        .route(
            "/api/v1/loans/{id}/default",
            post(handlers::loans::mark_defaulted),
        )
        .route("/api/v1/payments", get(handlers::loans::list_payments))
        .route("/api/v1/payments/{id}", get(handlers::loans::get_payment))
        // Bulk import
        .route(
            "/api/v1/imports",
            post(handlers::imports::run_import).delete(handlers::imports::purge_imports),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            pool,
            middleware::auth::auth_middleware,
        ));

    let app = Router::new()
        // Public routes
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/quote", get(handlers::quote::get_quote))
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
