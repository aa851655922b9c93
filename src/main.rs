mod config;
mod dto;
mod error;
mod handlers;
mod middleware;
mod models;
mod repositories;
mod services;
mod utils;

use axum::{
    http::{header, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use sqlx::mysql::MySqlPoolOptions;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AppState, Config};
use crate::handlers::app::{
    create_application_handler, delete_application_handler, get_application_handler,
    list_applications_handler, update_application_handler,
};
use crate::handlers::auth::{
    login_handler, logout_handler, manager_login_handler, register_handler,
    reset_password_handler,
};
use crate::handlers::oauth::{
    authorize_handler, introspect_handler, refresh_token_handler, revoke_handler, token_handler,
};
use crate::middleware::{admin_session, user_session};

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check - verifies database connection
async fn ready_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<HealthResponse>, axum::http::StatusCode> {
    sqlx::query("SELECT 1")
        .execute(&state.pool)
        .await
        .map_err(|_| axum::http::StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(HealthResponse {
        status: "ready",
        version: env!("CARGO_PKG_VERSION"),
    }))
}

/// Create the application router with all routes configured.
///
/// ## Routes
/// - POST /oauth2/register
/// - POST /oauth2/login
/// - POST /oauth2/manager-login
/// - GET  /oauth2/logout
/// - POST /oauth2/password
/// - GET  /oauth2/applications
/// - POST /oauth2/applications/register
/// - GET/PUT/DELETE /oauth2/applications/:client_id
/// - GET  /oauth2/authorize
/// - POST /oauth2/token
/// - POST /oauth2/revoke-token
/// - POST /oauth2/introspect
/// - POST /oauth2/refresh-token
pub fn create_router(state: AppState) -> Router {
    // End-user session resolution: soft, never rejects on its own.
    let user_session_layer = axum_middleware::from_fn_with_state(state.clone(), user_session);
    // Admin/manager session resolution: soft, never rejects on its own.
    let admin_session_layer = axum_middleware::from_fn_with_state(state.clone(), admin_session);

    let oauth2_routes = Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/manager-login", post(manager_login_handler))
        .route("/logout", get(logout_handler).layer(user_session_layer.clone()))
        .route("/password", post(reset_password_handler).layer(admin_session_layer.clone()))
        .route(
            "/applications",
            get(list_applications_handler).layer(admin_session_layer.clone()),
        )
        .route(
            "/applications/register",
            post(create_application_handler).layer(admin_session_layer.clone()),
        )
        .route(
            "/applications/:client_id",
            get(get_application_handler)
                .put(update_application_handler)
                .delete(delete_application_handler)
                .layer(admin_session_layer.clone()),
        )
        .route("/authorize", get(authorize_handler).layer(user_session_layer))
        .route("/token", post(token_handler))
        .route("/revoke-token", post(revoke_handler))
        .route("/introspect", post(introspect_handler))
        .route("/refresh-token", post(refresh_token_handler));

    Router::new()
        .route("/healthz", get(health_handler))
        .route("/readyz", get(ready_handler))
        .nest("/oauth2", oauth2_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .max_age(Duration::from_secs(3600)),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oauthhub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let addr = config.socket_addr();
    let state = AppState::new(pool, config);
    let app = create_router(state);

    tracing::info!("oauthhub v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
