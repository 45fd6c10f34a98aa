//! Router assembly and server startup.

use std::sync::Arc;

use axum::middleware;
use axum::{
    extract::State,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::service::ChoreService;
use crate::store;

use super::auth;
use super::board;
use super::supervisor;
use super::types::HealthResponse;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub service: ChoreService,
}

/// Build the full router: kiosk routes open, supervisor routes gated.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(auth::login))
        .route("/api/board", get(board::get_board))
        .route("/api/tasks/:id/claim", post(board::claim_task))
        .route("/api/tasks/:id/unclaim", post(board::unclaim_task))
        .route("/api/tasks/:id/complete", post(board::complete_task))
        .route("/api/rewards/:id/request", post(board::request_reward))
        .route("/api/job-requests", post(board::request_new_job));

    let protected_routes = Router::new()
        .route("/api/dashboard", get(supervisor::get_dashboard))
        .route("/api/scheduler/run", post(supervisor::run_scheduler))
        // Completion approvals
        .route("/api/logs/:id/approve", post(supervisor::approve_log))
        .route("/api/logs/:id/reject", post(supervisor::reject_log))
        .route("/api/logs/:id/unapprove", post(supervisor::unapprove_log))
        // Reward approvals and manual adjustments
        .route(
            "/api/reward-requests/:id/approve",
            post(supervisor::approve_reward_request),
        )
        .route(
            "/api/reward-requests/:id/reject",
            post(supervisor::reject_reward_request),
        )
        .route(
            "/api/participants/:id/adjust",
            post(supervisor::adjust_points),
        )
        // Board management
        .route(
            "/api/tasks/:id/unclaim-override",
            post(supervisor::unclaim_override),
        )
        .route("/api/tasks/:id/remove", post(supervisor::remove_task))
        .route(
            "/api/tasks/:id/blocks/:participant_id",
            post(supervisor::block_participant).delete(supervisor::unblock_participant),
        )
        .route(
            "/api/job-requests/:id/handled",
            post(supervisor::mark_job_request_handled),
        )
        .route(
            "/api/settings",
            get(supervisor::get_settings).put(supervisor::update_settings),
        )
        // Catalog
        .route("/api/participants", post(supervisor::create_participant))
        .route(
            "/api/participants/:id/deactivate",
            post(supervisor::deactivate_participant),
        )
        .route("/api/tasks", post(supervisor::create_task))
        .route("/api/tasks/:id", patch(supervisor::update_task))
        .route("/api/templates", post(supervisor::create_template))
        .route("/api/templates/:id", patch(supervisor::update_template))
        .route(
            "/api/templates/:id/active",
            post(supervisor::set_template_active),
        )
        .route("/api/rewards", post(supervisor::create_reward))
        .route("/api/rewards/:id/active", post(supervisor::set_reward_active))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = store::create_store(config.store_type, config.data_dir.clone()).await?;
    tracing::info!(
        persistent = store.is_persistent(),
        "Chore store ready ({:?})",
        config.store_type
    );

    if config.dev_mode {
        tracing::warn!("DEV_MODE is on: supervisor routes are open");
    }

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState {
        config,
        service: ChoreService::new(Arc::from(store)),
    });
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for SIGTERM/SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dev_mode: state.config.dev_mode,
        auth_required: state.config.auth.auth_required(state.config.dev_mode),
        persistent_store: state.service.store().is_persistent(),
    })
}
