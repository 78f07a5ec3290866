pub mod error;
pub mod payload;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with the callback routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState, max_concurrent_requests: usize) -> Router {
    Router::new()
        .route("/actions", post(routes::actions::handle_action))
        .route("/slack/actions", post(routes::actions::handle_action))
        .route("/health", get(routes::health::health))
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrent_requests.max(1)))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Start the webhook receiver on `0.0.0.0:{port}`.
pub async fn serve(
    app_state: AppState,
    port: u16,
    max_concurrent_requests: usize,
) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(app_state, listener, max_concurrent_requests).await
}

/// Start the webhook receiver on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(
    app_state: AppState,
    listener: tokio::net::TcpListener,
    max_concurrent_requests: usize,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(app_state, max_concurrent_requests);

    tracing::info!("webhook receiver listening on http://0.0.0.0:{actual_port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down"),
        Err(e) => {
            tracing::warn!("no ctrl-c handler, running until killed: {e}");
            std::future::pending::<()>().await;
        }
    }
}
