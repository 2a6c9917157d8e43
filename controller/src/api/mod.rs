//! HTTP status surface.
//!
//! Read-only mirror of the store, matching the original process's `api.go`
//! route tree, plus a debug-only event injector gated on `config.debug`.

pub mod handlers;
pub mod response;
pub mod ws;

use lb_protocol::ServiceEvent;
use lb_store::Store;
use std::sync::Arc;
use tokio::sync::mpsc;

use axum::routing::{get, post};
use axum::Router;
use log::info;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub debug_event_tx: Option<mpsc::Sender<ServiceEvent>>,
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/project", get(handlers::list_projects))
        .route(
            "/api/:project/loadbalancer",
            get(handlers::list_loadbalancers),
        )
        .route(
            "/api/:project/loadbalancer/:id",
            get(handlers::loadbalancer_protocols),
        )
        .route(
            "/api/:project/loadbalancer/:id/:protocol",
            get(handlers::loadbalancer_detail),
        )
        .route("/api/:project/backend", get(handlers::list_backends))
        .route(
            "/api/:project/backend/:name",
            get(handlers::backend_detail),
        );

    if state.debug_event_tx.is_some() {
        app = app.route("/debug/:tenant/events", post(handlers::submit_debug_event));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the status surface until `cancel` fires, then drains in-flight
/// requests for up to `drain_secs` before returning (§5 shutdown sequence).
pub async fn serve(
    addr: &str,
    state: AppState,
    cancel: CancellationToken,
    drain_secs: u64,
) -> anyhow::Result<()> {
    let app = router(state);
    info!("HTTP status surface listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            info!("HTTP status surface draining for up to {drain_secs}s");
            tokio::time::sleep(std::time::Duration::from_secs(drain_secs)).await;
        })
        .await?;
    Ok(())
}
