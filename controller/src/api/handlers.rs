use super::response::{err, ok};
use super::ws::respond_or_stream;
use crate::api::AppState;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use lb_protocol::{BindType, EventType, ServiceEvent, ServiceSpec};
use lb_store::Store;
use std::collections::HashMap;
use std::str::FromStr;

pub async fn health() -> impl IntoResponse {
    ok("running")
}

pub async fn list_projects(
    ws: Option<WebSocketUpgrade>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    respond_or_stream(ws, move || {
        let store = state.store.clone();
        async move { store.list_tenants().await }
    })
    .await
}

pub async fn list_loadbalancers(
    ws: Option<WebSocketUpgrade>,
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> impl IntoResponse {
    respond_or_stream(ws, move || {
        let store = state.store.clone();
        let project = project.clone();
        async move {
            let rows = store.list_lb_capacities(&project).await?;
            Ok(rows.into_iter().collect::<HashMap<String, i64>>())
        }
    })
    .await
}

pub async fn loadbalancer_protocols(
    ws: Option<WebSocketUpgrade>,
    State(state): State<AppState>,
    Path((project, id)): Path<(String, String)>,
) -> impl IntoResponse {
    respond_or_stream(ws, move || {
        let store = state.store.clone();
        let (project, id) = (project.clone(), id.clone());
        async move { store.list_lb_protocols(&project, &id).await }
    })
    .await
}

pub async fn loadbalancer_detail(
    ws: Option<WebSocketUpgrade>,
    State(state): State<AppState>,
    Path((project, id, protocol)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let proto = match lb_protocol::Protocol::from_str(&protocol) {
        Ok(p) => p,
        Err(_) => return err(400, format!("unknown protocol {protocol}")).into_response(),
    };
    respond_or_stream(ws, move || {
        let store = state.store.clone();
        let (project, id) = (project.clone(), id.clone());
        async move { store.get_lb_ports(&project, &id, proto).await }
    })
    .await
    .into_response()
}

pub async fn list_backends(
    ws: Option<WebSocketUpgrade>,
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> impl IntoResponse {
    respond_or_stream(ws, move || {
        let store = state.store.clone();
        let project = project.clone();
        async move {
            let rows = store.list_backends(&project).await?;
            Ok(rows.into_iter().collect::<HashMap<String, String>>())
        }
    })
    .await
}

pub async fn backend_detail(
    ws: Option<WebSocketUpgrade>,
    State(state): State<AppState>,
    Path((project, name)): Path<(String, String)>,
) -> impl IntoResponse {
    respond_or_stream(ws, move || {
        let store = state.store.clone();
        let (project, name) = (project.clone(), name.clone());
        async move { store.get_backend_ports(&project, &name).await }
    })
    .await
}

/// Debug-only: feeds the in-process `EventSource` stand-in directly from
/// curl/tests, mirroring the original process's "http bind type is a
/// log-only placeholder" carve-out (§6). Only mounted when `debug` is set.
pub async fn submit_debug_event(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    axum::Json(body): axum::Json<DebugEventBody>,
) -> impl IntoResponse {
    let Some(tx) = &state.debug_event_tx else {
        return err(404, "debug events are disabled").into_response();
    };
    let event = ServiceEvent {
        bind_type: BindType::Service,
        event_type: body.event_type,
        tenant,
        data: body.service,
    };
    match tx.send(event).await {
        Ok(()) => ok("queued").into_response(),
        Err(_) => err(503, "event queue closed").into_response(),
    }
}

#[derive(serde::Deserialize)]
pub struct DebugEventBody {
    pub event_type: EventType,
    pub service: ServiceSpec,
}
