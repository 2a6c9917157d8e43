use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use serde::Serialize;
use std::time::Duration;

use super::response::{err, ok};

/// Re-emits whatever `fetch` resolves to once per second over `socket`,
/// matching the original process's streaming-replay response helper.
/// Stops on the first send failure (the peer closed the connection).
async fn replay_loop(mut socket: WebSocket, fetch: impl Fn() -> BoxFuture<'static, serde_json::Value>) {
    loop {
        let payload = fetch().await;
        let Ok(text) = serde_json::to_string(&payload) else {
            return;
        };
        if socket.send(Message::Text(text)).await.is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

/// Shared query surface: a single route answers a plain `GET` with one
/// JSON envelope, or upgrades to a websocket and re-emits the same payload
/// every second, depending on whether the caller asked to upgrade (§6).
pub async fn respond_or_stream<T, F, Fut>(ws: Option<WebSocketUpgrade>, fetch: F) -> Response
where
    T: Serialize + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = anyhow::Result<T>> + Send + 'static,
{
    match ws {
        Some(upgrade) => upgrade
            .on_upgrade(move |socket| {
                replay_loop(socket, move || {
                    let fut = fetch();
                    Box::pin(async move {
                        match fut.await {
                            Ok(v) => serde_json::to_value(v).unwrap_or(serde_json::Value::Null),
                            Err(e) => serde_json::json!({ "error": e.to_string() }),
                        }
                    }) as BoxFuture<'static, serde_json::Value>
                })
            })
            .into_response(),
        None => match fetch().await {
            Ok(v) => ok(v).into_response(),
            Err(e) => err(500, e.to_string()).into_response(),
        },
    }
}
