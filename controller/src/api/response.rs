use axum::response::{IntoResponse, Json};
use serde::Serialize;

/// `{"code": <int>, "data": <value>, "message": <string>}`, matching the
/// original process's response helper.
#[derive(Serialize)]
pub struct Envelope<T: Serialize> {
    pub code: u16,
    pub data: T,
    pub message: String,
}

pub fn ok<T: Serialize>(data: T) -> impl IntoResponse {
    Json(Envelope {
        code: 200,
        data,
        message: String::new(),
    })
}

pub fn err(code: u16, message: impl Into<String>) -> impl IntoResponse {
    Json(Envelope {
        code,
        data: serde_json::Value::Null,
        message: message.into(),
    })
}
