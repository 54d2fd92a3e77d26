use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};

use crate::core::pipeline::StepType;
use crate::interfaces::web::AppState;

pub async fn list_requests(State(state): State<AppState>) -> Json<Value> {
    let requests = state.hub.list().await;
    Json(json!({ "requests": requests }))
}

pub async fn get_request(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.hub.get(&id).await {
        Some(request) => Json(json!(request)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "error", "error": "request not found" })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct RetryBody {
    pub step: Option<String>,
}

/// Re-run a request: with a `step` in the body, from that step on; with
/// no body, from scratch.
pub async fn retry_request(
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: Option<Json<RetryBody>>,
) -> Json<Value> {
    let step_name = body.and_then(|Json(b)| b.step);
    let step = match step_name {
        Some(name) => match StepType::from_name(&name) {
            Some(step) => Some(step),
            None => {
                return Json(json!({
                    "status": "error",
                    "error": format!("unknown step {:?}", name)
                }));
            }
        },
        None => None,
    };

    match state.manager.retry(&id, step).await {
        Ok(()) => Json(json!({ "status": "ok" })),
        Err(err) => Json(json!({ "status": "error", "error": err.to_string() })),
    }
}

/// Live snapshots of one request as server-sent events.
pub async fn request_events(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.hub.subscribe(&id).await;
    let stream = ReceiverStream::new(receiver).map(|snapshot| {
        let data = serde_json::to_string(&snapshot).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().data(data))
    });
    Sse::new(stream)
}
