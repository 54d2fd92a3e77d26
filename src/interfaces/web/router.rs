use axum::{
    Router,
    routing::{get, post},
};

use super::AppState;
use super::handlers::{requests, webhooks};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/helpdesk", post(webhooks::helpdesk_webhook))
        .route("/webhooks/tracker", post(webhooks::tracker_webhook))
        .route("/requests", get(requests::list_requests))
        .route("/requests/{id}", get(requests::get_request))
        .route("/requests/{id}/retry", post(requests::retry_request))
        .route("/requests/{id}/events", get(requests::request_events))
        .with_state(state)
}
