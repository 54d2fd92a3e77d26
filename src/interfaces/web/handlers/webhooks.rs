use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::core::pipeline::ConversationEvent;
use crate::interfaces::web::AppState;

/// New-conversation event from the helpdesk.
#[derive(Debug, Deserialize)]
pub struct HelpdeskEvent {
    pub conversation_id: String,
    pub conversation_url: String,
    #[serde(default)]
    pub message_body: String,
}

pub async fn helpdesk_webhook(
    State(state): State<AppState>,
    Json(payload): Json<HelpdeskEvent>,
) -> Json<Value> {
    info!(
        "helpdesk webhook for conversation {}",
        payload.conversation_id
    );

    let event = ConversationEvent {
        conversation_id: payload.conversation_id,
        conversation_url: payload.conversation_url,
        message_body: payload.message_body,
    };

    // The worker runs in the background; the helpdesk only needs an ack.
    match state.manager.submit(event).await {
        Ok(request_id) => Json(json!({ "status": "ok", "request_id": request_id })),
        Err(err) => Json(json!({ "status": "error", "error": err.to_string() })),
    }
}

/// Property-update event from the tracker. A `challenge` field anywhere
/// in the payload short-circuits into the subscription handshake.
#[derive(Debug, Deserialize)]
pub struct TrackerEvent {
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub entity: Option<TrackerEntity>,
    #[serde(default)]
    pub data: Option<TrackerEventData>,
    #[serde(default)]
    pub attempt_number: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TrackerEntity {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct TrackerEventData {
    #[serde(default)]
    pub updated_properties: Vec<String>,
}

pub enum TrackerReaction {
    Challenge(String),
    CheckDone { page_id: String, attempt_number: u32 },
    Ignore(&'static str),
}

/// Decide what a tracker event means before touching any upstream.
pub fn classify_tracker_event(event: &TrackerEvent, done_property_id: &str) -> TrackerReaction {
    if let Some(challenge) = &event.challenge {
        return TrackerReaction::Challenge(challenge.clone());
    }
    if event.event_type.as_deref() != Some("page.properties_updated") {
        return TrackerReaction::Ignore("not a property update");
    }
    let done_touched = event
        .data
        .as_ref()
        .is_some_and(|d| d.updated_properties.iter().any(|p| p == done_property_id));
    if !done_touched {
        return TrackerReaction::Ignore("done property untouched");
    }
    match &event.entity {
        Some(entity) => TrackerReaction::CheckDone {
            page_id: entity.id.clone(),
            attempt_number: event.attempt_number.unwrap_or(1),
        },
        None => TrackerReaction::Ignore("event has no entity id"),
    }
}

pub async fn tracker_webhook(
    State(state): State<AppState>,
    Json(payload): Json<TrackerEvent>,
) -> Json<Value> {
    match classify_tracker_event(&payload, &state.done_property_id) {
        TrackerReaction::Challenge(challenge) => Json(json!({ "challenge": challenge })),
        TrackerReaction::Ignore(reason) => Json(json!({ "status": "ok", "message": reason })),
        TrackerReaction::CheckDone {
            page_id,
            attempt_number,
        } => {
            let checked = match state.knowledge_base.is_done(&page_id).await {
                Ok(value) => value,
                Err(err) => {
                    // Redeliveries of a lost event are overwhelmingly
                    // done-transitions; first attempts are not assumed.
                    warn!(
                        "done lookup for page {} failed ({}), falling back to delivery count",
                        page_id, err
                    );
                    attempt_number > 1
                }
            };
            if !checked {
                return Json(json!({ "status": "ok", "message": "ticket not done" }));
            }

            info!("page {} marked done, dispatching notices", page_id);

            // Fire and forget so the tracker gets its ack immediately.
            let knowledge_base = state.knowledge_base.clone();
            let notifier = state.notifier.clone();
            tokio::spawn(async move {
                match knowledge_base.get_ticket(&page_id).await {
                    Ok(ticket) => notifier.notify_done(&ticket).await,
                    Err(err) => {
                        warn!("done notice skipped, page {} fetch failed: {}", page_id, err)
                    }
                }
            });

            Json(json!({ "status": "ok", "message": "notification dispatched" }))
        }
    }
}
