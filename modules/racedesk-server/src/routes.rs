//! Webhook routes for the WhatsApp Cloud API.
//!
//! GET /webhook answers Meta's subscription challenge; POST /webhook
//! receives inbound messages. Handling is spawned so the webhook can
//! acknowledge immediately, which keeps Meta from re-delivering.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<racedesk_core::Router>,
    pub verify_token: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Meta's verification handshake: echo `hub.challenge` back when the
/// token matches.
async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge").cloned().unwrap_or_default();

    if mode == Some("subscribe") && token == Some(state.verify_token.as_str()) {
        (StatusCode::OK, challenge)
    } else {
        warn!("webhook verification rejected");
        (StatusCode::FORBIDDEN, String::new())
    }
}

// Inbound payload, pared down to the fields the bot reads.

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
struct Change {
    #[serde(default)]
    value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
struct ChangeValue {
    #[serde(default)]
    messages: Vec<InboundMessage>,
}

#[derive(Debug, Deserialize)]
struct InboundMessage {
    #[serde(default)]
    from: String,
    #[serde(rename = "type", default)]
    kind: String,
    text: Option<InboundText>,
}

#[derive(Debug, Deserialize)]
struct InboundText {
    #[serde(default)]
    body: String,
}

async fn receive_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> StatusCode {
    for entry in payload.entry {
        for change in entry.changes {
            for message in change.value.messages {
                if message.kind != "text" {
                    debug!(kind = %message.kind, "ignoring non-text message");
                    continue;
                }
                let Some(text) = message.text else { continue };
                let router = Arc::clone(&state.router);
                let from = message.from;
                tokio::spawn(async move {
                    router.handle_message(&from, &text.body).await;
                });
            }
        }
    }
    StatusCode::OK
}
