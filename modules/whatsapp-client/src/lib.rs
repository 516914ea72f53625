//! Minimal WhatsApp Cloud API client.
//!
//! Only text sending is needed here; inbound messages arrive through
//! the webhook in the server crate.

pub mod error;

pub use error::{Result, WhatsAppError};

use std::time::Duration;

use serde_json::json;
use tracing::debug;

const GRAPH_API_URL: &str = "https://graph.facebook.com/v20.0";

pub struct WhatsAppClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    phone_id: String,
}

impl WhatsAppClient {
    pub fn new(token: &str, phone_id: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: GRAPH_API_URL.to_string(),
            token: token.to_string(),
            phone_id: phone_id.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Send a plain text message to a phone number (digits only).
    pub async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        let url = format!("{}/{}/messages", self.base_url, self.phone_id);
        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": body },
        });

        debug!(%to, "WhatsApp send_text");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(WhatsAppError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}
