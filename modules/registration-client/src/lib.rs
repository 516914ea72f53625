//! HTTP client for the event-registration backend.
//!
//! One method per backend operation the conversation needs. The base
//! URL is a single configuration value; all endpoints hang off it.

pub mod error;
mod types;

pub use error::{RegistrationError, Result};

use std::time::Duration;

use serde_json::json;
use tracing::debug;

use racedesk_common::{
    CategoryOption, EventSummary, ProfileUpdate, Registrant, RegistrationRecord,
    RegistrationUpdate, TransferRequest, TshirtCatalog,
};

use crate::types::{
    CategoryListEnvelope, EventListEnvelope, RegistrationListEnvelope, TshirtEnvelope,
    UserDataEnvelope,
};

pub struct RegistrationClient {
    client: reqwest::Client,
    base_url: String,
}

impl RegistrationClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "registration backend GET");

        let resp = self.client.get(&url).query(query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(RegistrationError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|err| RegistrationError::Shape(err.to_string()))
    }

    async fn put_json(&self, path: &str, body: &serde_json::Value) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "registration backend PUT");

        let resp = self.client.put(&url).json(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(RegistrationError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    /// Look up a registrant by CPF. `Ok(None)` when no account exists.
    pub async fn user_by_document(&self, cpf: &str) -> Result<Option<Registrant>> {
        let envelope: UserDataEnvelope = self
            .get_json("/user_data.php", &[("document", cpf)])
            .await?;
        if !envelope.success {
            return Ok(None);
        }
        Ok(envelope.data.and_then(|u| u.into_registrant(cpf)))
    }

    /// Events currently open for support (status 2 on the backend).
    pub async fn open_events(&self) -> Result<Vec<EventSummary>> {
        let envelope: EventListEnvelope =
            self.get_json("/events_list.php", &[("status", "2")]).await?;
        Ok(envelope
            .events
            .into_iter()
            .map(|e| e.into_summary())
            .filter(|e| !e.id.is_empty())
            .collect())
    }

    /// Category options available to a user within an event.
    pub async fn categories(&self, event_id: &str, user_id: i64) -> Result<Vec<CategoryOption>> {
        let user = user_id.to_string();
        let envelope: CategoryListEnvelope = self
            .get_json(
                "/event_category_list.php",
                &[("id", event_id), ("userID", &user), ("status", "1")],
            )
            .await?;
        Ok(envelope
            .categories
            .into_iter()
            .map(|c| c.into_option())
            .collect())
    }

    /// Child and adult t-shirt tables for an event, including stock counts.
    pub async fn tshirt_sizes(&self, event_id: &str) -> Result<TshirtCatalog> {
        let envelope: TshirtEnvelope = self
            .get_json("/event_tshirt_size.php", &[("id", event_id)])
            .await?;
        Ok(envelope.shirts.into_catalog())
    }

    /// All registrations of a user in an event.
    pub async fn registrations(
        &self,
        user_id: i64,
        event_id: &str,
    ) -> Result<Vec<RegistrationRecord>> {
        let user = user_id.to_string();
        let envelope: RegistrationListEnvelope = self
            .get_json(
                "/user_events_list.php",
                &[("userID", &user), ("eventID", event_id)],
            )
            .await?;
        Ok(envelope
            .data
            .into_iter()
            .map(|r| r.into_record())
            .filter(|r| !r.reference.is_empty())
            .collect())
    }

    /// Apply a registration mutation (category, t-shirt size or team name).
    pub async fn update_registration(&self, update: &RegistrationUpdate) -> Result<()> {
        let mut body = json!({
            "userID": update.user_id,
            "eventID": update.event_id,
        });
        if let Some(id) = &update.registration_id {
            body["inscricaoID"] = json!(id);
        }
        if let Some(size) = &update.tshirt_size {
            body["tshirtSize"] = json!(size);
        }
        if let Some(team) = &update.team {
            body["equipe"] = json!(team);
        }
        self.put_json("/inscricao_put.php", &body).await
    }

    /// Update profile fields (email, birthdate) during password recovery.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<()> {
        let mut body = json!({ "userID": update.user_id });
        if let Some(email) = &update.email {
            body["email"] = json!(email);
        }
        if let Some(birth) = &update.birth_date {
            body["birthdate"] = json!(birth);
        }
        self.put_json("/user_put.php", &body).await
    }

    /// Request a refund for a registration (cancellation).
    pub async fn request_refund(&self, reference: &str, name: &str, email: &str) -> Result<()> {
        let _: serde_json::Value = self
            .get_json(
                "/refund.php",
                &[
                    ("reference_id", reference),
                    ("nome_cliente", name),
                    ("email_cliente", email),
                ],
            )
            .await?;
        Ok(())
    }

    /// Move every registration of an event from one user to another.
    pub async fn transfer_ownership(&self, req: &TransferRequest) -> Result<()> {
        let old = req.old_user_id.to_string();
        let new = req.new_user_id.to_string();
        let _: serde_json::Value = self
            .get_json(
                "/transfer_ownership.php",
                &[
                    ("eventID", req.event_id.as_str()),
                    ("oldUserID", &old),
                    ("newUserID", &new),
                ],
            )
            .await?;
        Ok(())
    }
}
