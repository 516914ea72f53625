//! Domain types shared between the core and the backend client.
//!
//! These are the parsed shapes the conversation works with; the raw
//! backend JSON (Portuguese field names, stringly-typed ids) is mapped
//! into these by `registration-client`.

use serde::{Deserialize, Serialize};

/// An authenticated registrant, resolved by CPF lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registrant {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// ISO date (yyyy-mm-dd); may be empty when the profile lacks it.
    pub birth_date: String,
    /// Digits only, 11 characters.
    pub cpf: String,
    /// Digits only, as stored on the profile (may be empty).
    pub phone: String,
}

/// An open event as listed by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: String,
    pub title: String,
    pub category: Option<String>,
    pub slug: String,
}

impl EventSummary {
    /// Label used for menus and fuzzy matching: title plus category, if any.
    pub fn label(&self) -> String {
        match &self.category {
            Some(cat) if !cat.is_empty() => format!("{} {}", self.title, cat),
            _ => self.title.clone(),
        }
    }
}

/// A category option for a (event, user) pair. The id is the registration
/// record the change applies to, not the category itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryOption {
    pub registration_id: String,
    pub title: String,
    pub description: Option<String>,
    /// Pre-formatted price, e.g. "120,00".
    pub price: Option<String>,
    /// Pre-formatted service fee.
    pub fee: Option<String>,
}

/// One t-shirt size row with remaining stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TshirtSize {
    /// Canonical size code sent back on update (e.g. "P", "GG", "2_AZUL").
    pub code: String,
    pub label: String,
    pub available: i64,
}

/// Child and adult size tables for an event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TshirtCatalog {
    pub child: Vec<TshirtSize>,
    pub adult: Vec<TshirtSize>,
}

/// One registration of a user in an event, as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRecord {
    /// Payment reference code; identifies the registration for refunds.
    pub reference: String,
    pub status: String,
    /// Purchase date in dd/mm/yyyy.
    pub purchase_date: String,
    /// Purchase time in HH:MM (may be empty).
    pub purchase_time: String,
    pub event_title: Option<String>,
}

/// Mutation payload for a registration; only the set fields change.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationUpdate {
    pub user_id: i64,
    pub event_id: String,
    /// Target registration for a category change.
    pub registration_id: Option<String>,
    pub tshirt_size: Option<String>,
    pub team: Option<String>,
}

/// Profile fields updated during password recovery.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdate {
    pub user_id: i64,
    pub email: Option<String>,
    /// ISO date.
    pub birth_date: Option<String>,
}

/// Ownership transfer of all registrations in an event between two users.
#[derive(Debug, Clone, Serialize)]
pub struct TransferRequest {
    pub event_id: String,
    pub old_user_id: i64,
    pub new_user_id: i64,
}
