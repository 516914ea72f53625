//! Seams between the conversation core and the outside world.

use anyhow::Result;
use async_trait::async_trait;

use racedesk_common::{
    CategoryOption, EventSummary, ProfileUpdate, Registrant, RegistrationRecord,
    RegistrationUpdate, TransferRequest, TshirtCatalog,
};

/// Outbound message transport. Destinations are digits-only phone numbers.
///
/// Implemented by the WhatsApp client in the server crate and by an
/// in-memory recorder in tests.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> Result<()>;
}

/// The registration backend operations the conversation depends on.
///
/// Every call may fail; flow modules catch at their boundary and turn
/// failures into conversational fallbacks, never raw errors in chat.
#[async_trait]
pub trait RegistrationApi: Send + Sync {
    /// Look up a registrant by CPF (11 digits). `None` when unregistered.
    async fn user_by_document(&self, cpf: &str) -> Result<Option<Registrant>>;

    /// Events currently open for support.
    async fn open_events(&self) -> Result<Vec<EventSummary>>;

    /// Category options for a user within an event.
    async fn categories(&self, event_id: &str, user_id: i64) -> Result<Vec<CategoryOption>>;

    /// T-shirt size tables (child/adult) with stock counts.
    async fn tshirt_sizes(&self, event_id: &str) -> Result<TshirtCatalog>;

    /// Registrations of a user in an event.
    async fn registrations(&self, user_id: i64, event_id: &str)
        -> Result<Vec<RegistrationRecord>>;

    /// Apply a registration mutation (category, size or team).
    async fn update_registration(&self, update: &RegistrationUpdate) -> Result<()>;

    /// Update profile fields (email, birthdate).
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<()>;

    /// Request a refund (cancellation) for a registration reference.
    async fn request_refund(&self, reference: &str, name: &str, email: &str) -> Result<()>;

    /// Move registrations in an event between two users.
    async fn transfer_ownership(&self, req: &TransferRequest) -> Result<()>;
}
