use anyhow::Result;
use async_trait::async_trait;

/// Optional language-model collaborator for the conversation.
///
/// Implementations must be interchangeable: a failure is just an `Err`,
/// and every call site has a deterministic fallback (original text,
/// keyword matching). The bot works with `Passthrough` alone.
#[async_trait]
pub trait ConversationAi: Send + Sync {
    /// Rewrite an outbound message to sound natural in chat.
    async fn rewrite(&self, text: &str) -> Result<String>;

    /// Classify free text into one of the allowed keys.
    /// `Ok(None)` means the model matched none of them.
    async fn classify(&self, text: &str, allowed: &[&str]) -> Result<Option<String>>;

    /// Pick the best-matching index from a list of labels.
    async fn select_index(&self, query: &str, labels: &[String]) -> Result<Option<usize>>;
}
