use anyhow::Result;
use async_trait::async_trait;

use crate::traits::ConversationAi;

/// No-op implementation: returns text unchanged and never classifies.
///
/// Used when no API key is configured, and in tests.
#[derive(Debug, Clone, Default)]
pub struct Passthrough;

#[async_trait]
impl ConversationAi for Passthrough {
    async fn rewrite(&self, text: &str) -> Result<String> {
        Ok(text.to_string())
    }

    async fn classify(&self, _text: &str, _allowed: &[&str]) -> Result<Option<String>> {
        Ok(None)
    }

    async fn select_index(&self, _query: &str, _labels: &[String]) -> Result<Option<usize>> {
        Ok(None)
    }
}
