//! Dependency container handed to the router.

use std::sync::Arc;

use ai_client::ConversationAi;
use anyhow::Result;
use racedesk_common::Config;
use tracing::debug;

use crate::traits::{Messenger, RegistrationApi};

/// Everything the conversation needs to talk to the outside world.
pub struct BotDeps {
    pub config: Config,
    pub messenger: Arc<dyn Messenger>,
    pub api: Arc<dyn RegistrationApi>,
    pub ai: Arc<dyn ConversationAi>,
}

impl BotDeps {
    /// Send a message after a best-effort AI rewrite. A failed or empty
    /// rewrite falls back to the original text, so delivery never
    /// depends on the model.
    pub async fn say(&self, to: &str, text: &str) -> Result<()> {
        let body = match self.ai.rewrite(text).await {
            Ok(rewritten) if !rewritten.trim().is_empty() => rewritten,
            Ok(_) => text.to_string(),
            Err(err) => {
                debug!(error = %err, "rewrite unavailable, sending original text");
                text.to_string()
            }
        };
        self.messenger.send_text(to, &body).await
    }

    /// Send exactly this text. Used for menus and anything else whose
    /// numbering must survive verbatim.
    pub async fn send(&self, to: &str, text: &str) -> Result<()> {
        self.messenger.send_text(to, text).await
    }
}
