use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing_subscriber::EnvFilter;

use racedesk_common::Config;
use racedesk_core::{BotDeps, Messenger, RegistrationApi, Router};
use racedesk_server::routes::{self, AppState};

/// Wrapper to make WhatsAppClient implement the core Messenger trait.
struct WhatsAppMessenger {
    client: whatsapp_client::WhatsAppClient,
}

#[async_trait]
impl Messenger for WhatsAppMessenger {
    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        self.client.send_text(to, body).await?;
        Ok(())
    }
}

/// Wrapper to make RegistrationClient implement the core backend trait.
struct BackendApi {
    client: registration_client::RegistrationClient,
}

#[async_trait]
impl RegistrationApi for BackendApi {
    async fn user_by_document(
        &self,
        cpf: &str,
    ) -> Result<Option<racedesk_common::Registrant>> {
        Ok(self.client.user_by_document(cpf).await?)
    }

    async fn open_events(&self) -> Result<Vec<racedesk_common::EventSummary>> {
        Ok(self.client.open_events().await?)
    }

    async fn categories(
        &self,
        event_id: &str,
        user_id: i64,
    ) -> Result<Vec<racedesk_common::CategoryOption>> {
        Ok(self.client.categories(event_id, user_id).await?)
    }

    async fn tshirt_sizes(&self, event_id: &str) -> Result<racedesk_common::TshirtCatalog> {
        Ok(self.client.tshirt_sizes(event_id).await?)
    }

    async fn registrations(
        &self,
        user_id: i64,
        event_id: &str,
    ) -> Result<Vec<racedesk_common::RegistrationRecord>> {
        Ok(self.client.registrations(user_id, event_id).await?)
    }

    async fn update_registration(
        &self,
        update: &racedesk_common::RegistrationUpdate,
    ) -> Result<()> {
        Ok(self.client.update_registration(update).await?)
    }

    async fn update_profile(&self, update: &racedesk_common::ProfileUpdate) -> Result<()> {
        Ok(self.client.update_profile(update).await?)
    }

    async fn request_refund(&self, reference: &str, name: &str, email: &str) -> Result<()> {
        Ok(self.client.request_refund(reference, name, email).await?)
    }

    async fn transfer_ownership(&self, req: &racedesk_common::TransferRequest) -> Result<()> {
        Ok(self.client.transfer_ownership(req).await?)
    }
}

const TRANSFER_SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting racedesk-server");

    let config = Config::from_env();

    let messenger = Arc::new(WhatsAppMessenger {
        client: whatsapp_client::WhatsAppClient::new(
            &config.whatsapp_token,
            &config.whatsapp_phone_id,
        ),
    });
    let api = Arc::new(BackendApi {
        client: registration_client::RegistrationClient::new(&config.api_base_url),
    });
    let ai: Arc<dyn ai_client::ConversationAi> = match &config.openai_api_key {
        Some(key) => {
            tracing::info!(model = %config.openai_model, "AI rewriting enabled");
            Arc::new(ai_client::OpenAi::new(key, &config.openai_model))
        }
        None => {
            tracing::info!("No AI key configured, messages go out as written");
            Arc::new(ai_client::Passthrough)
        }
    };

    let verify_token = config.webhook_verify_token.clone();
    let addr = format!("{}:{}", config.web_host, config.web_port);

    let router = Arc::new(Router::new(BotDeps {
        config,
        messenger,
        api,
        ai,
    }));

    tokio::spawn(Arc::clone(&router).run_expiry_sweep(TRANSFER_SWEEP_PERIOD));

    let app = routes::build_router(AppState {
        router,
        verify_token,
    });

    tracing::info!(%addr, "Listening for webhooks");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}
