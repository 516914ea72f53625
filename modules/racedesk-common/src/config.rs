use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Registration backend
    pub api_base_url: String,
    pub site_base_url: String,

    // Conversation triggers
    pub trigger_phrase: String,
    pub extra_triggers: Vec<String>,
    pub end_triggers: Vec<String>,

    // AI rewriting/classification (optional collaborator)
    pub openai_api_key: Option<String>,
    pub openai_model: String,

    // WhatsApp Cloud API
    pub whatsapp_token: String,
    pub whatsapp_phone_id: String,
    pub webhook_verify_token: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            api_base_url: required_env("API_BASE_URL"),
            site_base_url: required_env("SITE_BASE_URL"),
            trigger_phrase: env::var("TRIGGER_PHRASE")
                .unwrap_or_else(|_| "Olá Bro".to_string()),
            extra_triggers: csv_env(
                "EXTRA_TRIGGERS",
                "iniciar atendimento bro,comecar atendimento",
            ),
            end_triggers: csv_env("END_TRIGGERS", "fim,encerrar,encerrar sessao"),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            whatsapp_token: required_env("WHATSAPP_TOKEN"),
            whatsapp_phone_id: required_env("WHATSAPP_PHONE_ID"),
            webhook_verify_token: required_env("WEBHOOK_VERIFY_TOKEN"),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn csv_env(key: &str, default: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
