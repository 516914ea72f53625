//! OpenAI chat-completions backend for [`ConversationAi`].

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::traits::ConversationAi;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

const REWRITE_SYSTEM: &str = "Reescreva a mensagem para WhatsApp de forma simpática, \
natural e objetiva. Evite soar robótico. Não adicione saudações que não existam e \
não repita informações.";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

pub struct OpenAi {
    api_key: String,
    model: String,
    http: reqwest::Client,
    base_url: String,
}

impl OpenAi {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            http: reqwest::Client::new(),
            base_url: OPENAI_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn chat(&self, system: &str, user: String, temperature: f32) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        debug!(model = %self.model, "OpenAI chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("OpenAI API error ({}): {}", status, error_text));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| anyhow!("No response from OpenAI"))
    }
}

#[async_trait]
impl ConversationAi for OpenAi {
    async fn rewrite(&self, text: &str) -> Result<String> {
        let out = self.chat(REWRITE_SYSTEM, text.to_string(), 0.5).await?;
        if out.is_empty() {
            return Err(anyhow!("Empty rewrite"));
        }
        Ok(out)
    }

    async fn classify(&self, text: &str, allowed: &[&str]) -> Result<Option<String>> {
        let prompt = format!(
            "Classifique a solicitação do usuário em UMA destas chaves: {}.\n\
             Responda apenas com a chave, ou \"unknown\" se nenhuma servir.\n\
             Texto: \"{}\"",
            allowed.join(", "),
            text
        );
        let raw = self
            .chat("Responda APENAS com a chave exata.", prompt, 0.0)
            .await?;
        let key = raw.trim().to_lowercase().replace(' ', "_");
        Ok(allowed.iter().find(|a| **a == key).map(|a| a.to_string()))
    }

    async fn select_index(&self, query: &str, labels: &[String]) -> Result<Option<usize>> {
        let mut listing = String::new();
        for (i, label) in labels.iter().enumerate() {
            listing.push_str(&format!("{}. {}\n", i + 1, label));
        }
        let prompt = format!(
            "O usuário escreveu: \"{}\".\nQual item da lista ele quis dizer?\n{}\n\
             Responda apenas com o número do item, ou 0 se nenhum corresponder.",
            query, listing
        );
        let raw = self
            .chat("Responda APENAS com um número.", prompt, 0.0)
            .await?;
        let n: usize = raw.trim().parse().unwrap_or(0);
        if n >= 1 && n <= labels.len() {
            Ok(Some(n - 1))
        } else {
            Ok(None)
        }
    }
}
