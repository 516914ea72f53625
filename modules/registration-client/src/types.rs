//! Wire DTOs for the registration backend.
//!
//! The backend is a legacy PHP API: Portuguese field names, ids that
//! arrive as either strings or numbers, and optional fields that come
//! and go per endpoint. Everything is mapped into the clean domain
//! types from `racedesk-common` before leaving this crate.

use serde::Deserialize;
use serde_json::Value;

use racedesk_common::{
    CategoryOption, EventSummary, Registrant, RegistrationRecord, TshirtCatalog, TshirtSize,
};

/// Accepts string or number ids.
pub(crate) fn value_to_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserDataEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<UserData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserData {
    #[serde(default, alias = "userID", alias = "userId", alias = "userid")]
    pub id: Value,
    #[serde(default, alias = "nome")]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "birthdate")]
    pub birth_date: String,
    #[serde(default, alias = "telefone", alias = "celular")]
    pub phone: String,
}

impl UserData {
    pub fn into_registrant(self, cpf: &str) -> Option<Registrant> {
        let id = value_to_i64(&self.id)?;
        let phone: String = self.phone.chars().filter(|c| c.is_ascii_digit()).collect();
        Some(Registrant {
            id,
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            birth_date: self.birth_date.trim().to_string(),
            cpf: cpf.to_string(),
            phone,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventListEnvelope {
    #[serde(default, alias = "evento")]
    pub events: Vec<EventRow>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventRow {
    #[serde(default)]
    pub id: Value,
    #[serde(default, alias = "titulo")]
    pub title: String,
    #[serde(default, alias = "categoria")]
    pub category: Option<String>,
    #[serde(default, alias = "url_amigavel", alias = "url")]
    pub slug: String,
}

impl EventRow {
    pub fn into_summary(self) -> EventSummary {
        EventSummary {
            id: value_to_string(&self.id),
            title: self.title.trim().to_string(),
            category: self.category.filter(|c| !c.trim().is_empty()),
            slug: self.slug.trim().trim_start_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CategoryListEnvelope {
    #[serde(default, alias = "categoria_evento")]
    pub categories: Vec<CategoryRow>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CategoryRow {
    #[serde(default)]
    pub id: Value,
    #[serde(default, alias = "titulo")]
    pub title: String,
    #[serde(default, alias = "descricao")]
    pub description: Option<String>,
    #[serde(default, alias = "valor_formatado")]
    pub price: Option<String>,
    #[serde(default, alias = "taxa_formatado")]
    pub fee: Option<String>,
}

impl CategoryRow {
    pub fn into_option(self) -> CategoryOption {
        CategoryOption {
            registration_id: value_to_string(&self.id),
            title: self.title.trim().to_string(),
            description: self.description.filter(|d| !d.trim().is_empty()),
            price: self.price.filter(|p| !p.trim().is_empty()),
            fee: self.fee.filter(|f| !f.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TshirtEnvelope {
    #[serde(default, alias = "camisetas")]
    pub shirts: TshirtTables,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TshirtTables {
    #[serde(default, alias = "infantil")]
    pub child: Vec<TshirtRow>,
    #[serde(default, alias = "adulto")]
    pub adult: Vec<TshirtRow>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TshirtRow {
    #[serde(default, alias = "tamanho")]
    pub size: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, alias = "disponiveis")]
    pub available: Value,
}

impl TshirtRow {
    fn into_size(self) -> TshirtSize {
        let code = self.size.trim().to_string();
        let label = self
            .label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| code.clone());
        TshirtSize {
            available: value_to_i64(&self.available).unwrap_or(0),
            code,
            label,
        }
    }
}

impl TshirtTables {
    pub fn into_catalog(self) -> TshirtCatalog {
        TshirtCatalog {
            child: self.child.into_iter().map(TshirtRow::into_size).collect(),
            adult: self.adult.into_iter().map(TshirtRow::into_size).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegistrationListEnvelope {
    #[serde(default)]
    pub data: Vec<RegistrationRow>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegistrationRow {
    #[serde(default, alias = "cod_pagseguro")]
    pub reference: String,
    #[serde(default, alias = "status_pagseguro")]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "data")]
    pub date: String,
    #[serde(default, alias = "hora")]
    pub time: String,
    #[serde(default)]
    pub event: Option<RegistrationEventRow>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegistrationEventRow {
    #[serde(default, alias = "titulo")]
    pub title: String,
}

impl RegistrationRow {
    pub fn into_record(self) -> RegistrationRecord {
        let status = self
            .payment_status
            .or(self.status)
            .unwrap_or_default()
            .trim()
            .to_string();
        RegistrationRecord {
            reference: self.reference.trim().to_string(),
            status,
            purchase_date: self.date.trim().to_string(),
            purchase_time: self.time.trim().to_string(),
            event_title: self.event.map(|e| e.title.trim().to_string()),
        }
    }
}
