//! The issue menu and conversation wrap-up.

use anyhow::Result;
use tracing::debug;

use crate::router::Router;
use crate::session::{Issue, Session, Step};
use crate::text::{is_no, is_polite_end, normalize, wants_more_help};

const ISSUE_MENU: &str = "Como posso te ajudar? Escolha uma opção:\n\
1. Esqueci minha senha\n\
2. Trocar categoria da inscrição\n\
3. Trocar tamanho da camiseta\n\
4. Alterar nome da equipe\n\
5. Cancelar inscrição\n\
6. Transferir inscrição para outra pessoa\n\
7. Outras dúvidas (FAQ)";

/// Classification keys shared with the AI prompt.
const ISSUE_KEYS: &[(&str, Issue)] = &[
    ("password", Issue::Password),
    ("category", Issue::Category),
    ("tshirt_size", Issue::TshirtSize),
    ("team_name", Issue::TeamName),
    ("cancel", Issue::Cancel),
    ("transfer", Issue::Transfer),
    ("faq", Issue::Faq),
    ("choose_event", Issue::ChooseEvent),
];

fn issue_for_key(key: &str) -> Option<Issue> {
    ISSUE_KEYS.iter().find(|(k, _)| *k == key).map(|(_, i)| *i)
}

/// Deterministic mapping: menu numbers first, then keyword heuristics.
fn direct_issue(norm: &str) -> Option<Issue> {
    match norm {
        "1" => return Some(Issue::Password),
        "2" => return Some(Issue::Category),
        "3" => return Some(Issue::TshirtSize),
        "4" => return Some(Issue::TeamName),
        "5" => return Some(Issue::Cancel),
        "6" => return Some(Issue::Transfer),
        "7" => return Some(Issue::Faq),
        _ => {}
    }
    if norm.contains("senha") {
        Some(Issue::Password)
    } else if norm.contains("categoria") {
        Some(Issue::Category)
    } else if norm.contains("camiseta") || norm.contains("tamanho") {
        Some(Issue::TshirtSize)
    } else if norm.contains("equipe") {
        Some(Issue::TeamName)
    } else if norm.contains("cancel") {
        Some(Issue::Cancel)
    } else if norm.contains("transfer") || norm.contains("titular") {
        Some(Issue::Transfer)
    } else if norm.contains("evento") && (norm.contains("trocar") || norm.contains("escolher")) {
        Some(Issue::ChooseEvent)
    } else if norm.contains("duvida") || norm.contains("faq") {
        Some(Issue::Faq)
    } else {
        None
    }
}

impl Router {
    pub(crate) async fn ask_issue(&self, sess: &mut Session, to: &str) -> Result<()> {
        sess.step = Step::AwaitingIssue;
        self.deps.send(to, ISSUE_MENU).await
    }

    pub(crate) async fn handle_issue(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        let norm = normalize(text);
        let mut issue = direct_issue(&norm);

        if issue.is_none() {
            let keys: Vec<&str> = ISSUE_KEYS.iter().map(|(k, _)| *k).collect();
            match self.deps.ai.classify(text, &keys).await {
                Ok(Some(key)) => issue = issue_for_key(&key),
                Ok(None) => {}
                Err(err) => debug!(error = %err, "issue classification unavailable"),
            }
        }

        let Some(issue) = issue else {
            self.deps
                .say(to, "Não consegui identificar o assunto. 🤔 Pode escolher pelo número?")
                .await?;
            return self.ask_issue(sess, to).await;
        };

        match issue {
            Issue::Password => self.start_password(sess, to).await,
            Issue::Faq => self.start_faq(sess, to).await,
            Issue::ChooseEvent => {
                sess.clear_event_context(false);
                self.ask_event(sess, to).await
            }
            Issue::Category | Issue::TshirtSize | Issue::TeamName => {
                self.with_event(sess, to, issue, None).await
            }
            Issue::Cancel => {
                self.with_event(
                    sess,
                    to,
                    issue,
                    Some("Certo, vamos ver o cancelamento. Primeiro preciso saber de qual evento se trata."),
                )
                .await
            }
            Issue::Transfer => {
                self.with_event(
                    sess,
                    to,
                    issue,
                    Some("Certo, vamos cuidar da transferência de titularidade. Primeiro preciso saber o evento."),
                )
                .await
            }
            Issue::FaqContact => self.send_faq_organizer_link(sess, to).await,
        }
    }

    /// Route to an event-scoped flow, queueing the issue and collecting
    /// the event first when necessary.
    async fn with_event(
        &self,
        sess: &mut Session,
        to: &str,
        issue: Issue,
        preface: Option<&str>,
    ) -> Result<()> {
        if sess.event.is_none() {
            sess.clear_event_context(false);
            sess.pending.desired_issue = Some(issue);
            if let Some(msg) = preface {
                self.deps.say(to, msg).await?;
            }
            return self.ask_event(sess, to).await;
        }
        match issue {
            Issue::Category => self.ask_category_options(sess, to).await,
            Issue::TshirtSize => self.ask_tshirt_options(sess, to).await,
            Issue::TeamName => self.ask_team_name(sess, to).await,
            Issue::Cancel => self.ask_cancel_options(sess, to).await,
            Issue::Transfer => self.start_transfer(sess, to).await,
            Issue::FaqContact => self.send_faq_organizer_link(sess, to).await,
            _ => self.ask_issue(sess, to).await,
        }
    }

    /// "Anything else I can help with?"
    pub(crate) async fn handle_more_help(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        // "não preciso de mais ajuda" mentions help but declines it.
        if !is_no(text) && wants_more_help(text) {
            return self.ask_issue(sess, to).await;
        }
        if is_polite_end(text) {
            sess.end_conversation();
            return self
                .deps
                .say(to, "Por nada! Se precisar, é só chamar. Boa prova! 👋")
                .await;
        }
        sess.end_conversation();
        self.deps
            .say(to, "Qualquer coisa, estou por aqui. Até mais! 👋")
            .await
    }
}
