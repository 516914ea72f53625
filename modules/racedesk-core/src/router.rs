//! Inbound message routing.
//!
//! Order of precedence for every message: transfer-authorization
//! interception, end triggers, the start gate, then the current step.

use std::sync::{Arc, OnceLock};

use anyhow::Result;
use chrono::Utc;
use racedesk_common::TransferRequest;
use regex::Regex;
use tracing::{info, warn};

use crate::deps::BotDeps;
use crate::phone::{phone_digits, phones_match};
use crate::session::{SessionStore, Step};
use crate::text::{is_no, normalize};
use crate::transfer::{TransferAuthorization, TransferRegistry};

/// Shape of a transfer-authorization reply: the 4-digit token, then
/// optionally an answer. Only `1`/`2` and plain yes/no words count as
/// answers; any other suffix is left to normal routing.
fn auth_reply_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| Regex::new(r"^(\d{4})(?:\s+(.+))?$").expect("valid literal regex"))
}

pub struct Router {
    pub(crate) deps: Arc<BotDeps>,
    pub(crate) sessions: SessionStore,
    pub(crate) transfers: TransferRegistry,
}

impl Router {
    pub fn new(deps: BotDeps) -> Self {
        Self {
            deps: Arc::new(deps),
            sessions: SessionStore::new(),
            transfers: TransferRegistry::new(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn transfers(&self) -> &TransferRegistry {
        &self.transfers
    }

    /// Entry point for one inbound message. Never propagates: failures
    /// are logged and answered with a generic apology so the chat is
    /// not left hanging.
    pub async fn handle_message(&self, from: &str, body: &str) {
        let phone = phone_digits(from);
        if phone.is_empty() || body.trim().is_empty() {
            return;
        }
        if let Err(err) = self.route(&phone, body.trim()).await {
            warn!(%phone, error = %err, "message handling failed");
            let _ = self
                .deps
                .say(&phone, "Opa, tive um problema por aqui. Pode tentar de novo em instantes?")
                .await;
        }
    }

    async fn route(&self, phone: &str, text: &str) -> Result<()> {
        // Authorization replies resolve against the registry before any
        // session state, so the holder can answer mid-flow.
        if self.try_resolve_authorization(phone, text).await? {
            return Ok(());
        }

        let cell = self.sessions.get_or_create(phone);
        let mut sess = cell.lock().await;
        let norm = normalize(text);

        if self.is_end_trigger(&norm) {
            if sess.started {
                sess.reset();
                self.deps
                    .say(
                        phone,
                        &format!(
                            "Atendimento encerrado. Quando precisar, é só mandar \"{}\". 👋",
                            self.deps.config.trigger_phrase
                        ),
                    )
                    .await?;
            }
            return Ok(());
        }

        if !sess.started {
            if self.is_start_trigger(&norm) {
                sess.started = true;
                self.deps
                    .say(phone, "Olá! Eu sou o assistente virtual da Bro Eventos. 😊")
                    .await?;
                if sess.user.as_ref().is_some_and(|u| !u.cpf.is_empty()) {
                    self.ask_cpf_verify(&mut sess, phone).await?;
                } else {
                    self.ask_cpf(&mut sess, phone).await?;
                }
            }
            // Anything before the trigger phrase is ignored.
            return Ok(());
        }

        match sess.step {
            Step::AwaitingCpf => self.handle_cpf(&mut sess, phone, text).await,
            Step::AwaitingCpfVerify => self.handle_cpf_verify(&mut sess, phone, text).await,
            Step::AwaitingEvent => self.handle_event_choice(&mut sess, phone, text).await,
            Step::AwaitingIssue => self.handle_issue(&mut sess, phone, text).await,
            Step::AwaitingMoreHelp => self.handle_more_help(&mut sess, phone, text).await,
            Step::AwaitingNoCategoryAction => {
                self.handle_no_category_action(&mut sess, phone, text).await
            }
            Step::AwaitingCategoryChoice => {
                self.handle_category_choice(&mut sess, phone, text).await
            }
            Step::AwaitingNoTshirtAction => {
                self.handle_no_tshirt_action(&mut sess, phone, text).await
            }
            Step::AwaitingTshirtChoice => self.handle_tshirt_choice(&mut sess, phone, text).await,
            Step::AwaitingTeamName => self.handle_team_name(&mut sess, phone, text).await,
            Step::AwaitingTeamConfirm => self.handle_team_confirm(&mut sess, phone, text).await,
            Step::AwaitingCancelRedirect => {
                self.handle_cancel_redirect(&mut sess, phone, text).await
            }
            Step::AwaitingNoCancelAction => {
                self.handle_no_cancel_action(&mut sess, phone, text).await
            }
            Step::AwaitingCancelChoice => self.handle_cancel_choice(&mut sess, phone, text).await,
            Step::AwaitingCancelConfirm => self.handle_cancel_confirm(&mut sess, phone, text).await,
            Step::AwaitingCancelRetry => self.handle_cancel_retry(&mut sess, phone, text).await,
            Step::AwaitingRefundName => self.handle_refund_name(&mut sess, phone, text).await,
            Step::AwaitingRefundEmail => self.handle_refund_email(&mut sess, phone, text).await,
            Step::AwaitingEmailConfirm => self.handle_email_confirm(&mut sess, phone, text).await,
            Step::AwaitingEmailVerification => {
                self.handle_email_verification(&mut sess, phone, text).await
            }
            Step::AwaitingBirthdateConfirm => {
                self.handle_birthdate_confirm(&mut sess, phone, text).await
            }
            Step::AwaitingBirthdateVerification => {
                self.handle_birthdate_verification(&mut sess, phone, text).await
            }
            Step::AwaitingFaqMenu => self.handle_faq_menu(&mut sess, phone, text).await,
            Step::AwaitingHolderRole => self.handle_holder_role(&mut sess, phone, text).await,
            Step::AwaitingHolderCpf => self.handle_holder_cpf(&mut sess, phone, text).await,
            Step::AwaitingHolderConfirm => self.handle_holder_confirm(&mut sess, phone, text).await,
            Step::AwaitingTransferCpf => self.handle_transfer_cpf(&mut sess, phone, text).await,
            Step::AwaitingTransferConfirm => {
                self.handle_transfer_confirm(&mut sess, phone, text).await
            }
            Step::AwaitingTransferSelfConfirm => {
                self.handle_transfer_self_confirm(&mut sess, phone, text).await
            }
            Step::AwaitingTransferRetry => {
                self.handle_transfer_retry(&mut sess, phone, text).await
            }
            Step::AwaitingTransferResult => {
                self.deps
                    .say(
                        phone,
                        "Ainda estou aguardando a resposta do titular atual. Assim que ele responder, te aviso por aqui! ⏳",
                    )
                    .await
            }
            Step::Idle => self.fallback(&mut sess, phone, text).await,
        }
    }

    fn is_start_trigger(&self, norm: &str) -> bool {
        let main = normalize(&self.deps.config.trigger_phrase);
        if !main.is_empty() && norm.contains(&main) {
            return true;
        }
        self.deps
            .config
            .extra_triggers
            .iter()
            .any(|t| {
                let t = normalize(t);
                !t.is_empty() && norm.contains(&t)
            })
    }

    fn is_end_trigger(&self, norm: &str) -> bool {
        self.deps
            .config
            .end_triggers
            .iter()
            .any(|t| normalize(t) == norm)
    }

    pub(crate) async fn fallback(
        &self,
        sess: &mut crate::session::Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        if crate::text::is_go_menu(text) {
            return self.ask_issue(sess, to).await;
        }
        // A queued issue without an event means we were interrupted on
        // the way to event selection; resume there.
        if sess.pending.desired_issue.is_some() && sess.event.is_none() {
            return self.ask_event(sess, to).await;
        }
        self.deps
            .say(to, "Não entendi. 🤔 Digite *menu* para ver as opções de atendimento.")
            .await
    }

    // ------------------------------------------------------------------
    // Transfer-authorization interception

    /// Returns `true` when the message was consumed as an authorization
    /// reply. A token reply from any phone other than the bound holder
    /// falls through to normal routing.
    async fn try_resolve_authorization(&self, phone: &str, text: &str) -> Result<bool> {
        let Some(caps) = auth_reply_shape().captures(text) else {
            return Ok(false);
        };
        let token = &caps[1];
        let suffix = caps.get(2).map(|m| m.as_str());

        let Some(auth) = self.transfers.get(token) else {
            return Ok(false);
        };
        if !phones_match(phone, &auth.authorizer_phone) {
            return Ok(false);
        }

        // "{token} o que é isso?" is a question, not an authorization.
        let answer = suffix.map(normalize);
        let denied = match answer.as_deref() {
            None => false,
            Some(s) if s == "2" || is_no(s) => true,
            Some("1" | "sim" | "ok" | "pode" | "confirmo" | "autorizo" | "sim autorizo") => false,
            Some(_) => return Ok(false),
        };

        if auth.is_expired_at(Utc::now()) {
            self.transfers.remove(token);
            info!(%token, "transfer authorization expired on reply");
            self.deps
                .say(
                    &auth.authorizer_phone,
                    "Este pedido de autorização expirou (validade de 30 minutos). Se ainda quiser transferir, peça para iniciar de novo.",
                )
                .await?;
            self.notify_requester_retry(
                &auth,
                "O pedido de autorização expirou sem resposta do titular. 😕",
            )
            .await?;
            return Ok(true);
        }

        self.transfers.remove(token);
        if denied {
            info!(%token, "transfer denied by holder");
            self.deps
                .say(&auth.authorizer_phone, "Tudo bem, a transferência NÃO será realizada. ✅")
                .await?;
            self.notify_requester_retry(
                &auth,
                "O titular atual não autorizou a transferência. 😕",
            )
            .await?;
            return Ok(true);
        }

        let req = TransferRequest {
            event_id: auth.event_id.clone(),
            old_user_id: auth.old_user_id,
            new_user_id: auth.new_user_id,
        };
        match self.deps.api.transfer_ownership(&req).await {
            Ok(()) => {
                info!(%token, event = %auth.event_id, "transfer completed");
                self.deps
                    .say(
                        &auth.authorizer_phone,
                        &format!(
                            "Autorização confirmada! A inscrição no evento {} foi transferida para {}. ✅",
                            auth.event_title, auth.new_holder_name
                        ),
                    )
                    .await?;
                self.finish_requester(
                    &auth,
                    &format!(
                        "Boa notícia! O titular autorizou e a transferência no evento {} foi concluída. 🎉\n\nPosso ajudar em mais alguma coisa?",
                        auth.event_title
                    ),
                )
                .await?;
            }
            Err(err) => {
                warn!(%token, error = %err, "transfer request failed");
                self.deps
                    .say(
                        &auth.authorizer_phone,
                        "Recebi sua autorização, mas houve um problema ao concluir a transferência. Nossa equipe vai verificar.",
                    )
                    .await?;
                // No structured retry here: the requester starts over.
                self.finish_requester(
                    &auth,
                    "O titular autorizou, mas houve um problema ao concluir a transferência. 😕 Se quiser, podemos começar de novo pelo menu.",
                )
                .await?;
            }
        }
        Ok(true)
    }

    /// Close out the requester's wait state with a final message.
    async fn finish_requester(&self, auth: &TransferAuthorization, message: &str) -> Result<()> {
        self.deps.say(&auth.requester_phone, message).await?;
        if let Some(cell) = self.sessions.get(&auth.requester_phone) {
            let mut sess = cell.lock().await;
            if sess.step == Step::AwaitingTransferResult {
                sess.step = Step::AwaitingMoreHelp;
                sess.pending.transfer = None;
            }
        }
        Ok(())
    }

    /// Tell the requester the handshake did not complete and offer the
    /// retry menu.
    async fn notify_requester_retry(
        &self,
        auth: &TransferAuthorization,
        message: &str,
    ) -> Result<()> {
        self.deps.say(&auth.requester_phone, message).await?;
        if let Some(cell) = self.sessions.get(&auth.requester_phone) {
            let mut sess = cell.lock().await;
            if sess.step == Step::AwaitingTransferResult {
                sess.step = Step::AwaitingTransferRetry;
                self.send_transfer_retry_menu(&auth.requester_phone).await?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expiry sweep

    /// Periodic cleanup of authorizations nobody answered. Both parties
    /// are notified when one is dropped.
    pub async fn run_expiry_sweep(self: Arc<Self>, period: std::time::Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            for auth in self.transfers.sweep_expired(Utc::now()) {
                info!(token = %auth.token, "transfer authorization expired");
                let _ = self
                    .deps
                    .say(
                        &auth.authorizer_phone,
                        "O pedido de autorização de transferência expirou (validade de 30 minutos).",
                    )
                    .await;
                if let Err(err) = self
                    .notify_requester_retry(
                        &auth,
                        "O pedido de autorização expirou sem resposta do titular. 😕",
                    )
                    .await
                {
                    warn!(error = %err, "failed to notify requester about expiry");
                }
            }
        }
    }
}
