//! Ownership transfer: identify both parties, then run the token
//! handshake with the current holder.

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::phone::{phone_digits, phones_match};
use crate::router::Router;
use crate::session::{Holder, Issue, Session, Step, TransferDraft};
use crate::text::{extract_cpf, format_cpf, is_go_menu, is_no, is_yes, normalize, wants_human};
use crate::transfer::{TransferAuthorization, TransferRegistry};

impl Router {
    pub(crate) async fn start_transfer(&self, sess: &mut Session, to: &str) -> Result<()> {
        if sess.user.is_none() {
            sess.pending.desired_issue = Some(Issue::Transfer);
            self.deps
                .say(to, "Para a transferência, primeiro preciso te identificar. 🙂")
                .await?;
            return self.ask_cpf(sess, to).await;
        }
        if sess.event.is_none() {
            sess.pending.desired_issue = Some(Issue::Transfer);
            return self.ask_event(sess, to).await;
        }
        sess.pending.transfer = Some(TransferDraft::default());
        sess.step = Step::AwaitingHolderRole;
        self.deps
            .say(
                to,
                "Você é o titular atual da inscrição?\n1. Sim, a inscrição está no meu nome\n2. Não, estou pedindo em nome do titular",
            )
            .await
    }

    pub(crate) async fn handle_holder_role(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        let norm = normalize(text);
        if norm == "1" || is_yes(text) {
            if let (Some(draft), Some(user)) = (sess.pending.transfer.as_mut(), sess.user.as_ref())
            {
                draft.old_holder = Some(Holder::from(user));
            }
            sess.step = Step::AwaitingTransferCpf;
            return self
                .deps
                .say(to, "Certo! Me envie o CPF da pessoa que vai receber a inscrição. 🪪")
                .await;
        }
        if norm == "2" || is_no(text) {
            sess.step = Step::AwaitingHolderCpf;
            return self
                .deps
                .say(to, "Entendi. Então me envie o CPF do titular atual da inscrição. 🪪")
                .await;
        }
        self.deps
            .say(to, "Responda 1 se a inscrição está no seu nome, ou 2 se está no nome de outra pessoa. 🙂")
            .await
    }

    pub(crate) async fn handle_holder_cpf(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        let Some(cpf) = extract_cpf(text) else {
            return self
                .deps
                .say(to, "Me envie o CPF do titular atual (11 números), por favor. 🙂")
                .await;
        };
        match self.deps.api.user_by_document(&cpf).await {
            Ok(Some(holder)) => {
                let name = holder.name.clone();
                if let Some(draft) = sess.pending.transfer.as_mut() {
                    draft.candidate_old = Some(Holder::from(&holder));
                }
                sess.step = Step::AwaitingHolderConfirm;
                self.deps
                    .say(
                        to,
                        &format!(
                            "Encontrei: *{name}*, CPF {}. É essa pessoa?\n1. Confirmar\n2. Corrigir o CPF",
                            format_cpf(&cpf)
                        ),
                    )
                    .await
            }
            Ok(None) => {
                sess.step = Step::AwaitingMoreHelp;
                self.deps
                    .say(
                        to,
                        &format!(
                            "Não encontrei cadastro para o CPF {}. Confirme com o titular e me chame de novo, tá?",
                            format_cpf(&cpf)
                        ),
                    )
                    .await
            }
            Err(err) => {
                warn!(error = %err, "holder CPF lookup failed");
                self.deps
                    .say(to, "Tive um problema ao consultar esse CPF. 😕 Pode tentar de novo?")
                    .await
            }
        }
    }

    pub(crate) async fn handle_holder_confirm(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        let norm = normalize(text);
        if norm == "1" || is_yes(text) {
            if let Some(draft) = sess.pending.transfer.as_mut() {
                draft.old_holder = draft.candidate_old.take();
            }
            sess.step = Step::AwaitingTransferCpf;
            return self
                .deps
                .say(to, "Certo! Agora me envie o CPF da pessoa que vai receber a inscrição. 🪪")
                .await;
        }
        if norm == "2" || is_no(text) {
            if let Some(draft) = sess.pending.transfer.as_mut() {
                draft.candidate_old = None;
            }
            sess.step = Step::AwaitingHolderCpf;
            return self.deps.say(to, "Sem problemas, me envie o CPF correto. 🙂").await;
        }
        self.deps
            .say(to, "Responda 1 para confirmar ou 2 para corrigir o CPF. 🙂")
            .await
    }

    pub(crate) async fn handle_transfer_cpf(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        let Some(cpf) = extract_cpf(text) else {
            return self
                .deps
                .say(to, "Me envie o CPF de quem vai receber a inscrição (11 números). 🙂")
                .await;
        };
        match self.deps.api.user_by_document(&cpf).await {
            Ok(Some(new_holder)) => {
                let name = new_holder.name.clone();
                if let Some(draft) = sess.pending.transfer.as_mut() {
                    draft.candidate_new = Some(Holder::from(&new_holder));
                }
                sess.step = Step::AwaitingTransferConfirm;
                self.deps
                    .say(
                        to,
                        &format!(
                            "A inscrição será transferida para *{name}*, CPF {}. Confirma?\n1. Confirmar\n2. Corrigir o CPF",
                            format_cpf(&cpf)
                        ),
                    )
                    .await
            }
            Ok(None) => {
                sess.step = Step::AwaitingMoreHelp;
                self.deps
                    .say(
                        to,
                        &format!(
                            "O CPF {} ainda não tem cadastro. A pessoa precisa criar uma conta em {}/v2/login.php antes da transferência.",
                            format_cpf(&cpf),
                            self.deps.config.site_base_url
                        ),
                    )
                    .await
            }
            Err(err) => {
                warn!(error = %err, "new holder CPF lookup failed");
                self.deps
                    .say(to, "Falha ao consultar esse CPF. 😕 Pode tentar de novo?")
                    .await
            }
        }
    }

    pub(crate) async fn handle_transfer_confirm(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        let norm = normalize(text);
        if norm == "2" || is_no(text) {
            if let Some(draft) = sess.pending.transfer.as_mut() {
                draft.candidate_new = None;
            }
            sess.step = Step::AwaitingTransferCpf;
            return self.deps.say(to, "Sem problemas, me envie o CPF correto. 🙂").await;
        }
        if !(norm == "1" || is_yes(text)) {
            return self
                .deps
                .say(to, "Responda 1 para confirmar ou 2 para corrigir o CPF. 🙂")
                .await;
        }

        let Some(draft) = sess.pending.transfer.as_mut() else {
            return self.start_transfer(sess, to).await;
        };
        draft.new_holder = draft.candidate_new.take();
        let Some(new_holder) = draft.new_holder.clone() else {
            sess.step = Step::AwaitingTransferCpf;
            return self
                .deps
                .say(to, "Me envie o CPF de quem vai receber a inscrição. 🙂")
                .await;
        };
        let old_holder = match draft.old_holder.clone().or_else(|| {
            sess.user.as_ref().map(Holder::from)
        }) {
            Some(h) => h,
            None => return self.start_transfer(sess, to).await,
        };

        // The holder authorizes from their own phone. When the requester
        // IS the holder, skip the cross-chat handshake.
        if phones_match(to, &old_holder.phone) {
            sess.step = Step::AwaitingTransferSelfConfirm;
            return self
                .deps
                .say(
                    to,
                    &format!(
                        "Como titular, você autoriza a transferência da sua inscrição para *{}*?\n1. Autorizo\n2. Não autorizo",
                        new_holder.name
                    ),
                )
                .await;
        }

        let holder_phone = phone_digits(&old_holder.phone);
        if holder_phone.is_empty() {
            sess.pending.transfer = None;
            sess.step = Step::AwaitingMoreHelp;
            return self
                .deps
                .say(
                    to,
                    "Não encontrei um telefone cadastrado para o titular atual, então não consigo pedir a autorização por aqui. 😕 Peça para ele atualizar o cadastro e me chame de novo.",
                )
                .await;
        }

        let Some(event) = sess.event.clone() else {
            sess.pending.desired_issue = Some(Issue::Transfer);
            return self.ask_event(sess, to).await;
        };

        let token = self.transfers.new_token();
        let now = Utc::now();
        self.transfers.insert(TransferAuthorization {
            token: token.clone(),
            authorizer_phone: holder_phone.clone(),
            requester_phone: to.to_string(),
            old_user_id: old_holder.id,
            new_user_id: new_holder.id,
            new_holder_name: new_holder.name.clone(),
            event_id: event.id.clone(),
            event_title: event.title.clone(),
            expires_at: TransferRegistry::expiry_from(now),
        });
        info!(%token, event = %event.id, "transfer authorization issued");

        // Open the holder's session so the token reply is not swallowed
        // by the start gate.
        {
            let cell = self.sessions.get_or_create(&holder_phone);
            let mut holder_sess = cell.lock().await;
            holder_sess.started = true;
        }
        self.deps
            .say(
                &holder_phone,
                &format!(
                    "Olá! Sou o assistente da Bro Eventos. {} pediu a transferência da inscrição no evento {} para *{}*.\n\nPara AUTORIZAR, responda: {token} 1\nPara RECUSAR, responda: {token} 2\n\nEste código vale por 30 minutos.",
                    old_holder.name, event.title, new_holder.name
                ),
            )
            .await?;

        sess.step = Step::AwaitingTransferResult;
        self.deps
            .say(
                to,
                "Enviei o pedido de autorização para o titular atual. Assim que ele responder, te aviso por aqui! ⏳",
            )
            .await
    }

    pub(crate) async fn handle_transfer_self_confirm(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        let norm = normalize(text);
        if norm == "1" || norm.contains("autorizo") && !is_no(text) || is_yes(text) {
            let Some(draft) = sess.pending.transfer.clone() else {
                return self.start_transfer(sess, to).await;
            };
            let (Some(old_holder), Some(new_holder), Some(event)) = (
                draft.old_holder.or_else(|| sess.user.as_ref().map(Holder::from)),
                draft.new_holder,
                sess.event.clone(),
            ) else {
                return self.start_transfer(sess, to).await;
            };

            let req = racedesk_common::TransferRequest {
                event_id: event.id.clone(),
                old_user_id: old_holder.id,
                new_user_id: new_holder.id,
            };
            return match self.deps.api.transfer_ownership(&req).await {
                Ok(()) => {
                    sess.pending.transfer = None;
                    sess.step = Step::AwaitingMoreHelp;
                    self.deps
                        .say(
                            to,
                            &format!(
                                "Transferência concluída! A inscrição no evento {} agora é de *{}*. ✅\n\nPosso ajudar em mais alguma coisa?",
                                event.title, new_holder.name
                            ),
                        )
                        .await
                }
                Err(err) => {
                    warn!(error = %err, "transfer request failed");
                    sess.step = Step::AwaitingTransferRetry;
                    self.send_transfer_retry_menu(to).await
                }
            };
        }
        if norm == "2" || is_no(text) {
            sess.pending.transfer = None;
            self.deps
                .say(to, "Sem problemas, a transferência não será feita. 🙂")
                .await?;
            return self.ask_issue(sess, to).await;
        }
        self.deps
            .say(to, "Responda 1 para autorizar ou 2 para não autorizar. 🙂")
            .await
    }

    pub(crate) async fn send_transfer_retry_menu(&self, to: &str) -> Result<()> {
        self.deps
            .say(
                to,
                "O que prefere?\n1. Tentar a transferência novamente\n2. Falar com um atendente\n3. Voltar ao menu",
            )
            .await
    }

    pub(crate) async fn handle_transfer_retry(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        let norm = normalize(text);
        if norm == "1" || norm.contains("tentar") {
            sess.pending.transfer = None;
            return self.start_transfer(sess, to).await;
        }
        if norm == "2" || wants_human(text) {
            sess.pending.transfer = None;
            sess.step = Step::Idle;
            return self
                .deps
                .say(to, "Certo! Vou encaminhar você para um atendente. Aguarde um instante. 🧑‍💻")
                .await;
        }
        if norm == "3" || is_go_menu(text) {
            sess.pending.transfer = None;
            return self.ask_issue(sess, to).await;
        }
        self.deps
            .say(to, "Responda 1, 2 ou 3, por favor. 🙂")
            .await
    }
}
