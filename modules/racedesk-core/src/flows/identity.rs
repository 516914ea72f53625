//! CPF collection and identity confirmation.

use anyhow::Result;
use tracing::warn;

use crate::router::Router;
use crate::session::{Issue, Session, Step};
use crate::text::{extract_cpf, format_cpf, is_create_account, is_fix_cpf, is_no, is_yes};

impl Router {
    pub(crate) async fn ask_cpf(&self, sess: &mut Session, to: &str) -> Result<()> {
        sess.step = Step::AwaitingCpf;
        sess.pending.cpf_choice_menu = false;
        self.deps
            .say(to, "Para começar, me informe o seu CPF (apenas números), por favor. 🪪")
            .await
    }

    pub(crate) async fn handle_cpf(&self, sess: &mut Session, to: &str, text: &str) -> Result<()> {
        if sess.pending.cpf_choice_menu {
            // The "CPF not found" menu is on screen.
            if let Some(cpf) = extract_cpf(text) {
                sess.pending.cpf_choice_menu = false;
                return self.lookup_and_greet(sess, to, &cpf).await;
            }
            if is_fix_cpf(text) {
                sess.pending.cpf_choice_menu = false;
                return self.ask_cpf(sess, to).await;
            }
            if is_create_account(text) {
                sess.pending.cpf_choice_menu = false;
                sess.step = Step::AwaitingMoreHelp;
                return self
                    .deps
                    .say(
                        to,
                        &format!(
                            "Sem problemas! Você pode criar seu cadastro aqui: {}/v2/login.php\n\nDepois é só me chamar de novo. Posso ajudar em mais alguma coisa?",
                            self.deps.config.site_base_url
                        ),
                    )
                    .await;
            }
            return self
                .deps
                .say(to, "Me envie o CPF correto, ou escolha:\n1. Corrigir o CPF\n2. Criar cadastro")
                .await;
        }

        let Some(cpf) = extract_cpf(text) else {
            return self
                .deps
                .say(to, "Hmm, não consegui identificar um CPF aí. Me envie os 11 números, pode ser com ou sem pontos. 🙂")
                .await;
        };
        self.lookup_and_greet(sess, to, &cpf).await
    }

    async fn lookup_and_greet(&self, sess: &mut Session, to: &str, cpf: &str) -> Result<()> {
        match self.deps.api.user_by_document(cpf).await {
            Ok(Some(user)) => {
                let name = user.name.clone();
                sess.user = Some(user);
                self.deps
                    .say(to, &format!("Achei seu cadastro, {name}! 🎉"))
                    .await?;
                self.after_identified(sess, to).await
            }
            Ok(None) => {
                sess.pending.cpf_choice_menu = true;
                sess.step = Step::AwaitingCpf;
                self.deps
                    .say(
                        to,
                        &format!(
                            "Não encontrei cadastro para o CPF {}. O que prefere?\n1. Corrigir o CPF\n2. Criar cadastro",
                            format_cpf(cpf)
                        ),
                    )
                    .await
            }
            Err(err) => {
                warn!(error = %err, "CPF lookup failed");
                self.deps
                    .say(to, "Não consegui consultar seu CPF agora. 😕 Pode tentar de novo em instantes?")
                    .await
            }
        }
    }

    /// Confirm a CPF we already have on file before reusing it.
    pub(crate) async fn ask_cpf_verify(&self, sess: &mut Session, to: &str) -> Result<()> {
        let Some(cpf) = sess.user.as_ref().map(|u| u.cpf.clone()).filter(|c| !c.is_empty())
        else {
            return self.ask_cpf(sess, to).await;
        };
        sess.step = Step::AwaitingCpfVerify;
        self.deps
            .say(
                to,
                &format!("Seu CPF é {}? Responda *sim* para continuar ou me envie o CPF correto.", format_cpf(&cpf)),
            )
            .await
    }

    pub(crate) async fn handle_cpf_verify(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        // A fresh CPF typed here overrides the confirmation question.
        if let Some(cpf) = extract_cpf(text) {
            return self.lookup_and_greet(sess, to, &cpf).await;
        }
        if is_yes(text) {
            let cpf = sess.user.as_ref().map(|u| u.cpf.clone()).unwrap_or_default();
            if cpf.is_empty() {
                return self.ask_cpf(sess, to).await;
            }
            return self.lookup_and_greet(sess, to, &cpf).await;
        }
        if is_no(text) {
            return self.ask_cpf(sess, to).await;
        }
        self.deps
            .say(to, "Responda *sim* para confirmar, ou me envie o CPF correto. 🙂")
            .await
    }

    /// Resume whatever the registrant originally asked for, or show the
    /// issue menu.
    pub(crate) async fn after_identified(&self, sess: &mut Session, to: &str) -> Result<()> {
        match sess.pending.desired_issue {
            Some(Issue::Password) => self.start_password(sess, to).await,
            Some(Issue::Faq) => self.start_faq(sess, to).await,
            Some(Issue::ChooseEvent) => self.ask_event(sess, to).await,
            Some(_) if sess.event.is_none() => self.ask_event(sess, to).await,
            Some(Issue::Category) => self.ask_category_options(sess, to).await,
            Some(Issue::TshirtSize) => self.ask_tshirt_options(sess, to).await,
            Some(Issue::TeamName) => self.ask_team_name(sess, to).await,
            Some(Issue::Cancel) => self.ask_cancel_options(sess, to).await,
            Some(Issue::Transfer) => self.start_transfer(sess, to).await,
            Some(Issue::FaqContact) => self.send_faq_organizer_link(sess, to).await,
            None => self.ask_issue(sess, to).await,
        }
    }
}
