//! Forgotten password flow: confirm (and fix) e-mail and birthdate,
//! then hand out the reset link.

use anyhow::Result;
use racedesk_common::ProfileUpdate;
use tracing::warn;

use crate::dates::{iso_to_br, to_iso_date};
use crate::router::Router;
use crate::session::{Session, Step};
use crate::text::{is_no, is_yes};

impl Router {
    pub(crate) async fn start_password(&self, sess: &mut Session, to: &str) -> Result<()> {
        sess.pending.new_email = None;
        sess.pending.new_birth = None;
        sess.step = Step::AwaitingEmailConfirm;
        self.deps
            .say(
                to,
                "Vamos recuperar seu acesso. 🔐 Primeiro, qual é o e-mail do seu cadastro?",
            )
            .await
    }

    pub(crate) async fn handle_email_confirm(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        let email = text.trim();
        if !email.contains('@') || email.contains(' ') {
            return self
                .deps
                .say(to, "Esse e-mail não parece válido. 🤔 Pode conferir e enviar de novo?")
                .await;
        }
        sess.pending.new_email = Some(email.to_string());
        sess.step = Step::AwaitingEmailVerification;
        self.deps
            .say(to, &format!("Confirmando: seu e-mail é *{email}*? (sim/não)"))
            .await
    }

    pub(crate) async fn handle_email_verification(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        if is_yes(text) {
            sess.step = Step::AwaitingBirthdateConfirm;
            return self
                .deps
                .say(to, "E qual é a sua data de nascimento? (dd/mm/aaaa)")
                .await;
        }
        if is_no(text) {
            sess.step = Step::AwaitingEmailConfirm;
            return self.deps.say(to, "Sem problemas, me envie o e-mail correto. 🙂").await;
        }
        self.deps
            .say(to, "Responda *sim* para confirmar ou *não* para corrigir o e-mail. 🙂")
            .await
    }

    pub(crate) async fn handle_birthdate_confirm(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        let Some(iso) = to_iso_date(text) else {
            return self
                .deps
                .say(to, "Não consegui entender a data. 🤔 Me envie no formato dd/mm/aaaa.")
                .await;
        };
        sess.pending.new_birth = Some(iso.clone());
        sess.step = Step::AwaitingBirthdateVerification;
        self.deps
            .say(
                to,
                &format!("Confirmando: sua data de nascimento é *{}*? (sim/não)", iso_to_br(&iso)),
            )
            .await
    }

    pub(crate) async fn handle_birthdate_verification(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        if is_yes(text) {
            return self.finish_password(sess, to).await;
        }
        if is_no(text) {
            sess.step = Step::AwaitingBirthdateConfirm;
            return self
                .deps
                .say(to, "Sem problemas, me envie a data correta (dd/mm/aaaa). 🙂")
                .await;
        }
        self.deps
            .say(to, "Responda *sim* para confirmar ou *não* para corrigir a data. 🙂")
            .await
    }

    /// Push any corrected profile fields, then send the reset link. The
    /// link goes out even when the profile update fails.
    async fn finish_password(&self, sess: &mut Session, to: &str) -> Result<()> {
        let new_email = sess.pending.new_email.take();
        let new_birth = sess.pending.new_birth.take();

        if let Some(user) = sess.user.clone() {
            let email_changed = new_email
                .as_deref()
                .is_some_and(|e| !e.eq_ignore_ascii_case(user.email.trim()));
            let birth_changed =
                new_birth.as_deref().is_some_and(|b| b != user.birth_date.trim());

            if email_changed || birth_changed {
                let update = ProfileUpdate {
                    user_id: user.id,
                    email: email_changed.then(|| new_email.clone().unwrap_or_default()),
                    birth_date: birth_changed.then(|| new_birth.clone().unwrap_or_default()),
                };
                match self.deps.api.update_profile(&update).await {
                    Ok(()) => {
                        self.deps
                            .say(to, "Atualizei seus dados de cadastro. ✅")
                            .await?;
                        if let Some(u) = sess.user.as_mut() {
                            if let Some(e) = &update.email {
                                u.email = e.clone();
                            }
                            if let Some(b) = &update.birth_date {
                                u.birth_date = b.clone();
                            }
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "profile update failed");
                        self.deps
                            .say(
                                to,
                                "Não consegui atualizar seus dados agora, mas você ainda pode redefinir a senha. 🙂",
                            )
                            .await?;
                    }
                }
            }
        }

        sess.step = Step::AwaitingMoreHelp;
        self.deps
            .say(
                to,
                &format!(
                    "Para redefinir sua senha, acesse: {}/v2/esquecisenha.php 🔑\n\nPosso ajudar em mais alguma coisa?",
                    self.deps.config.site_base_url
                ),
            )
            .await
    }
}
