//! Team name change flow.

use anyhow::Result;
use racedesk_common::RegistrationUpdate;
use tracing::warn;

use crate::router::Router;
use crate::session::{Issue, Session, Step};
use crate::text::{is_no, is_switch_event, is_yes};

impl Router {
    pub(crate) async fn ask_team_name(&self, sess: &mut Session, to: &str) -> Result<()> {
        let Some(event) = sess.event.clone() else {
            sess.pending.desired_issue = Some(Issue::TeamName);
            return self.ask_event(sess, to).await;
        };
        sess.pending.team_name = None;
        sess.step = Step::AwaitingTeamName;
        self.deps
            .say(
                to,
                &format!(
                    "Qual deve ser o novo nome da equipe no evento {}? (ou 0 para trocar de evento)",
                    event.title
                ),
            )
            .await
    }

    pub(crate) async fn handle_team_name(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        if is_switch_event(text) {
            sess.clear_event_context(true);
            sess.pending.desired_issue = Some(Issue::TeamName);
            return self.ask_event(sess, to).await;
        }
        let name = text.trim();
        if name.is_empty() {
            return self.deps.say(to, "Me envie o nome da equipe, por favor. 🙂").await;
        }
        sess.pending.team_name = Some(name.to_string());
        sess.step = Step::AwaitingTeamConfirm;
        self.deps
            .say(to, &format!("Confirmando: o nome da equipe será *{name}*. Pode ser? (sim/não)"))
            .await
    }

    pub(crate) async fn handle_team_confirm(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        if is_yes(text) {
            return self.apply_team_change(sess, to).await;
        }
        if is_no(text) {
            return self.ask_team_name(sess, to).await;
        }
        self.deps
            .say(to, "Responda *sim* para confirmar ou *não* para corrigir o nome. 🙂")
            .await
    }

    async fn apply_team_change(&self, sess: &mut Session, to: &str) -> Result<()> {
        let Some(team) = sess.pending.team_name.clone() else {
            return self.ask_team_name(sess, to).await;
        };
        let (Some(event), Some(user)) = (sess.event.clone(), sess.user.clone()) else {
            return self.ask_team_name(sess, to).await;
        };
        let update = RegistrationUpdate {
            user_id: user.id,
            event_id: event.id.clone(),
            registration_id: None,
            tshirt_size: None,
            team: Some(team.clone()),
        };
        match self.deps.api.update_registration(&update).await {
            Ok(()) => {
                sess.pending.team_name = None;
                sess.step = Step::AwaitingMoreHelp;
                self.deps
                    .say(
                        to,
                        &format!(
                            "Prontinho! O nome da equipe no evento {} agora é *{team}*. 🎉\n\nPosso ajudar em mais alguma coisa?",
                            event.title
                        ),
                    )
                    .await
            }
            Err(err) => {
                warn!(error = %err, "team update failed");
                self.deps
                    .say(to, "Não consegui salvar o nome da equipe. 😕 Vamos tentar de novo?")
                    .await?;
                self.ask_team_name(sess, to).await
            }
        }
    }
}
