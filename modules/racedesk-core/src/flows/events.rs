//! Event selection.

use anyhow::Result;
use tracing::warn;

use crate::fuzzy::select_from_list;
use crate::router::Router;
use crate::session::{EventRef, Issue, Session, Step};

impl Router {
    /// Fetch the open events and show the numbered menu.
    pub(crate) async fn ask_event(&self, sess: &mut Session, to: &str) -> Result<()> {
        let events = match self.deps.api.open_events().await {
            Ok(events) => events,
            Err(err) => {
                warn!(error = %err, "event list fetch failed");
                self.deps
                    .say(to, "Não consegui listar os eventos agora. 😕 Vamos tentar por outro caminho?")
                    .await?;
                return self.ask_issue(sess, to).await;
            }
        };
        if events.is_empty() {
            self.deps
                .say(to, "No momento não há eventos com atendimento aberto por aqui.")
                .await?;
            return self.ask_issue(sess, to).await;
        }
        sess.pending.events = events;
        sess.step = Step::AwaitingEvent;
        self.deps
            .say(to, "Sobre qual evento você precisa de ajuda? 🏁")
            .await?;
        self.send_event_menu(sess, to).await
    }

    /// Re-show the menu built from the stored list, without refetching.
    async fn send_event_menu(&self, sess: &Session, to: &str) -> Result<()> {
        let mut menu = String::from("Escolha o número do evento:\n");
        for (i, ev) in sess.pending.events.iter().enumerate() {
            menu.push_str(&format!("{}. {}\n", i + 1, ev.label()));
        }
        menu.push_str("\nVocê também pode escrever o nome do evento.");
        self.deps.send(to, &menu).await
    }

    pub(crate) async fn handle_event_choice(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        let n = sess.pending.events.len();
        let picked = match text.trim().parse::<usize>() {
            // Numeric input is taken as a menu position, never as text.
            Ok(num) if (1..=n).contains(&num) => Some(num - 1),
            Ok(_) => None,
            Err(_) => {
                let labels: Vec<String> =
                    sess.pending.events.iter().map(|ev| ev.label()).collect();
                select_from_list(self.deps.ai.as_ref(), text, &labels).await
            }
        };

        let Some(idx) = picked else {
            self.deps
                .say(to, "Não encontrei esse evento na lista. 🤔 Pode escolher pelo número?")
                .await?;
            return self.send_event_menu(sess, to).await;
        };

        let ev = sess.pending.events[idx].clone();
        sess.event = Some(EventRef::from(&ev));
        let title = ev.title;
        self.deps
            .say(to, &format!("Perfeito! Anotei o evento *{title}*. ✅"))
            .await?;

        match sess.pending.desired_issue.take() {
            Some(Issue::Category) => self.ask_category_options(sess, to).await,
            Some(Issue::TshirtSize) => self.ask_tshirt_options(sess, to).await,
            Some(Issue::TeamName) => self.ask_team_name(sess, to).await,
            Some(Issue::Cancel) => self.ask_cancel_options(sess, to).await,
            Some(Issue::Transfer) => self.start_transfer(sess, to).await,
            Some(Issue::FaqContact) => self.send_faq_organizer_link(sess, to).await,
            _ => self.ask_issue(sess, to).await,
        }
    }
}
