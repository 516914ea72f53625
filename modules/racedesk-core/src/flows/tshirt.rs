//! Shirt size change flow.

use anyhow::Result;
use racedesk_common::{RegistrationUpdate, TshirtSize};
use tracing::warn;

use crate::fuzzy::{select_from_list, tokens_all_contained, tshirt_search_text};
use crate::router::Router;
use crate::session::{Issue, Session, Step, TshirtChoice};
use crate::text::{is_go_menu, is_switch_event, normalize, wants_human};

fn in_stock(sizes: &[TshirtSize]) -> impl Iterator<Item = &TshirtSize> {
    sizes.iter().filter(|s| s.available > 0)
}

fn display_label(size: &TshirtSize) -> String {
    if size.label.is_empty() {
        size.code.clone()
    } else {
        size.label.clone()
    }
}

impl Router {
    pub(crate) async fn ask_tshirt_options(&self, sess: &mut Session, to: &str) -> Result<()> {
        let Some(event) = sess.event.clone() else {
            sess.pending.desired_issue = Some(Issue::TshirtSize);
            return self.ask_event(sess, to).await;
        };

        let catalog = match self.deps.api.tshirt_sizes(&event.id).await {
            Ok(catalog) => catalog,
            Err(err) => {
                warn!(error = %err, event = %event.id, "tshirt fetch failed");
                sess.step = Step::AwaitingNoTshirtAction;
                return self
                    .deps
                    .say(
                        to,
                        "Não consegui consultar os tamanhos agora. 😕 O que prefere?\n1. Falar com um atendente\n2. Voltar ao menu",
                    )
                    .await;
            }
        };

        let mut choices: Vec<TshirtChoice> = Vec::new();
        let mut menu = String::from("Tamanhos disponíveis:\n");
        for (section, sizes) in [("INFANTIL", &catalog.child), ("ADULTO", &catalog.adult)] {
            let rows: Vec<&TshirtSize> = in_stock(sizes).collect();
            if rows.is_empty() {
                continue;
            }
            menu.push_str(&format!("\n*{section}*\n"));
            for size in rows {
                choices.push(TshirtChoice {
                    code: size.code.clone(),
                    label: display_label(size),
                });
                menu.push_str(&format!("{}. {}\n", choices.len(), display_label(size)));
            }
        }

        if choices.is_empty() {
            sess.step = Step::AwaitingNoTshirtAction;
            return self
                .deps
                .say(
                    to,
                    &format!(
                        "Não há tamanhos com estoque disponível no evento {}. O que prefere?\n1. Falar com um atendente\n2. Voltar ao menu",
                        event.title
                    ),
                )
                .await;
        }
        menu.push_str("\nResponda com o número ou o tamanho (ex.: \"adulto M\"), ou 0 para trocar de evento.");

        sess.pending.tshirt_choices = choices;
        sess.step = Step::AwaitingTshirtChoice;
        self.deps
            .say(to, &format!("Vamos trocar o tamanho da camiseta no evento {}. 👕", event.title))
            .await?;
        self.deps.send(to, &menu).await
    }

    pub(crate) async fn handle_tshirt_choice(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        if is_switch_event(text) {
            sess.clear_event_context(true);
            sess.pending.desired_issue = Some(Issue::TshirtSize);
            return self.ask_event(sess, to).await;
        }

        let n = sess.pending.tshirt_choices.len();
        let mut picked = match text.trim().parse::<usize>() {
            Ok(num) if (1..=n).contains(&num) => Some(num - 1),
            Ok(_) => None,
            Err(_) => {
                let labels: Vec<String> = sess
                    .pending
                    .tshirt_choices
                    .iter()
                    .map(|c| c.label.clone())
                    .collect();
                select_from_list(self.deps.ai.as_ref(), text, &labels).await
            }
        };
        if picked.is_none() {
            // Synonym-expanded containment ("baby look p", "bl m").
            picked = sess
                .pending
                .tshirt_choices
                .iter()
                .position(|c| tokens_all_contained(text, &tshirt_search_text(&c.label, &c.code)));
        }
        if picked.is_none() {
            // Bare size code typed directly ("m", "gg", "blp").
            let wanted = normalize(text).replace(' ', "");
            picked = sess
                .pending
                .tshirt_choices
                .iter()
                .position(|c| normalize(&c.code).replace(' ', "") == wanted);
        }

        let Some(idx) = picked else {
            self.deps
                .say(
                    to,
                    "Não reconheci esse tamanho. 🤔 Pode escolher pelo número da lista ou escrever, por exemplo, \"adulto M\"?",
                )
                .await?;
            return self.ask_tshirt_options(sess, to).await;
        };
        let choice = sess.pending.tshirt_choices[idx].clone();
        self.apply_tshirt_change(sess, to, &choice).await
    }

    async fn apply_tshirt_change(
        &self,
        sess: &mut Session,
        to: &str,
        choice: &TshirtChoice,
    ) -> Result<()> {
        let (Some(event), Some(user)) = (sess.event.clone(), sess.user.clone()) else {
            return self.ask_tshirt_options(sess, to).await;
        };
        let update = RegistrationUpdate {
            user_id: user.id,
            event_id: event.id.clone(),
            registration_id: None,
            tshirt_size: Some(choice.code.clone()),
            team: None,
        };
        match self.deps.api.update_registration(&update).await {
            Ok(()) => {
                sess.pending.tshirt_choices.clear();
                sess.step = Step::AwaitingMoreHelp;
                self.deps
                    .say(
                        to,
                        &format!(
                            "Feito! Tamanho atualizado para *{}* no evento {}. 👕✅\n\nPosso ajudar em mais alguma coisa?",
                            choice.label.to_uppercase(),
                            event.title
                        ),
                    )
                    .await
            }
            Err(err) => {
                warn!(error = %err, "tshirt update failed");
                self.deps
                    .say(to, "Algo não deu certo ao trocar o tamanho. 😕 Vamos tentar de novo?")
                    .await?;
                self.ask_tshirt_options(sess, to).await
            }
        }
    }

    pub(crate) async fn handle_no_tshirt_action(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        let norm = normalize(text);
        if norm == "1" || wants_human(text) {
            sess.pending.tshirt_choices.clear();
            sess.pending.desired_issue = None;
            sess.step = Step::Idle;
            return self
                .deps
                .say(to, "Certo! Vou encaminhar você para um atendente. Aguarde um instante. 🧑‍💻")
                .await;
        }
        if norm == "2" || is_go_menu(text) {
            sess.pending.tshirt_choices.clear();
            sess.clear_event_context(false);
            return self.ask_issue(sess, to).await;
        }
        self.deps
            .say(to, "Responda 1 para falar com um atendente ou 2 para voltar ao menu. 🙂")
            .await
    }
}
