//! Category change flow.

use anyhow::Result;
use racedesk_common::RegistrationUpdate;
use tracing::warn;

use crate::fuzzy::{select_from_list, tokens_all_contained};
use crate::router::Router;
use crate::session::{Issue, Session, Step};
use crate::text::{is_go_menu, is_switch_event, normalize, wants_human};

// Free-text matching sees everything the menu showed, price and fee
// included ("a de 180" picks the R$ 180,00 option).
fn option_label(opt: &racedesk_common::CategoryOption) -> String {
    let mut label = opt.title.clone();
    let extras = [
        opt.description.as_deref(),
        opt.price.as_deref(),
        opt.fee.as_deref(),
    ];
    for part in extras.into_iter().flatten().filter(|p| !p.is_empty()) {
        label.push(' ');
        label.push_str(part);
    }
    label
}

impl Router {
    pub(crate) async fn ask_category_options(&self, sess: &mut Session, to: &str) -> Result<()> {
        let (Some(event), Some(user)) = (sess.event.clone(), sess.user.clone()) else {
            sess.pending.desired_issue = Some(Issue::Category);
            return if sess.user.is_none() {
                self.ask_cpf(sess, to).await
            } else {
                self.ask_event(sess, to).await
            };
        };

        let options = match self.deps.api.categories(&event.id, user.id).await {
            Ok(options) => options,
            Err(err) => {
                warn!(error = %err, event = %event.id, "category fetch failed");
                sess.step = Step::AwaitingNoCategoryAction;
                return self
                    .deps
                    .say(
                        to,
                        "Não consegui consultar as categorias agora. 😕 O que prefere?\n1. Falar com um atendente\n2. Voltar ao menu",
                    )
                    .await;
            }
        };
        if options.is_empty() {
            sess.step = Step::AwaitingNoCategoryAction;
            return self
                .deps
                .say(
                    to,
                    &format!(
                        "Não encontrei categorias disponíveis para troca no evento {}. O que prefere?\n1. Falar com um atendente\n2. Voltar ao menu",
                        event.title
                    ),
                )
                .await;
        }

        let mut menu = String::from("Estas são as categorias disponíveis:\n");
        for (i, opt) in options.iter().enumerate() {
            menu.push_str(&format!("{}. {}", i + 1, opt.title));
            if let Some(price) = opt.price.as_deref().filter(|p| !p.is_empty()) {
                menu.push_str(&format!(" — {price}"));
                if let Some(fee) = opt.fee.as_deref().filter(|f| !f.is_empty()) {
                    menu.push_str(&format!(" (taxa {fee})"));
                }
            }
            menu.push('\n');
        }
        menu.push_str("\nResponda com o número, ou 0 para trocar de evento.");

        sess.pending.category_options = options;
        sess.step = Step::AwaitingCategoryChoice;
        self.deps
            .say(to, &format!("Vamos trocar a categoria no evento {}. 📋", event.title))
            .await?;
        self.deps.send(to, &menu).await
    }

    pub(crate) async fn handle_category_choice(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        if is_switch_event(text) {
            sess.clear_event_context(true);
            sess.pending.desired_issue = Some(Issue::Category);
            return self.ask_event(sess, to).await;
        }

        let n = sess.pending.category_options.len();
        let mut picked = match text.trim().parse::<usize>() {
            Ok(num) if (1..=n).contains(&num) => Some(num - 1),
            Ok(_) => None,
            Err(_) => {
                let labels: Vec<String> =
                    sess.pending.category_options.iter().map(option_label).collect();
                select_from_list(self.deps.ai.as_ref(), text, &labels).await
            }
        };
        if picked.is_none() {
            // Last layer: fragment containment ("quadri", "infantil g").
            picked = sess
                .pending
                .category_options
                .iter()
                .position(|opt| tokens_all_contained(text, &normalize(&option_label(opt))));
        }

        let Some(idx) = picked else {
            self.deps
                .say(to, "Não consegui entender a categoria. 🤔 Pode escolher pelo número?")
                .await?;
            return self.ask_category_options(sess, to).await;
        };
        let registration_id = sess.pending.category_options[idx].registration_id.clone();
        self.apply_category_change(sess, to, &registration_id).await
    }

    async fn apply_category_change(
        &self,
        sess: &mut Session,
        to: &str,
        registration_id: &str,
    ) -> Result<()> {
        let (Some(event), Some(user)) = (sess.event.clone(), sess.user.clone()) else {
            return self.ask_category_options(sess, to).await;
        };
        let update = RegistrationUpdate {
            user_id: user.id,
            event_id: event.id.clone(),
            registration_id: Some(registration_id.to_string()),
            tshirt_size: None,
            team: None,
        };
        match self.deps.api.update_registration(&update).await {
            Ok(()) => {
                sess.pending.category_options.clear();
                sess.step = Step::AwaitingMoreHelp;
                self.deps
                    .say(
                        to,
                        &format!(
                            "Prontinho! Solicitei a troca de categoria no evento {}. 🎉\n\nPosso ajudar em mais alguma coisa?",
                            event.title
                        ),
                    )
                    .await
            }
            Err(err) => {
                warn!(error = %err, "category update failed");
                self.deps
                    .say(to, "Algo não deu certo ao trocar a categoria. 😕 Vamos tentar de novo?")
                    .await?;
                self.ask_category_options(sess, to).await
            }
        }
    }

    pub(crate) async fn handle_no_category_action(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        let norm = normalize(text);
        if norm == "1" || wants_human(text) {
            sess.pending.category_options.clear();
            sess.pending.desired_issue = None;
            sess.step = Step::Idle;
            return self
                .deps
                .say(to, "Certo! Vou encaminhar você para um atendente. Aguarde um instante. 🧑‍💻")
                .await;
        }
        if norm == "2" || is_go_menu(text) {
            sess.pending.category_options.clear();
            sess.clear_event_context(false);
            return self.ask_issue(sess, to).await;
        }
        self.deps
            .say(to, "Responda 1 para falar com um atendente ou 2 para voltar ao menu. 🙂")
            .await
    }
}
