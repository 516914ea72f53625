//! Cancellation and refund flow.
//!
//! Refunds are only offered for registrations in an allowed payment
//! status and purchased at most 7 days ago. Everything else is routed
//! to a human or back to the menu.

use anyhow::Result;
use chrono::Local;
use racedesk_common::RegistrationRecord;
use tracing::warn;

use crate::dates::{days_between, parse_br_datetime};
use crate::router::Router;
use crate::session::{CancelChoice, Issue, Session, Step};
use crate::text::{is_go_menu, is_no, is_switch_event, is_yes, normalize, wants_human};

const ALLOWED_STATUSES: &[&str] = &["Pago", "Disponível", "Disponivel"];
const REFUND_WINDOW_DAYS: f64 = 7.0;

fn status_allowed(record: &RegistrationRecord) -> bool {
    ALLOWED_STATUSES.iter().any(|s| record.status == *s)
}

fn within_window(record: &RegistrationRecord, now: chrono::NaiveDateTime) -> bool {
    match parse_br_datetime(&record.purchase_date, &record.purchase_time) {
        Some(bought) => days_between(bought, now) <= REFUND_WINDOW_DAYS,
        None => false,
    }
}

/// Split a user's registrations into refund-eligible ones, also noting
/// whether anything was excluded purely by payment status.
fn eligible_choices(
    records: &[RegistrationRecord],
    now: chrono::NaiveDateTime,
) -> (Vec<CancelChoice>, bool) {
    let any_status_blocked = !records.is_empty() && records.iter().all(|r| !status_allowed(r));
    let eligible = records
        .iter()
        .filter(|r| status_allowed(r) && within_window(r, now))
        .map(|r| CancelChoice {
            reference: r.reference.clone(),
            event_title: r.event_title.clone().unwrap_or_default(),
            date: r.purchase_date.clone(),
            time: r.purchase_time.clone(),
        })
        .collect();
    (eligible, any_status_blocked)
}

impl Router {
    pub(crate) async fn ask_cancel_options(&self, sess: &mut Session, to: &str) -> Result<()> {
        let (Some(event), Some(user)) = (sess.event.clone(), sess.user.clone()) else {
            sess.pending.desired_issue = Some(Issue::Cancel);
            return if sess.user.is_none() {
                self.ask_cpf(sess, to).await
            } else {
                self.ask_event(sess, to).await
            };
        };

        let records = match self.deps.api.registrations(user.id, &event.id).await {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, event = %event.id, "registration list fetch failed");
                sess.step = Step::AwaitingNoCancelAction;
                return self
                    .deps
                    .say(
                        to,
                        "Não consegui consultar suas inscrições agora. 😕 O que prefere?\n1. Falar com um atendente\n2. Voltar ao menu",
                    )
                    .await;
            }
        };

        let (choices, status_blocked) = eligible_choices(&records, Local::now().naive_local());

        if status_blocked {
            sess.step = Step::AwaitingCancelRedirect;
            return self
                .deps
                .say(
                    to,
                    &format!(
                        "As inscrições que encontrei no evento {} não estão com pagamento em situação que permita cancelamento por aqui. O que prefere?\n1. Escolher outro evento\n2. Falar com um atendente\n3. Voltar ao menu",
                        event.title
                    ),
                )
                .await;
        }
        if choices.is_empty() {
            sess.step = Step::AwaitingNoCancelAction;
            return self
                .deps
                .say(
                    to,
                    &format!(
                        "Não encontrei inscrições elegíveis para cancelamento no evento {} (o prazo é de até 7 dias após a compra). O que prefere?\n1. Falar com um atendente\n2. Voltar ao menu",
                        event.title
                    ),
                )
                .await;
        }

        let mut menu = String::from("Inscrições que podem ser canceladas:\n");
        for (i, c) in choices.iter().enumerate() {
            menu.push_str(&format!(
                "{}. {} — {} — compra em {} {}\n",
                i + 1,
                c.reference,
                c.event_title,
                c.date,
                c.time
            ));
        }
        menu.push_str("\nResponda com o número, ou 0 para trocar de evento.");

        sess.pending.cancel_choices = choices;
        sess.step = Step::AwaitingCancelChoice;
        self.deps
            .say(
                to,
                "Atenção: o cancelamento gera o estorno do valor pago e a inscrição deixa de valer. ⚠️",
            )
            .await?;
        self.deps.send(to, &menu).await
    }

    pub(crate) async fn handle_cancel_choice(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        if is_switch_event(text) {
            sess.clear_event_context(true);
            sess.pending.desired_issue = Some(Issue::Cancel);
            return self.ask_event(sess, to).await;
        }
        let n = sess.pending.cancel_choices.len();
        match text.trim().parse::<usize>() {
            Ok(num) if (1..=n).contains(&num) => {
                let choice = sess.pending.cancel_choices[num - 1].clone();
                sess.pending.cancel_ref = Some(choice.reference.clone());
                sess.step = Step::AwaitingCancelConfirm;
                self.deps
                    .say(
                        to,
                        &format!(
                            "Confirma o cancelamento da inscrição {} ({})? Responda *sim* para confirmar ou *não* para voltar.",
                            choice.reference, choice.event_title
                        ),
                    )
                    .await
            }
            _ => {
                self.deps
                    .say(to, "Não consegui entender. 🤔 Escolha a inscrição pelo número da lista.")
                    .await?;
                self.ask_cancel_options(sess, to).await
            }
        }
    }

    pub(crate) async fn handle_cancel_confirm(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        if is_yes(text) {
            return self.apply_cancel(sess, to).await;
        }
        if is_no(text) {
            sess.pending.cancel_ref = None;
            sess.pending.cancel_choices.clear();
            self.deps
                .say(to, "Sem problemas, nada foi cancelado. 🙂")
                .await?;
            return self.ask_issue(sess, to).await;
        }
        self.deps
            .say(to, "Responda *sim* para confirmar o cancelamento ou *não* para voltar. 🙂")
            .await
    }

    /// Fire the refund request, pausing to collect name or e-mail when
    /// the profile is missing them.
    pub(crate) async fn apply_cancel(&self, sess: &mut Session, to: &str) -> Result<()> {
        let Some(reference) = sess.pending.cancel_ref.clone() else {
            return self.ask_cancel_options(sess, to).await;
        };
        let Some(user) = sess.user.clone() else {
            sess.pending.desired_issue = Some(Issue::Cancel);
            return self.ask_cpf(sess, to).await;
        };
        if user.name.trim().is_empty() {
            sess.step = Step::AwaitingRefundName;
            return self
                .deps
                .say(to, "Para o estorno, preciso do seu nome completo. Pode me enviar?")
                .await;
        }
        if user.email.trim().is_empty() {
            sess.step = Step::AwaitingRefundEmail;
            return self
                .deps
                .say(to, "Para o estorno, preciso do seu e-mail. Pode me enviar?")
                .await;
        }

        match self
            .deps
            .api
            .request_refund(&reference, &user.name, &user.email)
            .await
        {
            Ok(()) => {
                sess.pending.cancel_ref = None;
                sess.pending.cancel_choices.clear();
                sess.step = Step::AwaitingMoreHelp;
                self.deps
                    .say(
                        to,
                        &format!(
                            "Cancelamento solicitado para a inscrição {reference}. O estorno segue o prazo da operadora de pagamento. ✅\n\nPosso ajudar em mais alguma coisa?"
                        ),
                    )
                    .await
            }
            Err(err) => {
                warn!(error = %err, %reference, "refund request failed");
                sess.step = Step::AwaitingCancelRetry;
                self.deps
                    .say(
                        to,
                        "Não consegui concluir o cancelamento agora. 😕 O que prefere?\n1. Tentar novamente\n2. Falar com um atendente\n3. Voltar ao menu",
                    )
                    .await
            }
        }
    }

    pub(crate) async fn handle_refund_name(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        let name = text.trim();
        if name.is_empty() {
            return self.deps.say(to, "Me envie seu nome completo, por favor. 🙂").await;
        }
        if let Some(user) = sess.user.as_mut() {
            user.name = name.to_string();
        }
        self.apply_cancel(sess, to).await
    }

    pub(crate) async fn handle_refund_email(
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
        if let Some(user) = sess.user.as_mut() {
            user.email = email.to_string();
        }
        self.apply_cancel(sess, to).await
    }

    pub(crate) async fn handle_cancel_redirect(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        let norm = normalize(text);
        if norm == "1" || norm.contains("evento") {
            sess.clear_event_context(true);
            sess.pending.desired_issue = Some(Issue::Cancel);
            return self.ask_event(sess, to).await;
        }
        if norm == "2" || wants_human(text) {
            sess.step = Step::Idle;
            return self
                .deps
                .say(to, "Certo! Vou encaminhar você para um atendente. Aguarde um instante. 🧑‍💻")
                .await;
        }
        if norm == "3" || is_go_menu(text) {
            sess.clear_event_context(false);
            return self.ask_issue(sess, to).await;
        }
        self.deps
            .say(to, "Responda 1, 2 ou 3, por favor. 🙂")
            .await
    }

    pub(crate) async fn handle_no_cancel_action(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        let norm = normalize(text);
        if norm == "1" || wants_human(text) {
            sess.step = Step::Idle;
            return self
                .deps
                .say(to, "Certo! Vou encaminhar você para um atendente. Aguarde um instante. 🧑‍💻")
                .await;
        }
        if norm == "2" || is_go_menu(text) {
            sess.clear_event_context(false);
            return self.ask_issue(sess, to).await;
        }
        self.deps
            .say(to, "Responda 1 para falar com um atendente ou 2 para voltar ao menu. 🙂")
            .await
    }

    pub(crate) async fn handle_cancel_retry(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        let norm = normalize(text);
        if norm == "1" || norm.contains("tentar") {
            return self.apply_cancel(sess, to).await;
        }
        if norm == "2" || wants_human(text) {
            sess.step = Step::Idle;
            return self
                .deps
                .say(to, "Certo! Vou encaminhar você para um atendente. Aguarde um instante. 🧑‍💻")
                .await;
        }
        if norm == "3" || is_go_menu(text) {
            sess.pending.cancel_ref = None;
            sess.clear_event_context(false);
            return self.ask_issue(sess, to).await;
        }
        self.deps
            .say(to, "Responda 1, 2 ou 3, por favor. 🙂")
            .await
    }
}

// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: &str, date: &str, time: &str) -> RegistrationRecord {
        RegistrationRecord {
            reference: "REF-1".into(),
            status: status.into(),
            purchase_date: date.into(),
            purchase_time: time.into(),
            event_title: Some("Corrida 5K".into()),
        }
    }

    fn now() -> chrono::NaiveDateTime {
        parse_br_datetime("10/08/2026", "12:00").unwrap()
    }

    #[test]
    fn paid_within_seven_days_is_eligible() {
        let (choices, blocked) = eligible_choices(&[record("Pago", "03/08/2026", "12:00")], now());
        assert_eq!(choices.len(), 1);
        assert!(!blocked);
    }

    #[test]
    fn exactly_seven_days_is_inclusive() {
        let (choices, _) = eligible_choices(&[record("Pago", "03/08/2026", "12:00:00")], now());
        assert_eq!(choices.len(), 1);
        let (choices, _) = eligible_choices(&[record("Pago", "03/08/2026", "11:59:59")], now());
        assert!(choices.is_empty());
    }

    #[test]
    fn disallowed_status_flags_the_redirect() {
        let (choices, blocked) =
            eligible_choices(&[record("Aguardando", "09/08/2026", "12:00")], now());
        assert!(choices.is_empty());
        assert!(blocked);
    }

    #[test]
    fn mixed_statuses_do_not_flag_redirect() {
        let records = [
            record("Aguardando", "09/08/2026", "12:00"),
            record("Disponível", "09/08/2026", "12:00"),
        ];
        let (choices, blocked) = eligible_choices(&records, now());
        assert_eq!(choices.len(), 1);
        assert!(!blocked);
    }

    #[test]
    fn empty_list_is_neither_blocked_nor_eligible() {
        let (choices, blocked) = eligible_choices(&[], now());
        assert!(choices.is_empty());
        assert!(!blocked);
    }

    #[test]
    fn unparseable_purchase_date_is_ineligible() {
        let (choices, _) = eligible_choices(&[record("Pago", "2026-08-09", "12:00")], now());
        assert!(choices.is_empty());
    }
}
