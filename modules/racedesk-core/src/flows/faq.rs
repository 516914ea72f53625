//! FAQ menu with canned answers.

use anyhow::Result;

use crate::router::Router;
use crate::session::{Issue, Session, Step};
use crate::text::{is_go_menu, normalize};

const FAQ_MENU: &str = "Dúvidas frequentes — escolha um número:\n\
1. Por que o evento tem limite de vagas?\n\
2. Posso transferir minha inscrição para outra pessoa?\n\
3. Como funciona a retirada do kit?\n\
4. Como falo com a organização do evento?\n\
5. Qual a diferença entre tempo bruto e tempo líquido?\n\n\
Ou digite *menu* para voltar.";

impl Router {
    pub(crate) async fn start_faq(&self, sess: &mut Session, to: &str) -> Result<()> {
        sess.step = Step::AwaitingFaqMenu;
        self.deps.send(to, FAQ_MENU).await
    }

    pub(crate) async fn handle_faq_menu(
        &self,
        sess: &mut Session,
        to: &str,
        text: &str,
    ) -> Result<()> {
        if is_go_menu(text) {
            return self.ask_issue(sess, to).await;
        }
        let answer = match normalize(text).as_str() {
            "1" => {
                "As vagas são limitadas pela estrutura do evento: percurso, hidratação, kits e segurança são dimensionados para um número máximo de participantes. Quando esgota, não conseguimos abrir exceções. 🙂"
            }
            "2" => {
                "Dá sim, com autorização do titular atual. Posso cuidar disso por aqui: escolha \"Transferir inscrição\" no menu. A alteração pode ser feita até 10 dias antes do evento."
            }
            "3" => {
                "A retirada do kit acontece nos dias e locais divulgados pelo organizador. Leve um documento com foto e o comprovante de inscrição. Se for retirar o kit de outra pessoa, leve também uma autorização assinada."
            }
            "4" => {
                // Organizer contact depends on the event page.
                sess.pending.desired_issue = Some(Issue::FaqContact);
                if sess.event.is_none() {
                    self.deps
                        .say(to, "Claro! Me diga primeiro de qual evento se trata. 🙂")
                        .await?;
                    return self.ask_event(sess, to).await;
                }
                return self.send_faq_organizer_link(sess, to).await;
            }
            "5" => {
                "Tempo bruto conta a partir do tiro de largada; tempo líquido conta a partir do momento em que você cruza o tapete de largada. A classificação geral usa o tempo bruto."
            }
            _ => {
                self.deps
                    .say(to, "Escolha uma das dúvidas pelo número, ou digite *menu* para voltar. 🙂")
                    .await?;
                return Ok(());
            }
        };
        self.deps.say(to, answer).await?;
        self.start_faq(sess, to).await
    }

    /// Point at the event page, where the organizer contact lives.
    pub(crate) async fn send_faq_organizer_link(
        &self,
        sess: &mut Session,
        to: &str,
    ) -> Result<()> {
        sess.pending.desired_issue = None;
        let base = &self.deps.config.site_base_url;
        let link = match sess.event.as_ref().filter(|ev| !ev.slug.is_empty()) {
            Some(ev) => format!("{base}/v2/{}", ev.slug),
            None => format!("{base}/v2"),
        };
        sess.step = Step::AwaitingMoreHelp;
        self.deps
            .say(
                to,
                &format!(
                    "O contato da organização fica na página do evento: {link} 📞\n\nPosso ajudar em mais alguma coisa?"
                ),
            )
            .await
    }
}
