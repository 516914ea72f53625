//! End-to-end conversation tests driven through in-memory fakes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Local};

use racedesk_common::{
    CategoryOption, Config, EventSummary, ProfileUpdate, Registrant, RegistrationRecord,
    RegistrationUpdate, TransferRequest, TshirtCatalog, TshirtSize,
};
use racedesk_core::{BotDeps, Messenger, RegistrationApi, Router};

// --- fakes -----------------------------------------------------------------

#[derive(Default)]
struct MemoryMessenger {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Messenger for MemoryMessenger {
    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

impl MemoryMessenger {
    fn bodies_to(&self, to: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == to)
            .map(|(_, b)| b.clone())
            .collect()
    }

    fn transcript_to(&self, to: &str) -> String {
        self.bodies_to(to).join("\n---\n")
    }
}

struct MockApi {
    users: HashMap<String, Registrant>,
    events: Vec<EventSummary>,
    categories: Vec<CategoryOption>,
    tshirts: TshirtCatalog,
    registrations: Vec<RegistrationRecord>,
    fail_refund: bool,
    refunds: Mutex<Vec<(String, String, String)>>,
    transfers: Mutex<Vec<TransferRequest>>,
    updates: Mutex<Vec<RegistrationUpdate>>,
    profile_updates: Mutex<Vec<ProfileUpdate>>,
}

impl MockApi {
    fn new() -> Self {
        Self {
            users: HashMap::new(),
            events: Vec::new(),
            categories: Vec::new(),
            tshirts: TshirtCatalog {
                child: Vec::new(),
                adult: Vec::new(),
            },
            registrations: Vec::new(),
            fail_refund: false,
            refunds: Mutex::new(Vec::new()),
            transfers: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            profile_updates: Mutex::new(Vec::new()),
        }
    }

    fn with_user(mut self, user: Registrant) -> Self {
        self.users.insert(user.cpf.clone(), user);
        self
    }

    fn with_events(mut self, events: Vec<EventSummary>) -> Self {
        self.events = events;
        self
    }
}

#[async_trait]
impl RegistrationApi for MockApi {
    async fn user_by_document(&self, cpf: &str) -> Result<Option<Registrant>> {
        Ok(self.users.get(cpf).cloned())
    }

    async fn open_events(&self) -> Result<Vec<EventSummary>> {
        Ok(self.events.clone())
    }

    async fn categories(&self, _event_id: &str, _user_id: i64) -> Result<Vec<CategoryOption>> {
        Ok(self.categories.clone())
    }

    async fn tshirt_sizes(&self, _event_id: &str) -> Result<TshirtCatalog> {
        Ok(self.tshirts.clone())
    }

    async fn registrations(
        &self,
        _user_id: i64,
        _event_id: &str,
    ) -> Result<Vec<RegistrationRecord>> {
        Ok(self.registrations.clone())
    }

    async fn update_registration(&self, update: &RegistrationUpdate) -> Result<()> {
        self.updates.lock().unwrap().push(update.clone());
        Ok(())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<()> {
        self.profile_updates.lock().unwrap().push(update.clone());
        Ok(())
    }

    async fn request_refund(&self, reference: &str, name: &str, email: &str) -> Result<()> {
        if self.fail_refund {
            return Err(anyhow!("refund backend down"));
        }
        self.refunds.lock().unwrap().push((
            reference.to_string(),
            name.to_string(),
            email.to_string(),
        ));
        Ok(())
    }

    async fn transfer_ownership(&self, req: &TransferRequest) -> Result<()> {
        self.transfers.lock().unwrap().push(req.clone());
        Ok(())
    }
}

// --- harness ---------------------------------------------------------------

const RUNNER: &str = "5547988776655";
const HOLDER: &str = "5547999887766";

fn runner() -> Registrant {
    Registrant {
        id: 2,
        name: "Rafaela Costa".into(),
        email: "rafaela@example.com".into(),
        birth_date: "1990-01-01".into(),
        cpf: "22233344455".into(),
        phone: RUNNER.into(),
    }
}

fn holder() -> Registrant {
    Registrant {
        id: 1,
        name: "Bruno Lima".into(),
        email: "bruno@example.com".into(),
        birth_date: "1985-05-05".into(),
        cpf: "11122233344".into(),
        phone: HOLDER.into(),
    }
}

fn new_holder() -> Registrant {
    Registrant {
        id: 3,
        name: "Carla Souza".into(),
        email: "carla@example.com".into(),
        birth_date: "1992-02-02".into(),
        cpf: "33344455566".into(),
        phone: "5511987654321".into(),
    }
}

fn events() -> Vec<EventSummary> {
    vec![
        EventSummary {
            id: "10".into(),
            title: "Corrida 10K".into(),
            category: None,
            slug: "corrida-10k".into(),
        },
        EventSummary {
            id: "20".into(),
            title: "Corrida 5K noturna especial".into(),
            category: None,
            slug: "corrida-5k".into(),
        },
    ]
}

fn test_config() -> Config {
    Config {
        api_base_url: "https://backend.example.test".into(),
        site_base_url: "https://site.example.test".into(),
        trigger_phrase: "Olá Bro".into(),
        extra_triggers: vec!["iniciar atendimento bro".into()],
        end_triggers: vec!["fim".into(), "encerrar".into()],
        openai_api_key: None,
        openai_model: "gpt-4o-mini".into(),
        whatsapp_token: "t".into(),
        whatsapp_phone_id: "p".into(),
        webhook_verify_token: "v".into(),
        web_host: "127.0.0.1".into(),
        web_port: 0,
    }
}

fn make_router(api: MockApi) -> (Arc<Router>, Arc<MemoryMessenger>, Arc<MockApi>) {
    let messenger = Arc::new(MemoryMessenger::default());
    let api = Arc::new(api);
    let router = Router::new(BotDeps {
        config: test_config(),
        messenger: Arc::clone(&messenger) as Arc<dyn Messenger>,
        api: Arc::clone(&api) as Arc<dyn RegistrationApi>,
        ai: Arc::new(ai_client::Passthrough),
    });
    (Arc::new(router), messenger, api)
}

/// Run the standard opening: trigger, CPF, land on the issue menu.
async fn open_session(router: &Router, from: &str, cpf: &str) {
    router.handle_message(from, "Olá Bro").await;
    router.handle_message(from, cpf).await;
}

fn find_token(body: &str) -> Option<String> {
    body.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_ascii_digit()))
        .find(|w| w.len() == 4 && w.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

fn br_date_days_ago(days: i64) -> String {
    (Local::now() - Duration::days(days))
        .format("%d/%m/%Y")
        .to_string()
}

// --- start gate and identity -----------------------------------------------

#[tokio::test]
async fn messages_before_the_trigger_are_ignored() {
    let (router, messenger, _) = make_router(MockApi::new().with_user(runner()));

    router.handle_message(RUNNER, "oi, tem alguém aí?").await;
    assert!(messenger.bodies_to(RUNNER).is_empty());

    router.handle_message(RUNNER, "olá bro, tudo bem?").await;
    let transcript = messenger.transcript_to(RUNNER);
    assert!(transcript.contains("CPF"));
}

#[tokio::test]
async fn known_cpf_leads_to_the_issue_menu() {
    let (router, messenger, _) = make_router(MockApi::new().with_user(runner()));

    open_session(&router, RUNNER, "222.333.444-55").await;
    let transcript = messenger.transcript_to(RUNNER);
    assert!(transcript.contains("Rafaela"));
    assert!(transcript.contains("Esqueci minha senha"));
}

#[tokio::test]
async fn unknown_cpf_offers_fix_or_signup() {
    let (router, messenger, _) = make_router(MockApi::new());

    router.handle_message(RUNNER, "Olá Bro").await;
    router.handle_message(RUNNER, "99988877766").await;
    assert!(messenger.transcript_to(RUNNER).contains("Criar cadastro"));

    router.handle_message(RUNNER, "2").await;
    assert!(messenger
        .transcript_to(RUNNER)
        .contains("https://site.example.test/v2/login.php"));
}

#[tokio::test]
async fn end_trigger_resets_and_restart_confirms_known_cpf() {
    let (router, messenger, _) = make_router(MockApi::new().with_user(runner()));

    open_session(&router, RUNNER, "22233344455").await;
    router.handle_message(RUNNER, "fim").await;
    assert!(messenger.transcript_to(RUNNER).contains("encerrado"));

    // Ignored again until the trigger...
    let before = messenger.bodies_to(RUNNER).len();
    router.handle_message(RUNNER, "1").await;
    assert_eq!(messenger.bodies_to(RUNNER).len(), before);

    // ...and "fim" keeps nothing, so a fresh CPF is requested.
    router.handle_message(RUNNER, "Olá Bro").await;
    let last = messenger.bodies_to(RUNNER).pop().unwrap();
    assert!(last.contains("CPF"));
}

// --- events ----------------------------------------------------------------

#[tokio::test]
async fn free_text_event_choice_uses_the_token_scorer() {
    let (router, messenger, _api) = make_router(
        MockApi::new().with_user(runner()).with_events(events()),
    );
    open_session(&router, RUNNER, "22233344455").await;

    router.handle_message(RUNNER, "3").await; // tamanho de camiseta
    assert!(messenger.transcript_to(RUNNER).contains("1. Corrida 10K"));

    // "10k" hits the short label harder than the long one
    router.handle_message(RUNNER, "10k").await;
    assert!(messenger
        .transcript_to(RUNNER)
        .contains("Anotei o evento *Corrida 10K*"));
}

#[tokio::test]
async fn unmatched_event_text_reprompts_without_losing_the_list() {
    let (router, messenger, _) = make_router(
        MockApi::new().with_user(runner()).with_events(events()),
    );
    open_session(&router, RUNNER, "22233344455").await;
    router.handle_message(RUNNER, "4").await; // equipe, needs an event

    router.handle_message(RUNNER, "maratona de inverno").await;
    let bodies = messenger.bodies_to(RUNNER);
    let menus = bodies
        .iter()
        .filter(|b| b.contains("1. Corrida 10K"))
        .count();
    assert_eq!(menus, 2, "menu shown again from the stored list");
}

// --- category --------------------------------------------------------------

fn category_api() -> MockApi {
    let mut api = MockApi::new().with_user(runner()).with_events(events());
    api.categories = vec![
        CategoryOption {
            registration_id: "501".into(),
            title: "5km".into(),
            description: None,
            price: Some("120,00".into()),
            fee: None,
        },
        CategoryOption {
            registration_id: "502".into(),
            title: "10km".into(),
            description: None,
            price: Some("180,00".into()),
            fee: Some("9,00".into()),
        },
    ];
    api
}

#[tokio::test]
async fn category_free_text_matches_on_the_listed_price() {
    let (router, _messenger, api) = make_router(category_api());
    open_session(&router, RUNNER, "22233344455").await;
    router.handle_message(RUNNER, "2").await; // categoria
    router.handle_message(RUNNER, "1").await; // Corrida 10K

    router.handle_message(RUNNER, "a de 180").await;
    let updates = api.updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].registration_id.as_deref(), Some("502"));
}

// --- tshirt ----------------------------------------------------------------

fn tshirt_api() -> MockApi {
    let mut api = MockApi::new().with_user(runner()).with_events(events());
    api.tshirts = TshirtCatalog {
        child: vec![TshirtSize {
            code: "INF10".into(),
            label: "Infantil 10".into(),
            available: 3,
        }],
        adult: vec![
            TshirtSize {
                code: "M".into(),
                label: "Adulto M".into(),
                available: 0,
            },
            TshirtSize {
                code: "BLP".into(),
                label: "Babylook P".into(),
                available: 5,
            },
        ],
    };
    api
}

#[tokio::test]
async fn out_of_stock_sizes_are_not_offered() {
    let (router, messenger, _) = make_router(tshirt_api());
    open_session(&router, RUNNER, "22233344455").await;
    router.handle_message(RUNNER, "3").await;
    router.handle_message(RUNNER, "1").await; // Corrida 10K

    let transcript = messenger.transcript_to(RUNNER);
    assert!(transcript.contains("Babylook P"));
    assert!(!transcript.contains("Adulto M"));
}

#[tokio::test]
async fn baby_look_spelling_matches_the_babylook_size() {
    let (router, _messenger, api) = make_router(tshirt_api());
    open_session(&router, RUNNER, "22233344455").await;
    router.handle_message(RUNNER, "3").await;
    router.handle_message(RUNNER, "1").await;

    router.handle_message(RUNNER, "baby look p").await;
    let updates = api.updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].tshirt_size.as_deref(), Some("BLP"));
    assert_eq!(updates[0].event_id, "10");
}

// --- cancellation ----------------------------------------------------------

fn cancel_record(status: &str, days_ago: i64) -> RegistrationRecord {
    RegistrationRecord {
        reference: "PAG-123".into(),
        status: status.into(),
        purchase_date: br_date_days_ago(days_ago),
        purchase_time: "10:00".into(),
        event_title: Some("Corrida 10K".into()),
    }
}

#[tokio::test]
async fn recent_paid_registration_can_be_cancelled() {
    let mut api = MockApi::new().with_user(runner()).with_events(events());
    api.registrations = vec![cancel_record("Pago", 2)];
    let (router, messenger, api) = make_router(api);

    open_session(&router, RUNNER, "22233344455").await;
    router.handle_message(RUNNER, "5").await;
    router.handle_message(RUNNER, "1").await; // event
    assert!(messenger.transcript_to(RUNNER).contains("PAG-123"));

    router.handle_message(RUNNER, "1").await; // registration
    router.handle_message(RUNNER, "sim").await;
    let refunds = api.refunds.lock().unwrap();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].0, "PAG-123");
    assert_eq!(refunds[0].1, "Rafaela Costa");
    assert_eq!(refunds[0].2, "rafaela@example.com");
}

#[tokio::test]
async fn old_purchases_are_outside_the_refund_window() {
    let mut api = MockApi::new().with_user(runner()).with_events(events());
    api.registrations = vec![cancel_record("Pago", 9)];
    let (router, messenger, api) = make_router(api);

    open_session(&router, RUNNER, "22233344455").await;
    router.handle_message(RUNNER, "5").await;
    router.handle_message(RUNNER, "1").await;

    assert!(messenger.transcript_to(RUNNER).contains("7 dias"));
    assert!(api.refunds.lock().unwrap().is_empty());
}

#[tokio::test]
async fn blocked_payment_status_redirects_instead_of_offering() {
    let mut api = MockApi::new().with_user(runner()).with_events(events());
    api.registrations = vec![cancel_record("Aguardando pagamento", 1)];
    let (router, messenger, _) = make_router(api);

    open_session(&router, RUNNER, "22233344455").await;
    router.handle_message(RUNNER, "5").await;
    router.handle_message(RUNNER, "1").await;

    let transcript = messenger.transcript_to(RUNNER);
    assert!(transcript.contains("1. Escolher outro evento"));
    assert!(!transcript.contains("PAG-123"));
}

#[tokio::test]
async fn failed_refund_offers_the_retry_menu() {
    let mut api = MockApi::new().with_user(runner()).with_events(events());
    api.registrations = vec![cancel_record("Disponível", 1)];
    api.fail_refund = true;
    let (router, messenger, _) = make_router(api);

    open_session(&router, RUNNER, "22233344455").await;
    router.handle_message(RUNNER, "5").await;
    router.handle_message(RUNNER, "1").await;
    router.handle_message(RUNNER, "1").await;
    router.handle_message(RUNNER, "sim").await;

    assert!(messenger.transcript_to(RUNNER).contains("1. Tentar novamente"));
}

// --- password --------------------------------------------------------------

#[tokio::test]
async fn password_flow_updates_changed_fields_and_sends_the_link() {
    let (router, messenger, api) = make_router(MockApi::new().with_user(runner()));
    open_session(&router, RUNNER, "22233344455").await;

    router.handle_message(RUNNER, "1").await;
    router.handle_message(RUNNER, "nova@example.com").await;
    router.handle_message(RUNNER, "sim").await;
    router.handle_message(RUNNER, "01/01/1990").await;
    router.handle_message(RUNNER, "sim").await;

    let updates = api.profile_updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].email.as_deref(), Some("nova@example.com"));
    // birthdate unchanged, so it is not resubmitted
    assert_eq!(updates[0].birth_date, None);
    assert!(messenger
        .transcript_to(RUNNER)
        .contains("https://site.example.test/v2/esquecisenha.php"));
}

// --- transfer handshake ----------------------------------------------------

async fn run_transfer_handshake(router: &Router) {
    open_session(router, RUNNER, "22233344455").await;
    router.handle_message(RUNNER, "6").await; // transfer
    router.handle_message(RUNNER, "1").await; // event: Corrida 10K
    router.handle_message(RUNNER, "2").await; // not the holder
    router.handle_message(RUNNER, "11122233344").await; // holder CPF
    router.handle_message(RUNNER, "1").await; // confirm holder
    router.handle_message(RUNNER, "33344455566").await; // new holder CPF
    router.handle_message(RUNNER, "1").await; // confirm new holder
}

fn transfer_api() -> MockApi {
    MockApi::new()
        .with_user(runner())
        .with_user(holder())
        .with_user(new_holder())
        .with_events(events())
}

#[tokio::test]
async fn holder_receives_the_token_and_can_authorize() {
    let (router, messenger, api) = make_router(transfer_api());
    run_transfer_handshake(&router).await;

    let holder_msgs = messenger.bodies_to(HOLDER);
    assert_eq!(holder_msgs.len(), 1);
    let token = find_token(&holder_msgs[0]).expect("token in holder message");
    assert!(holder_msgs[0].contains("Carla Souza"));

    router.handle_message(HOLDER, &format!("{token} 1")).await;

    let transfers = api.transfers.lock().unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].old_user_id, 1);
    assert_eq!(transfers[0].new_user_id, 3);
    assert_eq!(transfers[0].event_id, "10");
    assert!(messenger.transcript_to(RUNNER).contains("concluída"));
}

#[tokio::test]
async fn token_with_an_ambiguous_suffix_is_not_an_authorization() {
    let (router, messenger, api) = make_router(transfer_api());
    run_transfer_handshake(&router).await;

    let token = find_token(&messenger.bodies_to(HOLDER)[0]).unwrap();
    router
        .handle_message(HOLDER, &format!("{token} o que é isso?"))
        .await;

    assert!(api.transfers.lock().unwrap().is_empty());
    assert!(router.transfers().get(&token).is_some(), "token stays pending");

    // an explicit answer still resolves it afterwards
    router.handle_message(HOLDER, &format!("{token} 1")).await;
    assert_eq!(api.transfers.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn token_from_a_foreign_phone_is_ignored() {
    let (router, messenger, api) = make_router(transfer_api());
    run_transfer_handshake(&router).await;

    let token = find_token(&messenger.bodies_to(HOLDER)[0]).unwrap();
    let foreign = "5599999999999";
    router.handle_message(foreign, &format!("{token} 1")).await;

    assert!(api.transfers.lock().unwrap().is_empty());
    // the foreign phone has no started session, so it gets nothing back
    assert!(messenger.bodies_to(foreign).is_empty());

    // the real holder can still resolve it afterwards
    router.handle_message(HOLDER, &format!("{token} 1")).await;
    assert_eq!(api.transfers.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn holder_denial_cancels_and_offers_retry() {
    let (router, messenger, api) = make_router(transfer_api());
    run_transfer_handshake(&router).await;

    let token = find_token(&messenger.bodies_to(HOLDER)[0]).unwrap();
    router.handle_message(HOLDER, &format!("{token} 2")).await;

    assert!(api.transfers.lock().unwrap().is_empty());
    let transcript = messenger.transcript_to(RUNNER);
    assert!(transcript.contains("não autorizou"));
    assert!(transcript.contains("1. Tentar a transferência novamente"));
}

#[tokio::test]
async fn expired_token_notifies_both_parties() {
    let (router, messenger, api) = make_router(transfer_api());
    run_transfer_handshake(&router).await;

    let token = find_token(&messenger.bodies_to(HOLDER)[0]).unwrap();
    // Age the authorization past its deadline.
    let mut auth = router.transfers().remove(&token).unwrap();
    auth.expires_at = chrono::Utc::now() - Duration::minutes(1);
    router.transfers().insert(auth);

    router.handle_message(HOLDER, &format!("{token} 1")).await;

    assert!(api.transfers.lock().unwrap().is_empty());
    assert!(messenger.transcript_to(HOLDER).contains("expirou"));
    assert!(messenger.transcript_to(RUNNER).contains("expirou"));
    assert!(router.transfers().get(&token).is_none());
}

#[tokio::test]
async fn requester_who_is_the_holder_authorizes_inline() {
    // The session phone matches the holder's profile phone.
    let (router, messenger, api) = make_router(transfer_api());
    open_session(&router, HOLDER, "11122233344").await;
    router.handle_message(HOLDER, "6").await;
    router.handle_message(HOLDER, "1").await; // event
    router.handle_message(HOLDER, "1").await; // I am the holder
    router.handle_message(HOLDER, "33344455566").await;
    router.handle_message(HOLDER, "1").await; // confirm new holder

    assert!(messenger.transcript_to(HOLDER).contains("você autoriza"));
    router.handle_message(HOLDER, "1").await;

    let transfers = api.transfers.lock().unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].old_user_id, 1);
    assert_eq!(transfers[0].new_user_id, 3);
}

// --- wrap-up ---------------------------------------------------------------

#[tokio::test]
async fn more_help_yes_reopens_the_menu() {
    let (router, messenger, _) = make_router(tshirt_api());
    open_session(&router, RUNNER, "22233344455").await;
    router.handle_message(RUNNER, "3").await;
    router.handle_message(RUNNER, "1").await;
    router.handle_message(RUNNER, "2").await; // Babylook P, lands on more-help

    let before = messenger
        .bodies_to(RUNNER)
        .iter()
        .filter(|b| b.contains("Esqueci minha senha"))
        .count();
    router.handle_message(RUNNER, "sim").await;
    let after = messenger
        .bodies_to(RUNNER)
        .iter()
        .filter(|b| b.contains("Esqueci minha senha"))
        .count();
    assert_eq!(after, before + 1);
}

#[tokio::test]
async fn negated_more_help_reply_ends_the_conversation() {
    let (router, messenger, _) = make_router(tshirt_api());
    open_session(&router, RUNNER, "22233344455").await;
    router.handle_message(RUNNER, "3").await;
    router.handle_message(RUNNER, "1").await;
    router.handle_message(RUNNER, "2").await; // lands on more-help

    router
        .handle_message(RUNNER, "não preciso de mais ajuda, obrigada")
        .await;
    let last = messenger.bodies_to(RUNNER).pop().unwrap();
    assert!(
        !last.contains("Esqueci minha senha"),
        "menu must not reopen: {last}"
    );
    assert!(last.contains("👋"));
}

#[tokio::test]
async fn restart_after_a_polite_end_confirms_the_cpf_on_file() {
    let (router, messenger, _) = make_router(tshirt_api());
    open_session(&router, RUNNER, "22233344455").await;
    router.handle_message(RUNNER, "3").await;
    router.handle_message(RUNNER, "1").await;
    router.handle_message(RUNNER, "2").await; // lands on more-help

    router.handle_message(RUNNER, "obrigada").await; // polite end
    router.handle_message(RUNNER, "Olá Bro").await;
    let last = messenger.bodies_to(RUNNER).pop().unwrap();
    assert!(last.contains("222.333.444-55"), "CPF on file is confirmed: {last}");
}
