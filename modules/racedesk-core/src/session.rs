//! Per-contact conversation state.
//!
//! Sessions are keyed by digits-only phone and wrapped in an async
//! mutex so messages from the same contact are handled one at a time;
//! different contacts never block each other.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use racedesk_common::{CategoryOption, EventSummary, Registrant};
use tokio::sync::Mutex;

/// Where the conversation currently waits for input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    /// No flow in progress; only the trigger phrase is honored.
    #[default]
    Idle,
    AwaitingCpf,
    AwaitingCpfVerify,
    AwaitingEvent,
    AwaitingIssue,
    AwaitingMoreHelp,
    AwaitingNoCategoryAction,
    AwaitingCategoryChoice,
    AwaitingNoTshirtAction,
    AwaitingTshirtChoice,
    AwaitingTeamName,
    AwaitingTeamConfirm,
    AwaitingCancelRedirect,
    AwaitingNoCancelAction,
    AwaitingCancelChoice,
    AwaitingCancelConfirm,
    AwaitingCancelRetry,
    AwaitingRefundName,
    AwaitingRefundEmail,
    AwaitingEmailConfirm,
    AwaitingEmailVerification,
    AwaitingBirthdateConfirm,
    AwaitingBirthdateVerification,
    AwaitingFaqMenu,
    AwaitingHolderRole,
    AwaitingHolderCpf,
    AwaitingHolderConfirm,
    AwaitingTransferCpf,
    AwaitingTransferConfirm,
    AwaitingTransferSelfConfirm,
    AwaitingTransferRetry,
    AwaitingTransferResult,
}

/// What the registrant asked for, carried across detours (CPF lookup,
/// event selection) until the flow can actually start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Issue {
    Password,
    Category,
    TshirtSize,
    TeamName,
    Cancel,
    Transfer,
    Faq,
    FaqContact,
    ChooseEvent,
}

/// The event the session is working on.
#[derive(Debug, Clone, Default)]
pub struct EventRef {
    pub id: String,
    pub title: String,
    pub slug: String,
}

impl From<&EventSummary> for EventRef {
    fn from(ev: &EventSummary) -> Self {
        Self {
            id: ev.id.clone(),
            title: ev.title.clone(),
            slug: ev.slug.clone(),
        }
    }
}

/// A shirt size option offered in the last menu, in menu order.
#[derive(Debug, Clone)]
pub struct TshirtChoice {
    pub code: String,
    pub label: String,
}

/// A cancellable registration offered in the last menu.
#[derive(Debug, Clone)]
pub struct CancelChoice {
    pub reference: String,
    pub event_title: String,
    pub date: String,
    pub time: String,
}

/// One side of an ownership transfer.
#[derive(Debug, Clone, Default)]
pub struct Holder {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub cpf: String,
}

impl From<&Registrant> for Holder {
    fn from(r: &Registrant) -> Self {
        Self {
            id: r.id,
            name: r.name.clone(),
            phone: r.phone.clone(),
            cpf: r.cpf.clone(),
        }
    }
}

/// In-progress transfer parties. `candidate_*` hold lookups awaiting
/// confirmation; they are promoted on "yes" and dropped on "no".
#[derive(Debug, Clone, Default)]
pub struct TransferDraft {
    pub old_holder: Option<Holder>,
    pub candidate_old: Option<Holder>,
    pub new_holder: Option<Holder>,
    pub candidate_new: Option<Holder>,
}

/// Scratch state for the step the session is waiting on. Fields are
/// only meaningful for their owning steps and are cleared on context
/// switches.
#[derive(Debug, Clone, Default)]
pub struct Pending {
    pub desired_issue: Option<Issue>,
    pub events: Vec<EventSummary>,
    pub category_options: Vec<CategoryOption>,
    pub tshirt_choices: Vec<TshirtChoice>,
    pub cancel_choices: Vec<CancelChoice>,
    pub cancel_ref: Option<String>,
    pub team_name: Option<String>,
    pub new_email: Option<String>,
    pub new_birth: Option<String>,
    /// The "not found" CPF menu (1 correct / 2 sign up) is showing.
    pub cpf_choice_menu: bool,
    pub transfer: Option<TransferDraft>,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Set once the trigger phrase is seen; until then inbound text is
    /// ignored.
    pub started: bool,
    pub step: Step,
    pub user: Option<Registrant>,
    pub event: Option<EventRef>,
    pub pending: Pending,
}

impl Session {
    /// Full reset, as if the contact had never written.
    pub fn reset(&mut self) {
        *self = Session::default();
    }

    /// Wind down a finished conversation but remember who this is, so a
    /// restart can confirm the CPF on file instead of asking again.
    pub fn end_conversation(&mut self) {
        let user = self.user.take();
        *self = Session::default();
        self.user = user;
    }

    /// Drop the selected event and every menu derived from it.
    /// `keep_desired` preserves the queued issue so it can resume after
    /// a new event is chosen.
    pub fn clear_event_context(&mut self, keep_desired: bool) {
        self.event = None;
        self.pending.events.clear();
        self.pending.category_options.clear();
        self.pending.tshirt_choices.clear();
        self.pending.cancel_choices.clear();
        self.pending.cancel_ref = None;
        if !keep_desired {
            self.pending.desired_issue = None;
        }
    }
}

/// Concurrent session map. Lookup takes a short synchronous lock; the
/// returned handle serializes handling per contact.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Arc<Mutex<Session>>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, key: &str) -> Arc<Mutex<Session>> {
        if let Ok(map) = self.inner.read() {
            if let Some(cell) = map.get(key) {
                return Arc::clone(cell);
            }
        }
        let mut map = match self.inner.write() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(map.entry(key.to_string()).or_default())
    }

    pub fn get(&self, key: &str) -> Option<Arc<Mutex<Session>>> {
        self.inner.read().ok()?.get(key).map(Arc::clone)
    }
}

// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_returns_the_same_cell_per_key() {
        let store = SessionStore::new();
        let a = store.get_or_create("5547999887766");
        let b = store.get_or_create("5547999887766");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(store.get("5547000000000").is_none());
    }

    #[tokio::test]
    async fn clear_event_context_can_keep_the_queued_issue() {
        let store = SessionStore::new();
        let cell = store.get_or_create("1");
        let mut sess = cell.lock().await;
        sess.event = Some(EventRef::default());
        sess.pending.desired_issue = Some(Issue::Cancel);
        sess.pending.cancel_ref = Some("ref-1".into());

        sess.clear_event_context(true);
        assert!(sess.event.is_none());
        assert!(sess.pending.cancel_ref.is_none());
        assert_eq!(sess.pending.desired_issue, Some(Issue::Cancel));

        sess.clear_event_context(false);
        assert_eq!(sess.pending.desired_issue, None);
    }
}
