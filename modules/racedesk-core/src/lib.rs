//! Conversational core of the support assistant.
//!
//! Everything stateful lives here: the session store, the step state
//! machine, the flow modules and the ownership-transfer authorization
//! registry. I/O happens only through the dyn traits in [`traits`], so
//! the whole dialogue can be driven in tests with in-memory fakes.

pub mod dates;
pub mod deps;
pub mod flows;
pub mod fuzzy;
pub mod phone;
pub mod router;
pub mod session;
pub mod text;
pub mod traits;
pub mod transfer;

pub use deps::BotDeps;
pub use router::Router;
pub use session::{Issue, Pending, Session, SessionStore, Step};
pub use traits::{Messenger, RegistrationApi};
pub use transfer::{TransferAuthorization, TransferRegistry};
