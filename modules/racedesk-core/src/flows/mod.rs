//! Conversation flows, one module per subject. Each module extends
//! [`crate::router::Router`] with the handlers for its steps.

pub mod cancel;
pub mod category;
pub mod events;
pub mod faq;
pub mod identity;
pub mod menu;
pub mod password;
pub mod team;
pub mod transfer;
pub mod tshirt;
