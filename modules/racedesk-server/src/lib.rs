//! HTTP surface of the assistant: the WhatsApp webhook and health.

pub mod routes;
