//! # scout-agent
//!
//! Model gateway for Scout's exploration loop.
//!
//! The gateway turns one [`PromptContext`] into one [`scout_core::ModelReply`]:
//! - A structured function call becomes an `ActionRequest`
//! - A text-only reply is read as COMPLETE with the text as summary
//! - Anything unparseable is `MALFORMED_RESPONSE`
//!
//! ## Key Pattern
//!
//! Every call is a single request with no retry. Rate limits, auth failures
//! and timeouts surface to the loop immediately, which fails the session.

mod auth;
mod client;
mod gateway;
pub mod schema;
mod types;

pub use auth::{get_api_key, FALLBACK_API_KEY_ENV};
pub use client::GeminiGateway;
pub use gateway::{HistoryEntry, ModelGateway, ObservationContext, PromptContext};
pub use schema::{action_declarations, parse_function_call, parse_response, SYSTEM_INSTRUCTION};
pub use types::*;
