//! # scout-orchestrator
//!
//! Agent loop for Scout.
//!
//! This crate provides:
//! - A pure state machine for loop control flow and step accounting
//! - The AgentLoopController that drives model and browser per session
//! - Bounded prompt construction from session history
//! - Activity logging and session trace persistence

mod activity_logger;
mod loop_engine;
mod prompt;
mod session_store;
mod state_machine;

pub use activity_logger::ActivityLogger;
pub use loop_engine::{AgentLoopController, LoopOptions};
pub use prompt::{build_prompt_context, html_excerpt, PromptOptions, DEFAULT_GOAL};
pub use session_store::{list_sessions, load_session, save_session};
pub use state_machine::{transition, Directive, LoopEvent, LoopPolicy, LoopState};
