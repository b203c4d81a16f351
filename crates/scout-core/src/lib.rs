//! # scout-core
//!
//! Core types for the Scout UI test discovery system.
//!
//! Scout drives a browser against a target web application, lets a multimodal
//! model propose interaction steps, and distills the resulting trace into
//! reviewable test cases.
//!
//! ## Core Paradigm
//!
//! - Captures ARE content-addressed (equal hash means interchangeable)
//! - Sessions ARE append-only traces owned by one loop
//! - Approved tests ARE write-once from the system's perspective
//! - Reports ARE keyed by run timestamp

pub mod config;
mod error;
pub mod fail_open;
mod types;

pub use config::ScoutConfig;
pub use error::{
    truncate_chars, ActionError, ActionErrorKind, LifecycleError, ModelError, ModelErrorKind,
    Result, ScoutError, SynthesisError, MAX_ERROR_BODY_CHARS,
};
pub use types::*;
