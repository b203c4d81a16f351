//! # scout-lifecycle
//!
//! Test case governance for Scout.
//!
//! This crate provides:
//! - The DRAFT / APPROVED / DEPRECATED state machine, serialized per case
//! - Write-once protection for approved test code
//! - The on-disk `tests/{draft,approved,deprecated}` layout

mod manager;
mod store;

pub use manager::LifecycleManager;
pub use store::TestCaseStore;
