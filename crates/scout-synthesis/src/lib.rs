//! Scout Synthesis - session traces to governed test artifacts
//!
//! This crate groups a finished session's turns by page and renders each group
//! as a pytest-playwright test case in DRAFT status, with scored selectors.

pub mod naming;
pub mod selectors;
pub mod synthesizer;
pub mod templates;

pub use naming::{claim_name, page_key, test_name_for_url};
pub use selectors::{is_dynamic, selector_info, stability_score};
pub use synthesizer::{PageGroup, TestSynthesizer};
pub use templates::{locator_expr, render_test_module, step_lines, PageTest};
