//! # scout-report
//!
//! Test execution and reporting for Scout.
//!
//! This crate provides:
//! - A TestRunner trait with a pytest subprocess implementation
//! - The ExecutionReporter, with bounded parallelism and failure captures
//! - JUnit XML and text rendering, and the on-disk report collection

mod junit;
mod report_store;
mod reporter;
mod runner;

pub use junit::{render_junit, render_summary};
pub use report_store::ReportStore;
pub use reporter::{ExecutionReporter, FailureCapturer};
pub use runner::{classify, PytestRunner, RunOutput, TestRunner};
