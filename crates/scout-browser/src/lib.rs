//! Browser actuation and page capture for Scout
//!
//! This crate drives a Chrome/Chromium browser through the Chrome DevTools
//! Protocol and turns abstract [`scout_core::ActionRequest`]s into
//! [`scout_core::Observation`]s.
//!
//! # Architecture
//!
//! - [`driver`]: the [`BrowserDriver`] seam (navigate, screenshot, DOM, locate-and-act)
//! - [`browser`]: headless Chrome implementation of the driver
//! - [`locator`]: tiered selector strategies built from a model's selector hint
//! - [`executor`]: [`ActionExecutor`] mapping each action onto one driver operation
//! - [`capture_store`]: content-addressed, insert-if-absent capture storage
//!
//! # Requirements
//!
//! - Chrome or Chromium installed for [`BrowserSession`]
//! - Everything else is testable against a fake driver

pub mod browser;
pub mod capture_store;
pub mod driver;
pub mod executor;
pub mod locator;

pub use browser::BrowserSession;
pub use capture_store::CaptureStore;
pub use driver::{BrowserDriver, ElementAction, LocateOutcome, Locator, SelectorStrategy};
pub use executor::{ActionExecutor, DriverActionExecutor, ExecutorOptions};
pub use locator::strategies_for;
