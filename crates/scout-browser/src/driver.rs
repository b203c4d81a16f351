//! Browser driver seam

use async_trait::async_trait;
use scout_core::{ActionError, SelectorTier};
use std::time::Duration;

/// How the driver finds an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

/// One concrete way of locating the element a hint refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorStrategy {
    pub tier: SelectorTier,
    pub locator: Locator,
    /// Playwright-style rendering recorded on the resolved selector
    pub selector_text: String,
    pub element_type: String,
    pub role: Option<String>,
    pub name: Option<String>,
}

/// What to do with a located element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementAction {
    Click,
    /// Clear the field, then type the text
    Type(String),
    /// Only confirm the element is present
    Exists,
}

/// Result of a locate-and-act call that did not hit a driver error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateOutcome {
    Acted,
    NotFound,
}

/// Synchronous-style browser operations consumed by the action executor
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Load a URL; returns a status line
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<String, ActionError>;

    /// Wait until no new network resources appear for `quiet`
    ///
    /// Returns `false` if `timeout` elapsed first.
    async fn wait_for_network_settled(
        &self,
        quiet: Duration,
        timeout: Duration,
    ) -> Result<bool, ActionError>;

    /// PNG bytes of the visible viewport
    async fn screenshot(&self) -> Result<Vec<u8>, ActionError>;

    /// Serialized DOM
    async fn dom_snapshot(&self) -> Result<String, ActionError>;

    async fn current_url(&self) -> Result<String, ActionError>;

    /// Locate an element with one strategy and apply the action to it
    async fn locate_and_act(
        &self,
        strategy: &SelectorStrategy,
        action: &ElementAction,
        timeout: Duration,
    ) -> Result<LocateOutcome, ActionError>;
}
