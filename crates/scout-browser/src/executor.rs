//! Action executor
//!
//! Each action tag maps to exactly one driver operation, followed by an
//! observation (URL, DOM, screenshot). CLICK and TYPE walk the selector tiers
//! strongest first and record which one succeeded.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use scout_core::config::BrowserConfig;
use scout_core::{
    ActionError, ActionRequest, Observation, ResolvedSelector, SelectorHint, WaitCondition,
};

use crate::driver::{BrowserDriver, ElementAction, LocateOutcome};
use crate::locator::strategies_for;

/// Applies one abstract action to the browser
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn apply(&self, action: &ActionRequest) -> Result<Observation, ActionError>;
}

/// Timing knobs for the driver-backed executor
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub navigation_timeout: Duration,
    pub network_quiet: Duration,
    pub network_settle_timeout: Duration,
    /// Per-tier wait when locating an element
    pub locate_timeout: Duration,
    /// Settle window after a click or type, which may trigger navigation
    pub post_action_settle: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self::from_config(&BrowserConfig::default())
    }
}

impl ExecutorOptions {
    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            navigation_timeout: config.navigation_timeout(),
            network_quiet: Duration::from_millis(config.network_quiet_ms),
            network_settle_timeout: Duration::from_secs(config.network_settle_timeout_secs),
            locate_timeout: Duration::from_secs(3),
            post_action_settle: Duration::from_secs(2),
        }
    }
}

/// ActionExecutor over any [`BrowserDriver`]
pub struct DriverActionExecutor<D> {
    driver: D,
    options: ExecutorOptions,
}

impl<D: BrowserDriver> DriverActionExecutor<D> {
    pub fn new(driver: D, options: ExecutorOptions) -> Self {
        Self { driver, options }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    async fn observe(
        &self,
        status: String,
        resolved: Option<ResolvedSelector>,
    ) -> Result<Observation, ActionError> {
        let url = self.driver.current_url().await?;
        let html = self.driver.dom_snapshot().await?;
        let screenshot = self.driver.screenshot().await?;
        debug!(
            "Observed {} ({} html bytes, {} screenshot bytes)",
            url,
            html.len(),
            screenshot.len()
        );
        Ok(Observation {
            url,
            html,
            screenshot,
            status,
            resolved,
        })
    }

    /// Walk the tiers until one locates the element and the action applies
    async fn resolve(
        &self,
        hint: &SelectorHint,
        action: &ElementAction,
        timeout: Duration,
    ) -> Result<Option<ResolvedSelector>, ActionError> {
        let strategies = strategies_for(hint);
        if strategies.is_empty() {
            return Err(ActionError::selector_not_found(format!(
                "hint '{}' yields no selector",
                hint
            )));
        }

        for (idx, strategy) in strategies.iter().enumerate() {
            match self.driver.locate_and_act(strategy, action, timeout).await? {
                LocateOutcome::Acted => {
                    debug!(
                        "Resolved '{}' via {} tier: {}",
                        hint, strategy.tier, strategy.selector_text
                    );
                    let fallback_selectors = strategies
                        .iter()
                        .enumerate()
                        .filter(|(i, s)| *i != idx && s.selector_text != strategy.selector_text)
                        .map(|(_, s)| s.selector_text.clone())
                        .collect();
                    return Ok(Some(ResolvedSelector {
                        tier: strategy.tier,
                        selector_text: strategy.selector_text.clone(),
                        element_type: strategy.element_type.clone(),
                        role: strategy.role.clone(),
                        name: strategy.name.clone(),
                        fallback_selectors,
                    }));
                }
                LocateOutcome::NotFound => {
                    debug!("{} tier missed: {}", strategy.tier, strategy.selector_text);
                }
            }
        }
        Ok(None)
    }

    async fn resolve_required(
        &self,
        hint: &SelectorHint,
        action: &ElementAction,
    ) -> Result<ResolvedSelector, ActionError> {
        self.resolve(hint, action, self.options.locate_timeout)
            .await?
            .ok_or_else(|| {
                ActionError::selector_not_found(format!("no tier matched '{}'", hint))
            })
    }

    async fn settle(&self, timeout: Duration) -> Result<bool, ActionError> {
        self.driver
            .wait_for_network_settled(self.options.network_quiet, timeout)
            .await
    }
}

#[async_trait]
impl<D: BrowserDriver> ActionExecutor for DriverActionExecutor<D> {
    async fn apply(&self, action: &ActionRequest) -> Result<Observation, ActionError> {
        info!("Applying {}", action);
        match action {
            ActionRequest::Navigate { url } => {
                let status = self
                    .driver
                    .navigate(url, self.options.navigation_timeout)
                    .await?;
                self.settle(self.options.network_settle_timeout).await?;
                self.observe(status, None).await
            }
            ActionRequest::Click { selector_hint } => {
                let resolved = self
                    .resolve_required(selector_hint, &ElementAction::Click)
                    .await?;
                self.settle(self.options.post_action_settle).await?;
                let status = format!("clicked {}", resolved.selector_text);
                self.observe(status, Some(resolved)).await
            }
            ActionRequest::Type {
                selector_hint,
                text,
            } => {
                let resolved = self
                    .resolve_required(selector_hint, &ElementAction::Type(text.clone()))
                    .await?;
                self.settle(self.options.post_action_settle).await?;
                let status = format!("typed {} chars into {}", text.chars().count(), resolved.selector_text);
                self.observe(status, Some(resolved)).await
            }
            ActionRequest::Wait { condition } => match condition {
                WaitCondition::Millis { ms } => {
                    tokio::time::sleep(Duration::from_millis(*ms)).await;
                    self.observe(format!("waited {}ms", ms), None).await
                }
                WaitCondition::Selector { hint } => {
                    let resolved = self
                        .resolve(hint, &ElementAction::Exists, self.options.network_settle_timeout)
                        .await?
                        .ok_or_else(|| {
                            ActionError::timeout(format!("'{}' did not appear", hint))
                        })?;
                    let status = format!("found {}", resolved.selector_text);
                    self.observe(status, Some(resolved)).await
                }
                WaitCondition::NetworkSettled => {
                    if !self.settle(self.options.network_settle_timeout).await? {
                        return Err(ActionError::timeout(format!(
                            "network did not settle within {:?}",
                            self.options.network_settle_timeout
                        )));
                    }
                    self.observe("network settled".to_string(), None).await
                }
            },
            ActionRequest::Screenshot => self.observe("screenshot captured".to_string(), None).await,
            ActionRequest::Complete { .. } => Err(ActionError::driver(
                "COMPLETE is terminal and has no browser operation",
            )),
        }
    }
}
