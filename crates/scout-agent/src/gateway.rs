//! The model gateway seam and the context handed across it

use async_trait::async_trait;
use scout_core::{ContentHash, ModelError, ModelReply};

/// One prior turn as summarized for the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub turn_index: usize,
    /// Human-readable action, e.g. `CLICK text='Sign in'`
    pub action: String,
    /// Driver status or error text
    pub status: String,
    /// `new page <hash>`, `unchanged`, or `same as turn N`
    pub observation: String,
}

/// The latest observation, already bounded for the prompt
#[derive(Debug, Clone)]
pub struct ObservationContext {
    pub url: String,
    pub html_excerpt: String,
    pub html_truncated: bool,
    /// Latest screenshot, always sent whole
    pub screenshot_png: Vec<u8>,
    pub content_hash: ContentHash,
    pub status: String,
}

/// Everything one inference needs
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub goal: String,
    pub target_url: String,
    /// 1-based step being inferred
    pub step: usize,
    pub max_steps: usize,
    pub history: Vec<HistoryEntry>,
    /// Older turns dropped from `history`
    pub omitted_turns: usize,
    pub observation: ObservationContext,
}

impl PromptContext {
    /// Render the text part of the prompt
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("## Goal\n{}\n\n", self.goal));
        out.push_str(&format!("Target application: {}\n", self.target_url));
        out.push_str(&format!("Step {} of {}\n\n", self.step, self.max_steps));

        out.push_str("## History\n");
        if self.history.is_empty() {
            out.push_str("No actions taken yet.\n");
        } else {
            if self.omitted_turns > 0 {
                out.push_str(&format!("({} earlier turns omitted)\n", self.omitted_turns));
            }
            for entry in &self.history {
                out.push_str(&format!(
                    "- Turn {}: {} -> {} [{}]\n",
                    entry.turn_index, entry.action, entry.status, entry.observation
                ));
            }
        }

        let obs = &self.observation;
        out.push_str("\n## Current page\n");
        out.push_str(&format!("URL: {}\n", obs.url));
        out.push_str(&format!("Status: {}\n", obs.status));
        out.push_str(&format!("Capture: {}\n", obs.content_hash.short()));
        out.push_str("The attached image is the current screenshot.\n\n");
        out.push_str("```html\n");
        out.push_str(&obs.html_excerpt);
        if obs.html_truncated {
            out.push_str("\n<!-- truncated -->");
        }
        out.push_str("\n```\n\n");
        out.push_str(
            "Call exactly one function for the next action, or call `complete` \
             when the main workflows have been explored.\n",
        );
        out
    }
}

/// Wraps the generative model call
///
/// Implementations make exactly one attempt per call and never retry.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Infer the next action for the given context
    async fn infer(&self, context: &PromptContext) -> Result<ModelReply, ModelError>;

    /// Model identifier recorded on sessions
    fn model_name(&self) -> &str;
}
