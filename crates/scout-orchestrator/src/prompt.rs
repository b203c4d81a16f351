//! Prompt context builder for loop steps
//!
//! Builds a bounded [`PromptContext`] from the session so far:
//! - The most recent `history_window` turns, each summarized in one line
//! - Repeated observations named by the turn that first produced them
//! - An HTML excerpt cut to the character budget (scripts and styles removed)
//! - The latest screenshot, never truncated

use regex::Regex;
use std::sync::OnceLock;

use scout_agent::{HistoryEntry, ObservationContext, PromptContext};
use scout_core::{AgentSession, ContentHash, Observation, Turn};

/// Default exploration goal
pub const DEFAULT_GOAL: &str = "Explore the main user workflows of this application \
(navigation, forms, key content) so that each can become an automated UI test.";

/// Bounds applied when building a prompt
#[derive(Debug, Clone)]
pub struct PromptOptions {
    pub goal: String,
    pub html_char_budget: usize,
    pub history_window: usize,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            goal: DEFAULT_GOAL.to_string(),
            html_char_budget: 20_000,
            history_window: 12,
        }
    }
}

fn noise_pattern() -> &'static Regex {
    static NOISE: OnceLock<Regex> = OnceLock::new();
    NOISE.get_or_init(|| {
        Regex::new(r"(?is)<script\b[^>]*>.*?</script>|<style\b[^>]*>.*?</style>|<!--.*?-->|<svg\b[^>]*>.*?</svg>")
            .expect("static regex")
    })
}

/// Strip non-content markup and cut to `budget` characters
///
/// Returns the excerpt and whether it was truncated.
pub fn html_excerpt(html: &str, budget: usize) -> (String, bool) {
    let stripped = noise_pattern().replace_all(html, "");
    let compact = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    match compact.char_indices().nth(budget) {
        Some((idx, _)) => (compact[..idx].to_string(), true),
        None => (compact, false),
    }
}

/// Where a content hash was first observed
fn first_seen(session: &AgentSession, hash: &ContentHash, before: usize) -> Option<String> {
    if session.initial_capture.as_ref() == Some(hash) {
        return Some("initial page".to_string());
    }
    session
        .turns
        .iter()
        .take(before)
        .find(|t| t.observation_ref.as_ref() == Some(hash))
        .map(|t| format!("turn {}", t.turn_index))
}

fn history_entry(session: &AgentSession, turn: &Turn) -> HistoryEntry {
    let action = turn
        .action_taken
        .as_ref()
        .unwrap_or(&turn.model_response.action)
        .to_string();

    let status = match (&turn.error, &turn.page_url) {
        (Some(err), _) => format!("error: {}", err),
        (None, Some(url)) => format!("ok, now at {}", url),
        (None, None) => "ok".to_string(),
    };

    let observation = match &turn.observation_ref {
        None => "no observation".to_string(),
        Some(hash) if turn.stalled => match first_seen(session, hash, turn.turn_index) {
            Some(origin) => format!("unchanged, same as {}", origin),
            None => "unchanged".to_string(),
        },
        Some(hash) => format!("new page {}", hash.short()),
    };

    HistoryEntry {
        turn_index: turn.turn_index,
        action,
        status,
        observation,
    }
}

/// Build the prompt context for the inference that begins `step`
pub fn build_prompt_context(
    session: &AgentSession,
    observation: &Observation,
    content_hash: &ContentHash,
    step: usize,
    max_steps: usize,
    options: &PromptOptions,
) -> PromptContext {
    let skip = session.turns.len().saturating_sub(options.history_window);
    let history = session
        .turns
        .iter()
        .skip(skip)
        .map(|t| history_entry(session, t))
        .collect();

    let (html_excerpt, html_truncated) = html_excerpt(&observation.html, options.html_char_budget);

    PromptContext {
        goal: options.goal.clone(),
        target_url: session.target_url.clone(),
        step,
        max_steps,
        history,
        omitted_turns: skip,
        observation: ObservationContext {
            url: observation.url.clone(),
            html_excerpt,
            html_truncated,
            screenshot_png: observation.screenshot.clone(),
            content_hash: content_hash.clone(),
            status: observation.status.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scout_core::{ActionRequest, ModelReply, SelectorHint};

    fn turn(index: usize, hash: &str, stalled: bool) -> Turn {
        let action = ActionRequest::Click {
            selector_hint: SelectorHint::bare(format!("Item {}", index)),
        };
        Turn {
            turn_index: index,
            prompt_context_ref: None,
            model_response: ModelReply::action(action.clone()),
            action_taken: Some(action),
            observation_ref: Some(ContentHash(hash.into())),
            page_url: Some("https://example.com/".into()),
            resolved_selector: None,
            stalled,
            error: None,
            started_at: Utc::now(),
        }
    }

    fn observation(html: &str) -> Observation {
        Observation {
            url: "https://example.com/".into(),
            html: html.into(),
            screenshot: vec![7; 4096],
            status: "clicked".into(),
            resolved: None,
        }
    }

    #[test]
    fn test_excerpt_strips_scripts_and_truncates() {
        let html = "<html><script>var x = 1;</script><style>p{}</style><p>Hello   world</p></html>";
        let (excerpt, truncated) = html_excerpt(html, 1000);
        assert_eq!(excerpt, "<html><p>Hello world</p></html>");
        assert!(!truncated);

        let (excerpt, truncated) = html_excerpt(html, 10);
        assert_eq!(excerpt.chars().count(), 10);
        assert!(truncated);
    }

    #[test]
    fn test_history_window_and_stall_markers() {
        let mut session = AgentSession::new("https://example.com", "goal", "model");
        session.initial_capture = Some(ContentHash("init".into()));
        session.turns = vec![
            turn(0, "aaa", false),
            turn(1, "aaa", true),
            turn(2, "init", true),
        ];

        let options = PromptOptions {
            history_window: 2,
            ..PromptOptions::default()
        };
        let ctx = build_prompt_context(
            &session,
            &observation("<p>x</p>"),
            &ContentHash("init".into()),
            4,
            10,
            &options,
        );

        assert_eq!(ctx.omitted_turns, 1);
        assert_eq!(ctx.history.len(), 2);
        assert_eq!(ctx.history[0].observation, "unchanged, same as turn 0");
        assert_eq!(ctx.history[1].observation, "unchanged, same as initial page");
        // Screenshot is passed through whole
        assert_eq!(ctx.observation.screenshot_png.len(), 4096);
    }
}
