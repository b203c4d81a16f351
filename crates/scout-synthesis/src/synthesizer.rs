//! Session trace to draft test cases

use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use scout_core::{
    ActionRequest, AgentSession, ResolvedSelector, SelectorInfo, SessionStatus, SynthesisError,
    TestCase,
};

use crate::naming::{claim_name, page_key, test_name_for_url};
use crate::selectors::selector_info;
use crate::templates::{render_test_module, step_lines, PageTest};

/// Actions recorded on one page, in the order they ran
#[derive(Debug, Clone)]
pub struct PageGroup {
    /// Page URL without fragment
    pub key: String,
    pub start_url: String,
    pub steps: Vec<(ActionRequest, Option<ResolvedSelector>)>,
    pub final_url: String,
}

impl PageGroup {
    fn new(url: &str) -> Self {
        Self {
            key: page_key(url),
            start_url: url.to_string(),
            steps: Vec::new(),
            final_url: url.to_string(),
        }
    }

    fn description(&self) -> String {
        if self.steps.is_empty() {
            return format!("Page loads: {}", self.start_url);
        }
        let actions: Vec<String> = self.steps.iter().map(|(a, _)| a.to_string()).collect();
        format!(
            "Replays {} recorded action(s) on {}: {}",
            self.steps.len(),
            self.start_url,
            actions.join("; ")
        )
    }

    fn selectors(&self) -> Vec<SelectorInfo> {
        let mut seen = BTreeSet::new();
        self.steps
            .iter()
            .filter_map(|(_, resolved)| resolved.as_ref())
            .filter(|r| seen.insert(r.selector_text.clone()))
            .map(selector_info)
            .collect()
    }
}

/// Turns finished sessions into DRAFT test cases
pub struct TestSynthesizer;

impl TestSynthesizer {
    /// Group usable turns by the page they acted on
    ///
    /// Revisits of a page merge into its first group. The initial page always
    /// has a group when the session captured it, so a page-load test exists
    /// even when nothing was clicked.
    pub fn group_turns(session: &AgentSession) -> Vec<PageGroup> {
        let mut groups: Vec<PageGroup> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        let mut ensure = |groups: &mut Vec<PageGroup>, url: &str| -> usize {
            let key = page_key(url);
            *index.entry(key).or_insert_with(|| {
                groups.push(PageGroup::new(url));
                groups.len() - 1
            })
        };

        let mut current_url = session.target_url.clone();
        if session.initial_capture.is_some() {
            ensure(&mut groups, &current_url);
        }

        for turn in session.usable_turns() {
            let Some(action) = turn.action_taken.as_ref() else {
                continue;
            };
            let page_url = turn.page_url.clone().unwrap_or_else(|| current_url.clone());

            match action {
                ActionRequest::Navigate { .. } => {
                    ensure(&mut groups, &page_url);
                }
                ActionRequest::Screenshot | ActionRequest::Complete { .. } => {}
                _ => {
                    let idx = ensure(&mut groups, &current_url);
                    let group = &mut groups[idx];
                    group
                        .steps
                        .push((action.clone(), turn.resolved_selector.clone()));
                    group.final_url = page_url.clone();
                    if page_key(&page_url) != group.key {
                        ensure(&mut groups, &page_url);
                    }
                }
            }
            current_url = page_url;
        }

        groups
    }

    /// Emit one DRAFT test case per page group
    ///
    /// # Arguments
    /// * `session` - A finished session
    /// * `reserved` - Names held by APPROVED or DEPRECATED cases; generated
    ///   names never reuse them
    ///
    /// # Errors
    /// [`SynthesisError::NoUsableTrace`] when the session is still running, or
    /// failed before producing anything to replay.
    pub fn synthesize(
        session: &AgentSession,
        reserved: &BTreeSet<String>,
    ) -> Result<Vec<TestCase>, SynthesisError> {
        match session.status {
            SessionStatus::Running => {
                return Err(SynthesisError::NoUsableTrace {
                    session_id: session.session_id.clone(),
                    reason: "session is still running".to_string(),
                })
            }
            SessionStatus::Failed if !session.has_usable_trace() => {
                return Err(SynthesisError::NoUsableTrace {
                    session_id: session.session_id.clone(),
                    reason: "session failed before any usable turn".to_string(),
                })
            }
            _ => {}
        }

        let groups = Self::group_turns(session);
        let mut taken = reserved.clone();
        let mut cases = Vec::with_capacity(groups.len());

        for group in groups {
            let base = test_name_for_url(&group.start_url);
            let name = claim_name(&base, &mut taken);
            if name != base {
                debug!("Name {} taken, using {}", base, name);
            }

            let steps = group
                .steps
                .iter()
                .flat_map(|(action, resolved)| step_lines(action, resolved.as_ref()))
                .collect();
            let description = group.description();
            let code = render_test_module(&PageTest {
                name: name.clone(),
                description: description.clone(),
                session_id: session.session_id.clone(),
                start_url: group.start_url.clone(),
                steps,
                final_url: group.final_url.clone(),
            });

            cases.push(
                TestCase::new_draft(name, &group.start_url, &session.session_id, code)
                    .with_description(description)
                    .with_selectors(group.selectors())
                    .with_generated_by(&session.model),
            );
        }

        info!(
            "Synthesized {} test case(s) from session {}",
            cases.len(),
            session.session_id
        );
        Ok(cases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scout_core::{
        ContentHash, ModelError, ModelReply, SelectorHint, SelectorTier, TerminationReason,
        TestStatus, Turn,
    };

    fn turn(index: usize, action: ActionRequest, page_url: &str) -> Turn {
        let resolved = match &action {
            ActionRequest::Click { selector_hint } | ActionRequest::Type { selector_hint, .. } => {
                Some(ResolvedSelector {
                    tier: SelectorTier::RoleText,
                    selector_text: format!("text=\"{}\"", selector_hint.text.clone().unwrap_or_default()),
                    element_type: "element".into(),
                    role: None,
                    name: selector_hint.text.clone(),
                    fallback_selectors: vec![],
                })
            }
            _ => None,
        };
        Turn {
            turn_index: index,
            prompt_context_ref: None,
            model_response: ModelReply::action(action.clone()),
            action_taken: Some(action),
            observation_ref: Some(ContentHash(format!("hash{}", index))),
            page_url: Some(page_url.to_string()),
            resolved_selector: resolved,
            stalled: false,
            error: None,
            started_at: Utc::now(),
        }
    }

    fn click(text: &str) -> ActionRequest {
        ActionRequest::Click {
            selector_hint: SelectorHint::bare(text),
        }
    }

    fn session() -> AgentSession {
        let mut session = AgentSession::new("https://shop.example.com/", "goal", "gemini-test");
        session.initial_capture = Some(ContentHash("init".into()));
        session
    }

    #[test]
    fn test_groups_by_page_and_merges_revisits() {
        let mut s = session();
        s.turns = vec![
            turn(0, click("Products"), "https://shop.example.com/products"),
            turn(1, click("Home"), "https://shop.example.com/#top"),
            turn(2, click("About"), "https://shop.example.com/about"),
        ];
        s.step_count = 3;
        s.terminate(TerminationReason::MaxStepsReached { max_steps: 3 });

        let groups = TestSynthesizer::group_turns(&s);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "https://shop.example.com/",
                "https://shop.example.com/products",
                "https://shop.example.com/about"
            ]
        );
        // Home page: "Products" then, after the revisit, "About"
        assert_eq!(groups[0].steps.len(), 2);
        assert_eq!(groups[1].steps.len(), 1);
        assert_eq!(groups[0].final_url, "https://shop.example.com/about");
    }

    #[test]
    fn test_synthesize_emits_drafts_with_scored_selectors() {
        let mut s = session();
        s.turns = vec![turn(0, click("Products"), "https://shop.example.com/products")];
        s.step_count = 2;
        s.terminate(TerminationReason::Completed {
            summary: "done".into(),
        });

        let cases = TestSynthesizer::synthesize(&s, &BTreeSet::new()).unwrap();
        assert_eq!(cases.len(), 2);
        assert!(cases.iter().all(|c| c.status == TestStatus::Draft));
        assert_eq!(cases[0].name, "test_shop_example_com_home");
        assert_eq!(cases[0].selectors.len(), 1);
        assert_eq!(cases[0].selectors[0].stability_score, 1.0);
        assert!(cases[0]
            .test_code
            .contains("page.get_by_text(\"Products\", exact=True).click()"));
        assert_eq!(cases[1].name, "test_shop_example_com_products");
        assert_eq!(cases[1].source_session_id, s.session_id);
        assert_eq!(cases[1].generated_by, "gemini-test");
    }

    #[test]
    fn test_reserved_names_get_versioned() {
        let mut s = session();
        s.terminate(TerminationReason::Completed {
            summary: "done".into(),
        });
        let reserved: BTreeSet<String> = ["test_shop_example_com_home".to_string()].into();

        let cases = TestSynthesizer::synthesize(&s, &reserved).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].name, "test_shop_example_com_home_v2");
    }

    #[test]
    fn test_failed_without_trace_is_an_error() {
        let mut s = AgentSession::new("https://shop.example.com/", "goal", "m");
        s.terminate(TerminationReason::ModelFailure {
            kind: ModelError::from_http(401, "bad key").kind,
            status: Some(401),
            message: "bad key".into(),
        });
        assert!(matches!(
            TestSynthesizer::synthesize(&s, &BTreeSet::new()),
            Err(SynthesisError::NoUsableTrace { .. })
        ));

        let running = session();
        assert!(TestSynthesizer::synthesize(&running, &BTreeSet::new()).is_err());
    }

    #[test]
    fn test_failed_session_keeps_usable_turns() {
        let mut s = session();
        let mut broken = turn(1, click("Checkout"), "https://shop.example.com/");
        broken.error = Some("SELECTOR_NOT_FOUND".into());
        broken.observation_ref = None;
        s.turns = vec![
            turn(0, click("Products"), "https://shop.example.com/products"),
            broken,
        ];
        s.step_count = 2;
        s.terminate(TerminationReason::Internal {
            message: "x".into(),
        });

        let cases = TestSynthesizer::synthesize(&s, &BTreeSet::new()).unwrap();
        assert_eq!(cases.len(), 2);
        assert!(!cases.iter().any(|c| c.test_code.contains("Checkout")));
    }
}
