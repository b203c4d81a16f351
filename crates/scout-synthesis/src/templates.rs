//! pytest-playwright code templates

use regex::Regex;
use std::sync::OnceLock;

use scout_core::{ActionRequest, ResolvedSelector, SelectorHint, SelectorTier, WaitCondition};

/// Quote a string as a Python literal (JSON escapes are valid Python escapes)
pub fn py_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s.replace('"', "\\\"")))
}

fn test_id_pattern() -> &'static Regex {
    static TEST_ID: OnceLock<Regex> = OnceLock::new();
    TEST_ID.get_or_init(|| {
        Regex::new(r#"^\[data-testid="((?:[^"\\]|\\.)*)"\]$"#).expect("static regex")
    })
}

fn css_unescape(s: &str) -> String {
    s.replace("\\\"", "\"").replace("\\\\", "\\")
}

/// Playwright locator expression for the element an action resolved to
///
/// Inputs located by text alone are matched by label or placeholder, the way a
/// text-only hint resolves in the browser.
pub fn locator_expr(
    resolved: Option<&ResolvedSelector>,
    hint: &SelectorHint,
    is_input: bool,
) -> String {
    let Some(resolved) = resolved else {
        return hint_locator(hint, is_input);
    };

    match resolved.tier {
        SelectorTier::RoleText => match (&resolved.role, &resolved.name) {
            (Some(role), Some(name)) => format!(
                "page.get_by_role({}, name={}, exact=True)",
                py_str(role),
                py_str(name)
            ),
            (Some(role), None) => format!("page.get_by_role({}).first", py_str(role)),
            (None, Some(name)) if is_input => label_or_placeholder(name),
            (None, Some(name)) => format!("page.get_by_text({}, exact=True)", py_str(name)),
            (None, None) => format!("page.locator({})", py_str(&resolved.selector_text)),
        },
        SelectorTier::TestId => match test_id_pattern().captures(&resolved.selector_text) {
            Some(caps) => format!("page.get_by_test_id({})", py_str(&css_unescape(&caps[1]))),
            None => format!("page.locator({})", py_str(&resolved.selector_text)),
        },
        SelectorTier::Structural => format!("page.locator({})", py_str(&resolved.selector_text)),
    }
}

fn label_or_placeholder(name: &str) -> String {
    format!(
        "page.get_by_label({q}).or_(page.get_by_placeholder({q}))",
        q = py_str(name)
    )
}

/// Locator straight from a hint, used when no resolution was recorded
fn hint_locator(hint: &SelectorHint, is_input: bool) -> String {
    let text = hint.text.as_deref().map(str::trim).filter(|t| !t.is_empty());
    if let Some(role) = hint.role.as_deref() {
        return match text {
            Some(name) => format!(
                "page.get_by_role({}, name={}, exact=True)",
                py_str(role),
                py_str(name)
            ),
            None => format!("page.get_by_role({}).first", py_str(role)),
        };
    }
    if let Some(test_id) = hint.test_id.as_deref().filter(|t| Some(*t) != text) {
        return format!("page.get_by_test_id({})", py_str(test_id));
    }
    if let Some(css) = hint.css.as_deref().filter(|c| Some(*c) != text) {
        return format!("page.locator({})", py_str(css));
    }
    match text {
        Some(name) if is_input => label_or_placeholder(name),
        Some(name) => format!("page.get_by_text({}, exact=True)", py_str(name)),
        None => "page.locator(\"body\")".to_string(),
    }
}

/// Python statements replaying one recorded action
pub fn step_lines(action: &ActionRequest, resolved: Option<&ResolvedSelector>) -> Vec<String> {
    match action {
        ActionRequest::Navigate { url } => vec![format!("page.goto({})", py_str(url))],
        ActionRequest::Click { selector_hint } => {
            vec![format!("{}.click()", locator_expr(resolved, selector_hint, false))]
        }
        ActionRequest::Type {
            selector_hint,
            text,
        } => {
            let locator = locator_expr(resolved, selector_hint, true);
            vec![
                format!("{}.fill({})", locator, py_str(text)),
                format!("expect({}).to_have_value({})", locator, py_str(text)),
            ]
        }
        ActionRequest::Wait { condition } => match condition {
            WaitCondition::Millis { ms } => vec![format!("page.wait_for_timeout({})", ms)],
            WaitCondition::Selector { hint } => {
                vec![format!("{}.wait_for()", locator_expr(resolved, hint, false))]
            }
            WaitCondition::NetworkSettled => {
                vec!["page.wait_for_load_state(\"networkidle\")".to_string()]
            }
        },
        ActionRequest::Screenshot | ActionRequest::Complete { .. } => Vec::new(),
    }
}

/// Everything needed to render one test module
#[derive(Debug, Clone)]
pub struct PageTest {
    pub name: String,
    pub description: String,
    pub session_id: String,
    pub start_url: String,
    /// Python statements, one per line
    pub steps: Vec<String>,
    /// URL the page should be on after the last step
    pub final_url: String,
}

/// Render a complete pytest-playwright module
pub fn render_test_module(test: &PageTest) -> String {
    let mut code = String::new();
    code.push_str(&format!(
        "\"\"\"{}\n\nGenerated by scout from session {}.\n\"\"\"\n",
        test.description.replace("\"\"\"", "'''"),
        test.session_id
    ));
    code.push_str("import re\n\nfrom playwright.sync_api import Page, expect\n\n\n");
    code.push_str(&format!("def {}(page: Page) -> None:\n", test.name));
    code.push_str(&format!("    page.goto({})\n", py_str(&test.start_url)));
    code.push_str("    page.wait_for_load_state(\"domcontentloaded\")\n");
    for line in &test.steps {
        code.push_str("    ");
        code.push_str(line);
        code.push('\n');
    }
    code.push_str("    expect(page.locator(\"body\")).to_be_visible()\n");
    code.push_str(&format!(
        "    expect(page).to_have_url(re.compile(re.escape({})))\n",
        py_str(&test.final_url)
    ));
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(tier: SelectorTier, text: &str, role: Option<&str>, name: Option<&str>) -> ResolvedSelector {
        ResolvedSelector {
            tier,
            selector_text: text.to_string(),
            element_type: "button".to_string(),
            role: role.map(str::to_string),
            name: name.map(str::to_string),
            fallback_selectors: vec![],
        }
    }

    #[test]
    fn test_locators_per_tier() {
        let hint = SelectorHint::bare("Add to cart");
        assert_eq!(
            locator_expr(
                Some(&resolved(SelectorTier::RoleText, "", Some("button"), Some("Add to cart"))),
                &hint,
                false
            ),
            "page.get_by_role(\"button\", name=\"Add to cart\", exact=True)"
        );
        assert_eq!(
            locator_expr(
                Some(&resolved(SelectorTier::TestId, "[data-testid=\"add-cart\"]", None, None)),
                &hint,
                false
            ),
            "page.get_by_test_id(\"add-cart\")"
        );
        assert_eq!(
            locator_expr(
                Some(&resolved(SelectorTier::TestId, "[data-qa=\"add-cart\"]", None, None)),
                &hint,
                false
            ),
            "page.locator(\"[data-qa=\\\"add-cart\\\"]\")"
        );
        assert_eq!(
            locator_expr(
                Some(&resolved(SelectorTier::RoleText, "text=\"Email\"", None, Some("Email"))),
                &hint,
                true
            ),
            "page.get_by_label(\"Email\").or_(page.get_by_placeholder(\"Email\"))"
        );
    }

    #[test]
    fn test_type_step_fills_and_asserts() {
        let action = ActionRequest::Type {
            selector_hint: SelectorHint {
                css: Some("#email".into()),
                ..SelectorHint::default()
            },
            text: "a@b.co".into(),
        };
        let lines = step_lines(&action, None);
        assert_eq!(lines[0], "page.locator(\"#email\").fill(\"a@b.co\")");
        assert_eq!(lines[1], "expect(page.locator(\"#email\")).to_have_value(\"a@b.co\")");
        assert!(step_lines(&ActionRequest::Screenshot, None).is_empty());
    }

    #[test]
    fn test_render_module() {
        let code = render_test_module(&PageTest {
            name: "test_example_com_home".into(),
            description: "Landing page loads".into(),
            session_id: "session-abc".into(),
            start_url: "https://example.com/".into(),
            steps: vec!["page.get_by_text(\"About\", exact=True).click()".into()],
            final_url: "https://example.com/about".into(),
        });
        assert!(code.starts_with("\"\"\"Landing page loads"));
        assert!(code.contains("def test_example_com_home(page: Page) -> None:\n"));
        assert!(code.contains("    page.goto(\"https://example.com/\")\n"));
        assert!(code.contains("    page.get_by_text(\"About\", exact=True).click()\n"));
        assert!(code.contains("re.escape(\"https://example.com/about\")"));
    }

    #[test]
    fn test_py_str_escapes() {
        assert_eq!(py_str("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
    }
}
