//! Tiered selector strategies
//!
//! A selector hint is expanded into an ordered list of strategies, strongest
//! tier first: role + visible text, then test identifier attributes, then the
//! raw structural CSS selector.

use scout_core::{SelectorHint, SelectorTier};

use crate::driver::{Locator, SelectorStrategy};

/// Attributes treated as test identifiers, in lookup order
pub const TEST_ID_ATTRIBUTES: [&str; 3] = ["data-testid", "data-test", "data-qa"];

const CSS_TAGS: &[&str] = &[
    "a", "button", "input", "textarea", "select", "form", "label", "nav", "header", "footer",
    "main", "section", "div", "span", "ul", "li", "h1", "h2", "h3", "img", "table",
];

/// Quote a string as an XPath 1.0 literal
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{}'", s)
    } else if !s.contains('"') {
        format!("\"{}\"", s)
    } else {
        let pieces: Vec<String> = s.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", pieces.join(", \"'\", "))
    }
}

fn css_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn clean_role(role: &str) -> String {
    role.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Native elements carrying an implicit ARIA role
fn implicit_role_predicate(role: &str) -> Option<&'static str> {
    Some(match role {
        "button" => {
            "self::button or (self::input and (@type='submit' or @type='button' or @type='reset'))"
        }
        "link" => "self::a",
        "textbox" => {
            "self::textarea or (self::input and (not(@type) or @type='text' or @type='email' \
             or @type='password' or @type='tel' or @type='url' or @type='number'))"
        }
        "searchbox" => "self::input and @type='search'",
        "checkbox" => "self::input and @type='checkbox'",
        "radio" => "self::input and @type='radio'",
        "combobox" => "self::select",
        "heading" => "self::h1 or self::h2 or self::h3 or self::h4 or self::h5 or self::h6",
        "img" => "self::img",
        _ => return None,
    })
}

fn element_type_for_role(role: &str) -> String {
    match role {
        "textbox" | "searchbox" => "input".to_string(),
        "combobox" => "select".to_string(),
        other => other.to_string(),
    }
}

/// Matches an element whose visible text or accessible name equals `name`
fn name_predicate(name: &str) -> String {
    let lit = xpath_literal(name);
    format!(
        "normalize-space(.)={lit} or @aria-label={lit} or @value={lit} or @placeholder={lit} \
         or @title={lit} or @id=//label[normalize-space(.)={lit}]/@for",
        lit = lit
    )
}

fn playwright_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\\\""))
}

fn role_text_strategy(role: Option<&str>, text: Option<&str>) -> Option<SelectorStrategy> {
    let role = role.map(clean_role).filter(|r| !r.is_empty());
    match (role, text) {
        (Some(role), text) => {
            let role_pred = match implicit_role_predicate(&role) {
                Some(native) => format!("{} or @role={}", native, xpath_literal(&role)),
                None => format!("@role={}", xpath_literal(&role)),
            };
            let (xpath, selector_text) = match text {
                Some(name) => (
                    format!("//*[({}) and ({})]", role_pred, name_predicate(name)),
                    format!("role={}[name={}]", role, playwright_quote(name)),
                ),
                None => (format!("//*[{}]", role_pred), format!("role={}", role)),
            };
            Some(SelectorStrategy {
                tier: SelectorTier::RoleText,
                locator: Locator::XPath(xpath),
                selector_text,
                element_type: element_type_for_role(&role),
                role: Some(role),
                name: text.map(str::to_string),
            })
        }
        (None, Some(text)) => {
            let interactive = "self::button or self::a or self::input or self::textarea \
                               or self::select or self::label or @role";
            let xpath = format!(
                "//*[({}) and ({})] | //*[not(*) and normalize-space(.)={}]",
                interactive,
                name_predicate(text),
                xpath_literal(text)
            );
            Some(SelectorStrategy {
                tier: SelectorTier::RoleText,
                locator: Locator::XPath(xpath),
                selector_text: format!("text={}", playwright_quote(text)),
                element_type: "element".to_string(),
                role: None,
                name: Some(text.to_string()),
            })
        }
        (None, None) => None,
    }
}

fn is_identifier_like(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

/// Heuristic for free-form hints: does this read as CSS rather than prose?
pub fn looks_like_css(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() {
        return false;
    }
    if s.starts_with(['#', '.', '[']) || s.contains(['>', '[', ']', '=', ':']) {
        return true;
    }
    let head = s.split(['.', '#', ' ']).next().unwrap_or_default();
    CSS_TAGS.contains(&head) && s.split_whitespace().all(|part| {
        let tag = part.split(['.', '#']).next().unwrap_or_default();
        CSS_TAGS.contains(&tag)
    })
}

/// Expand a hint into strategies, strongest tier first
pub fn strategies_for(hint: &SelectorHint) -> Vec<SelectorStrategy> {
    let text = hint.text.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let role = hint.role.as_deref();
    let mut out = Vec::new();

    if let Some(strategy) = role_text_strategy(role, text) {
        out.push(strategy);
    }

    let element_type = role
        .map(|r| element_type_for_role(&clean_role(r)))
        .unwrap_or_else(|| "element".to_string());

    if let Some(test_id) = hint.test_id.as_deref().map(str::trim) {
        // A bare hint copies its text into test_id; only identifier-shaped values qualify
        let ambiguous = hint.text.as_deref().map(str::trim) == Some(test_id);
        if is_identifier_like(test_id) || (!ambiguous && !test_id.is_empty()) {
            for attr in TEST_ID_ATTRIBUTES {
                let selector = format!("[{}={}]", attr, css_string(test_id));
                out.push(SelectorStrategy {
                    tier: SelectorTier::TestId,
                    locator: Locator::Css(selector.clone()),
                    selector_text: selector,
                    element_type: element_type.clone(),
                    role: None,
                    name: None,
                });
            }
        }
    }

    if let Some(css) = hint.css.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        let ambiguous = hint.text.as_deref().map(str::trim) == Some(css);
        if !ambiguous || looks_like_css(css) {
            out.push(SelectorStrategy {
                tier: SelectorTier::Structural,
                locator: Locator::Css(css.to_string()),
                selector_text: css.to_string(),
                element_type,
                role: None,
                name: None,
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xpath_literal_quoting() {
        assert_eq!(xpath_literal("Sign in"), "'Sign in'");
        assert_eq!(xpath_literal("Don't"), "\"Don't\"");
        assert_eq!(
            xpath_literal("Say \"don't\""),
            "concat('Say \"don', \"'\", 't\"')"
        );
    }

    #[test]
    fn test_bare_prose_hint_skips_css() {
        let strategies = strategies_for(&SelectorHint::bare("Sign in"));
        let tiers: Vec<_> = strategies.iter().map(|s| s.tier).collect();
        assert_eq!(tiers, vec![SelectorTier::RoleText]);
        assert_eq!(strategies[0].selector_text, "text=\"Sign in\"");
    }

    #[test]
    fn test_bare_identifier_hint_tries_test_ids() {
        let strategies = strategies_for(&SelectorHint::bare("login-button"));
        let tiers: Vec<_> = strategies.iter().map(|s| s.tier).collect();
        assert_eq!(
            tiers,
            vec![
                SelectorTier::RoleText,
                SelectorTier::TestId,
                SelectorTier::TestId,
                SelectorTier::TestId,
            ]
        );
        assert_eq!(strategies[1].selector_text, "[data-testid=\"login-button\"]");
    }

    #[test]
    fn test_bare_css_hint_reaches_structural() {
        let strategies = strategies_for(&SelectorHint::bare("form#login > button.primary"));
        let last = strategies.last().unwrap();
        assert_eq!(last.tier, SelectorTier::Structural);
        assert_eq!(last.locator, Locator::Css("form#login > button.primary".into()));
    }

    #[test]
    fn test_role_and_text_strategy() {
        let hint = SelectorHint {
            role: Some("Button".into()),
            text: Some("Submit".into()),
            test_id: None,
            css: Some("#submit".into()),
        };
        let strategies = strategies_for(&hint);
        assert_eq!(strategies.len(), 2);

        let first = &strategies[0];
        assert_eq!(first.selector_text, "role=button[name=\"Submit\"]");
        assert_eq!(first.element_type, "button");
        match &first.locator {
            Locator::XPath(xpath) => {
                assert!(xpath.contains("self::button"));
                assert!(xpath.contains("@role='button'"));
            }
            other => panic!("unexpected locator {:?}", other),
        }
        assert_eq!(strategies[1].tier, SelectorTier::Structural);
    }

    #[test]
    fn test_looks_like_css() {
        assert!(looks_like_css("#email"));
        assert!(looks_like_css("input[name=q]"));
        assert!(looks_like_css("nav a"));
        assert!(!looks_like_css("Sign in"));
        assert!(!looks_like_css("Pricing"));
    }
}
