//! Selector stability scoring
//!
//! Scores start from the tier that resolved the element (role/text 1.0,
//! test id 0.8, structural 0.4). Structural selectors that look positional or
//! framework-generated lose a further 0.2, floored at 0.05.

use regex::Regex;
use std::sync::OnceLock;

use scout_core::{ResolvedSelector, SelectorInfo, SelectorTier};

/// Deducted from structural selectors that look positional or generated
pub const DYNAMIC_PENALTY: f64 = 0.2;

/// Lowest score any selector receives
pub const MIN_STABILITY: f64 = 0.05;

fn dynamic_pattern() -> &'static Regex {
    static DYNAMIC: OnceLock<Regex> = OnceLock::new();
    DYNAMIC.get_or_init(|| {
        Regex::new(
            r"(?i)nth-child|nth-of-type|nth-last-|:eq\(|\bauto-|\bgenerated-|\d{4,}|\b(css|sc|jsx|emotion|ember)-[a-z0-9]{4,}",
        )
        .expect("static regex")
    })
}

/// Whether a selector is likely to change between builds or renders
pub fn is_dynamic(selector: &str) -> bool {
    dynamic_pattern().is_match(selector)
}

/// Score a selector resolved at `tier`
pub fn stability_score(tier: SelectorTier, selector_text: &str) -> f64 {
    let mut score = tier.base_score();
    if tier == SelectorTier::Structural && is_dynamic(selector_text) {
        score -= DYNAMIC_PENALTY;
    }
    score.clamp(MIN_STABILITY, 1.0)
}

/// Role and text selectors name what the user sees, so digits there are content
fn is_semantic(selector: &str) -> bool {
    selector.starts_with("role=") || selector.starts_with("text=")
}

/// Build the selector record for a resolved element
pub fn selector_info(resolved: &ResolvedSelector) -> SelectorInfo {
    let fallback_selectors = resolved
        .fallback_selectors
        .iter()
        .filter(|f| *f != &resolved.selector_text)
        .filter(|f| is_semantic(f) || !is_dynamic(f))
        .cloned()
        .collect();

    SelectorInfo {
        element_type: resolved.element_type.clone(),
        selector_text: resolved.selector_text.clone(),
        selector_type: resolved.tier,
        stability_score: stability_score(resolved.tier, &resolved.selector_text),
        fallback_selectors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(tier: SelectorTier, text: &str, fallbacks: &[&str]) -> ResolvedSelector {
        ResolvedSelector {
            tier,
            selector_text: text.to_string(),
            element_type: "button".to_string(),
            role: None,
            name: None,
            fallback_selectors: fallbacks.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_tier_scores() {
        assert_eq!(stability_score(SelectorTier::RoleText, "role=button[name=\"Buy\"]"), 1.0);
        assert_eq!(stability_score(SelectorTier::TestId, "[data-testid=\"buy\"]"), 0.8);
        assert_eq!(stability_score(SelectorTier::Structural, "form > button.primary"), 0.4);
    }

    #[test]
    fn test_dynamic_structural_penalized() {
        let score = stability_score(SelectorTier::Structural, "ul > li:nth-child(3)");
        assert!((score - 0.2).abs() < 1e-9);
        let score = stability_score(SelectorTier::Structural, "#generated-id-48213");
        assert!((score - 0.2).abs() < 1e-9);
        // Never below the floor, never above 1
        assert!(stability_score(SelectorTier::Structural, "div:nth-of-type(2)") >= MIN_STABILITY);
    }

    #[test]
    fn test_dynamic_fallbacks_filtered() {
        let info = selector_info(&resolved(
            SelectorTier::RoleText,
            "role=button[name=\"Order 2024\"]",
            &[
                "[data-testid=\"order\"]",
                "div:nth-child(4) > button",
                ".css-1x2y3z4",
                "text=\"Order 2024\"",
            ],
        ));
        assert_eq!(info.stability_score, 1.0);
        assert_eq!(
            info.fallback_selectors,
            vec!["[data-testid=\"order\"]", "text=\"Order 2024\""]
        );
    }
}
