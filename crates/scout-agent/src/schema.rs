//! Action schema declared to the model, and the parser for its replies
//!
//! Six functions are declared: `navigate`, `click`, `type_text`, `wait`,
//! `screenshot` and `complete`. Each maps onto exactly one
//! [`ActionRequest`] variant.

use serde_json::{json, Value};

use scout_core::{
    ActionRequest, ModelError, ModelReply, SelectorHint, WaitCondition,
};

use crate::types::{FunctionCall, FunctionDeclaration, GenerateContentResponse};

/// Longest WAIT the model may request
pub const MAX_WAIT_MS: u64 = 30_000;

/// System instruction sent with every request
pub const SYSTEM_INSTRUCTION: &str = "You are an expert QA engineer exploring a web \
application to discover user-interface test scenarios. You control a real browser \
through the declared functions. On each turn you see the current screenshot, an \
excerpt of the page HTML and a summary of your previous actions. Choose ONE next \
action that exercises a meaningful user workflow: navigation, form entry, \
submission, content verification. Prefer targeting elements by their accessible \
role and visible text, then by data-testid, and only then by CSS. Avoid repeating \
an action whose observation was unchanged. When the main workflows have been \
covered, call `complete` with a short summary of what you verified.";

fn selector_properties() -> Value {
    json!({
        "target": {
            "type": "STRING",
            "description": "Visible text, test id or CSS selector of the element"
        },
        "role": {
            "type": "STRING",
            "description": "Accessible role, e.g. button, link, textbox"
        },
        "text": {
            "type": "STRING",
            "description": "Visible text or accessible name"
        },
        "test_id": {
            "type": "STRING",
            "description": "Value of data-testid / data-test / data-qa"
        },
        "css": {
            "type": "STRING",
            "description": "CSS selector, used only as a last resort"
        }
    })
}

/// Function declarations describing the action schema
pub fn action_declarations() -> Vec<FunctionDeclaration> {
    let mut type_props = selector_properties();
    type_props["value"] = json!({
        "type": "STRING",
        "description": "Text to type into the element"
    });

    vec![
        FunctionDeclaration {
            name: "navigate".into(),
            description: "Load a URL in the browser and wait for the network to settle".into(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "url": { "type": "STRING", "description": "Absolute URL to load" }
                },
                "required": ["url"]
            }),
        },
        FunctionDeclaration {
            name: "click".into(),
            description: "Click an element".into(),
            parameters: json!({
                "type": "OBJECT",
                "properties": selector_properties()
            }),
        },
        FunctionDeclaration {
            name: "type_text".into(),
            description: "Type text into an input element".into(),
            parameters: json!({
                "type": "OBJECT",
                "properties": type_props,
                "required": ["value"]
            }),
        },
        FunctionDeclaration {
            name: "wait".into(),
            description: "Wait for a delay, an element, or network quiet".into(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "milliseconds": { "type": "INTEGER", "description": "Fixed delay" },
                    "selector": { "type": "STRING", "description": "Wait until this element exists" },
                    "network_idle": { "type": "BOOLEAN", "description": "Wait for network quiet" }
                }
            }),
        },
        FunctionDeclaration {
            name: "screenshot".into(),
            description: "Capture the current page without acting".into(),
            parameters: json!({ "type": "OBJECT", "properties": {} }),
        },
        FunctionDeclaration {
            name: "complete".into(),
            description: "Finish exploration".into(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "summary": { "type": "STRING", "description": "What was explored and verified" }
                },
                "required": ["summary"]
            }),
        },
    ]
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn selector_hint(name: &str, args: &Value) -> Result<SelectorHint, ModelError> {
    let mut hint = match str_arg(args, "target") {
        Some(target) => SelectorHint::bare(target),
        None => SelectorHint::default(),
    };
    if let Some(role) = str_arg(args, "role") {
        hint.role = Some(role.to_string());
    }
    if let Some(text) = str_arg(args, "text") {
        hint.text = Some(text.to_string());
    }
    if let Some(test_id) = str_arg(args, "test_id") {
        hint.test_id = Some(test_id.to_string());
    }
    if let Some(css) = str_arg(args, "css") {
        hint.css = Some(css.to_string());
    }

    if hint.is_empty() {
        return Err(ModelError::malformed(format!(
            "{} call has no element target: {}",
            name, args
        )));
    }
    Ok(hint)
}

/// Map one function call onto an [`ActionRequest`]
pub fn parse_function_call(call: &FunctionCall) -> Result<ActionRequest, ModelError> {
    let args = &call.args;
    match call.name.as_str() {
        "navigate" => {
            let url = str_arg(args, "url").ok_or_else(|| {
                ModelError::malformed(format!("navigate call missing url: {}", args))
            })?;
            Ok(ActionRequest::Navigate {
                url: url.to_string(),
            })
        }
        "click" => Ok(ActionRequest::Click {
            selector_hint: selector_hint("click", args)?,
        }),
        "type_text" => {
            let text = args.get("value").and_then(Value::as_str).ok_or_else(|| {
                ModelError::malformed(format!("type_text call missing value: {}", args))
            })?;
            Ok(ActionRequest::Type {
                selector_hint: selector_hint("type_text", args)?,
                text: text.to_string(),
            })
        }
        "wait" => {
            let condition = if let Some(ms) = args.get("milliseconds").and_then(Value::as_f64) {
                if ms < 0.0 {
                    return Err(ModelError::malformed(format!("negative wait: {}", ms)));
                }
                WaitCondition::Millis {
                    ms: (ms as u64).min(MAX_WAIT_MS),
                }
            } else if let Some(selector) = str_arg(args, "selector") {
                WaitCondition::Selector {
                    hint: SelectorHint::bare(selector),
                }
            } else if args.get("network_idle").and_then(Value::as_bool) == Some(true) {
                WaitCondition::NetworkSettled
            } else {
                return Err(ModelError::malformed(format!(
                    "wait call has no condition: {}",
                    args
                )));
            };
            Ok(ActionRequest::Wait { condition })
        }
        "screenshot" => Ok(ActionRequest::Screenshot),
        "complete" => Ok(ActionRequest::Complete {
            summary: str_arg(args, "summary").unwrap_or_default().to_string(),
        }),
        other => Err(ModelError::malformed(format!(
            "unknown function '{}'",
            other
        ))),
    }
}

/// Interpret a generateContent response
///
/// The first function call wins; any text parts become the narrative. A reply
/// with text but no function call is read as COMPLETE.
pub fn parse_response(response: &GenerateContentResponse) -> Result<ModelReply, ModelError> {
    let candidate = response.candidates.first().ok_or_else(|| {
        let reason = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
            .unwrap_or_else(|| "none given".to_string());
        ModelError::malformed(format!("response has no candidates (block reason: {})", reason))
    })?;

    let parts = candidate
        .content
        .as_ref()
        .map(|c| c.parts.as_slice())
        .unwrap_or_default();

    let text = parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let narrative = (!text.is_empty()).then(|| text.clone());

    if let Some(call) = parts.iter().find_map(|p| p.function_call.as_ref()) {
        let mut action = parse_function_call(call)?;
        if let ActionRequest::Complete { summary } = &mut action {
            if summary.is_empty() {
                *summary = text;
            }
        }
        return Ok(ModelReply { action, narrative });
    }

    if text.is_empty() {
        return Err(ModelError::malformed(format!(
            "candidate has neither text nor function call (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("none")
        )));
    }

    Ok(ModelReply {
        action: ActionRequest::Complete { summary: text },
        narrative,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::ModelErrorKind;

    fn response(value: Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    fn call(name: &str, args: Value) -> FunctionCall {
        FunctionCall {
            name: name.into(),
            args,
        }
    }

    #[test]
    fn test_declarations_cover_every_action() {
        let names: Vec<_> = action_declarations().into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec!["navigate", "click", "type_text", "wait", "screenshot", "complete"]
        );
    }

    #[test]
    fn test_parse_click_bare_target() {
        let action = parse_function_call(&call("click", json!({ "target": "Sign in" }))).unwrap();
        match action {
            ActionRequest::Click { selector_hint } => {
                assert_eq!(selector_hint.text.as_deref(), Some("Sign in"));
                assert_eq!(selector_hint.css.as_deref(), Some("Sign in"));
                assert!(selector_hint.role.is_none());
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_parse_type_structured_hint() {
        let action = parse_function_call(&call(
            "type_text",
            json!({ "role": "textbox", "text": "Email", "value": "a@b.co" }),
        ))
        .unwrap();
        assert_eq!(
            action,
            ActionRequest::Type {
                selector_hint: SelectorHint {
                    role: Some("textbox".into()),
                    text: Some("Email".into()),
                    test_id: None,
                    css: None,
                },
                text: "a@b.co".into(),
            }
        );
    }

    #[test]
    fn test_parse_wait_forms() {
        let action = parse_function_call(&call("wait", json!({ "milliseconds": 120000 }))).unwrap();
        assert_eq!(
            action,
            ActionRequest::Wait {
                condition: WaitCondition::Millis { ms: MAX_WAIT_MS }
            }
        );

        let action = parse_function_call(&call("wait", json!({ "network_idle": true }))).unwrap();
        assert_eq!(
            action,
            ActionRequest::Wait {
                condition: WaitCondition::NetworkSettled
            }
        );

        let err = parse_function_call(&call("wait", json!({}))).unwrap_err();
        assert_eq!(err.kind, ModelErrorKind::MalformedResponse);
    }

    #[test]
    fn test_parse_rejects_bad_calls() {
        for (name, args) in [
            ("navigate", json!({})),
            ("click", json!({ "target": "  " })),
            ("type_text", json!({ "target": "Email" })),
            ("scroll", json!({})),
        ] {
            let err = parse_function_call(&call(name, args)).unwrap_err();
            assert_eq!(err.kind, ModelErrorKind::MalformedResponse, "{}", name);
        }
    }

    #[test]
    fn test_text_only_reply_is_complete() {
        let reply = parse_response(&response(json!({
            "candidates": [{ "content": { "parts": [{ "text": "All flows covered." }] } }]
        })))
        .unwrap();
        assert_eq!(
            reply.action,
            ActionRequest::Complete {
                summary: "All flows covered.".into()
            }
        );
    }

    #[test]
    fn test_function_call_with_narrative() {
        let reply = parse_response(&response(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Opening the pricing page." },
                { "functionCall": { "name": "navigate", "args": { "url": "https://example.com/pricing" } } }
            ] } }]
        })))
        .unwrap();
        assert_eq!(
            reply.action,
            ActionRequest::Navigate {
                url: "https://example.com/pricing".into()
            }
        );
        assert_eq!(reply.narrative.as_deref(), Some("Opening the pricing page."));
    }

    #[test]
    fn test_complete_without_summary_uses_text() {
        let reply = parse_response(&response(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Done exploring." },
                { "functionCall": { "name": "complete", "args": {} } }
            ] } }]
        })))
        .unwrap();
        assert_eq!(
            reply.action,
            ActionRequest::Complete {
                summary: "Done exploring.".into()
            }
        );
    }

    #[test]
    fn test_empty_responses_are_malformed() {
        let err = parse_response(&response(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .unwrap_err();
        assert_eq!(err.kind, ModelErrorKind::MalformedResponse);
        assert!(err.message.contains("SAFETY"));

        let err = parse_response(&response(json!({
            "candidates": [{ "finishReason": "MAX_TOKENS" }]
        })))
        .unwrap_err();
        assert_eq!(err.kind, ModelErrorKind::MalformedResponse);
    }
}
