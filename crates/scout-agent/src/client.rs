//! Gemini `generateContent` client
//!
//! Key design: one HTTP request per inference. Every transport failure is
//! classified into a [`ModelErrorKind`] and returned as-is; nothing here
//! sleeps, backs off or retries.

use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;

use scout_core::config::ModelConfig;
use scout_core::{
    truncate_chars, ModelError, ModelErrorKind, ModelReply, Result, ScoutError,
    MAX_ERROR_BODY_CHARS,
};

use crate::auth;
use crate::gateway::{ModelGateway, PromptContext};
use crate::schema::{action_declarations, parse_response, SYSTEM_INSTRUCTION};
use crate::types::{
    Content, FunctionCallingConfig, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, Part, Tool, ToolConfig,
};

/// ModelGateway backed by the Gemini REST API
#[derive(Debug, Clone)]
pub struct GeminiGateway {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_output_tokens: u32,
}

impl GeminiGateway {
    /// Create a gateway with an explicit API key
    pub fn new(config: &ModelConfig, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ScoutError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.name.clone(),
            api_key: api_key.into(),
            max_output_tokens: config.max_output_tokens,
        })
    }

    /// Create a gateway, reading the key from the configured environment variable
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let api_key = auth::get_api_key(&config.api_key_env)?;
        Self::new(config, api_key)
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    /// Build the request body for one inference
    pub fn build_request(&self, context: &PromptContext) -> GenerateContentRequest {
        let mut parts = vec![Part::text(context.render_text())];
        if !context.observation.screenshot_png.is_empty() {
            let encoded =
                base64::engine::general_purpose::STANDARD.encode(&context.observation.screenshot_png);
            parts.push(Part::inline_png(encoded));
        }

        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(SYSTEM_INSTRUCTION)],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            tools: vec![Tool {
                function_declarations: action_declarations(),
            }],
            tool_config: ToolConfig {
                function_calling_config: FunctionCallingConfig {
                    mode: "AUTO".to_string(),
                },
            },
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }
}

fn transport_error(err: reqwest::Error) -> ModelError {
    let kind = if err.is_timeout() {
        ModelErrorKind::Timeout
    } else {
        ModelErrorKind::ServiceError
    };
    ModelError {
        kind,
        status: err.status().map(|s| s.as_u16()),
        message: format!("request failed: {}", err),
    }
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    async fn infer(&self, context: &PromptContext) -> std::result::Result<ModelReply, ModelError> {
        let request = self.build_request(context);

        tracing::debug!(
            "Sending step {} to {} ({} history entries, {} html chars, {} screenshot bytes)",
            context.step,
            self.model,
            context.history.len(),
            context.observation.html_excerpt.len(),
            context.observation.screenshot_png.len()
        );

        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let err = ModelError::from_http(status.as_u16(), &body);
            tracing::error!("Model request failed: {}", err);
            return Err(err);
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            ModelError::malformed(format!(
                "invalid response JSON ({}): {}",
                e,
                truncate_chars(&body, MAX_ERROR_BODY_CHARS)
            ))
        })?;

        if let Some(usage) = &parsed.usage_metadata {
            tracing::info!(
                "Step {} inference complete ({} prompt tokens, {} output tokens)",
                context.step,
                usage.prompt_token_count,
                usage.candidates_token_count
            );
        }

        parse_response(&parsed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ObservationContext;
    use httpmock::prelude::*;
    use scout_core::{ActionRequest, ContentHash};
    use serde_json::json;

    const MODEL_PATH: &str = "/models/test-model:generateContent";

    fn gateway(server: &MockServer) -> GeminiGateway {
        let config = ModelConfig {
            name: "test-model".into(),
            endpoint: server.base_url(),
            request_timeout_secs: 5,
            ..ModelConfig::default()
        };
        GeminiGateway::new(&config, "test-key").unwrap()
    }

    fn context() -> PromptContext {
        PromptContext {
            goal: "Explore".into(),
            target_url: "https://example.com".into(),
            step: 3,
            max_steps: 10,
            history: vec![],
            omitted_turns: 0,
            observation: ObservationContext {
                url: "https://example.com".into(),
                html_excerpt: "<h1>Example</h1>".into(),
                html_truncated: false,
                screenshot_png: vec![1, 2, 3],
                content_hash: ContentHash::compute("<h1>Example</h1>", &[1, 2, 3]),
                status: "navigated".into(),
            },
        }
    }

    #[tokio::test]
    async fn test_rate_limit_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path(MODEL_PATH);
                then.status(429).body("{\"error\":{\"status\":\"RESOURCE_EXHAUSTED\"}}");
            })
            .await;

        let err = gateway(&server).infer(&context()).await.unwrap_err();
        assert_eq!(err.kind, ModelErrorKind::RateLimited);
        assert_eq!(err.status, Some(429));
        assert!(err.message.contains("RESOURCE_EXHAUSTED"));
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_status_classification() {
        for (status, kind) in [
            (401, ModelErrorKind::Auth),
            (403, ModelErrorKind::Auth),
            (504, ModelErrorKind::Timeout),
            (500, ModelErrorKind::ServiceError),
        ] {
            let server = MockServer::start_async().await;
            let mock = server
                .mock_async(|when, then| {
                    when.method(POST).path(MODEL_PATH);
                    then.status(status).body("nope");
                })
                .await;

            let err = gateway(&server).infer(&context()).await.unwrap_err();
            assert_eq!(err.kind, kind, "status {}", status);
            mock.assert_hits_async(1).await;
        }
    }

    #[tokio::test]
    async fn test_function_call_response() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(MODEL_PATH)
                    .header("x-goog-api-key", "test-key")
                    .body_includes("\"inlineData\"")
                    .body_includes("\"functionDeclarations\"");
                then.status(200).json_body(json!({
                    "candidates": [{
                        "content": { "parts": [
                            { "functionCall": { "name": "click", "args": { "role": "button", "text": "Sign in" } } }
                        ] }
                    }],
                    "usageMetadata": { "promptTokenCount": 812, "candidatesTokenCount": 14 }
                }));
            })
            .await;

        let reply = gateway(&server).infer(&context()).await.unwrap();
        match reply.action {
            ActionRequest::Click { selector_hint } => {
                assert_eq!(selector_hint.role.as_deref(), Some("button"));
                assert_eq!(selector_hint.text.as_deref(), Some("Sign in"));
            }
            other => panic!("unexpected action {:?}", other),
        }
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_invalid_json_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(MODEL_PATH);
                then.status(200).body("<html>proxy error</html>");
            })
            .await;

        let err = gateway(&server).infer(&context()).await.unwrap_err();
        assert_eq!(err.kind, ModelErrorKind::MalformedResponse);
        assert!(err.message.contains("proxy error"));
    }

    #[test]
    fn test_request_omits_empty_screenshot() {
        let config = ModelConfig::default();
        let gateway = GeminiGateway::new(&config, "k").unwrap();
        let mut ctx = context();
        ctx.observation.screenshot_png.clear();

        let request = gateway.build_request(&ctx);
        assert_eq!(request.contents[0].parts.len(), 1);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["toolConfig"]["functionCallingConfig"]["mode"], "AUTO");
        assert!(body["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("QA engineer"));
    }
}
