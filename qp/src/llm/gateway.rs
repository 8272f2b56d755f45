//! LLM gateway
//!
//! The single seam the pipeline talks to. A gateway either wraps a remote
//! [`LlmClient`] or is offline, in which case every caller substitutes the
//! deterministic fallback instead of calling out.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{AnthropicClient, CompletionRequest, LlmClient, LlmError, StopReason};
use crate::config::LlmConfig;

/// What a gateway call produced
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutput {
    /// Raw model text, unmodified
    Text(String),
    /// First well-formed JSON object found in the model text
    Structured(Value),
}

impl GatewayOutput {
    pub fn into_text(self) -> String {
        match self {
            GatewayOutput::Text(text) => text,
            GatewayOutput::Structured(value) => value.to_string(),
        }
    }
}

enum Backend {
    Remote(Arc<dyn LlmClient>),
    Offline,
}

/// Prompt-in, text-or-object-out access to a language model
pub struct LlmGateway {
    backend: Backend,
    max_tokens: u32,
}

impl LlmGateway {
    /// Build a gateway from configuration
    ///
    /// A missing or placeholder credential, or an unknown provider, yields an
    /// offline gateway rather than an error.
    pub fn from_config(config: &LlmConfig) -> Self {
        debug!(provider = %config.provider, model = %config.model, "LlmGateway::from_config: called");
        if config.provider != "anthropic" {
            warn!(provider = %config.provider, "Unknown LLM provider, running offline");
            return Self::offline();
        }
        if !config.credential_status().is_configured() {
            info!("No LLM credential configured ({}), running offline", config.api_key_env);
            return Self::offline();
        }
        match AnthropicClient::from_config(config) {
            Ok(client) => Self::remote(Arc::new(client), config.max_tokens),
            Err(e) => {
                warn!(error = %e, "Failed to build LLM client, running offline");
                Self::offline()
            }
        }
    }

    pub fn remote(client: Arc<dyn LlmClient>, max_tokens: u32) -> Self {
        Self {
            backend: Backend::Remote(client),
            max_tokens,
        }
    }

    pub fn offline() -> Self {
        Self {
            backend: Backend::Offline,
            max_tokens: 0,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self.backend, Backend::Offline)
    }

    /// Send one prompt
    ///
    /// With a schema hint the model is asked for JSON matching it and the
    /// first JSON object in the reply is returned; a reply with none fails
    /// with `InvalidResponse`. Without a hint the raw text is returned. An
    /// empty reply is always `InvalidResponse`.
    pub async fn invoke(&self, prompt: &str, schema_hint: Option<&Value>) -> Result<GatewayOutput, LlmError> {
        debug!(prompt_len = prompt.len(), structured = schema_hint.is_some(), "LlmGateway::invoke: called");
        let client = match &self.backend {
            Backend::Remote(client) => client,
            Backend::Offline => return Err(LlmError::NotConfigured),
        };

        let mut request = CompletionRequest::user(prompt, self.max_tokens);
        if let Some(schema) = schema_hint {
            request = request.with_system(format!(
                "次のJSONスキーマに従うJSONオブジェクトのみを出力してください。\n{}",
                serde_json::to_string_pretty(schema)?
            ));
        }

        let response = client.complete(request).await?;
        info!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "LLM call completed"
        );
        if response.stop_reason == StopReason::MaxTokens {
            warn!(max_tokens = self.max_tokens, "LLM reply was cut off at the token limit");
        }
        let content = response
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::InvalidResponse("empty completion".to_string()))?;
        debug!(content_len = content.len(), "LlmGateway::invoke: reply received");

        match schema_hint {
            Some(_) => extract_json_object(&content)
                .map(GatewayOutput::Structured)
                .ok_or_else(|| LlmError::InvalidResponse("no JSON object in reply".to_string())),
            None => Ok(GatewayOutput::Text(content)),
        }
    }
}

/// First well-formed JSON object embedded in `text`
///
/// Tries every `{` in order and parses one value from there, so prose or
/// code fences around the object are ignored.
pub fn extract_json_object(text: &str) -> Option<Value> {
    for (start, _) in text.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(value @ Value::Object(_))) = stream.next() {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::CompletionResponse;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_extract_json_object_plain() {
        let value = extract_json_object(r#"{"persona": "コンサルタント"}"#).unwrap();
        assert_eq!(value["persona"], "コンサルタント");
    }

    #[test]
    fn test_extract_json_object_with_prose_and_fence() {
        let text = "分析結果です。\n```json\n{\"method\": \"PREP法\", \"key_points\": [\"a\"]}\n```\n以上。";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["method"], "PREP法");
    }

    #[test]
    fn test_extract_json_object_skips_broken_braces() {
        let text = "use {braces} like this, then {\"ok\": true}";
        assert_eq!(extract_json_object(text), Some(json!({"ok": true})));
    }

    #[test]
    fn test_extract_json_object_none() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("{ unterminated").is_none());
    }

    #[tokio::test]
    async fn test_offline_gateway_reports_not_configured() {
        let gateway = LlmGateway::offline();
        assert!(gateway.is_offline());

        let err = gateway.invoke("hi", None).await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_invoke_text_returns_raw() {
        let client = Arc::new(MockLlmClient::texts(&["  最適化されたプロンプト  "]));
        let gateway = LlmGateway::remote(client.clone(), 1000);

        let out = gateway.invoke("質問", None).await.unwrap();
        assert_eq!(out, GatewayOutput::Text("  最適化されたプロンプト  ".to_string()));
        assert_eq!(client.prompts(), vec!["質問".to_string()]);
    }

    #[tokio::test]
    async fn test_invoke_structured_sends_schema_as_system_prompt() {
        let client = Arc::new(MockLlmClient::texts(&["Sure: {\"persona\": \"x\"} done"]));
        let gateway = LlmGateway::remote(client.clone(), 1000);

        let hint = json!({"type": "object"});
        let out = gateway.invoke("分析して", Some(&hint)).await.unwrap();
        assert_eq!(out, GatewayOutput::Structured(json!({"persona": "x"})));
        assert_eq!(client.prompts(), vec!["分析して".to_string()]);

        let system = &client.system_prompts()[0];
        assert!(system.contains("JSONスキーマ"));
        assert!(system.contains("\"object\""));
    }

    #[tokio::test]
    async fn test_invoke_structured_without_object_is_invalid() {
        let client = Arc::new(MockLlmClient::texts(&["I cannot help with that"]));
        let gateway = LlmGateway::remote(client, 1000);

        let err = gateway.invoke("分析して", Some(&json!({}))).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_invoke_empty_completion_is_invalid() {
        let client = Arc::new(MockLlmClient::new(vec![CompletionResponse::text("   ")]));
        let gateway = LlmGateway::remote(client, 1000);

        let err = gateway.invoke("質問", None).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_invoke_propagates_transport_error() {
        let client = Arc::new(MockLlmClient::scripted(vec![Err(LlmError::Timeout(Duration::from_secs(5)))]));
        let gateway = LlmGateway::remote(client, 1000);

        let err = gateway.invoke("質問", None).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_from_config_unknown_provider_is_offline() {
        let config = LlmConfig {
            provider: "mystery".to_string(),
            ..Default::default()
        };
        assert!(LlmGateway::from_config(&config).is_offline());
    }

    #[test]
    fn test_from_config_missing_credential_is_offline() {
        let config = LlmConfig {
            api_key_env: "QP_GATEWAY_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        assert!(LlmGateway::from_config(&config).is_offline());
    }
}
