//! Anthropic Messages API dialect

use conflux_config::ProviderConfig;
use conflux_core::{FunctionDescriptor, GatewayError};
use conflux_routing::ModelDescriptor;
use http::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde_json::{Value, json};

use super::{AdapterSettings, Normalized, ProviderAdapter, decode_json};
use crate::dispatch::{Endpoint, RawReply};
use crate::mapper;
use crate::types::{ChatCompletionRequest, NormalizedResponse};

/// API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API adapter
pub struct AnthropicAdapter {
    name: String,
    settings: AdapterSettings,
}

impl AnthropicAdapter {
    /// Create from provider configuration
    pub fn new(name: String, config: &ProviderConfig) -> Self {
        Self {
            name,
            settings: AdapterSettings::from_config(config),
        }
    }
}

impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_payload(
        &self,
        request: &ChatCompletionRequest,
        model: &ModelDescriptor,
        functions: &[FunctionDescriptor],
    ) -> Result<Value, GatewayError> {
        let mut payload = mapper::common_payload(request, model);

        // The Messages API rejects these OpenAI-style sampling controls
        for key in ["seed", "presence_penalty", "frequency_penalty", "n"] {
            payload.remove(key);
        }

        // The Messages API requires max_tokens
        payload.insert(
            "max_tokens".to_owned(),
            json!(request.params.max_tokens.unwrap_or(model.max_tokens)),
        );
        if let Some(top_k) = request.params.top_k {
            payload.insert("top_k".to_owned(), json!(top_k));
        }

        // System text is a dedicated top-level field and must not be
        // duplicated inside messages
        let (system, rest) = mapper::split_system(&request.messages);
        if let Some(system) = system {
            payload.insert("system".to_owned(), Value::String(system));
        }
        payload.insert("messages".to_owned(), mapper::wire_messages(rest));

        // Thinking needs both a capable model and an explicit ask from
        // the caller (`should_think` or a reasoning effort); capability
        // alone does not opt the request in
        let thinking = model.has_thinking && (request.should_think || request.reasoning_effort.is_some());
        if thinking {
            // Thinking and top_p are mutually exclusive on this API
            let budget = mapper::reasoning_budget(request.params.max_tokens, request.reasoning_effort);
            payload.insert(
                "thinking".to_owned(),
                json!({"type": "enabled", "budget_tokens": budget}),
            );
        } else if let Some(top_p) = request.params.top_p {
            payload.insert("top_p".to_owned(), json!(top_p));
        }

        if model.supports_functions && request.use_tools && !functions.is_empty() {
            let tools: Vec<Value> = functions
                .iter()
                .map(|f| {
                    json!({
                        "name": f.name,
                        "description": f.description,
                        "input_schema": f.parameters.clone().unwrap_or_else(|| json!({"type": "object"})),
                    })
                })
                .collect();
            payload.insert("tools".to_owned(), Value::Array(tools));
        }

        Ok(Value::Object(payload))
    }

    fn endpoint(&self, _request: &ChatCompletionRequest, _model: &ModelDescriptor) -> Endpoint {
        self.settings.endpoint("v1/messages")
    }

    fn headers(&self) -> Result<HeaderMap, GatewayError> {
        let mut headers = self.settings.base_headers()?;
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        if let Some(key) = &self.settings.api_key {
            let value = HeaderValue::try_from(key.expose_secret())
                .map_err(|e| GatewayError::Configuration(format!("invalid api key: {e}")))?;
            headers.insert("x-api-key", value);
        }
        Ok(headers)
    }

    fn normalize(&self, reply: &RawReply) -> Result<Normalized, GatewayError> {
        let raw = decode_json(&self.name, reply)?;

        let blocks = raw.get("content").and_then(Value::as_array).cloned().unwrap_or_default();

        let response = blocks
            .iter()
            .filter(|b| b["type"] == "text")
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(" ");

        let tool_uses: Vec<Value> = blocks
            .iter()
            .filter(|b| b["type"] == "tool_use")
            .map(|b| {
                json!({
                    "id": b.get("id"),
                    "name": b.get("name"),
                    "arguments": b.get("input"),
                })
            })
            .collect();
        let tool_calls = if tool_uses.is_empty() {
            None
        } else {
            Some(Value::Array(tool_uses))
        };

        Ok(Normalized::Response(NormalizedResponse {
            response,
            tool_calls,
            usage: raw.get("usage").filter(|v| !v.is_null()).cloned(),
            citations: None,
            trace: reply.trace.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::tests::model;
    use crate::dispatch::VendorTrace;
    use crate::types::ReasoningEffort;
    use bytes::Bytes;
    use conflux_core::{Content, Message, Role};

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::new("anthropic".to_owned(), &ProviderConfig::default())
    }

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            messages: vec![
                Message::new(Role::System, Content::Text("be terse".to_owned())),
                Message::new(Role::User, Content::Text("hi".to_owned())),
            ],
            ..ChatCompletionRequest::default()
        }
    }

    #[test]
    fn system_is_top_level_and_not_in_messages() {
        let payload = adapter().build_payload(&request(), &model("claude", "anthropic"), &[]).unwrap();

        assert_eq!(payload["system"], "be terse");
        let messages = payload["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn max_tokens_defaults_to_model_limit() {
        let payload = adapter().build_payload(&request(), &model("claude", "anthropic"), &[]).unwrap();
        assert_eq!(payload["max_tokens"], 4096);
    }

    #[test]
    fn thinking_budget_replaces_top_p() {
        let mut req = request();
        req.params.max_tokens = Some(1000);
        req.params.top_p = Some(0.9);
        req.reasoning_effort = Some(ReasoningEffort::High);

        let mut descriptor = model("claude", "anthropic");
        descriptor.has_thinking = true;

        let payload = adapter().build_payload(&req, &descriptor, &[]).unwrap();
        assert_eq!(payload["thinking"]["type"], "enabled");
        assert_eq!(payload["thinking"]["budget_tokens"], 900);
        assert!(payload.get("top_p").is_none());
    }

    #[test]
    fn thinking_capable_model_stays_off_without_an_explicit_ask() {
        let mut req = request();
        req.params.top_p = Some(0.9);

        let mut descriptor = model("claude", "anthropic");
        descriptor.has_thinking = true;

        let payload = adapter().build_payload(&req, &descriptor, &[]).unwrap();
        assert!(payload.get("thinking").is_none());
        assert_eq!(payload["top_p"], 0.9);

        req.should_think = true;
        let payload = adapter().build_payload(&req, &descriptor, &[]).unwrap();
        assert_eq!(payload["thinking"]["type"], "enabled");
    }

    #[test]
    fn unsupported_sampling_controls_are_dropped() {
        let mut req = request();
        req.params.temperature = Some(0.4);
        req.params.seed = Some(7);
        req.params.presence_penalty = Some(0.5);
        req.params.frequency_penalty = Some(0.5);
        req.params.n = Some(2);

        let payload = adapter().build_payload(&req, &model("claude", "anthropic"), &[]).unwrap();
        assert_eq!(payload["temperature"], 0.4);
        assert!(payload.get("seed").is_none());
        assert!(payload.get("presence_penalty").is_none());
        assert!(payload.get("frequency_penalty").is_none());
        assert!(payload.get("n").is_none());
    }

    #[test]
    fn top_p_kept_when_thinking_is_off() {
        let mut req = request();
        req.params.top_p = Some(0.9);

        let payload = adapter().build_payload(&req, &model("claude", "anthropic"), &[]).unwrap();
        assert_eq!(payload["top_p"], 0.9);
        assert!(payload.get("thinking").is_none());
    }

    #[test]
    fn content_blocks_join_with_single_space() {
        let reply = RawReply {
            body: Bytes::from(
                json!({
                    "content": [
                        {"type": "text", "text": "Hello"},
                        {"type": "tool_use", "id": "t1", "name": "lookup", "input": {"q": "x"}},
                        {"type": "text", "text": "world"}
                    ],
                    "usage": {"input_tokens": 10}
                })
                .to_string(),
            ),
            content_type: "application/json".to_owned(),
            trace: VendorTrace::default(),
        };

        let Normalized::Response(normalized) = adapter().normalize(&reply).unwrap() else {
            panic!("expected text response");
        };
        assert_eq!(normalized.response, "Hello world");
        let calls = normalized.tool_calls.unwrap();
        assert_eq!(calls[0]["name"], "lookup");
        assert_eq!(calls[0]["arguments"]["q"], "x");
    }
}
