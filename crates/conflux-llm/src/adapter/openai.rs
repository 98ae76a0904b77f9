//! OpenAI-compatible chat completions dialect
//!
//! Also the default dialect for unknown providers, since most vendors
//! expose an OpenAI-compatible surface.

use conflux_config::ProviderConfig;
use conflux_core::{FunctionDescriptor, GatewayError, Role};
use conflux_routing::ModelDescriptor;
use http::HeaderMap;
use serde_json::{Value, json};

use super::{AdapterSettings, Normalized, ProviderAdapter, decode_json};
use crate::dispatch::{Endpoint, RawReply};
use crate::mapper;
use crate::types::{ChatCompletionRequest, NormalizedResponse};

/// Models that reject parallel tool calls
const NO_PARALLEL_TOOL_CALLS: &[&str] = &["gpt-4-turbo", "gpt-4o-mini"];

/// OpenAI-compatible adapter
pub struct OpenAiAdapter {
    name: String,
    settings: AdapterSettings,
}

impl OpenAiAdapter {
    /// Create from provider configuration
    pub fn new(name: String, config: &ProviderConfig) -> Self {
        Self {
            name,
            settings: AdapterSettings::from_config(config),
        }
    }
}

/// Whether a wire name belongs to the reasoning model family
///
/// These models use `max_completion_tokens` and reject the `system`
/// role in favor of `developer`.
fn is_reasoning_family(wire_name: &str) -> bool {
    wire_name.starts_with("o1") || wire_name.starts_with("o3") || wire_name.starts_with("o4")
}

impl ProviderAdapter for OpenAiAdapter {
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
        let reasoning = is_reasoning_family(&model.wire_name);

        if let Some(top_p) = request.params.top_p {
            payload.insert("top_p".to_owned(), json!(top_p));
        }
        if let Some(max_tokens) = request.params.max_tokens {
            let field = if reasoning { "max_completion_tokens" } else { "max_tokens" };
            payload.insert(field.to_owned(), json!(max_tokens));
        }

        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|message| {
                let mut entry = mapper::wire_message(message);
                if reasoning
                    && message.role == Role::System
                    && let Some(obj) = entry.as_object_mut()
                {
                    obj.insert("role".to_owned(), Value::String("developer".to_owned()));
                }
                entry
            })
            .collect();
        payload.insert("messages".to_owned(), Value::Array(messages));

        if model.supports_functions && request.use_tools && !functions.is_empty() {
            payload.insert("tools".to_owned(), mapper::tool_declarations(functions));
            if NO_PARALLEL_TOOL_CALLS.contains(&model.wire_name.as_str()) {
                payload.insert("parallel_tool_calls".to_owned(), Value::Bool(false));
            }
        }

        Ok(Value::Object(payload))
    }

    fn endpoint(&self, _request: &ChatCompletionRequest, _model: &ModelDescriptor) -> Endpoint {
        self.settings.endpoint("chat/completions")
    }

    fn headers(&self) -> Result<HeaderMap, GatewayError> {
        self.settings.bearer_headers()
    }

    fn normalize(&self, reply: &RawReply) -> Result<Normalized, GatewayError> {
        let raw = decode_json(&self.name, reply)?;
        let message = &raw["choices"][0]["message"];

        let response = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let tool_calls = message.get("tool_calls").filter(|v| !v.is_null()).cloned();
        let usage = raw.get("usage").filter(|v| !v.is_null()).cloned();
        let citations = raw.get("citations").and_then(Value::as_array).map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        });

        Ok(Normalized::Response(NormalizedResponse {
            response,
            tool_calls,
            usage,
            citations,
            trace: reply.trace.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::tests::model;
    use crate::dispatch::VendorTrace;
    use crate::types::SamplingParams;
    use bytes::Bytes;
    use conflux_core::{Content, Message};

    fn adapter() -> OpenAiAdapter {
        OpenAiAdapter::new("openai".to_owned(), &ProviderConfig::default())
    }

    fn request(text: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            messages: vec![Message::new(Role::User, Content::Text(text.to_owned()))],
            ..ChatCompletionRequest::default()
        }
    }

    fn reply(body: Value) -> RawReply {
        RawReply {
            body: Bytes::from(body.to_string()),
            content_type: "application/json".to_owned(),
            trace: VendorTrace::default(),
        }
    }

    #[test]
    fn standard_models_use_max_tokens() {
        let mut req = request("hi");
        req.params.max_tokens = Some(256);

        let payload = adapter().build_payload(&req, &model("gpt-4o", "openai"), &[]).unwrap();
        assert_eq!(payload["max_tokens"], 256);
        assert!(payload.get("max_completion_tokens").is_none());
    }

    #[test]
    fn reasoning_models_use_max_completion_tokens_and_developer_role() {
        let mut req = request("hi");
        req.params.max_tokens = Some(256);
        req.messages.insert(0, Message::new(Role::System, Content::Text("be terse".to_owned())));

        let payload = adapter().build_payload(&req, &model("o1-mini", "openai"), &[]).unwrap();
        assert_eq!(payload["max_completion_tokens"], 256);
        assert!(payload.get("max_tokens").is_none());
        assert_eq!(payload["messages"][0]["role"], "developer");
        assert_eq!(payload["messages"][1]["role"], "user");
    }

    #[test]
    fn parallel_tool_calls_disabled_for_listed_models() {
        let functions = vec![FunctionDescriptor {
            name: "lookup".to_owned(),
            description: "find things".to_owned(),
            parameters: None,
        }];

        let payload = adapter()
            .build_payload(&request("hi"), &model("gpt-4o-mini", "openai"), &functions)
            .unwrap();
        assert_eq!(payload["parallel_tool_calls"], false);
        assert_eq!(payload["tools"][0]["function"]["name"], "lookup");

        let payload = adapter()
            .build_payload(&request("hi"), &model("gpt-4o", "openai"), &functions)
            .unwrap();
        assert!(payload.get("parallel_tool_calls").is_none());
    }

    #[test]
    fn tools_omitted_when_caller_disables_them() {
        let functions = vec![FunctionDescriptor {
            name: "lookup".to_owned(),
            description: String::new(),
            parameters: None,
        }];
        let mut req = request("hi");
        req.use_tools = false;

        let payload = adapter()
            .build_payload(&req, &model("gpt-4o", "openai"), &functions)
            .unwrap();
        assert!(payload.get("tools").is_none());
    }

    #[test]
    fn normalizes_choices_message_shape() {
        let raw = reply(json!({
            "choices": [{"message": {"content": "hello", "tool_calls": null}}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2}
        }));

        let Normalized::Response(normalized) = adapter().normalize(&raw).unwrap() else {
            panic!("expected text response");
        };
        assert_eq!(normalized.response, "hello");
        assert!(normalized.tool_calls.is_none());
        assert_eq!(normalized.usage.unwrap()["prompt_tokens"], 5);
    }

    #[test]
    fn tool_calls_pass_through_verbatim() {
        let raw = reply(json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{"id": "c1", "function": {"name": "lookup", "arguments": "{}"}}]
            }}]
        }));

        let Normalized::Response(normalized) = adapter().normalize(&raw).unwrap() else {
            panic!("expected text response");
        };
        assert_eq!(normalized.response, "");
        assert_eq!(normalized.tool_calls.unwrap()[0]["id"], "c1");
    }

    #[test]
    fn round_trip_preserves_message_order() {
        let mut req = request("first");
        req.messages.push(Message::new(Role::Assistant, Content::Text("second".to_owned())));
        req.messages.push(Message::new(Role::User, Content::Text("third".to_owned())));
        req.params = SamplingParams {
            temperature: Some(0.1),
            ..SamplingParams::default()
        };

        let payload = adapter().build_payload(&req, &model("gpt-4o", "openai"), &[]).unwrap();
        let roles: Vec<&str> = payload["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, ["user", "assistant", "user"]);
        assert_eq!(payload["messages"][2]["content"], "third");
    }
}
