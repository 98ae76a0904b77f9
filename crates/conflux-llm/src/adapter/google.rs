//! Google Gemini generateContent dialect
//!
//! Diverges far enough from the shared payload base that the wire
//! shape is built from scratch: camelCase generation config, `contents`
//! instead of `messages`, and the model name lives in the URL.

use conflux_config::ProviderConfig;
use conflux_core::{FunctionDescriptor, GatewayError, Role};
use conflux_routing::ModelDescriptor;
use http::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde_json::{Map, Value, json};

use super::{AdapterSettings, Normalized, ProviderAdapter, decode_json};
use crate::dispatch::{Endpoint, RawReply};
use crate::mapper;
use crate::types::{ChatCompletionRequest, NormalizedResponse};

/// Google Gemini adapter
pub struct GoogleAdapter {
    name: String,
    settings: AdapterSettings,
}

impl GoogleAdapter {
    /// Create from provider configuration
    pub fn new(name: String, config: &ProviderConfig) -> Self {
        Self {
            name,
            settings: AdapterSettings::from_config(config),
        }
    }
}

/// Canonical role to Gemini role
const fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        Role::System | Role::Developer | Role::User | Role::Tool => "user",
    }
}

impl ProviderAdapter for GoogleAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_payload(
        &self,
        request: &ChatCompletionRequest,
        model: &ModelDescriptor,
        functions: &[FunctionDescriptor],
    ) -> Result<Value, GatewayError> {
        let mut payload = Map::new();

        // System text is a dedicated top-level field and must not be
        // duplicated inside contents
        let (system, rest) = mapper::split_system(&request.messages);
        if let Some(system) = system {
            payload.insert("systemInstruction".to_owned(), json!({"parts": [{"text": system}]}));
        }

        let contents: Vec<Value> = rest
            .iter()
            .map(|message| {
                json!({
                    "role": gemini_role(message.role),
                    "parts": [{"text": message.content.as_text()}],
                })
            })
            .collect();
        payload.insert("contents".to_owned(), Value::Array(contents));

        let mut generation = Map::new();
        let params = &request.params;
        if let Some(temperature) = params.temperature {
            generation.insert("temperature".to_owned(), json!(temperature));
        }
        if let Some(top_p) = params.top_p {
            generation.insert("topP".to_owned(), json!(top_p));
        }
        if let Some(top_k) = params.top_k {
            generation.insert("topK".to_owned(), json!(top_k));
        }
        if let Some(max_tokens) = params.max_tokens {
            generation.insert("maxOutputTokens".to_owned(), json!(max_tokens));
        }
        if let Some(stop) = &params.stop {
            generation.insert("stopSequences".to_owned(), json!(stop));
        }
        if let Some(n) = params.n {
            generation.insert("candidateCount".to_owned(), json!(n));
        }
        if !generation.is_empty() {
            payload.insert("generationConfig".to_owned(), Value::Object(generation));
        }

        if model.supports_functions && request.use_tools && !functions.is_empty() {
            let declarations: Vec<Value> = functions
                .iter()
                .map(|f| {
                    json!({
                        "name": f.name,
                        "description": f.description,
                        "parameters": f.parameters,
                    })
                })
                .collect();
            payload.insert("tools".to_owned(), json!([{"functionDeclarations": declarations}]));
        }

        Ok(Value::Object(payload))
    }

    fn endpoint(&self, request: &ChatCompletionRequest, model: &ModelDescriptor) -> Endpoint {
        let verb = if request.stream {
            "streamGenerateContent?alt=sse"
        } else {
            "generateContent"
        };
        self.settings
            .endpoint(&format!("v1beta/models/{}:{verb}", model.wire_name))
    }

    fn headers(&self) -> Result<HeaderMap, GatewayError> {
        let mut headers = self.settings.base_headers()?;
        if let Some(key) = &self.settings.api_key {
            let value = HeaderValue::try_from(key.expose_secret())
                .map_err(|e| GatewayError::Configuration(format!("invalid api key: {e}")))?;
            headers.insert("x-goog-api-key", value);
        }
        Ok(headers)
    }

    fn normalize(&self, reply: &RawReply) -> Result<Normalized, GatewayError> {
        let raw = decode_json(&self.name, reply)?;
        let parts = raw["candidates"][0]["content"]["parts"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        // First text part of the first candidate, or empty
        let response = parts
            .iter()
            .find_map(|p| p.get("text").and_then(Value::as_str))
            .unwrap_or_default()
            .to_owned();

        let calls: Vec<Value> = parts
            .iter()
            .filter_map(|p| p.get("functionCall"))
            .map(|call| {
                json!({
                    "name": call.get("name"),
                    "arguments": call.get("args"),
                })
            })
            .collect();
        let tool_calls = if calls.is_empty() { None } else { Some(Value::Array(calls)) };

        Ok(Normalized::Response(NormalizedResponse {
            response,
            tool_calls,
            usage: raw.get("usageMetadata").filter(|v| !v.is_null()).cloned(),
            citations: None,
            trace: reply.trace.clone(),
        }))
    }
}
