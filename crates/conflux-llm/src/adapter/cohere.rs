//! Cohere chat dialect
//!
//! System text is injected as a leading message with the vendor's
//! `SYSTEM` role name; a short exception list of model ids rejects that
//! role outright and never receives it.

use conflux_config::ProviderConfig;
use conflux_core::{FunctionDescriptor, GatewayError};
use conflux_routing::ModelDescriptor;
use http::HeaderMap;
use serde_json::{Value, json};

use super::{AdapterSettings, Normalized, ProviderAdapter, decode_json};
use crate::dispatch::{Endpoint, RawReply};
use crate::mapper;
use crate::types::{ChatCompletionRequest, NormalizedResponse};

/// Models that reject the `SYSTEM` role; system text is dropped for them
const SYSTEM_ROLE_EXCEPTIONS: &[&str] = &["command-r7b-12-2024", "command-light"];

/// Cohere chat adapter
pub struct CohereAdapter {
    name: String,
    settings: AdapterSettings,
}

impl CohereAdapter {
    /// Create from provider configuration
    pub fn new(name: String, config: &ProviderConfig) -> Self {
        Self {
            name,
            settings: AdapterSettings::from_config(config),
        }
    }
}

impl ProviderAdapter for CohereAdapter {
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

        if let Some(top_p) = request.params.top_p {
            payload.insert("p".to_owned(), json!(top_p));
        }
        if let Some(top_k) = request.params.top_k {
            payload.insert("k".to_owned(), json!(top_k));
        }
        if let Some(max_tokens) = request.params.max_tokens {
            payload.insert("max_tokens".to_owned(), json!(max_tokens));
        }

        let (system, rest) = mapper::split_system(&request.messages);
        let mut messages: Vec<Value> = Vec::with_capacity(rest.len() + 1);
        if let Some(system) = system
            && !SYSTEM_ROLE_EXCEPTIONS.contains(&model.wire_name.as_str())
        {
            messages.push(json!({"role": "SYSTEM", "content": system}));
        }
        messages.extend(rest.iter().map(|m| mapper::wire_message(m)));
        payload.insert("messages".to_owned(), Value::Array(messages));

        if model.supports_functions && request.use_tools && !functions.is_empty() {
            payload.insert("tools".to_owned(), mapper::tool_declarations(functions));
        }

        Ok(Value::Object(payload))
    }

    fn endpoint(&self, _request: &ChatCompletionRequest, _model: &ModelDescriptor) -> Endpoint {
        self.settings.endpoint("v2/chat")
    }

    fn headers(&self) -> Result<HeaderMap, GatewayError> {
        self.settings.bearer_headers()
    }

    fn normalize(&self, reply: &RawReply) -> Result<Normalized, GatewayError> {
        let raw = decode_json(&self.name, reply)?;
        let message = &raw["message"];

        let response = match message.get("content") {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Array(parts)) => parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(" "),
            _ => String::new(),
        };

        Ok(Normalized::Response(NormalizedResponse {
            response,
            tool_calls: message.get("tool_calls").filter(|v| !v.is_null()).cloned(),
            usage: raw.get("usage").filter(|v| !v.is_null()).cloned(),
            citations: None,
            trace: reply.trace.clone(),
        }))
    }
}
