//! Workers AI dialect
//!
//! Text models return an already-normalized `{response}` shape (or wrap
//! it in `result`); media-generation models take a prompt/image pair
//! instead of a messages array and may return raw binary output.

use conflux_config::ProviderConfig;
use conflux_core::{FunctionDescriptor, GatewayError};
use conflux_routing::ModelDescriptor;
use http::HeaderMap;
use serde_json::{Value, json};

use super::{AdapterSettings, Normalized, ProviderAdapter, decode_json};
use crate::dispatch::{Endpoint, RawReply};
use crate::mapper;
use crate::types::{ChatCompletionRequest, NormalizedResponse};

/// Workers AI adapter
pub struct WorkersAdapter {
    name: String,
    settings: AdapterSettings,
}

impl WorkersAdapter {
    /// Create from provider configuration
    pub fn new(name: String, config: &ProviderConfig) -> Self {
        Self {
            name,
            settings: AdapterSettings::from_config(config),
        }
    }
}

impl ProviderAdapter for WorkersAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_payload(
        &self,
        request: &ChatCompletionRequest,
        model: &ModelDescriptor,
        functions: &[FunctionDescriptor],
    ) -> Result<Value, GatewayError> {
        if model.is_media_generation() {
            // Media models take the last message's content as a
            // prompt/image pair instead of a messages array
            let inputs = mapper::media_inputs(request);
            if inputs.prompt.is_empty() && inputs.image.is_none() {
                return Err(GatewayError::Params(
                    "media generation requires a prompt or source image".to_owned(),
                ));
            }
            let mut payload = serde_json::Map::new();
            payload.insert("prompt".to_owned(), Value::String(inputs.prompt));
            if let Some(image) = inputs.image {
                payload.insert("image".to_owned(), Value::String(image));
            }
            return Ok(Value::Object(payload));
        }

        let mut payload = mapper::common_payload(request, model);
        if let Some(top_p) = request.params.top_p {
            payload.insert("top_p".to_owned(), json!(top_p));
        }
        if let Some(top_k) = request.params.top_k {
            payload.insert("top_k".to_owned(), json!(top_k));
        }
        if let Some(max_tokens) = request.params.max_tokens {
            payload.insert("max_tokens".to_owned(), json!(max_tokens));
        }
        payload.insert("messages".to_owned(), mapper::wire_messages(&request.messages));

        if model.supports_functions && request.use_tools && !functions.is_empty() {
            payload.insert("tools".to_owned(), mapper::tool_declarations(functions));
        }

        Ok(Value::Object(payload))
    }

    fn endpoint(&self, _request: &ChatCompletionRequest, model: &ModelDescriptor) -> Endpoint {
        // The route is the model's wire name, e.g. "@cf/meta/llama-3.1-8b-instruct"
        self.settings.endpoint(&model.wire_name)
    }

    fn headers(&self) -> Result<HeaderMap, GatewayError> {
        self.settings.bearer_headers()
    }

    fn normalize(&self, reply: &RawReply) -> Result<Normalized, GatewayError> {
        if reply.content_type.starts_with("image/") || reply.content_type.starts_with("video/") {
            return Ok(Normalized::Media {
                bytes: reply.body.to_vec(),
                content_type: reply.content_type.clone(),
            });
        }

        let raw = decode_json(&self.name, reply)?;

        // Pass through when already normalized, else unwrap `result`
        let source = if raw.get("response").is_some() {
            raw.clone()
        } else {
            raw.get("result").cloned().unwrap_or(Value::Null)
        };

        let response = match &source {
            Value::String(text) => text.clone(),
            other => other
                .get("response")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
        };

        Ok(Normalized::Response(NormalizedResponse {
            response,
            tool_calls: source.get("tool_calls").filter(|v| !v.is_null()).cloned(),
            usage: source
                .get("usage")
                .or_else(|| raw.get("usage"))
                .filter(|v| !v.is_null())
                .cloned(),
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
    use bytes::Bytes;
    use conflux_config::ModelType;
    use conflux_core::{Content, ContentPart, Message, Role};

    fn adapter() -> WorkersAdapter {
        WorkersAdapter::new("workers-ai".to_owned(), &ProviderConfig::default())
    }

    fn reply(body: Value, content_type: &str) -> RawReply {
        RawReply {
            body: Bytes::from(body.to_string()),
            content_type: content_type.to_owned(),
            trace: VendorTrace::default(),
        }
    }

    #[test]
    fn media_models_get_prompt_image_pair() {
        let mut descriptor = model("@cf/flux", "workers-ai");
        descriptor.model_types = vec![ModelType::ImageToImage];

        let request = ChatCompletionRequest {
            messages: vec![Message::new(
                Role::User,
                Content::Parts(vec![
                    ContentPart::Text { text: "a fox".to_owned() },
                    ContentPart::Image {
                        url: "data:image/png;base64,abc".to_owned(),
                        detail: None,
                    },
                ]),
            )],
            ..ChatCompletionRequest::default()
        };

        let payload = adapter().build_payload(&request, &descriptor, &[]).unwrap();
        assert_eq!(payload["prompt"], "a fox");
        assert_eq!(payload["image"], "data:image/png;base64,abc");
        assert!(payload.get("messages").is_none());
    }

    #[test]
    fn media_without_inputs_is_a_params_error() {
        let mut descriptor = model("@cf/flux", "workers-ai");
        descriptor.model_types = vec![ModelType::TextToImage];

        let request = ChatCompletionRequest::default();
        let result = adapter().build_payload(&request, &descriptor, &[]);
        assert!(matches!(result, Err(GatewayError::Params(_))));
    }

    #[test]
    fn already_normalized_shape_passes_through() {
        let raw = reply(json!({"response": "hello", "usage": {"total_tokens": 3}}), "application/json");
        let Normalized::Response(normalized) = adapter().normalize(&raw).unwrap() else {
            panic!("expected text response");
        };
        assert_eq!(normalized.response, "hello");
        assert_eq!(normalized.usage.unwrap()["total_tokens"], 3);
    }

    #[test]
    fn result_field_is_the_fallback() {
        let raw = reply(json!({"result": {"response": "hello"}}), "application/json");
        let Normalized::Response(normalized) = adapter().normalize(&raw).unwrap() else {
            panic!("expected text response");
        };
        assert_eq!(normalized.response, "hello");

        let raw = reply(json!({"result": "plain text"}), "application/json");
        let Normalized::Response(normalized) = adapter().normalize(&raw).unwrap() else {
            panic!("expected text response");
        };
        assert_eq!(normalized.response, "plain text");
    }

    #[test]
    fn binary_output_becomes_media() {
        let raw = RawReply {
            body: Bytes::from_static(&[0x89, 0x50, 0x4e, 0x47]),
            content_type: "image/png".to_owned(),
            trace: VendorTrace::default(),
        };
        match adapter().normalize(&raw).unwrap() {
            Normalized::Media { bytes, content_type } => {
                assert_eq!(bytes, vec![0x89, 0x50, 0x4e, 0x47]);
                assert_eq!(content_type, "image/png");
            }
            Normalized::Response(_) => panic!("expected media"),
        }
    }
}
