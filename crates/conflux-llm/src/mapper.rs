//! Shared parameter-mapping helpers used by every provider adapter
//!
//! Adapters build a provider-neutral "common" payload first, then apply
//! their dialect's branches (token field name, system-prompt placement,
//! thinking budgets, media shapes) on top.

use conflux_core::{FunctionDescriptor, Message, Role};
use conflux_routing::ModelDescriptor;
use serde_json::{Map, Value, json};

use crate::types::{ChatCompletionRequest, ReasoningEffort};

/// Thinking budget when the request carries no `max_tokens`
const DEFAULT_THINKING_BUDGET: u32 = 1024;

/// Compute the extended-thinking token budget
///
/// The budget is a fraction of `max_tokens` chosen by effort: low 50%,
/// medium 75%, high 90%, anything else 75%. Without `max_tokens` the
/// budget defaults to 1024.
pub fn reasoning_budget(max_tokens: Option<u32>, effort: Option<ReasoningEffort>) -> u32 {
    max_tokens.map_or(DEFAULT_THINKING_BUDGET, |max| {
        let fraction = match effort {
            Some(ReasoningEffort::Low) => 0.5,
            Some(ReasoningEffort::High) => 0.9,
            Some(ReasoningEffort::Medium | ReasoningEffort::Other) | None => 0.75,
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let budget = (f64::from(max) * fraction) as u32;
        budget
    })
}

/// Build the provider-neutral payload base
///
/// Carries the wire model name, the sampling controls every dialect
/// shares, and the stream flag. Messages, token limits, and tools are
/// attached by the adapter because their shape is dialect-specific.
pub fn common_payload(request: &ChatCompletionRequest, model: &ModelDescriptor) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("model".to_owned(), Value::String(model.wire_name.clone()));

    let params = &request.params;
    if let Some(temperature) = params.temperature {
        payload.insert("temperature".to_owned(), json!(temperature));
    }
    if let Some(seed) = params.seed {
        payload.insert("seed".to_owned(), json!(seed));
    }
    if let Some(presence_penalty) = params.presence_penalty {
        payload.insert("presence_penalty".to_owned(), json!(presence_penalty));
    }
    if let Some(frequency_penalty) = params.frequency_penalty {
        payload.insert("frequency_penalty".to_owned(), json!(frequency_penalty));
    }
    if let Some(stop) = &params.stop {
        payload.insert("stop".to_owned(), json!(stop));
    }
    if let Some(logit_bias) = &params.logit_bias {
        payload.insert("logit_bias".to_owned(), logit_bias.clone());
    }
    if let Some(n) = params.n {
        payload.insert("n".to_owned(), json!(n));
    }
    if request.stream {
        payload.insert("stream".to_owned(), Value::Bool(true));
    }

    payload
}

/// Split system instructions out of a transcript
///
/// Returns the joined system text (for vendors that take it as a
/// dedicated top-level field and must not see it duplicated inside
/// `messages`) and the remaining non-system messages in order.
pub fn split_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
    let mut system_parts: Vec<String> = Vec::new();
    let mut rest: Vec<&Message> = Vec::new();

    for message in messages {
        if message.role == Role::System {
            system_parts.push(message.content.as_text());
        } else {
            rest.push(message);
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system, rest)
}

/// Serialize one canonical message into the generic wire shape
///
/// Only role, content, and tool calls go on the wire; internal fields
/// (id, timestamps, platform) stay home.
pub fn wire_message(message: &Message) -> Value {
    let mut entry = Map::new();
    entry.insert("role".to_owned(), json!(message.role));
    entry.insert(
        "content".to_owned(),
        serde_json::to_value(&message.content).unwrap_or(Value::Null),
    );
    if let Some(tool_calls) = &message.tool_calls {
        entry.insert("tool_calls".to_owned(), tool_calls.clone());
    }
    Value::Object(entry)
}

/// Serialize a transcript into the generic wire shape
pub fn wire_messages<'a>(messages: impl IntoIterator<Item = &'a Message>) -> Value {
    Value::Array(messages.into_iter().map(wire_message).collect())
}

/// Function declarations in the `{"type": "function", ...}` wire shape
pub fn tool_declarations(functions: &[FunctionDescriptor]) -> Value {
    Value::Array(
        functions
            .iter()
            .map(|f| {
                json!({
                    "type": "function",
                    "function": {
                        "name": f.name,
                        "description": f.description,
                        "parameters": f.parameters,
                    }
                })
            })
            .collect(),
    )
}

/// Prompt/image inputs for media-generation models
#[derive(Debug, Clone, Default)]
pub struct MediaInputs {
    /// Text prompt from the last message
    pub prompt: String,
    /// Source image reference, when the last message carries one
    pub image: Option<String>,
}

/// Extract media-generation inputs from the last message
///
/// Media-generation dialects replace the `messages` array with a
/// prompt/image pair taken from the last message's content.
pub fn media_inputs(request: &ChatCompletionRequest) -> MediaInputs {
    request.messages.last().map_or_else(MediaInputs::default, |last| MediaInputs {
        prompt: last.content.as_text(),
        image: last.content.first_image().map(str::to_owned),
    })
}

/// Drop system messages from a transcript (no-system request mode)
pub fn strip_system(messages: Vec<Message>) -> Vec<Message> {
    messages.into_iter().filter(|m| m.role != Role::System).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_core::{Content, ContentPart};

    #[test]
    fn reasoning_budget_fractions() {
        assert_eq!(reasoning_budget(Some(1000), Some(ReasoningEffort::Low)), 500);
        assert_eq!(reasoning_budget(Some(1000), Some(ReasoningEffort::Medium)), 750);
        assert_eq!(reasoning_budget(Some(1000), Some(ReasoningEffort::High)), 900);
        assert_eq!(reasoning_budget(Some(1000), Some(ReasoningEffort::Other)), 750);
        assert_eq!(reasoning_budget(Some(1000), None), 750);
    }

    #[test]
    fn reasoning_budget_defaults_without_max_tokens() {
        assert_eq!(reasoning_budget(None, Some(ReasoningEffort::High)), 1024);
        assert_eq!(reasoning_budget(None, None), 1024);
    }

    #[test]
    fn split_system_joins_and_preserves_order() {
        let messages = vec![
            Message::new(Role::System, Content::Text("be terse".to_owned())),
            Message::new(Role::User, Content::Text("hi".to_owned())),
            Message::new(Role::System, Content::Text("stay safe".to_owned())),
            Message::new(Role::Assistant, Content::Text("hello".to_owned())),
        ];

        let (system, rest) = split_system(&messages);
        assert_eq!(system.as_deref(), Some("be terse\n\nstay safe"));
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].role, Role::User);
        assert_eq!(rest[1].role, Role::Assistant);
    }

    #[test]
    fn wire_message_omits_internal_fields() {
        let message = Message::new(Role::User, Content::Text("hi".to_owned()));
        let wire = wire_message(&message);

        assert_eq!(wire["role"], "user");
        assert_eq!(wire["content"], "hi");
        assert!(wire.get("id").is_none());
        assert!(wire.get("created_at").is_none());
    }

    #[test]
    fn media_inputs_take_prompt_and_first_image() {
        let request = ChatCompletionRequest {
            messages: vec![Message::new(
                Role::User,
                Content::Parts(vec![
                    ContentPart::Text {
                        text: "a red fox".to_owned(),
                    },
                    ContentPart::Image {
                        url: "data:image/png;base64,xyz".to_owned(),
                        detail: None,
                    },
                ]),
            )],
            ..ChatCompletionRequest::default()
        };

        let inputs = media_inputs(&request);
        assert_eq!(inputs.prompt, "a red fox");
        assert_eq!(inputs.image.as_deref(), Some("data:image/png;base64,xyz"));
    }

    #[test]
    fn strip_system_keeps_everything_else() {
        let messages = vec![
            Message::new(Role::System, Content::Text("x".to_owned())),
            Message::new(Role::User, Content::Text("y".to_owned())),
        ];
        let stripped = strip_system(messages);
        assert_eq!(stripped.len(), 1);
        assert_eq!(stripped[0].role, Role::User);
    }
}
