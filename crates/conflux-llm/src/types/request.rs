use conflux_core::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sampling controls forwarded to the vendor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Sampling temperature (0.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Top-k sampling cutoff
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Random seed for deterministic generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Presence penalty (-2.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Frequency penalty (-2.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Token-level logit bias map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logit_bias: Option<Value>,
    /// Number of completions to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
}

/// How the request transcript should be shaped before dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestMode {
    /// Standard completion
    #[default]
    Normal,
    /// Strip system messages before dispatch
    NoSystem,
    /// Prompt-improvement assistant
    PromptCoach,
    /// Pin routing to locally hosted models
    Local,
    /// Pin routing to remote vendor models
    Remote,
}

/// Requested depth of extended reasoning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
    /// Unrecognized effort values map here rather than failing
    #[serde(other)]
    Other,
}

/// Retrieval-augmentation options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagOptions {
    /// Number of context passages to retrieve
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Named collection to search; `None` means the default corpus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

const fn default_top_k() -> usize {
    3
}

impl Default for RagOptions {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            collection: None,
        }
    }
}

/// Canonical chat-completion request
///
/// The one shape every inbound request is decoded into; everything
/// downstream of the entry point consumes this and never a vendor
/// dialect. Exactly one effective model is resolved before dispatch:
/// either `model` is pinned here or the router picks one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Pinned model id; absence triggers routing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Ordered conversation transcript
    pub messages: Vec<Message>,
    /// Sampling controls
    #[serde(flatten)]
    pub params: SamplingParams,
    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
    /// Transcript-shaping mode
    #[serde(default)]
    pub mode: RequestMode,
    /// Whether to augment the prompt with retrieved context
    #[serde(default)]
    pub use_rag: bool,
    /// Retrieval options, meaningful only when `use_rag` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag: Option<RagOptions>,
    /// Requested reasoning depth for thinking-capable models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Force-enable extended thinking where the model supports it
    #[serde(default)]
    pub should_think: bool,
    /// Allow tool/function declarations to be attached
    #[serde(default = "default_true")]
    pub use_tools: bool,
    /// Persist the exchange to the conversation store
    #[serde(default = "default_true")]
    pub store: bool,
    /// Optional per-request budget ceiling in USD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_constraint: Option<f64>,
    /// Originating platform tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Requesting user identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

const fn default_true() -> bool {
    true
}

impl Default for ChatCompletionRequest {
    fn default() -> Self {
        Self {
            model: None,
            messages: Vec::new(),
            params: SamplingParams::default(),
            stream: false,
            mode: RequestMode::default(),
            use_rag: false,
            rag: None,
            reasoning_effort: None,
            should_think: false,
            use_tools: true,
            store: true,
            budget_constraint: None,
            platform: None,
            user: None,
        }
    }
}

impl ChatCompletionRequest {
    /// Text of the last user message, if any
    pub fn last_user_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == conflux_core::Role::User)
            .map(|m| m.content.as_text())
    }

    /// Whether any message carries an image attachment
    pub fn has_images(&self) -> bool {
        self.messages.iter().any(|m| m.content.has_images())
    }
}
