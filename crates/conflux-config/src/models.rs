use serde::Deserialize;

/// Task families a model can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelType {
    /// General text completion
    Text,
    /// Code-oriented completion
    Coding,
    /// Speech synthesis/recognition
    Speech,
    /// Text-to-image generation
    TextToImage,
    /// Image-to-image transformation
    ImageToImage,
    /// Text-to-video generation
    TextToVideo,
    /// Image-to-video generation
    ImageToVideo,
}

impl ModelType {
    /// Whether this type produces media output instead of text
    pub const fn is_media_generation(self) -> bool {
        matches!(
            self,
            Self::TextToImage | Self::ImageToImage | Self::TextToVideo | Self::ImageToVideo
        )
    }
}

/// Static capability descriptor for one model
///
/// Loaded once at process start; immutable afterwards.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDescriptorConfig {
    /// Internal model identifier
    pub id: String,
    /// Provider name (key into the provider map)
    pub provider: String,
    /// Vendor-native model identifier when it differs from `id`
    #[serde(default)]
    pub wire_name: Option<String>,
    /// Supported task families
    #[serde(default)]
    pub model_types: Vec<ModelType>,
    /// Capability strength tags (e.g. "coding", "math", "vision")
    #[serde(default)]
    pub strengths: Vec<String>,
    /// Context window in tokens
    pub context_window: u32,
    /// Maximum output tokens
    pub max_tokens: u32,
    /// Cost per 1k input tokens (USD)
    pub cost_per_1k_input: f64,
    /// Cost per 1k output tokens (USD)
    pub cost_per_1k_output: f64,
    /// Context-complexity rank, 1-5
    pub context_complexity: u8,
    /// Reliability rank, 1-5; absent means no observed data
    #[serde(default)]
    pub reliability: Option<u8>,
    /// Speed rank, 1-5; absent means no observed data
    #[serde(default)]
    pub speed: Option<u8>,
    /// Whether the model accepts image inputs
    #[serde(default)]
    pub multimodal: bool,
    /// Whether the model supports tool/function declarations
    #[serde(default)]
    pub supports_functions: bool,
    /// Whether the model has an extended-thinking mode
    #[serde(default)]
    pub has_thinking: bool,
    /// Whether the router may select this model automatically
    #[serde(default)]
    pub router_eligible: bool,
}
