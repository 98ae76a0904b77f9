//! Prompt requirement analysis
//!
//! Extracts domain keywords from a prompt, asks a classification
//! backend for a requirement estimate, and normalizes the (often
//! sloppy) reply into a `PromptRequirements` profile for the router.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use conflux_core::{FunctionDescriptor, GatewayError};
use regex::Regex;
use serde::Deserialize;

/// Maximum keywords kept by the naive-tokenization fallback
const MAX_FALLBACK_KEYWORDS: usize = 5;

/// Coding-domain keywords
const CODING_KEYWORDS: &[&str] = &[
    "code", "function", "debug", "compile", "refactor", "implement", "api", "bug", "error", "test", "class", "struct",
    "script", "algorithm", "regex", "sql", "typescript", "python", "rust", "javascript",
];

/// Math-domain keywords
const MATH_KEYWORDS: &[&str] = &[
    "calculate", "solve", "equation", "integral", "derivative", "matrix", "probability", "theorem", "proof", "algebra",
    "geometry", "statistics", "sum", "average",
];

/// Requirement profile of a prompt
///
/// Produced once per request; consumed once by the model router.
#[derive(Debug, Clone, Default)]
pub struct PromptRequirements {
    /// Expected task complexity, 1-5
    pub expected_complexity: u8,
    /// Capability tags the task requires
    pub required_capabilities: Vec<String>,
    /// Estimated input token count
    pub estimated_input_tokens: u32,
    /// Estimated output token count
    pub estimated_output_tokens: u32,
    /// Whether the caller supplied image attachments
    pub has_images: bool,
    /// Whether the task needs tool/function calling
    pub needs_functions: bool,
    /// Optional budget ceiling in USD for this request
    pub budget_constraint: Option<f64>,
}

/// Classification backend seam
///
/// Production wiring backs this with the dispatch layer; tests use a
/// canned implementation.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Run the classification prompt and return the raw reply text
    async fn classify(&self, system_prompt: &str, prompt: &str) -> Result<String, GatewayError>;
}

/// Prompt requirement analyzer
pub struct RequirementAnalyzer {
    classifier: Arc<dyn Classifier>,
}

impl RequirementAnalyzer {
    /// Create an analyzer over a classification backend
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Analyze a prompt into a requirement profile
    ///
    /// Keyword extraction is local; the complexity/capability estimate
    /// comes from the classification backend. A classification failure
    /// is a hard error; there is no silent fallback once keyword
    /// extraction has run.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Unknown` when the classification call
    /// fails.
    pub async fn analyze(
        &self,
        prompt: &str,
        has_images: bool,
        capability_tags: &[String],
        functions: &[FunctionDescriptor],
        budget_constraint: Option<f64>,
    ) -> Result<PromptRequirements, GatewayError> {
        let keywords = domain_keywords(prompt);
        let system_prompt = classification_prompt(&keywords, capability_tags, functions);

        let reply = self
            .classifier
            .classify(&system_prompt, prompt)
            .await
            .map_err(|e| GatewayError::Unknown(anyhow::anyhow!("requirement classification failed: {e}")))?;

        let verdict = parse_verdict(&reply);

        Ok(PromptRequirements {
            expected_complexity: u8::try_from(verdict.expected_complexity.unwrap_or(0).clamp(1, 5)).unwrap_or(1),
            required_capabilities: verdict.required_capabilities,
            estimated_input_tokens: u32::try_from(verdict.estimated_input_tokens.unwrap_or(0).max(0)).unwrap_or(0),
            estimated_output_tokens: u32::try_from(verdict.estimated_output_tokens.unwrap_or(0).max(0)).unwrap_or(0),
            // Not asked of the classifier: derived from attachments
            has_images,
            needs_functions: verdict.needs_functions.unwrap_or(false),
            budget_constraint,
        })
    }
}

/// Extract domain keywords from a prompt
///
/// Categorized substring matches against the coding and math keyword
/// domains win; otherwise fall back to naive tokenization filtered
/// against the same sets, capped at five tokens.
pub fn domain_keywords(prompt: &str) -> Vec<String> {
    let lower = prompt.to_lowercase();

    let mut categorized: Vec<String> = Vec::new();
    for keyword in CODING_KEYWORDS.iter().chain(MATH_KEYWORDS) {
        if lower.contains(keyword) {
            categorized.push((*keyword).to_owned());
        }
    }
    if !categorized.is_empty() {
        return categorized;
    }

    let mut fallback: Vec<String> = Vec::new();
    for token in lower.split(|c: char| !c.is_alphanumeric()) {
        if token.len() <= 2 {
            continue;
        }
        if !CODING_KEYWORDS.contains(&token) && !MATH_KEYWORDS.contains(&token) {
            continue;
        }
        if !fallback.iter().any(|t| t == token) {
            fallback.push(token.to_owned());
        }
        if fallback.len() == MAX_FALLBACK_KEYWORDS {
            break;
        }
    }
    fallback
}

/// Build the classification system prompt
fn classification_prompt(keywords: &[String], capability_tags: &[String], functions: &[FunctionDescriptor]) -> String {
    let function_list = functions
        .iter()
        .map(|f| format!("- {}: {}", f.name, f.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You estimate the requirements of a user task.\n\
         Domain keywords detected: [{}]\n\
         Valid capability tags: [{}]\n\
         Available tool functions:\n{}\n\
         Reply with a JSON object: {{\"expectedComplexity\": 1-5, \
         \"requiredCapabilities\": [tags], \"estimatedInputTokens\": n, \
         \"estimatedOutputTokens\": n, \"needsFunctions\": bool}}",
        keywords.join(", "),
        capability_tags.join(", "),
        if function_list.is_empty() { "(none)" } else { &function_list },
    )
}

/// Fields the classifier is expected to return
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ClassifierVerdict {
    expected_complexity: Option<i64>,
    required_capabilities: Vec<String>,
    estimated_input_tokens: Option<i64>,
    estimated_output_tokens: Option<i64>,
    needs_functions: Option<bool>,
}

static COMPLEXITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*expectedComplexity\*\*:\s*(\d+)").expect("valid regex"));
static CAPABILITIES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*requiredCapabilities\*\*:\s*([^\n]+)").expect("valid regex"));
static INPUT_TOKENS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*estimatedInputTokens\*\*:\s*(\d+)").expect("valid regex"));
static OUTPUT_TOKENS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*estimatedOutputTokens\*\*:\s*(\d+)").expect("valid regex"));
static NEEDS_FUNCTIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*needsFunctions\*\*:\s*(true|false)").expect("valid regex"));

/// Tolerantly parse the classifier's reply
///
/// First try the `{...}` block as JSON; if that fails or is absent,
/// fall back to labeled markdown field extraction. A reply with
/// neither yields an all-defaults verdict (normalized downstream).
fn parse_verdict(reply: &str) -> ClassifierVerdict {
    if let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}'))
        && start < end
        && let Ok(verdict) = serde_json::from_str::<ClassifierVerdict>(&reply[start..=end])
    {
        return verdict;
    }

    let capture_i64 = |re: &Regex| {
        re.captures(reply)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok())
    };

    let required_capabilities = CAPABILITIES_RE
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| {
            m.as_str()
                .trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split(',')
                .map(|s| s.trim().trim_matches('"').trim_matches('\'').to_owned())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    ClassifierVerdict {
        expected_complexity: capture_i64(&COMPLEXITY_RE),
        required_capabilities,
        estimated_input_tokens: capture_i64(&INPUT_TOKENS_RE),
        estimated_output_tokens: capture_i64(&OUTPUT_TOKENS_RE),
        needs_functions: NEEDS_FUNCTIONS_RE
            .captures(reply)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str() == "true"),
    }
}
