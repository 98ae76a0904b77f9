use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatch::VendorTrace;

/// Vendor-neutral completion response
///
/// Produced by the response normalizer; every component downstream of
/// dispatch consumes this shape and never a raw vendor payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedResponse {
    /// Response text; empty when the model only produced tool calls
    pub response: String,
    /// Raw vendor tool-call array, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
    /// Vendor-reported token usage, kept in the vendor's shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
    /// Source citations attached by the vendor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<String>>,
    /// Trace metadata extracted from response headers
    #[serde(default, skip_serializing_if = "VendorTrace::is_empty")]
    pub trace: VendorTrace,
}

impl NormalizedResponse {
    /// Plain-text response with no tool calls or usage
    pub fn text(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            ..Self::default()
        }
    }

    /// Whether the model produced neither text nor tool calls
    pub fn is_empty(&self) -> bool {
        self.response.is_empty() && self.tool_calls.is_none()
    }

    /// Attach trace metadata from the dispatch layer
    #[must_use]
    pub fn with_trace(mut self, trace: VendorTrace) -> Self {
        self.trace = trace;
        self
    }
}
