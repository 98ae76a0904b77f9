//! Canonical request/response types for the orchestration core

pub mod request;
pub mod response;
pub mod tool;

pub use request::{ChatCompletionRequest, RagOptions, ReasoningEffort, RequestMode, SamplingParams};
pub use response::NormalizedResponse;
pub use tool::ToolInvocation;
