//! Completion orchestration: canonical request/response types,
//! per-provider adapters, dispatch with retry, response normalization,
//! streaming post-processing, and tool-call execution.

pub mod adapter;
pub mod classify;
pub mod dispatch;
pub mod feedback;
pub mod mapper;
pub mod pipeline;
pub mod stream;
pub mod tools;
pub mod types;

pub use adapter::{AdapterRegistry, Normalized, ProviderAdapter};
pub use classify::DispatchClassifier;
pub use dispatch::{Dispatcher, Endpoint, RawReply, VendorTrace};
pub use feedback::{FeedbackForwarder, FeedbackRequest};
pub use pipeline::{CompletionOutcome, CompletionPipeline};
pub use stream::{PostProcessor, StreamAccumulator};
pub use tools::ToolOrchestrator;
pub use types::{ChatCompletionRequest, NormalizedResponse, ToolInvocation};
