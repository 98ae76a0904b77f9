//! Traits for external collaborators consumed by the orchestration core
//!
//! Safety validation, conversation persistence, function execution, blob
//! storage, and retrieval are external subsystems; the core only sees
//! these narrow interfaces.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::context::RequestContext;
use crate::error::GatewayError;
use crate::message::{Message, MessageStatus};

/// Result of a guardrails validation call
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Whether the content passed validation
    pub is_valid: bool,
    /// Violation descriptions, empty when valid
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,
    /// Raw validator response for diagnostics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
}

/// Input/output safety validation collaborator
#[async_trait]
pub trait GuardrailsValidator: Send + Sync {
    /// Validate user-supplied input before any vendor call
    async fn validate_input(&self, text: &str) -> Result<ValidationReport, GatewayError>;

    /// Validate model output before it is surfaced or persisted
    async fn validate_output(&self, text: &str) -> Result<ValidationReport, GatewayError>;
}

/// Durable conversation persistence collaborator
///
/// Storage medium is unspecified; any durable backend satisfies the
/// contract.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append a message to a conversation, returning the stored copy
    async fn add(&self, conversation_id: &str, message: Message) -> Result<Message, GatewayError>;

    /// Fetch the ordered message list for a conversation
    async fn get(&self, conversation_id: &str) -> Result<Vec<Message>, GatewayError>;
}

/// Descriptor of a callable function, fed to the classification backend
/// and to vendors that support tool declarations
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDescriptor {
    /// Function name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema for the function parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Result of a function handler invocation
#[derive(Debug, Clone)]
pub struct FunctionOutcome {
    /// Output content from the handler
    pub content: String,
    /// Success or error
    pub status: MessageStatus,
    /// Structured handler output
    pub data: Option<Value>,
}

/// Named-function execution collaborator
#[async_trait]
pub trait FunctionRegistry: Send + Sync {
    /// Descriptors for every registered function
    fn descriptors(&self) -> Vec<FunctionDescriptor>;

    /// Invoke a named handler with parsed arguments
    async fn invoke(
        &self,
        name: &str,
        completion_id: &str,
        arguments: Value,
        context: &RequestContext,
    ) -> Result<FunctionOutcome, GatewayError>;
}

/// Binary blob storage, used only by media-generation normalization
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a key, returning a textual reference
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, GatewayError>;
}

/// Retrieval collaborator for RAG-augmented requests
///
/// Vector search internals stay external; the core only asks for
/// context snippets.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Retrieve up to `top_k` context snippets for a query
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>, GatewayError>;
}
