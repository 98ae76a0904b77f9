//! Shared types for the conflux gateway core
//!
//! Holds the error taxonomy, the per-request context, the canonical
//! `Message` shape, and the collaborator traits consumed by the
//! orchestration pipeline (guardrails, conversation store, function
//! registry, blob store, context retriever).

pub mod collaborators;
pub mod context;
pub mod error;
pub mod message;

pub use collaborators::{
    BlobStore, ContextRetriever, ConversationStore, FunctionDescriptor, FunctionOutcome, FunctionRegistry,
    GuardrailsValidator, ValidationReport,
};
pub use context::RequestContext;
pub use error::{GatewayError, HttpError};
pub use message::{Content, ContentPart, Message, MessageStatus, Role, unix_timestamp};
