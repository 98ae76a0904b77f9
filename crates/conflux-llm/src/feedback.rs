//! Feedback forwarding to the vendor's trace-annotation endpoint
//!
//! Callers rate a completion by its vendor log id; the signal is
//! forwarded upstream so vendor-side traces carry it. The input shape
//! (`log_id`, `feedback`, `score`) is part of the stable external
//! contract.

use std::sync::Arc;

use conflux_core::GatewayError;
use http::HeaderMap;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use crate::dispatch::{Dispatcher, Endpoint};

/// Inbound feedback submission
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    /// Vendor log id from the completion's trace metadata
    pub log_id: String,
    /// Feedback signal, -1 or 1
    pub feedback: i64,
    /// Optional quality score
    #[serde(default)]
    pub score: Option<u32>,
}

/// Forwards feedback to the gateway's log-annotation endpoint
pub struct FeedbackForwarder {
    dispatcher: Arc<Dispatcher>,
}

impl FeedbackForwarder {
    /// Create a forwarder over the shared dispatcher
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Annotate a vendor log entry with a feedback signal
    ///
    /// Goes through the dispatch boundary, so the uniform retry policy
    /// applies here too.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Params` for an out-of-range signal, or
    /// the dispatch error when the annotation call fails.
    pub async fn submit(&self, request: &FeedbackRequest) -> Result<(), GatewayError> {
        if !matches!(request.feedback, -1 | 1) {
            return Err(GatewayError::Params(format!(
                "feedback must be -1 or 1, got {}",
                request.feedback
            )));
        }

        let payload = json!({
            "feedback": request.feedback,
            "score": request.score,
        });

        self.dispatcher
            .send(
                Method::PUT,
                "logs",
                &Endpoint::Route(request.log_id.clone()),
                HeaderMap::new(),
                &payload,
            )
            .await?;

        tracing::debug!(log_id = %request.log_id, feedback = request.feedback, "feedback forwarded");
        Ok(())
    }
}
