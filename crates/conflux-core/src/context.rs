use secrecy::SecretString;

/// Per-request context threaded explicitly through the orchestration chain
///
/// Constructed once per inbound request from immutable configuration and
/// request identity; never shared mutably between requests.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Requesting user identity
    pub user: Option<String>,
    /// Platform tag from the caller (e.g. "web", "ios")
    pub platform: Option<String>,
    /// Conversation the request belongs to
    pub conversation_id: Option<String>,
    /// Whether assistant/tool messages should be persisted
    pub store: bool,
    /// Whether tool execution is restricted for this caller
    pub restricted: bool,
    /// Caller-supplied API key overriding the configured one
    pub api_key: Option<SecretString>,
    /// Request date in ISO-8601, passed to function handlers
    pub request_date: Option<String>,
}

impl RequestContext {
    /// Create an empty context (no user, no conversation, persistence off)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the requesting user
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the conversation id
    #[must_use]
    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Enable message persistence
    #[must_use]
    pub const fn with_store(mut self, store: bool) -> Self {
        self.store = store;
        self
    }

    /// Set the platform tag
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_context_does_not_persist() {
        let ctx = RequestContext::new();
        assert!(!ctx.store);
        assert!(ctx.user.is_none());
        assert!(ctx.conversation_id.is_none());
    }
}
