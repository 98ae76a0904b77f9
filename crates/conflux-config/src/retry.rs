use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Backoff curve between retry attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Delay doubles after every attempt
    #[default]
    Exponential,
    /// Delay grows by a fixed step per attempt
    Linear,
}

/// Retry/timeout policy applied uniformly at the dispatch boundary
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryPolicy {
    /// Per-attempt request timeout (e.g. "30s")
    #[serde(default = "default_request_timeout", deserialize_with = "parse_duration")]
    pub request_timeout: Duration,
    /// Total attempts including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay between attempts (e.g. "500ms")
    #[serde(default = "default_retry_delay", deserialize_with = "parse_duration")]
    pub retry_delay: Duration,
    /// Backoff curve
    #[serde(default)]
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            max_attempts: default_max_attempts(),
            retry_delay: default_retry_delay(),
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based: 1 is the first retry)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Linear => self.retry_delay.saturating_mul(attempt),
            Backoff::Exponential => self
                .retry_delay
                .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1))),
        }
    }
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_retry_delay() -> Duration {
    Duration::from_millis(500)
}

fn parse_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    duration_str::parse(&s).map_err(|e| serde::de::Error::custom(format!("invalid duration '{s}': {e}")))
}
