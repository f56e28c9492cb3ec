//! Service configuration from environment variables

use crate::scheduler::{DelayPolicy, FixedDelay, JitteredDelay};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_REPLY_DELAY_MS: u64 = 1500;

/// Runtime settings for the assistant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantConfig {
    pub port: u16,
    /// How long the assistant "thinks" before each reply
    pub reply_delay: Duration,
    /// Random spread applied around `reply_delay`; zero disables jitter
    pub reply_jitter: Duration,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            reply_delay: Duration::from_millis(DEFAULT_REPLY_DELAY_MS),
            reply_jitter: Duration::ZERO,
        }
    }
}

impl AssistantConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let delay_ms = parse_or(&lookup, "FARM_ASSISTANT_REPLY_DELAY_MS", DEFAULT_REPLY_DELAY_MS);
        let jitter_ms = parse_or(&lookup, "FARM_ASSISTANT_REPLY_JITTER_MS", 0u64);

        Self {
            port: parse_or(&lookup, "FARM_ASSISTANT_PORT", DEFAULT_PORT),
            reply_delay: Duration::from_millis(delay_ms),
            reply_jitter: Duration::from_millis(jitter_ms),
        }
    }

    pub fn delay_policy(&self) -> Arc<dyn DelayPolicy> {
        if self.reply_jitter.is_zero() {
            Arc::new(FixedDelay(self.reply_delay))
        } else {
            Arc::new(JitteredDelay {
                base: self.reply_delay,
                jitter: self.reply_jitter,
            })
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, %default, "Ignoring unparseable setting");
            default
        }),
    }
}
