//! Channel configuration.

use serde::{Deserialize, Serialize};

/// Default listener count above which a channel logs a leak warning.
pub const DEFAULT_WARN_LISTENER_THRESHOLD: usize = 10_000;

/// What an emission does when a listener fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmitPolicy {
    /// Log the failure and keep delivering to the rest of the snapshot.
    #[default]
    Isolate,
    /// Stop at the first failure and return it to the emitter.
    Propagate,
}

/// Settings applied to a channel at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Listener failure handling during `emit`.
    pub emit_policy: EmitPolicy,
    /// Warn once the listener count grows past this value. `None` disables.
    pub warn_listener_threshold: Option<usize>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            emit_policy: EmitPolicy::default(),
            warn_listener_threshold: Some(DEFAULT_WARN_LISTENER_THRESHOLD),
        }
    }
}

impl ChannelConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the emit policy.
    pub fn with_emit_policy(mut self, policy: EmitPolicy) -> Self {
        self.emit_policy = policy;
        self
    }

    /// Sets (or clears) the listener count warning threshold.
    pub fn with_warn_listener_threshold(mut self, threshold: Option<usize>) -> Self {
        self.warn_listener_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChannelConfig::new();
        assert_eq!(config.emit_policy, EmitPolicy::Isolate);
        assert_eq!(
            config.warn_listener_threshold,
            Some(DEFAULT_WARN_LISTENER_THRESHOLD)
        );
    }

    #[test]
    fn test_builder() {
        let config = ChannelConfig::new()
            .with_emit_policy(EmitPolicy::Propagate)
            .with_warn_listener_threshold(None);
        assert_eq!(config.emit_policy, EmitPolicy::Propagate);
        assert!(config.warn_listener_threshold.is_none());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ChannelConfig =
            serde_json::from_str(r#"{"emit_policy": "propagate"}"#).unwrap();
        assert_eq!(config.emit_policy, EmitPolicy::Propagate);
        assert_eq!(
            config.warn_listener_threshold,
            Some(DEFAULT_WARN_LISTENER_THRESHOLD)
        );
    }

    #[test]
    fn test_deserialize_empty() {
        let config: ChannelConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ChannelConfig::default());
    }
}
