//! Runtime configuration.
//!
//! Defaults live in [`defaults`], environment overrides in [`env_vars`].
//! Action timeouts are never configured here: every action timeout comes
//! from the action itself or from its domain's `defaultActionTimeout`.

use std::time::Duration;

/// Default values.
pub mod defaults {
    /// Deepest action chain the mediator will walk.
    pub const MAX_CHAIN_DEPTH: usize = 64;
    /// Buffered lifecycle events per subscriber.
    pub const EVENT_CHANNEL_CAPACITY: usize = 256;
    /// Manifest download timeout in seconds.
    pub const MANIFEST_FETCH_TIMEOUT_SECS: u64 = 30;
}

/// Environment variable names.
pub mod env_vars {
    use super::defaults;

    pub const MAX_CHAIN_DEPTH: &str = "HAI3_MFE_MAX_CHAIN_DEPTH";
    pub const EVENT_CAPACITY: &str = "HAI3_MFE_EVENT_CAPACITY";
    pub const MANIFEST_TIMEOUT_SECS: &str = "HAI3_MFE_MANIFEST_TIMEOUT_SECS";

    fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
        std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
    }

    /// Maximum chain depth from the environment, or the default.
    pub fn max_chain_depth() -> usize {
        parsed(MAX_CHAIN_DEPTH)
            .filter(|v: &usize| *v > 0)
            .unwrap_or(defaults::MAX_CHAIN_DEPTH)
    }

    /// Event channel capacity from the environment, or the default.
    pub fn event_capacity() -> usize {
        parsed(EVENT_CAPACITY)
            .filter(|v: &usize| *v > 0)
            .unwrap_or(defaults::EVENT_CHANNEL_CAPACITY)
    }

    /// Manifest fetch timeout (seconds) from the environment, or the default.
    pub fn manifest_timeout_secs() -> u64 {
        parsed(MANIFEST_TIMEOUT_SECS)
            .filter(|v: &u64| *v > 0)
            .unwrap_or(defaults::MANIFEST_FETCH_TIMEOUT_SECS)
    }
}

/// Configuration of one MFE runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfeConfig {
    pub max_chain_depth: usize,
    pub event_channel_capacity: usize,
    pub manifest_fetch_timeout: Duration,
}

impl Default for MfeConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: defaults::MAX_CHAIN_DEPTH,
            event_channel_capacity: defaults::EVENT_CHANNEL_CAPACITY,
            manifest_fetch_timeout: Duration::from_secs(defaults::MANIFEST_FETCH_TIMEOUT_SECS),
        }
    }
}

impl MfeConfig {
    /// Defaults overridden by `HAI3_MFE_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            max_chain_depth: env_vars::max_chain_depth(),
            event_channel_capacity: env_vars::event_capacity(),
            manifest_fetch_timeout: Duration::from_secs(env_vars::manifest_timeout_secs()),
        }
    }

    pub fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth.max(1);
        self
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    pub fn with_manifest_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.manifest_fetch_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MfeConfig::default();
        assert_eq!(config.max_chain_depth, defaults::MAX_CHAIN_DEPTH);
        assert_eq!(config.manifest_fetch_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_clamps_zero() {
        let config = MfeConfig::default()
            .with_max_chain_depth(0)
            .with_event_channel_capacity(0);
        assert_eq!(config.max_chain_depth, 1);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[test]
    fn test_from_env_override() {
        std::env::set_var(env_vars::MAX_CHAIN_DEPTH, "8");
        std::env::set_var(env_vars::EVENT_CAPACITY, "not-a-number");
        std::env::set_var(env_vars::MANIFEST_TIMEOUT_SECS, "7");
        let config = MfeConfig::from_env();
        std::env::remove_var(env_vars::MAX_CHAIN_DEPTH);
        std::env::remove_var(env_vars::EVENT_CAPACITY);
        std::env::remove_var(env_vars::MANIFEST_TIMEOUT_SECS);

        assert_eq!(config.max_chain_depth, 8);
        assert_eq!(config.event_channel_capacity, defaults::EVENT_CHANNEL_CAPACITY);
        assert_eq!(config.manifest_fetch_timeout, Duration::from_secs(7));
    }
}
