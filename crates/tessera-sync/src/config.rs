//! Configuration for a sync session

use std::time::Duration;

use tessera_core::DEFAULT_GATEWAY;

/// Configuration for a [`Session`](crate::Session) and its orchestrators.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Capacity of the notification broadcast channel.
    pub event_channel_capacity: usize,
    /// Upper bound on waiting for a submitted transaction to confirm.
    pub confirmation_timeout: Duration,
    /// Base URL of the content gateway used for links.
    pub gateway_base: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: 1024,
            confirmation_timeout: Duration::from_secs(120),
            gateway_base: DEFAULT_GATEWAY.to_string(),
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the notification channel capacity.
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the confirmation timeout.
    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Set the gateway base URL.
    pub fn with_gateway_base(mut self, base: impl Into<String>) -> Self {
        self.gateway_base = base.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.event_channel_capacity, 1024);
        assert_eq!(config.confirmation_timeout, Duration::from_secs(120));
        assert_eq!(config.gateway_base, "https://ipfs.io");
    }

    #[test]
    fn test_builders() {
        let config = SyncConfig::new()
            .with_event_channel_capacity(0)
            .with_confirmation_timeout(Duration::from_millis(50))
            .with_gateway_base("http://localhost:8080");
        assert_eq!(config.event_channel_capacity, 1);
        assert_eq!(config.confirmation_timeout, Duration::from_millis(50));
        assert_eq!(config.gateway_base, "http://localhost:8080");
    }
}
