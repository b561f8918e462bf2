//! Connection configuration.

use std::time::Duration;

/// Default wire protocol.
pub const DEFAULT_PROTOCOL: &str = "tcp";

/// Configuration for tablet connections.
#[derive(Debug, Clone)]
pub struct ConnConfig {
    /// Name of the wire protocol to dial with.
    pub protocol: String,
    /// Time allowed to establish a connection.
    pub dial_timeout: Duration,
    /// Upper bound for each unary call, on top of the caller's context.
    pub call_timeout: Duration,
    /// Largest accepted frame, in bytes.
    pub max_frame_len: usize,
}

impl ConnConfig {
    /// Creates a configuration for the given protocol.
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            dial_timeout: Duration::from_secs(5),
            call_timeout: Duration::from_secs(30),
            max_frame_len: 16 * 1024 * 1024,
        }
    }

    /// Sets the dial timeout.
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Sets the per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Sets the maximum frame length.
    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }
}

impl Default for ConnConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PROTOCOL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ConnConfig::default();
        assert_eq!(config.protocol, "tcp");
        assert_eq!(config.dial_timeout, Duration::from_secs(5));
    }

    #[test]
    fn config_builder() {
        let config = ConnConfig::new("loopback")
            .with_dial_timeout(Duration::from_millis(200))
            .with_call_timeout(Duration::from_secs(2))
            .with_max_frame_len(1024);
        assert_eq!(config.protocol, "loopback");
        assert_eq!(config.dial_timeout, Duration::from_millis(200));
        assert_eq!(config.call_timeout, Duration::from_secs(2));
        assert_eq!(config.max_frame_len, 1024);
    }
}
