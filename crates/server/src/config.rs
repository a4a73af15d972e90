//! Configuration for the line-streaming server.

use std::time::Duration;

/// Configuration for a [`LineStreamingServer`](crate::LineStreamingServer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to (0 picks an ephemeral port).
    pub port: u16,
    /// Pause between two consecutive lines, in milliseconds.
    pub delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9999,
            delay_ms: 1000,
        }
    }
}

impl ServerConfig {
    /// Create a configuration listening on all interfaces.
    pub fn new(port: u16, delay_ms: u64) -> Self {
        Self {
            port,
            delay_ms,
            ..Default::default()
        }
    }

    /// Create a configuration bound to the loopback interface.
    pub fn local(port: u16, delay_ms: u64) -> Self {
        Self::new(port, delay_ms).with_host("127.0.0.1")
    }

    /// Set the host to bind to.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the delay between lines.
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Get the socket address string.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the delay between lines as a [`Duration`].
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}
