//! Network reachability probing.
//!
//! The transfer engine consults a [`Reachability`] probe before retrying a
//! failed transfer: when the network is down it polls at a fixed interval
//! until connectivity returns instead of burning retry attempts. The trait
//! is object-safe so tests can inject scripted probes.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

/// Boolean predicate answering "does the network look up right now?".
#[async_trait]
pub trait Reachability: Send + Sync {
    /// Returns `true` when the network appears reachable.
    async fn is_connected(&self) -> bool;
}

/// Probe that attempts a TCP connect to a well-known endpoint.
///
/// A connect that completes within the probe timeout counts as "up"; a
/// refused, unroutable, or timed-out connect counts as "down".
#[derive(Debug, Clone)]
pub struct TcpReachability {
    addr: String,
    probe_timeout: Duration,
}

/// Public DNS endpoint used by the default probe.
const DEFAULT_PROBE_ADDR: &str = "1.1.1.1:53";

/// How long a single probe connect may take.
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

impl TcpReachability {
    /// Creates a probe against the default public endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self::with_addr(DEFAULT_PROBE_ADDR)
    }

    /// Creates a probe against a specific `host:port` endpoint.
    #[must_use]
    pub fn with_addr(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl Default for TcpReachability {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reachability for TcpReachability {
    async fn is_connected(&self) -> bool {
        matches!(
            tokio::time::timeout(self.probe_timeout, TcpStream::connect(&self.addr)).await,
            Ok(Ok(_))
        )
    }
}

/// Probe that always reports the network up.
///
/// Used when connectivity waiting is disabled and as a test stand-in.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeConnected;

#[async_trait]
impl Reachability for AssumeConnected {
    async fn is_connected(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_assume_connected_always_up() {
        assert!(AssumeConnected.is_connected().await);
    }

    #[tokio::test]
    async fn test_tcp_probe_down_for_unroutable_endpoint() {
        // TEST-NET-1 is guaranteed unroutable.
        let probe = TcpReachability::with_addr("192.0.2.1:9");
        assert!(!probe.is_connected().await);
    }
}
