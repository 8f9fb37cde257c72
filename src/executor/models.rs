use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_BODY_BYTES: usize = 256 * 1024;

/// Transport budgets, in milliseconds. Mirrors the `http` block of
/// `apichain.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpConfig {
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub tls_handshake_timeout_ms: u64,
    pub response_header_timeout_ms: u64,
    pub idle_timeout_ms: u64,
    pub keep_alive_ms: u64,
    pub max_idle_per_host: usize,
    pub proxy_from_env: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 5_000,
            tls_handshake_timeout_ms: 5_000,
            response_header_timeout_ms: 10_000,
            idle_timeout_ms: 90_000,
            keep_alive_ms: 30_000,
            max_idle_per_host: 20,
            proxy_from_env: true,
        }
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl HttpConfig {
    pub fn timeout(&self) -> Option<Duration> {
        millis(self.timeout_ms)
    }

    /// The connect phase includes the TLS handshake, so the larger of the two
    /// budgets applies to it.
    pub fn connect_timeout(&self) -> Option<Duration> {
        millis(self.connect_timeout_ms.max(self.tls_handshake_timeout_ms))
    }

    pub fn response_header_timeout(&self) -> Option<Duration> {
        millis(self.response_header_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        millis(self.idle_timeout_ms)
    }

    pub fn keep_alive(&self) -> Option<Duration> {
        millis(self.keep_alive_ms)
    }
}
