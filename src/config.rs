//! Server configuration
//!
//! Command line flags with environment variable fallbacks.

use std::time::Duration;

use clap::Parser;

/// Default listen address: all interfaces, port 8001
pub const DEFAULT_BIND: &str = "0.0.0.0:8001";

/// Real-time position presence relay
#[derive(Parser, Debug, Clone)]
#[command(name = "presence_relay", version, about)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "PRESENCE_BIND", default_value = DEFAULT_BIND)]
    pub bind: String,

    /// Seconds to wait for a join message before dropping the connection.
    /// Waits forever when unset.
    #[arg(long, env = "PRESENCE_JOIN_TIMEOUT_SECS")]
    pub join_timeout_secs: Option<u64>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "PRESENCE_LOG", default_value = "presence_relay=info")]
    pub log_filter: String,

    /// Command buffer size for the relay actor
    #[arg(long, default_value_t = 256, value_parser = parse_capacity)]
    pub channel_capacity: usize,
}

/// Parse a channel buffer size; tokio channels need at least one slot
fn parse_capacity(s: &str) -> Result<usize, String> {
    let capacity: usize = s.parse().map_err(|e| format!("{}", e))?;
    if capacity == 0 {
        return Err("capacity must be at least 1".to_string());
    }
    Ok(capacity)
}

impl Config {
    pub fn join_timeout(&self) -> Option<Duration> {
        self.join_timeout_secs.map(Duration::from_secs)
    }

    /// Per-connection settings handed to each handler
    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            join_timeout: self.join_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            join_timeout_secs: None,
            log_filter: "presence_relay=info".to_string(),
            channel_capacity: 256,
        }
    }
}

/// Settings each connection handler needs
#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    pub join_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Config::default().connection()
    }
}
