use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_LONG_CHANNEL_PREFIX;
use crate::constants::DEFAULT_RELAY_DIR;
use crate::constants::DEFAULT_SHORT_CHANNEL_PREFIX;
use crate::wire::RecordTag;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RelayConfig {
    /// Directory holding the per-CPU relay files
    /// Default: "/sys/kernel/debug"
    #[serde(default = "default_relay_dir")]
    pub relay_dir: PathBuf,

    /// File name prefix of short-record channels, followed by the CPU number
    /// Default: "provenance"
    #[serde(default = "default_short_channel_prefix")]
    pub short_channel_prefix: String,

    /// File name prefix of long-record channels, followed by the CPU number
    /// Default: "long_provenance"
    #[serde(default = "default_long_channel_prefix")]
    pub long_channel_prefix: String,

    /// Bytes requested per relay file read
    /// Default: 16384
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    /// Wait before re-reading a drained relay file (unit: milliseconds)
    /// Default: 10
    #[serde(default = "default_idle_poll_interval_ms")]
    pub idle_poll_interval_ms: u64,

    /// Time `stop` waits for each relay task before abandoning it
    /// (unit: milliseconds)
    /// Default: 1000
    #[serde(default = "default_stop_grace_period_ms")]
    pub stop_grace_period_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            relay_dir: default_relay_dir(),
            short_channel_prefix: default_short_channel_prefix(),
            long_channel_prefix: default_long_channel_prefix(),
            read_buffer_size: default_read_buffer_size(),
            idle_poll_interval_ms: default_idle_poll_interval_ms(),
            stop_grace_period_ms: default_stop_grace_period_ms(),
        }
    }
}

impl RelayConfig {
    /// Validates relay configuration
    /// # Errors
    /// Returns `Error::Config` when:
    /// - A channel prefix is empty or both prefixes are equal
    /// - The read buffer cannot hold the largest short record
    /// - The poll interval or grace period is zero
    pub fn validate(&self) -> Result<()> {
        if self.short_channel_prefix.is_empty() || self.long_channel_prefix.is_empty() {
            return Err(invalid("channel prefixes cannot be empty".into()));
        }
        if self.short_channel_prefix == self.long_channel_prefix {
            return Err(invalid(format!(
                "short and long channel prefixes must differ, both are {:?}",
                self.short_channel_prefix
            )));
        }

        let largest_short = RecordTag::ALL
            .iter()
            .filter_map(|tag| tag.fixed_len())
            .max()
            .unwrap_or_default();
        if self.read_buffer_size < largest_short {
            return Err(invalid(format!(
                "relay.read_buffer_size {} is smaller than the largest short record ({} bytes)",
                self.read_buffer_size, largest_short
            )));
        }

        if self.idle_poll_interval_ms == 0 {
            return Err(invalid("relay.idle_poll_interval_ms must be greater than 0".into()));
        }
        if self.stop_grace_period_ms == 0 {
            return Err(invalid("relay.stop_grace_period_ms must be greater than 0".into()));
        }

        Ok(())
    }

    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }

    pub fn stop_grace_period(&self) -> Duration {
        Duration::from_millis(self.stop_grace_period_ms)
    }
}

fn invalid(message: String) -> Error {
    Error::Config(ConfigError::Message(message))
}

fn default_relay_dir() -> PathBuf {
    PathBuf::from(DEFAULT_RELAY_DIR)
}
fn default_short_channel_prefix() -> String {
    DEFAULT_SHORT_CHANNEL_PREFIX.to_string()
}
fn default_long_channel_prefix() -> String {
    DEFAULT_LONG_CHANNEL_PREFIX.to_string()
}
fn default_read_buffer_size() -> usize {
    16 * 1024
}
fn default_idle_poll_interval_ms() -> u64 {
    10
}
fn default_stop_grace_period_ms() -> u64 {
    1000
}
