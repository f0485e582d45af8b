//! Client configuration parsed from environment variables.

use uuid::Uuid;

use crate::error::ErrorCode;
use crate::mutation::ResolutionPolicy;
use crate::store::ClientId;

pub const DEFAULT_REACTION_MS: i64 = 4000;
pub const DEFAULT_CURSOR_TTL_MS: i64 = 5000;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        "E_CONFIG_INVALID"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub client_id: ClientId,
    pub reaction_window_ms: i64,
    pub cursor_ttl_ms: i64,
    pub channel_capacity: usize,
    pub resolution: ResolutionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: Uuid::new_v4(),
            reaction_window_ms: DEFAULT_REACTION_MS,
            cursor_ttl_ms: DEFAULT_CURSOR_TTL_MS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            resolution: ResolutionPolicy::default(),
        }
    }
}

impl Config {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `SKETCH_CLIENT_ID`: random v4 when absent
    /// - `SKETCH_REACTION_MS`: default 4000
    /// - `SKETCH_CURSOR_TTL_MS`: default 5000
    /// - `SKETCH_CHANNEL_CAPACITY`: default 256
    /// - `SKETCH_RESOLUTION`: `lww` (default) or `field_timestamps`
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for a malformed client id or resolution policy.
    /// Malformed numbers fall back to their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let client_id = match std::env::var("SKETCH_CLIENT_ID") {
            Ok(raw) => Uuid::parse_str(raw.trim())
                .map_err(|e| ConfigError::Invalid { var: "SKETCH_CLIENT_ID", reason: e.to_string() })?,
            Err(_) => Uuid::new_v4(),
        };
        let resolution = match std::env::var("SKETCH_RESOLUTION") {
            Ok(raw) => raw
                .trim()
                .parse::<ResolutionPolicy>()
                .map_err(|reason| ConfigError::Invalid { var: "SKETCH_RESOLUTION", reason })?,
            Err(_) => ResolutionPolicy::default(),
        };

        Ok(Self {
            client_id,
            reaction_window_ms: env_parse("SKETCH_REACTION_MS", DEFAULT_REACTION_MS),
            cursor_ttl_ms: env_parse("SKETCH_CURSOR_TTL_MS", DEFAULT_CURSOR_TTL_MS),
            channel_capacity: env_parse("SKETCH_CHANNEL_CAPACITY", DEFAULT_CHANNEL_CAPACITY),
            resolution,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
