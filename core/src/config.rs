//! Executor and worker-pool settings.
//!
//! Defaults match what Supabase-style gateways tolerate: 15 s to connect,
//! 30 s to read, and a 30 s ceiling on how long a caller may be blocked.
//! Settings can come from JSON (durations in milliseconds) or from
//! `RESTBRIDGE_*` environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PREFER: &str = "return=representation";

const ENV_CONNECT_TIMEOUT: &str = "RESTBRIDGE_CONNECT_TIMEOUT_MS";
const ENV_READ_TIMEOUT: &str = "RESTBRIDGE_READ_TIMEOUT_MS";
const ENV_CALL_TIMEOUT: &str = "RESTBRIDGE_CALL_TIMEOUT_MS";
const ENV_DUAL_AUTH_HEADER: &str = "RESTBRIDGE_DUAL_AUTH_HEADER";
const ENV_PREFER: &str = "RESTBRIDGE_PREFER";
const ENV_MAX_WORKERS: &str = "RESTBRIDGE_MAX_WORKERS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("malformed config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-request behaviour of a `RequestExecutor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    #[serde(rename = "connect_timeout_ms", with = "millis")]
    pub connect_timeout: Duration,
    #[serde(rename = "read_timeout_ms", with = "millis")]
    pub read_timeout: Duration,
    /// Upper bound on how long `execute` blocks its caller.
    #[serde(rename = "call_timeout_ms", with = "millis")]
    pub call_timeout: Duration,
    /// Also send the key as an `apikey` header next to `Authorization: Bearer`.
    pub dual_auth_header: bool,
    /// Value of the `Prefer` header; `None` omits it.
    pub prefer: Option<String>,
    /// Characters of the key that survive redaction in logs.
    pub key_prefix_len: usize,
    /// Characters of the request body echoed into debug logs.
    pub body_preview_len: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            dual_auth_header: true,
            prefer: Some(DEFAULT_PREFER.to_string()),
            key_prefix_len: 10,
            body_preview_len: 200,
        }
    }
}

impl ExecutorConfig {
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_dual_auth_header(mut self, enabled: bool) -> Self {
        self.dual_auth_header = enabled;
        self
    }

    pub fn with_prefer(mut self, prefer: Option<&str>) -> Self {
        self.prefer = prefer.map(str::to_string);
        self
    }
}

/// Sizing of the shared worker pool behind an `ExecutionContext`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Upper bound on concurrently running exchanges; the pool grows to it on demand.
    pub max_workers: usize,
    /// Idle workers are reaped after this long.
    #[serde(rename = "keep_alive_ms", with = "millis")]
    pub keep_alive: Duration,
    /// How long `shutdown` waits for in-flight exchanges.
    #[serde(rename = "shutdown_grace_ms", with = "millis")]
    pub shutdown_grace: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: 64,
            keep_alive: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl PoolConfig {
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }
}

/// Complete settings for a host: one pool, one executor configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub executor: ExecutorConfig,
    pub pool: PoolConfig,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by any `RESTBRIDGE_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_CONNECT_TIMEOUT)? {
            config.executor.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_READ_TIMEOUT)? {
            config.executor.read_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_CALL_TIMEOUT)? {
            config.executor.call_timeout = Duration::from_millis(ms);
        }
        if let Some(enabled) = parse_var::<bool, _>(&lookup, ENV_DUAL_AUTH_HEADER)? {
            config.executor.dual_auth_header = enabled;
        }
        if let Some(prefer) = lookup(ENV_PREFER) {
            let prefer = prefer.trim();
            config.executor.prefer = (!prefer.is_empty()).then(|| prefer.to_string());
        }
        if let Some(workers) = parse_var::<usize, _>(&lookup, ENV_MAX_WORKERS)? {
            config.pool.max_workers = workers;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executor.call_timeout.is_zero() {
            return Err(ConfigError::Zero("call_timeout"));
        }
        if self.executor.connect_timeout.is_zero() {
            return Err(ConfigError::Zero("connect_timeout"));
        }
        if self.executor.read_timeout.is_zero() {
            return Err(ConfigError::Zero("read_timeout"));
        }
        if self.pool.max_workers == 0 {
            return Err(ConfigError::Zero("max_workers"));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().try_into().unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
