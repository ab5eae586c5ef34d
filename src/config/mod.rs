//! Configuration types and builders.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::time::Duration;

/// Policy for operations running concurrently against the same session.
///
/// `Serialized` holds the session's mutation slot for the duration of each
/// handler call, so cached session state is never interleaved between two
/// in-flight invocations. `Parallel` lets them run fully concurrently and
/// leaves consistency to the handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyPolicy {
    #[default]
    Serialized,
    Parallel,
}

impl ConcurrencyPolicy {
    /// Parse a concurrency policy from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "serialized" | "serial" => Some(Self::Serialized),
            "parallel" => Some(Self::Parallel),
            _ => None,
        }
    }
}

impl TryFrom<&str> for ConcurrencyPolicy {
    type Error = ConfigError;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        Self::parse(s).ok_or_else(|| ConfigError::InvalidValue {
            field: "concurrency".into(),
            message: format!("Unknown policy: '{}'. Valid policies: serialized, parallel", s)
                .into(),
        })
    }
}

/// Session behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Timeout for the `roots/list` client round trip.
    pub roots_request_timeout: Duration,
    /// How concurrent operations on one session are scheduled.
    pub concurrency: ConcurrencyPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            roots_request_timeout: Duration::from_secs(10),
            concurrency: ConcurrencyPolicy::default(),
        }
    }
}

/// Builder for SessionConfig with fluent API.
#[derive(Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roots_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.roots_request_timeout = timeout;
        self
    }

    pub fn concurrency(mut self, policy: ConcurrencyPolicy) -> Self {
        self.config.concurrency = policy;
        self
    }

    /// Apply overrides from environment variables.
    pub fn from_env(mut self) -> Result<Self> {
        if let Ok(timeout_ms) = env::var("CIPHER_ROOTS_TIMEOUT_MS") {
            let ms: u64 = timeout_ms.parse().map_err(|_| {
                ConfigError::InvalidValue {
                    field: "CIPHER_ROOTS_TIMEOUT_MS".into(),
                    message: "Expected a positive integer of milliseconds".into(),
                }
            })?;
            self.config.roots_request_timeout = Duration::from_millis(ms);
        }

        if let Ok(policy) = env::var("CIPHER_SESSION_CONCURRENCY") {
            self.config.concurrency = ConcurrencyPolicy::try_from(policy.as_str())?;
        }

        Ok(self)
    }

    pub fn build(self) -> SessionConfig {
        self.config
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: Cow<'static, str>,
    pub version: Cow<'static, str>,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "cipher-mcp".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

/// Builder for ServerConfig.
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<Cow<'static, str>>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn session(mut self, session: SessionConfig) -> Self {
        self.config.session = session;
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concurrency_policy_parse() {
        assert_eq!(
            ConcurrencyPolicy::parse("serialized"),
            Some(ConcurrencyPolicy::Serialized)
        );
        assert_eq!(
            ConcurrencyPolicy::parse("PARALLEL"),
            Some(ConcurrencyPolicy::Parallel)
        );
        assert_eq!(ConcurrencyPolicy::parse("unknown"), None);
    }

    #[test]
    fn test_concurrency_policy_try_from() {
        assert_eq!(
            ConcurrencyPolicy::try_from("serial").unwrap(),
            ConcurrencyPolicy::Serialized
        );
        assert!(ConcurrencyPolicy::try_from("bogus").is_err());
    }

    #[test]
    fn test_session_config_builder() {
        let config = SessionConfigBuilder::new()
            .roots_request_timeout(Duration::from_millis(250))
            .concurrency(ConcurrencyPolicy::Parallel)
            .build();

        assert_eq!(config.roots_request_timeout, Duration::from_millis(250));
        assert_eq!(config.concurrency, ConcurrencyPolicy::Parallel);
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.name, "cipher-mcp");
        assert_eq!(
            config.session.roots_request_timeout,
            Duration::from_secs(10)
        );
        assert_eq!(config.session.concurrency, ConcurrencyPolicy::Serialized);
    }
}
