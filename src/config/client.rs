use crate::utils::error::{ConfigError, Result};
use crate::utils::validation::{validate_positive_number, validate_range, Validate};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP connection pool settings shared by every request of one adapter.
///
/// Every field is optional; unset fields fall back to:
///
/// | field                   | default |
/// |-------------------------|---------|
/// | `max_idle_per_host`     | 100     |
/// | `connect_timeout_secs`  | 10      |
/// | `request_timeout_secs`  | 10      |
/// | `idle_timeout_secs`     | 90      |
/// | `tcp_keepalive_secs`    | 30      |
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    pub max_idle_per_host: Option<usize>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
    pub tcp_keepalive_secs: Option<u64>,
}

impl ClientConfig {
    pub fn max_idle_per_host(&self) -> usize {
        self.max_idle_per_host.unwrap_or(100)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.unwrap_or(10))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(10))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.unwrap_or(90))
    }

    pub fn tcp_keepalive(&self) -> Duration {
        Duration::from_secs(self.tcp_keepalive_secs.unwrap_or(30))
    }

    /// 建立共用連線池的 HTTP client
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(self.max_idle_per_host())
            .pool_idle_timeout(self.idle_timeout())
            .connect_timeout(self.connect_timeout())
            .timeout(self.request_timeout())
            .tcp_keepalive(self.tcp_keepalive())
            .build()?;
        Ok(client)
    }
}

impl Validate for ClientConfig {
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        validate_positive_number("client.max_idle_per_host", self.max_idle_per_host(), 1)?;
        validate_range(
            "client.request_timeout_secs",
            self.request_timeout().as_secs(),
            1,
            3600,
        )?;
        validate_range(
            "client.connect_timeout_secs",
            self.connect_timeout().as_secs(),
            1,
            600,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.max_idle_per_host(), 100);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.idle_timeout(), Duration::from_secs(90));
        assert!(config.validate().is_ok());
        assert!(config.build_client().is_ok());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let config = ClientConfig {
            request_timeout_secs: Some(0),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
