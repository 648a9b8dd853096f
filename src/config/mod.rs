// Configuration module
// Author: kelexine (https://github.com/kelexine)

mod models;

pub use models::*;

use crate::error::{GatewayError, Result};
use crate::gateway::RouteId;
use config::{Config, Environment, File};
use std::path::PathBuf;

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest, `SITEGATE__BACKEND__BASE_URL`)
    /// 2. Config file (`path`, or `~/.sitegate/config.toml`)
    /// 3. Defaults (lowest)
    ///
    /// CLI flags are applied on top by the binary.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let (file, required) = match path {
            Some(path) => (path.to_string(), true),
            None => (Self::default_config_path(), false),
        };

        let config = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&Self::default())?)
            // An explicitly named file must exist
            .add_source(File::with_name(&file).required(required))
            .add_source(
                Environment::with_prefix("SITEGATE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let config: AppConfig = config
            .try_deserialize()
            .map_err(|e| GatewayError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.backend.base_url.starts_with("http://")
            || self.backend.base_url.starts_with("https://"))
        {
            return Err(GatewayError::Config(format!(
                "backend.base_url must be an http(s) URL, got {:?}",
                self.backend.base_url
            )));
        }
        if self.backend.timeout_seconds == 0 {
            return Err(GatewayError::Config(
                "backend.timeout_seconds must be greater than zero".to_string(),
            ));
        }
        for (name, seconds) in &self.backend.route_timeouts {
            if RouteId::from_name(name).is_none() {
                return Err(GatewayError::Config(format!(
                    "backend.route_timeouts names unknown route {:?}",
                    name
                )));
            }
            if *seconds == 0 {
                return Err(GatewayError::Config(format!(
                    "backend.route_timeouts.{} must be greater than zero",
                    name
                )));
            }
        }
        if self.auth.cookie_name.trim().is_empty() {
            return Err(GatewayError::Config(
                "auth.cookie_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn default_config_path() -> String {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sitegate")
            .join("config.toml")
            .to_string_lossy()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Resource;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.auth.cookie_name, "accessToken");
        assert_eq!(config.backend.timeout_seconds, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[backend]
base_url = "https://api.example.com/v1"
timeout_seconds = 3

[backend.route_timeouts]
website_data = 4

[cache.policies.userNotifications]
stale_time_seconds = 10
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.backend.base_url, "https://api.example.com/v1");
        assert_eq!(config.backend.timeout_seconds, 3);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.backend.route_timeouts["website_data"], 4);
        assert_eq!(
            config.cache.policies[&Resource::UserNotifications].stale_time_seconds,
            Some(10)
        );
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = AppConfig::load(Some("/definitely/not/here/sitegate.toml"));
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_rejects_non_http_backend() {
        let mut config = AppConfig::default();
        config.backend.base_url = "ftp://backend".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_or_zero_route_timeout() {
        let mut config = AppConfig::default();
        config.backend.route_timeouts.insert("no_such_route".into(), 5);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.backend.route_timeouts.insert("chat".into(), 0);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.backend.route_timeouts.insert("chat".into(), 30);
        assert!(config.validate().is_ok());
    }
}
