//! Configuration loading

use anyhow::{Context, Result, bail};
use gatehouse_auth::SecuritySettings;
use gatehouse_db::Role;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Profiles active regardless of the command line
    #[serde(default)]
    pub profiles: Vec<String>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Security chains plus the accounts created on first start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(flatten)]
    pub settings: SecuritySettings,
    /// Seeded only while the account table is empty
    #[serde(default = "default_accounts")]
    pub accounts: Vec<BootstrapAccount>,
    /// Interval of the expired session sweep
    #[serde(default = "default_session_sweep_secs")]
    pub session_sweep_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            settings: SecuritySettings::default(),
            accounts: default_accounts(),
            session_sweep_secs: default_session_sweep_secs(),
        }
    }
}

/// Account created on first start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAccount {
    pub username: String,
    pub password: String,
    pub roles: Vec<Role>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "./data/gatehouse.db".to_string()
}

fn default_accounts() -> Vec<BootstrapAccount> {
    vec![
        BootstrapAccount {
            username: "user".to_string(),
            password: "password".to_string(),
            roles: vec![Role::User],
        },
        BootstrapAccount {
            username: "operations".to_string(),
            password: "operations".to_string(),
            roles: vec![Role::Sysadmin],
        },
    ]
}

fn default_session_sweep_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    /// The file did not exist
    Defaults,
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Runs before logging is set up, so the caller reports the source.
    pub fn load(path: &str) -> Result<(Self, ConfigSource)> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            return Ok((Self::default(), ConfigSource::Defaults));
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path))?;

        Ok((config, ConfigSource::File))
    }

    /// Checks that do not need the security layer
    fn validate(&self) -> Result<()> {
        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            other => bail!("Unknown logging format '{}'", other),
        }

        for account in &self.security.accounts {
            if account.username.trim().is_empty() {
                bail!("Bootstrap account with an empty username");
            }
            if account.password.is_empty() {
                bail!("Bootstrap account '{}' has an empty password", account.username);
            }
            if account.roles.is_empty() {
                bail!("Bootstrap account '{}' has no roles", account.username);
            }
        }

        self.security.settings.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let (config, source) = Config::load(path.to_str().unwrap()).unwrap();

        assert_eq!(source, ConfigSource::Defaults);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.security.settings.api_realm, "api realm");
        assert_eq!(config.security.accounts.len(), 2);
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn test_load_overrides() {
        let file = write_config(
            r#"
profiles = ["docs"]

[server]
port = 9090

[security]
actuator_realm = "ops"
management_base_path = "/manage"

[[security.accounts]]
username = "alice"
password = "secret"
roles = ["USER", "SYSADMIN"]

[logging]
format = "json"
"#,
        );

        let (config, source) = Config::load(file.path().to_str().unwrap()).unwrap();

        assert_eq!(source, ConfigSource::File);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.profiles, vec!["docs".to_string()]);
        assert_eq!(config.security.settings.actuator_realm, "ops");
        assert_eq!(config.security.settings.api_realm, "api realm");
        assert_eq!(config.security.settings.management_base(), "/manage");
        assert_eq!(config.security.accounts.len(), 1);
        assert_eq!(
            config.security.accounts[0].roles,
            vec![Role::User, Role::Sysadmin]
        );
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let file = write_config(
            r#"
[logging]
format = "xml"
"#,
        );
        assert!(Config::load(file.path().to_str().unwrap()).is_err());

        let file = write_config(
            r#"
[security]
management_base_path = "actuator"
"#,
        );
        assert!(Config::load(file.path().to_str().unwrap()).is_err());

        let file = write_config(
            r#"
[[security.accounts]]
username = "nobody"
password = "secret"
roles = []
"#,
        );
        assert!(Config::load(file.path().to_str().unwrap()).is_err());

        let file = write_config("[server\nport = 1");
        assert!(Config::load(file.path().to_str().unwrap()).is_err());
    }
}
