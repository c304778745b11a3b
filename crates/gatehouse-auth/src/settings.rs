//! Security settings and deployment profiles

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::ConfigError;
use crate::session::is_local_redirect;

/// Tunables for the three security chains
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySettings {
    /// Paths served by the API chain
    #[serde(default = "default_api_pattern")]
    pub api_pattern: String,
    /// Realm announced in API Basic challenges
    #[serde(default = "default_api_realm")]
    pub api_realm: String,
    /// Base path of the management endpoints
    #[serde(default = "default_management_base_path")]
    pub management_base_path: String,
    /// Realm announced in management Basic challenges
    #[serde(default = "default_actuator_realm")]
    pub actuator_realm: String,
    /// Management endpoints reachable without credentials
    #[serde(default = "default_public_endpoints")]
    pub public_endpoints: Vec<String>,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
    /// Where a successful login lands when no request was saved
    #[serde(default = "default_success_path")]
    pub default_success_path: String,
    #[serde(default = "default_session_cookie_name")]
    pub session_cookie_name: String,
    /// Idle timeout of form login sessions
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
}

fn default_api_pattern() -> String {
    "/api/**".to_string()
}

fn default_api_realm() -> String {
    "api realm".to_string()
}

fn default_management_base_path() -> String {
    "/actuator".to_string()
}

fn default_actuator_realm() -> String {
    "actuator realm".to_string()
}

fn default_public_endpoints() -> Vec<String> {
    vec!["health".to_string()]
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_logout_path() -> String {
    "/logout".to_string()
}

fn default_success_path() -> String {
    "/".to_string()
}

fn default_session_cookie_name() -> String {
    "SESSIONID".to_string()
}

fn default_session_timeout_secs() -> u64 {
    1800 // 30 minutes
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            api_pattern: default_api_pattern(),
            api_realm: default_api_realm(),
            management_base_path: default_management_base_path(),
            actuator_realm: default_actuator_realm(),
            public_endpoints: default_public_endpoints(),
            login_path: default_login_path(),
            logout_path: default_logout_path(),
            default_success_path: default_success_path(),
            session_cookie_name: default_session_cookie_name(),
            session_timeout_secs: default_session_timeout_secs(),
        }
    }
}

fn validate_path(name: &'static str, value: &str) -> Result<(), ConfigError> {
    if !is_local_redirect(value) {
        return Err(ConfigError::InvalidPath {
            name,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn validate_realm(chain: &'static str, realm: &str) -> Result<(), ConfigError> {
    if realm.trim().is_empty() {
        return Err(ConfigError::InvalidRealm {
            chain,
            reason: "realm must not be empty",
        });
    }
    if realm.contains(['"', '\\']) || realm.chars().any(|c| c.is_control()) {
        return Err(ConfigError::InvalidRealm {
            chain,
            reason: "realm must not contain quotes, backslashes or control characters",
        });
    }
    Ok(())
}

impl SecuritySettings {
    /// Check everything the chain builder relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_path("api pattern", &self.api_pattern)?;
        validate_path("management base path", &self.management_base_path)?;
        validate_path("login path", &self.login_path)?;
        validate_path("logout path", &self.logout_path)?;
        validate_path("default success path", &self.default_success_path)?;
        validate_realm("api", &self.api_realm)?;
        validate_realm("actuator", &self.actuator_realm)?;

        if self.management_base_path.trim_end_matches('/').is_empty() {
            return Err(ConfigError::InvalidPath {
                name: "management base path",
                value: self.management_base_path.clone(),
            });
        }

        let cookie_ok = !self.session_cookie_name.is_empty()
            && self
                .session_cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !cookie_ok {
            return Err(ConfigError::InvalidCookieName(
                self.session_cookie_name.clone(),
            ));
        }

        if self.session_timeout_secs == 0 {
            return Err(ConfigError::InvalidSessionTimeout);
        }

        Ok(())
    }

    /// Management base path without a trailing slash
    pub fn management_base(&self) -> &str {
        self.management_base_path.trim_end_matches('/')
    }
}

/// Set of active deployment profiles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profiles(BTreeSet<String>);

impl Profiles {
    /// Profile that exposes the documentation area behind form login
    pub const DOCS: &'static str = "docs";

    pub fn new<I, S>(names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut profiles = BTreeSet::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(ConfigError::InvalidProfile(name.to_string()));
            }
            profiles.insert(name.to_string());
        }
        Ok(Self(profiles))
    }

    /// Parse a comma separated list such as `docs,local`
    pub fn parse(list: &str) -> Result<Self, ConfigError> {
        Self::new(list.split(','))
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn docs_enabled(&self) -> bool {
        self.is_active(Self::DOCS)
    }

    pub fn extend(&mut self, other: Profiles) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Profiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("default");
        }
        let names: Vec<&str> = self.iter().collect();
        f.write_str(&names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = SecuritySettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.api_realm, "api realm");
        assert_eq!(settings.actuator_realm, "actuator realm");
        assert_eq!(settings.management_base(), "/actuator");
    }

    #[test]
    fn test_invalid_settings() {
        let settings = SecuritySettings {
            api_realm: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidRealm { chain: "api", .. })
        ));

        let settings = SecuritySettings {
            actuator_realm: "bad \"realm\"".to_string(),
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = SecuritySettings {
            management_base_path: "actuator".to_string(),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::InvalidPath { .. })));

        let settings = SecuritySettings {
            management_base_path: "/".to_string(),
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = SecuritySettings {
            default_success_path: "//evil.example/".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidPath { name: "default success path", .. })
        ));

        let settings = SecuritySettings {
            session_cookie_name: "bad cookie".to_string(),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::InvalidCookieName(_))));

        let settings = SecuritySettings {
            session_timeout_secs: 0,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::InvalidSessionTimeout)));
    }

    #[test]
    fn test_profiles() {
        let profiles = Profiles::parse("docs, local,,").unwrap();
        assert!(profiles.docs_enabled());
        assert!(profiles.is_active("local"));
        assert!(!profiles.is_active("prod"));
        assert_eq!(profiles.to_string(), "docs,local");

        assert!(!Profiles::default().docs_enabled());
        assert_eq!(Profiles::default().to_string(), "default");
        assert!(Profiles::parse("docs;prod").is_err());
    }

    #[test]
    fn test_profiles_extend() {
        let mut profiles = Profiles::parse("local").unwrap();
        profiles.extend(Profiles::parse("docs").unwrap());
        assert!(profiles.docs_enabled());
        assert!(profiles.is_active("local"));
    }
}
