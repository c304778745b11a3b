//! Database models

use crate::utils::{parse_datetime_or_now, split_csv};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

/// Error type for parsing models from strings
#[derive(Debug, Clone)]
pub enum ParseError {
    InvalidRole(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidRole(s) => write!(f, "Invalid role: {}", s),
        }
    }
}

impl std::error::Error for ParseError {}

/// Role granted to an account
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Consumer of the `/api` surface
    User,
    /// Operator of the management endpoints
    Sysadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Sysadmin => "SYSADMIN",
        }
    }

    /// Granted authority name, e.g. `ROLE_USER`
    pub fn authority(&self) -> String {
        format!("ROLE_{}", self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let name = name.strip_prefix("ROLE_").unwrap_or(name);
        match name.to_ascii_uppercase().as_str() {
            "USER" => Ok(Role::User),
            "SYSADMIN" => Ok(Role::Sysadmin),
            _ => Err(ParseError::InvalidRole(s.to_string())),
        }
    }
}

/// Account model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub enabled: bool,
    pub locked: bool,
    pub expired: bool,
    pub credentials_expired: bool,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// New account (for insertion)
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
}

/// Greeting served by the `/api` resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Greeting {
    pub id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==================== TryFrom Implementations ====================

impl TryFrom<&sqlx::sqlite::SqliteRow> for Account {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        let roles: Option<String> = row.try_get("roles")?;
        Ok(Account {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            enabled: row.try_get("enabled")?,
            locked: row.try_get("locked")?,
            expired: row.try_get("expired")?,
            credentials_expired: row.try_get("credentials_expired")?,
            roles: split_csv(roles.as_deref())
                .into_iter()
                .filter_map(|r| Role::from_str(r).ok())
                .collect(),
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            updated_at: parse_datetime_or_now(&row.try_get::<String, _>("updated_at")?),
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for Greeting {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(Greeting {
            id: row.try_get("id")?,
            text: row.try_get("text")?,
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            updated_at: parse_datetime_or_now(&row.try_get::<String, _>("updated_at")?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
        assert_eq!("sysadmin".parse::<Role>().unwrap(), Role::Sysadmin);
        assert_eq!("ROLE_SYSADMIN".parse::<Role>().unwrap(), Role::Sysadmin);
        assert!("ADMIN".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_authority() {
        assert_eq!(Role::User.authority(), "ROLE_USER");
        assert_eq!(Role::Sysadmin.to_string(), "SYSADMIN");
    }
}
