//! Authentication providers
//!
//! A provider turns submitted credentials into an [`AuthUser`] or an
//! [`AuthError`]. The security filter and the form login handler only ever
//! talk to the trait, so deployments can supply their own account source.

use async_trait::async_trait;
use gatehouse_db::{Account, Database, Role};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::middleware::AuthUser;
use crate::password::{Argon2PasswordEncoder, DUMMY_HASH, PasswordEncoder};

/// Pluggable credential verification
#[async_trait]
pub trait AuthenticationProvider: Send + Sync {
    /// Verify a username/password pair
    async fn authenticate(&self, username: &str, password: &str) -> Result<AuthUser, AuthError>;
}

/// Run the (CPU heavy) hash comparison off the async runtime
async fn check_password(
    encoder: &Arc<dyn PasswordEncoder>,
    password: &str,
    hash: String,
) -> Result<bool, AuthError> {
    let encoder = Arc::clone(encoder);
    let password = password.to_string();
    tokio::task::spawn_blocking(move || encoder.matches(&password, &hash))
        .await
        .map_err(|e| AuthError::PasswordHash(format!("Task join error: {}", e)))?
}

/// Status checks applied after the password has been verified
fn check_account_status(account: &Account) -> Result<(), AuthError> {
    if account.locked {
        return Err(AuthError::AccountLocked);
    }
    if !account.enabled {
        return Err(AuthError::AccountDisabled);
    }
    if account.expired {
        return Err(AuthError::AccountExpired);
    }
    if account.credentials_expired {
        return Err(AuthError::CredentialsExpired);
    }
    Ok(())
}

/// Provider backed by the account table
#[derive(Clone)]
pub struct AccountAuthenticationProvider {
    db: Database,
    encoder: Arc<dyn PasswordEncoder>,
}

impl AccountAuthenticationProvider {
    pub fn new(db: Database, encoder: Arc<dyn PasswordEncoder>) -> Self {
        Self { db, encoder }
    }

    /// Provider using the default Argon2 encoder
    pub fn with_default_encoder(db: Database) -> Self {
        Self::new(db, Arc::new(Argon2PasswordEncoder::new()))
    }
}

#[async_trait]
impl AuthenticationProvider for AccountAuthenticationProvider {
    async fn authenticate(&self, username: &str, password: &str) -> Result<AuthUser, AuthError> {
        let account = self.db.get_account_by_username(username).await?;

        // Unknown users are checked against a dummy hash so that a lookup
        // miss costs as much as a wrong password
        let hash = account
            .as_ref()
            .map(|a| a.password_hash.clone())
            .unwrap_or_else(|| DUMMY_HASH.to_string());

        let matched = match check_password(&self.encoder, password, hash).await {
            Ok(matched) => matched,
            Err(e) => {
                if account.is_some() {
                    warn!("Stored password hash for '{}' is unusable: {}", username, e);
                }
                false
            }
        };

        let account = match (account, matched) {
            (Some(account), true) => account,
            _ => {
                debug!("Authentication failed for '{}': bad credentials", username);
                return Err(AuthError::InvalidCredentials);
            }
        };

        check_account_status(&account).inspect_err(|e| {
            debug!("Authentication failed for '{}': {}", username, e);
        })?;

        Ok(AuthUser::from_account(&account))
    }
}

/// Provider with a fixed set of users held in memory
#[derive(Clone)]
pub struct InMemoryAuthenticationProvider {
    users: HashMap<String, (String, AuthUser)>,
    encoder: Arc<dyn PasswordEncoder>,
}

impl Default for InMemoryAuthenticationProvider {
    fn default() -> Self {
        Self::new(Arc::new(Argon2PasswordEncoder::new()))
    }
}

impl InMemoryAuthenticationProvider {
    pub fn new(encoder: Arc<dyn PasswordEncoder>) -> Self {
        Self {
            users: HashMap::new(),
            encoder,
        }
    }

    /// Register a user, hashing the password with the provider's encoder
    pub fn with_user(
        mut self,
        username: &str,
        password: &str,
        roles: &[Role],
    ) -> Result<Self, AuthError> {
        let hash = self.encoder.encode(password)?;
        let user = AuthUser {
            id: self.users.len() as i64 + 1,
            username: username.to_string(),
            roles: roles.to_vec(),
        };
        self.users.insert(username.to_string(), (hash, user));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl AuthenticationProvider for InMemoryAuthenticationProvider {
    async fn authenticate(&self, username: &str, password: &str) -> Result<AuthUser, AuthError> {
        let (hash, user) = match self.users.get(username) {
            Some((hash, user)) => (hash.clone(), Some(user)),
            None => (DUMMY_HASH.to_string(), None),
        };

        let matched = check_password(&self.encoder, password, hash)
            .await
            .unwrap_or(false);

        match (user, matched) {
            (Some(user), true) => Ok(user.clone()),
            _ => Err(AuthError::InvalidCredentials),
        }
    }
}
