//! Gatehouse Authentication and Authorization
//!
//! This crate provides the password encoder, the pluggable authentication
//! provider, and the ordered security chains that guard the API, the
//! management endpoints and the documentation area.

pub mod basic;
pub mod chain;
pub mod entry_point;
pub mod error;
pub mod matcher;
pub mod middleware;
pub mod password;
pub mod provider;
pub mod session;
pub mod settings;

pub use basic::BasicCredentials;
pub use chain::{
    Access, AuthenticationMechanism, Decision, SecurityFilterChain, SessionCreationPolicy,
    WebSecurity,
};
pub use error::{AuthError, ConfigError};
pub use matcher::{PathPattern, RequestMatcher};
pub use middleware::{AuthUser, security_filter};
pub use password::{Argon2PasswordEncoder, PasswordEncoder, hash_password, verify_password};
pub use provider::{
    AccountAuthenticationProvider, AuthenticationProvider, InMemoryAuthenticationProvider,
};
pub use session::{Session, SessionStore, spawn_session_reaper};
pub use settings::{Profiles, SecuritySettings};
