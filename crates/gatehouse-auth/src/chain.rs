//! Ordered security chains
//!
//! A [`SecurityFilterChain`] claims a group of paths, names the access each
//! path requires, says how principals authenticate and whether sessions
//! may be used. [`WebSecurity`] holds the chains in order; the first chain
//! whose matcher accepts a path handles the request alone.

use gatehouse_db::Role;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::entry_point::{BasicAuthenticationEntryPoint, LoginUrlAuthenticationEntryPoint};
use crate::error::ConfigError;
use crate::matcher::RequestMatcher;
use crate::middleware::AuthUser;
use crate::provider::AuthenticationProvider;
use crate::session::SessionStore;
use crate::settings::{Profiles, SecuritySettings};

/// Access required for a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// No authentication attempted, everyone passes
    PermitAll,
    /// Any authenticated principal
    Authenticated,
    /// Authenticated principal holding the role
    HasRole(Role),
}

/// Outcome of checking a principal against an [`Access`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Granted,
    /// No principal; the entry point must challenge
    Unauthenticated,
    /// Principal present but not allowed
    Denied,
}

impl Access {
    pub fn decide(&self, user: Option<&AuthUser>) -> Decision {
        match (self, user) {
            (Access::PermitAll, _) => Decision::Granted,
            (_, None) => Decision::Unauthenticated,
            (Access::Authenticated, Some(_)) => Decision::Granted,
            (Access::HasRole(role), Some(user)) if user.has_role(*role) => Decision::Granted,
            (Access::HasRole(_), Some(_)) => Decision::Denied,
        }
    }
}

/// How a chain establishes the principal
#[derive(Debug, Clone)]
pub enum AuthenticationMechanism {
    /// `Authorization: Basic` on every request
    HttpBasic(BasicAuthenticationEntryPoint),
    /// Login form plus session cookie
    FormLogin(LoginUrlAuthenticationEntryPoint),
}

/// Whether a chain may create or read sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCreationPolicy {
    /// No session is created or consulted; session cookies are stripped
    /// from responses
    Stateless,
    /// Sessions are created when the login flow needs one
    IfRequired,
}

#[derive(Debug, Clone)]
struct AuthorizationRule {
    matcher: RequestMatcher,
    access: Access,
}

/// One ordered rule set
#[derive(Debug, Clone)]
pub struct SecurityFilterChain {
    name: String,
    order: i32,
    matcher: RequestMatcher,
    rules: Vec<AuthorizationRule>,
    mechanism: AuthenticationMechanism,
    session_policy: SessionCreationPolicy,
}

impl SecurityFilterChain {
    pub fn new(
        name: impl Into<String>,
        order: i32,
        matcher: RequestMatcher,
        mechanism: AuthenticationMechanism,
    ) -> Self {
        Self {
            name: name.into(),
            order,
            matcher,
            rules: Vec::new(),
            mechanism,
            session_policy: SessionCreationPolicy::IfRequired,
        }
    }

    pub fn session_policy(mut self, policy: SessionCreationPolicy) -> Self {
        self.session_policy = policy;
        self
    }

    /// Add an authorization rule. Rules are tried in insertion order.
    pub fn rule(mut self, matcher: RequestMatcher, access: Access) -> Self {
        self.rules.push(AuthorizationRule { matcher, access });
        self
    }

    /// Catch-all rule; add it last
    pub fn any_request(self, access: Access) -> Self {
        self.rule(RequestMatcher::any_request(), access)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn mechanism(&self) -> &AuthenticationMechanism {
        &self.mechanism
    }

    pub fn is_stateless(&self) -> bool {
        self.session_policy == SessionCreationPolicy::Stateless
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matcher.matches(path)
    }

    /// Access required for `path`. Paths no rule covers require an
    /// authenticated principal.
    pub fn access_for(&self, path: &str) -> Access {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(path))
            .map(|rule| rule.access.clone())
            .unwrap_or(Access::Authenticated)
    }

    /// `/api/**`: Basic, role `USER`, stateless
    pub fn api(settings: &SecuritySettings) -> Result<Self, ConfigError> {
        Ok(Self::new(
            "api",
            1,
            RequestMatcher::ant(&settings.api_pattern)?,
            AuthenticationMechanism::HttpBasic(BasicAuthenticationEntryPoint::new(
                settings.api_realm.clone(),
            )),
        )
        .session_policy(SessionCreationPolicy::Stateless)
        .any_request(Access::HasRole(Role::User)))
    }

    /// Management endpoints: public endpoints open, everything else Basic
    /// with role `SYSADMIN`, stateless
    pub fn actuator(settings: &SecuritySettings) -> Result<Self, ConfigError> {
        let base = settings.management_base();
        let mut chain = Self::new(
            "actuator",
            2,
            RequestMatcher::any_endpoint(base)?,
            AuthenticationMechanism::HttpBasic(BasicAuthenticationEntryPoint::new(
                settings.actuator_realm.clone(),
            )),
        )
        .session_policy(SessionCreationPolicy::Stateless);

        for endpoint in &settings.public_endpoints {
            chain = chain.rule(RequestMatcher::endpoint(base, endpoint)?, Access::PermitAll);
        }

        Ok(chain.any_request(Access::HasRole(Role::Sysadmin)))
    }

    /// Everything else: form login, any authenticated principal
    pub fn form_login(settings: &SecuritySettings) -> Result<Self, ConfigError> {
        Ok(Self::new(
            "form-login",
            3,
            RequestMatcher::any_request(),
            AuthenticationMechanism::FormLogin(LoginUrlAuthenticationEntryPoint::new(
                settings.login_path.clone(),
            )),
        )
        .rule(
            RequestMatcher::ant_any([
                settings.login_path.as_str(),
                settings.logout_path.as_str(),
            ])?,
            Access::PermitAll,
        )
        .any_request(Access::Authenticated))
    }
}

/// The assembled security configuration
pub struct WebSecurity {
    chains: Vec<SecurityFilterChain>,
    provider: Arc<dyn AuthenticationProvider>,
    sessions: Arc<SessionStore>,
    settings: SecuritySettings,
}

impl WebSecurity {
    /// Assemble from explicit chains; they are ordered by `order`
    pub fn new(
        mut chains: Vec<SecurityFilterChain>,
        provider: Arc<dyn AuthenticationProvider>,
        settings: SecuritySettings,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        chains.sort_by_key(|c| c.order);

        let sessions = Arc::new(SessionStore::new(
            settings.session_cookie_name.clone(),
            Duration::from_secs(settings.session_timeout_secs),
        ));

        Ok(Self {
            chains,
            provider,
            sessions,
            settings,
        })
    }

    /// The standard chains: API, management, and form login when the
    /// `docs` profile is active
    pub fn from_settings(
        settings: SecuritySettings,
        profiles: &Profiles,
        provider: Arc<dyn AuthenticationProvider>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;

        let mut chains = vec![
            SecurityFilterChain::api(&settings)?,
            SecurityFilterChain::actuator(&settings)?,
        ];
        if profiles.docs_enabled() {
            chains.push(SecurityFilterChain::form_login(&settings)?);
        }

        let security = Self::new(chains, provider, settings)?;
        for chain in &security.chains {
            info!(
                "Security chain #{} '{}' ({})",
                chain.order,
                chain.name,
                if chain.is_stateless() { "stateless" } else { "session" }
            );
        }
        Ok(security)
    }

    /// First chain claiming `path`
    pub fn chain_for(&self, path: &str) -> Option<&SecurityFilterChain> {
        self.chains.iter().find(|c| c.matches(path))
    }

    pub fn chains(&self) -> &[SecurityFilterChain] {
        &self.chains
    }

    pub fn provider(&self) -> &Arc<dyn AuthenticationProvider> {
        &self.provider
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn settings(&self) -> &SecuritySettings {
        &self.settings
    }

    pub fn form_login_enabled(&self) -> bool {
        self.chains
            .iter()
            .any(|c| matches!(c.mechanism, AuthenticationMechanism::FormLogin(_)))
    }
}
