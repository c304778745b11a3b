//! Server-side sessions for form login
//!
//! Only the form login chain uses sessions. Sessions live in memory,
//! are addressed by a random cookie value and expire after an idle
//! timeout.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue},
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::middleware::AuthUser;

/// A single session
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    /// Principal established by a successful form login
    pub user: Option<AuthUser>,
    /// Request that was interrupted by the redirect to the login form
    pub saved_request: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl Session {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().simple().to_string(),
            user: None,
            saved_request: None,
            created_at: now,
            last_accessed_at: now,
        }
    }
}

/// Idle timeout of sessions that never authenticated
const ANONYMOUS_SESSION_TIMEOUT_SECS: u64 = 300;
/// Upper bound on sessions that never authenticated
const MAX_ANONYMOUS_SESSIONS: usize = 10_000;

/// Whether `target` is safe to use as a same-origin redirect.
///
/// Only absolute paths qualify. `//host` and `/\host` are read by browsers
/// as references to another host.
pub fn is_local_redirect(target: &str) -> bool {
    target.starts_with('/')
        && !matches!(target.as_bytes().get(1), Some(b'/') | Some(b'\\'))
        && !target.chars().any(|c| c.is_control() || c == '\\')
}

fn to_duration(value: std::time::Duration) -> Duration {
    Duration::from_std(value).unwrap_or_else(|_| Duration::minutes(30))
}

/// In-memory session registry
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    cookie_name: String,
    timeout: Duration,
    anonymous_timeout: Duration,
    max_anonymous: usize,
}

impl SessionStore {
    pub fn new(cookie_name: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            cookie_name: cookie_name.into(),
            timeout: to_duration(timeout),
            anonymous_timeout: to_duration(std::time::Duration::from_secs(
                ANONYMOUS_SESSION_TIMEOUT_SECS,
            )),
            max_anonymous: MAX_ANONYMOUS_SESSIONS,
        }
    }

    /// Override the idle timeout and the cap applied to sessions that
    /// never authenticated. The timeout never exceeds the store timeout.
    pub fn with_anonymous_limits(mut self, timeout: std::time::Duration, max: usize) -> Self {
        self.anonymous_timeout = to_duration(timeout);
        self.max_anonymous = max.max(1);
        self
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Number of live (possibly expired but not yet purged) sessions
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        let timeout = if session.user.is_some() {
            self.timeout
        } else {
            self.timeout.min(self.anonymous_timeout)
        };
        now - session.last_accessed_at > timeout
    }

    /// Drop expired sessions and, if the anonymous cap is still reached,
    /// the least recently used anonymous ones
    fn make_room_for_anonymous(&self, sessions: &mut HashMap<String, Session>, now: DateTime<Utc>) {
        let anonymous = sessions.values().filter(|s| s.user.is_none()).count();
        if anonymous < self.max_anonymous {
            return;
        }

        sessions.retain(|_, s| !self.is_expired(s, now));

        let mut anonymous: Vec<(DateTime<Utc>, String)> = sessions
            .values()
            .filter(|s| s.user.is_none())
            .map(|s| (s.last_accessed_at, s.id.clone()))
            .collect();
        if anonymous.len() < self.max_anonymous {
            return;
        }

        anonymous.sort();
        let excess = anonymous.len() + 1 - self.max_anonymous;
        for (_, id) in anonymous.into_iter().take(excess) {
            sessions.remove(&id);
        }
        debug!("Evicted {} anonymous sessions", excess);
    }

    /// Look up a session and mark it as accessed. Expired sessions are
    /// removed and reported as absent.
    pub fn get(&self, id: &str) -> Option<Session> {
        let now = Utc::now();
        let mut sessions = self.sessions.write();

        let expired = match sessions.get(id) {
            Some(session) => self.is_expired(session, now),
            None => return None,
        };
        if expired {
            debug!("Session expired");
            sessions.remove(id);
            return None;
        }

        let session = sessions.get_mut(id)?;
        session.last_accessed_at = now;
        Some(session.clone())
    }

    /// Resolve the session referenced by the request's cookie
    pub fn from_headers(&self, headers: &HeaderMap) -> Option<Session> {
        session_cookie(headers, &self.cookie_name).and_then(|id| self.get(&id))
    }

    /// Remember the request to return to after login. Creates a session
    /// if `id` is absent or no longer valid and returns the session used.
    ///
    /// Targets that are not local paths are not saved and `None` is
    /// returned.
    pub fn save_request(&self, id: Option<&str>, target: &str) -> Option<Session> {
        if !is_local_redirect(target) {
            debug!("Refusing to save non-local redirect target");
            return None;
        }

        let existing = id.and_then(|id| self.get(id));
        let mut sessions = self.sessions.write();
        let mut session = match existing {
            Some(session) => session,
            None => {
                self.make_room_for_anonymous(&mut sessions, Utc::now());
                Session::new()
            }
        };
        session.saved_request = Some(target.to_string());
        sessions.insert(session.id.clone(), session.clone());
        Some(session)
    }

    /// Establish an authenticated session.
    ///
    /// The previous session (if any) is discarded and a fresh id issued so
    /// that an id planted before login cannot be reused afterwards. The
    /// saved request survives the rotation.
    pub fn authenticate(&self, previous: Option<&str>, user: AuthUser) -> Session {
        let saved_request = previous
            .and_then(|id| self.invalidate(id))
            .and_then(|s| s.saved_request);

        let mut session = Session::new();
        session.user = Some(user);
        session.saved_request = saved_request;
        self.sessions
            .write()
            .insert(session.id.clone(), session.clone());
        session
    }

    /// Remove the saved request from a session and return it. Targets
    /// that are not local paths are discarded.
    pub fn take_saved_request(&self, id: &str) -> Option<String> {
        let target = self
            .sessions
            .write()
            .get_mut(id)
            .and_then(|s| s.saved_request.take())?;
        if is_local_redirect(&target) {
            Some(target)
        } else {
            warn!("Discarding non-local saved request");
            None
        }
    }

    /// Drop a session, returning it if it existed
    pub fn invalidate(&self, id: &str) -> Option<Session> {
        self.sessions.write().remove(id)
    }

    /// Remove every expired session and return how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| !self.is_expired(s, now));
        before - sessions.len()
    }

    /// `Set-Cookie` value carrying a session id
    pub fn session_cookie_header(&self, id: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        let value = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", self.cookie_name, id);
        HeaderValue::from_str(&value)
    }

    /// `Set-Cookie` value that deletes the session cookie
    pub fn clear_cookie_header(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let value = format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
            self.cookie_name
        );
        HeaderValue::from_str(&value)
    }
}

/// Read a cookie value from the `Cookie` request headers
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Start the background task that purges expired sessions
pub fn spawn_session_reaper(
    store: Arc<SessionStore>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    use tokio::time::{Duration, interval};

    info!(
        "Starting background session reaper (interval: {} seconds)",
        interval_secs
    );

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));

        // Skip the first tick (which fires immediately)
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let purged = store.purge_expired();
            if purged > 0 {
                info!("Purged {} expired sessions", purged);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_db::Role;

    fn user() -> AuthUser {
        AuthUser {
            id: 1,
            username: "reader".to_string(),
            roles: vec![Role::User],
        }
    }

    fn store() -> SessionStore {
        SessionStore::new("SESSIONID", std::time::Duration::from_secs(60))
    }

    #[test]
    fn test_save_request_creates_session() {
        let store = store();
        let session = store.save_request(None, "/docs/index.html").unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(&session.id).unwrap().saved_request.as_deref(),
            Some("/docs/index.html")
        );

        // Unknown ids get a fresh session rather than an error
        let other = store.save_request(Some("unknown"), "/").unwrap();
        assert_ne!(other.id, "unknown");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_authenticate_rotates_id_and_keeps_saved_request() {
        let store = store();
        let anonymous = store.save_request(None, "/docs/guide.html").unwrap();

        let session = store.authenticate(Some(&anonymous.id), user());
        assert_ne!(session.id, anonymous.id);
        assert!(store.get(&anonymous.id).is_none());
        assert_eq!(session.saved_request.as_deref(), Some("/docs/guide.html"));
        assert_eq!(store.get(&session.id).unwrap().user.unwrap().username, "reader");

        assert_eq!(
            store.take_saved_request(&session.id).as_deref(),
            Some("/docs/guide.html")
        );
        assert!(store.take_saved_request(&session.id).is_none());
    }

    #[test]
    fn test_expired_sessions_are_dropped() {
        let store = SessionStore::new("SESSIONID", std::time::Duration::ZERO);
        let session = store.authenticate(None, user());
        std::thread::sleep(std::time::Duration::from_millis(5));

        assert!(store.get(&session.id).is_none());
        assert!(store.is_empty());

        store.authenticate(None, user());
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(store.purge_expired(), 1);
    }

    #[test]
    fn test_invalidate() {
        let store = store();
        let session = store.authenticate(None, user());
        assert!(store.invalidate(&session.id).is_some());
        assert!(store.get(&session.id).is_none());
    }

    #[test]
    fn test_session_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; SESSIONID=abc123; x=y"));
        assert_eq!(session_cookie(&headers, "SESSIONID").as_deref(), Some("abc123"));
        assert!(session_cookie(&headers, "OTHER").is_none());

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("SESSIONID="));
        assert!(session_cookie(&headers, "SESSIONID").is_none());
    }

    #[test]
    fn test_cookie_headers() {
        let store = store();
        let set = store.session_cookie_header("abc").unwrap();
        assert_eq!(set.to_str().unwrap(), "SESSIONID=abc; Path=/; HttpOnly; SameSite=Lax");
        let clear = store.clear_cookie_header().unwrap();
        assert!(clear.to_str().unwrap().contains("Max-Age=0"));

        assert!(store.session_cookie_header("bad\nid").is_err());
    }

    #[test]
    fn test_local_redirect_targets() {
        assert!(is_local_redirect("/"));
        assert!(is_local_redirect("/docs/index.html?page=2"));
        assert!(!is_local_redirect("//evil.example/phish"));
        assert!(!is_local_redirect("/\\evil.example"));
        assert!(!is_local_redirect("https://evil.example/"));
        assert!(!is_local_redirect("docs/index.html"));
        assert!(!is_local_redirect(""));
    }

    #[test]
    fn test_non_local_target_is_not_saved() {
        let store = store();
        assert!(store.save_request(None, "//evil.example/phish").is_none());
        assert!(store.is_empty());

        // An existing session keeps its earlier target
        let session = store.save_request(None, "/docs/index.html").unwrap();
        assert!(store.save_request(Some(&session.id), "//evil.example").is_none());
        assert_eq!(
            store.take_saved_request(&session.id).as_deref(),
            Some("/docs/index.html")
        );
    }

    #[test]
    fn test_anonymous_sessions_are_capped() {
        let store = store().with_anonymous_limits(std::time::Duration::from_secs(60), 2);
        let authenticated = store.authenticate(None, user());

        let first = store.save_request(None, "/a").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = store.save_request(None, "/b").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let third = store.save_request(None, "/c").unwrap();

        assert_eq!(store.len(), 3);
        assert!(store.get(&first.id).is_none());
        assert!(store.get(&second.id).is_some());
        assert!(store.get(&third.id).is_some());
        assert!(store.get(&authenticated.id).is_some());
    }

    #[test]
    fn test_anonymous_sessions_expire_first() {
        let store = store().with_anonymous_limits(std::time::Duration::ZERO, 100);
        let anonymous = store.save_request(None, "/docs/index.html").unwrap();
        let authenticated = store.authenticate(None, user());
        std::thread::sleep(std::time::Duration::from_millis(5));

        assert!(store.get(&anonymous.id).is_none());
        assert!(store.get(&authenticated.id).is_some());
        assert_eq!(store.purge_expired(), 0);
    }
}
