//! Per-browser-session storage for the login handshake.
//!
//! Each browser gets an opaque id in an HttpOnly cookie; the id keys a
//! concurrent map holding the CSRF `state` nonce and, after a successful
//! exchange, the access token. State is request-local or session-keyed, so
//! no cross-session locking is needed.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use rand::{distributions::Alphanumeric, Rng};

pub const SESSION_COOKIE: &str = "relay_session";

/// Sessions carry no expiry; the store instead sheds entries when it
/// reaches this size, so cookie-less crawler traffic cannot grow the map
/// without bound.
const MAX_SESSIONS: usize = 100_000;

/// What a session holds.
///
/// `state` lives only during the login handshake and is replaced on every
/// initiation; `access_token` persists for the life of the session with no
/// expiry tracking (provider-side validity governs usability).
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub state: Option<String>,
    pub access_token: Option<String>,
}

/// Request-scoped session id, injected by [`attach_session`].
#[derive(Debug, Clone)]
pub struct SessionId(pub String);

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<DashMap<String, Session>>,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_sessions: usize) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            max_sessions,
        }
    }

    /// Create a fresh empty session and return its id.
    ///
    /// At capacity, sessions that never progressed past creation are shed
    /// first; only if every session is mid-handshake or authenticated are
    /// arbitrary entries evicted to make room.
    pub fn create(&self) -> String {
        if self.inner.len() >= self.max_sessions {
            self.inner
                .retain(|_, session| session.state.is_some() || session.access_token.is_some());
        }
        while self.inner.len() >= self.max_sessions {
            let victim = self.inner.iter().next().map(|entry| entry.key().clone());
            match victim {
                Some(key) => {
                    self.inner.remove(&key);
                }
                None => break,
            }
        }

        let id = random_session_id();
        self.inner.insert(id.clone(), Session::default());
        id
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        self.inner.get(id).map(|entry| entry.value().clone())
    }

    /// Store the login `state`, replacing any prior value.
    pub fn set_state(&self, id: &str, state: String) {
        self.inner.entry(id.to_string()).or_default().state = Some(state);
    }

    pub fn state(&self, id: &str) -> Option<String> {
        self.inner.get(id).and_then(|entry| entry.state.clone())
    }

    pub fn set_access_token(&self, id: &str, token: String) {
        self.inner.entry(id.to_string()).or_default().access_token = Some(token);
    }

    /// Non-empty access token for the session, if one was stored.
    pub fn access_token(&self, id: &str) -> Option<String> {
        self.inner
            .get(id)
            .and_then(|entry| entry.access_token.clone())
            .filter(|token| !token.is_empty())
    }
}

fn random_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Middleware that binds every request to a session.
///
/// Reuses the id from the session cookie when it names a live session,
/// otherwise creates one and sets the cookie on the way out. Handlers read
/// the id from request extensions via [`SessionId`].
pub async fn attach_session(
    State(store): State<SessionStore>,
    mut req: Request,
    next: Next,
) -> Response {
    let existing = cookie_value(req.headers(), SESSION_COOKIE).filter(|id| store.contains(id));
    let (id, fresh) = match existing {
        Some(id) => (id, false),
        None => (store.create(), true),
    };

    req.extensions_mut().insert(SessionId(id.clone()));
    let mut response = next.run(req).await;

    if fresh {
        let cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}
