//! Cookie sessions kept in process memory.
//!
//! The cookie carries a random token plus a SHA-256 tag over the server secret
//! and the token; the session table maps tokens to user ids.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::http::{header::COOKIE, request::Parts, HeaderMap};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::AppState;
use crate::services::{password::constant_time_eq, ServiceError};

pub const COOKIE_NAME: &str = "spinbet.sid";

struct Session {
    user_id: i32,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct Sessions {
    secret: Arc<str>,
    max_age: Duration,
    entries: Arc<DashMap<Uuid, Session>>,
}

impl Sessions {
    pub fn new(secret: &str, max_age: Duration) -> Self {
        Sessions {
            secret: Arc::from(secret),
            max_age,
            entries: Arc::new(DashMap::new()),
        }
    }

    fn tag(&self, token: &Uuid) -> String {
        let digest = Sha256::new()
            .chain_update(self.secret.as_bytes())
            .chain_update(b".")
            .chain_update(token.as_bytes())
            .finalize();
        hex::encode(digest)
    }

    /// Starts a session for `user_id` and returns the `Set-Cookie` value.
    /// Expired sessions are swept out first.
    pub fn open(&self, user_id: i32) -> String {
        let now = Instant::now();
        self.entries.retain(|_, session| session.expires_at > now);

        let token = Uuid::new_v4();
        self.entries.insert(
            token,
            Session {
                user_id,
                expires_at: now + self.max_age,
            },
        );

        format!(
            "{}={}.{}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            COOKIE_NAME,
            token,
            self.tag(&token),
            self.max_age.as_secs()
        )
    }

    /// Resolves a cookie value to its token and user id.
    pub fn resolve(&self, cookie: &str) -> Option<(Uuid, i32)> {
        let (token, tag) = cookie.split_once('.')?;
        let token = Uuid::parse_str(token).ok()?;
        if !constant_time_eq(tag.as_bytes(), self.tag(&token).as_bytes()) {
            return None;
        }

        let (user_id, expired) = {
            let session = self.entries.get(&token)?;
            (session.user_id, session.expires_at <= Instant::now())
        };
        if expired {
            self.entries.remove(&token);
            return None;
        }

        Some((token, user_id))
    }

    pub fn close(&self, token: &Uuid) {
        self.entries.remove(token);
    }

    /// Ends whatever session the request carries.
    pub fn close_from_headers(&self, headers: &HeaderMap) {
        if let Some((token, user_id)) = session_cookie(headers).and_then(|c| self.resolve(c)) {
            self.close(&token);
            log::info!("Closed session for user {}", user_id);
        }
    }

    pub fn expired_cookie() -> String {
        format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", COOKIE_NAME)
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .map(|(_, value)| value)
}

/// The authenticated caller. Rejects with 401 when there is no live session.
pub struct CurrentUser {
    pub user_id: i32,
}

impl axum::extract::FromRequestParts<AppState> for CurrentUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        session_cookie(&parts.headers)
            .and_then(|cookie| state.sessions.resolve(cookie))
            .map(|(_, user_id)| CurrentUser { user_id })
            .ok_or(ServiceError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn cookie_value(set_cookie: &str) -> String {
        set_cookie
            .split(';')
            .next()
            .and_then(|pair| pair.split_once('='))
            .map(|(_, value)| value.to_string())
            .unwrap()
    }

    #[test]
    fn opened_session_resolves_to_its_user() {
        let sessions = Sessions::new("secret", Duration::from_secs(60));
        let set_cookie = sessions.open(42);
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("Max-Age=60"));

        let (_, user_id) = sessions.resolve(&cookie_value(&set_cookie)).unwrap();
        assert_eq!(user_id, 42);
    }

    #[test]
    fn tampered_or_foreign_cookies_are_rejected() {
        let sessions = Sessions::new("secret", Duration::from_secs(60));
        let value = cookie_value(&sessions.open(42));

        let (token, _) = value.split_once('.').unwrap();
        assert!(sessions.resolve(&format!("{}.{}", token, "00")).is_none());

        let other = Sessions::new("other secret", Duration::from_secs(60));
        assert!(other.resolve(&value).is_none());
        assert!(sessions.resolve("garbage").is_none());
    }

    #[test]
    fn expired_sessions_are_dropped() {
        let sessions = Sessions::new("secret", Duration::ZERO);
        let value = cookie_value(&sessions.open(42));
        assert!(sessions.resolve(&value).is_none());
        assert!(sessions.entries.is_empty());
    }

    #[test]
    fn opening_a_session_sweeps_expired_ones() {
        let expired = Sessions::new("secret", Duration::ZERO);
        for _ in 0..1_000 {
            expired.open(42);
        }
        assert_eq!(expired.entries.len(), 1);

        let live = Sessions::new("secret", Duration::from_secs(60));
        for user_id in 0..10 {
            live.open(user_id);
        }
        assert_eq!(live.entries.len(), 10);
    }

    #[test]
    fn closing_from_headers_ends_the_session() {
        let sessions = Sessions::new("secret", Duration::from_secs(60));
        let value = cookie_value(&sessions.open(42));

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {}={}", COOKIE_NAME, value)).unwrap(),
        );
        sessions.close_from_headers(&headers);
        assert!(sessions.resolve(&value).is_none());
    }
}
