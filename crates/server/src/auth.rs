//! Session-backed authentication for the personnel routes.
//!
//! Sessions live in memory, keyed by an opaque id carried in a cookie. Only
//! this module creates, refreshes or tears them down; handlers receive the
//! resolved identity through a `RequestContext`.

use std::{collections::HashMap, sync::Arc};

use axum::http::{header, header::InvalidHeaderValue, HeaderMap, HeaderValue};
use chrono::{DateTime, TimeDelta, Utc};
use personnel_api::RequestContext;
use shared::domain::Username;
use storage::Storage;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("credential check failed: {0:#}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
struct SessionRecord {
    username: Username,
    last_seen: DateTime<Utc>,
}

/// Session id -> authenticated user, with idle expiry.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
    idle_timeout: TimeDelta,
}

impl SessionStore {
    pub fn new(idle_minutes: i64) -> Self {
        let idle_timeout =
            TimeDelta::try_minutes(idle_minutes.max(1)).unwrap_or_else(|| TimeDelta::minutes(30));
        Self::with_idle_timeout(idle_timeout)
    }

    pub fn with_idle_timeout(idle_timeout: TimeDelta) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout,
        }
    }

    pub async fn create(&self, username: Username) -> String {
        self.create_at(username, Utc::now()).await
    }

    /// Expired sessions are swept on every create, so abandoned ids do not pile up.
    pub(crate) async fn create_at(&self, username: Username, now: DateTime<Utc>) -> String {
        let session_id = Uuid::new_v4().simple().to_string();
        let mut map = self.sessions.write().await;
        self.retain_live(&mut map, now);
        map.insert(
            session_id.clone(),
            SessionRecord {
                username,
                last_seen: now,
            },
        );
        session_id
    }

    pub async fn resolve(&self, session_id: &str) -> Option<Username> {
        self.resolve_at(session_id, Utc::now()).await
    }

    /// Returns the session's user and refreshes its idle clock. Expired
    /// sessions are dropped on lookup.
    pub(crate) async fn resolve_at(&self, session_id: &str, now: DateTime<Utc>) -> Option<Username> {
        let mut map = self.sessions.write().await;
        let record = map.get_mut(session_id)?;
        if now - record.last_seen > self.idle_timeout {
            debug!(username = %record.username, "session expired");
            map.remove(session_id);
            return None;
        }
        record.last_seen = now;
        Some(record.username.clone())
    }

    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    pub(crate) async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut map = self.sessions.write().await;
        self.retain_live(&mut map, now)
    }

    fn retain_live(&self, map: &mut HashMap<String, SessionRecord>, now: DateTime<Utc>) -> usize {
        let before = map.len();
        map.retain(|_, record| now - record.last_seen <= self.idle_timeout);
        let removed = before - map.len();
        if removed > 0 {
            debug!(removed, "purged expired sessions");
        }
        removed
    }

    pub fn idle_timeout(&self) -> TimeDelta {
        self.idle_timeout
    }

    pub async fn invalidate(&self, session_id: &str) -> bool {
        let mut map = self.sessions.write().await;
        map.remove(session_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

pub async fn authenticate(
    storage: &Storage,
    username: &str,
    password: &str,
) -> Result<Username, LoginError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(LoginError::InvalidCredentials);
    }
    if storage.verify_credentials(username, password).await? {
        info!(%username, "login succeeded");
        Ok(Username::new(username))
    } else {
        info!(%username, "login rejected");
        Err(LoginError::InvalidCredentials)
    }
}

pub async fn request_context(
    sessions: &SessionStore,
    cookie_name: &str,
    headers: &HeaderMap,
) -> RequestContext {
    let Some(session_id) = parse_cookie(headers, cookie_name) else {
        return RequestContext::anonymous();
    };
    match sessions.resolve(&session_id).await {
        Some(username) => RequestContext::authenticated(username),
        None => RequestContext::anonymous(),
    }
}

pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(name: &str, session_id: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{name}={session_id}; HttpOnly; SameSite=Lax; Path=/"
    ))
}

pub fn clear_session_cookie(name: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{name}=; Max-Age=0; HttpOnly; SameSite=Lax; Path=/"
    ))
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
