use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Per-caller context created by a successful unlock. The calculator never
/// sees it; only the request surface checks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    pub session_id: String,
    pub created_ms: u64,
    pub lease_expires_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("an access session is required")]
    SessionRequired,
    #[error("access key rejected")]
    InvalidKey,
    #[error("unknown session id")]
    NotFound,
    #[error("session lease expired")]
    Expired,
}

impl AccessError {
    pub fn code(self) -> &'static str {
        match self {
            Self::SessionRequired => "session_required",
            Self::InvalidKey => "invalid_key",
            Self::NotFound => "session_not_found",
            Self::Expired => "session_expired",
        }
    }
}

/// Optional shared-key gate in front of the estimate tools.
pub struct AccessGate {
    access_key: Option<String>,
    ttl_ms: u64,
    sessions: Mutex<HashMap<String, SessionContext>>,
}

impl AccessGate {
    pub fn new(access_key: Option<String>, ttl_ms: u64) -> Self {
        Self {
            access_key: access_key.filter(|k| !k.is_empty()),
            ttl_ms,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.access_key.is_some()
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    pub fn unlock(&self, candidate: &str) -> Result<SessionContext, AccessError> {
        self.unlock_at(candidate, now_ms())
    }

    /// Succeeds immediately when the gate is disabled; otherwise renews the
    /// session lease.
    pub fn authorize(&self, session_id: Option<&str>) -> Result<(), AccessError> {
        self.authorize_at(session_id, now_ms())
    }

    pub fn active_sessions(&self) -> usize {
        let now = now_ms();
        let mut sessions = self.sessions.lock();
        cleanup_expired_sessions_locked(&mut sessions, now);
        sessions.len()
    }

    /// Session ids are random v4 UUIDs; nothing about them derives from the
    /// clock. With the gate disabled the context is returned but not stored.
    fn unlock_at(&self, candidate: &str, now: u64) -> Result<SessionContext, AccessError> {
        let Some(key) = &self.access_key else {
            return Ok(self.new_context(now));
        };
        if !constant_time_eq(key.as_bytes(), candidate.as_bytes()) {
            return Err(AccessError::InvalidKey);
        }

        let context = self.new_context(now);
        let mut sessions = self.sessions.lock();
        let expired = cleanup_expired_sessions_locked(&mut sessions, now);
        if expired > 0 {
            log::debug!("dropped {expired} expired access sessions");
        }
        sessions.insert(context.session_id.clone(), context.clone());
        Ok(context)
    }

    fn new_context(&self, now: u64) -> SessionContext {
        SessionContext {
            session_id: format!("sess-{}", Uuid::new_v4().simple()),
            created_ms: now,
            lease_expires_ms: now.saturating_add(self.ttl_ms),
        }
    }

    fn authorize_at(&self, session_id: Option<&str>, now: u64) -> Result<(), AccessError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let Some(session_id) = session_id else {
            return Err(AccessError::SessionRequired);
        };

        let mut sessions = self.sessions.lock();
        let Some(context) = sessions.get_mut(session_id) else {
            return Err(AccessError::NotFound);
        };
        if context.lease_expires_ms <= now {
            sessions.remove(session_id);
            return Err(AccessError::Expired);
        }
        context.lease_expires_ms = now.saturating_add(self.ttl_ms);
        Ok(())
    }
}

fn cleanup_expired_sessions_locked(
    sessions: &mut HashMap<String, SessionContext>,
    now: u64,
) -> usize {
    let before = sessions.len();
    sessions.retain(|_, context| context.lease_expires_ms > now);
    before.saturating_sub(sessions.len())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
