//! Client connection lifecycle records, owned by [`crate::clients::ClientRegistry`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Read,
    Write,
    Admin,
}

impl AccessLevel {
    /// Priority used by C8's `client_priority` resolution strategy.
    pub fn priority(self) -> u8 {
        match self {
            AccessLevel::Read => 1,
            AccessLevel::Write => 2,
            AccessLevel::Admin => 3,
        }
    }

    /// Whether this level dominates the level required for `op`.
    pub fn dominates(self, required: AccessLevel) -> bool {
        self.priority() >= required.priority()
    }
}

/// A client's live connection to exactly one session (I7).
///
/// `locks` is a weak back-reference: the authoritative lock table lives in
/// [`crate::locks::LockManager`]; this set is updated only through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSession {
    pub client_id: String,
    pub session_id: String,
    pub connection_time: i64,
    pub last_activity: i64,
    pub access_level: AccessLevel,
    pub client_info: serde_json::Map<String, serde_json::Value>,
    pub locks: BTreeSet<String>,
}

impl ClientSession {
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        session_id: impl Into<String>,
        now: i64,
        access_level: AccessLevel,
        client_info: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            session_id: session_id.into(),
            connection_time: now,
            last_activity: now,
            access_level,
            client_info,
            locks: BTreeSet::new(),
        }
    }

    pub fn touch(&mut self, now: i64) {
        self.last_activity = now;
    }

    pub fn is_idle(&self, now: i64, client_timeout_ms: i64) -> bool {
        now - self.last_activity >= client_timeout_ms
    }
}
