use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of lifecycle events a session manager can emit.
///
/// Kept as a tagged union rather than an open string so subscribers can
/// match exhaustively and the bus rejects typos at compile time.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionCreated,
    SessionUpdated,
    SessionCompleted,
    SessionFailed,
    HealthCheckFailed,
    RecoveryStarted,
    RecoveryStrategyAttempted,
    RecoverySucceeded,
    RecoveryFailed,
    ClientConnected,
    ClientDisconnected,
    LockAcquired,
    LockReleased,
    LockConflict,
    ConflictDetected,
    ConflictResolved,
    CheckpointCreated,
    RestorationStarted,
    RestorationCompleted,
}

/// Variant-specific payload for an [`Event`], one shape per [`EventType`].
///
/// `Other` is an escape hatch for ad hoc diagnostic context; core emitters
/// always construct a named variant.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventData {
    Session {
        status: String,
    },
    Health {
        health_score: u8,
        issue_count: usize,
    },
    Recovery {
        strategy_name: String,
        confidence: Option<f64>,
    },
    Client {
        client_id: String,
    },
    Lock {
        lock_id: String,
        client_id: String,
        wait_time_ms: Option<i64>,
    },
    Conflict {
        conflict_id: String,
        severity: String,
    },
    Checkpoint {
        checkpoint_id: String,
        auto: bool,
    },
    Restoration {
        total: usize,
        succeeded: usize,
        failed: usize,
    },
    Other(Value),
}

/// A single emitted fact: what happened, to which session, and when.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: String,
    pub event_type: EventType,
    pub session_id: String,
    pub data: EventData,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(
        id: impl Into<String>,
        event_type: EventType,
        session_id: impl Into<String>,
        data: EventData,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            event_type,
            session_id: session_id.into(),
            data,
            timestamp,
        }
    }

    pub fn to_json_value(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "type": self.event_type,
            "sessionId": self.session_id,
            "data": self.data,
            "timestamp": self.timestamp.to_rfc3339(),
        })
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_event_serializes_with_tag() {
        let event = Event::new(
            "event_1",
            EventType::SessionCreated,
            "s1",
            EventData::Session { status: "active".into() },
            Utc::now(),
        );
        let json = event.to_json_value();
        assert_eq!(json["type"], "session_created");
        assert_eq!(json["data"]["kind"], "session");
    }
}
