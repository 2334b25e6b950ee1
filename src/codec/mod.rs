//! C2: versioned serialization and schema migration for `ReasoningState`.
//!
//! Grounded on the teacher's `runtimes::persistence` module: explicit
//! `Persisted*` envelope types decoupled from the live in-memory shape, with
//! `From`/`TryFrom` conversions doing the translation work.

pub mod migrations;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ReasoningState;

pub const CURRENT_SCHEMA_VERSION: &str = "3.0.0";

#[derive(Debug, Error, Diagnostic)]
pub enum CodecError {
    #[error("corrupt byte stream: {0}")]
    #[diagnostic(
        code(reasoning_sessions::codec::corrupt),
        help("The stored bytes are not a parseable state envelope.")
    )]
    Corrupt(String),

    #[error("no migration path from schema version {0}")]
    #[diagnostic(code(reasoning_sessions::codec::unsupported_version))]
    UnsupportedVersion(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// The on-disk envelope: `{ "_version", "_serializedAt", ...state fields }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEnvelope {
    #[serde(rename = "_version")]
    pub version: String,
    #[serde(rename = "_serializedAt")]
    pub serialized_at: i64,
    #[serde(rename = "_migratedAt", skip_serializing_if = "Option::is_none")]
    pub migrated_at: Option<i64>,
    #[serde(rename = "_migratedFrom", skip_serializing_if = "Option::is_none")]
    pub migrated_from: Option<String>,
    #[serde(flatten)]
    pub state: ReasoningState,
}

/// Serializes a state to its current-version envelope. Round-trip lossless
/// for the current schema version (P7), enforced by `decode(encode(s)) == s`.
pub fn encode(state: &ReasoningState, now_ms: i64) -> Result<Vec<u8>> {
    let envelope = StateEnvelope {
        version: CURRENT_SCHEMA_VERSION.to_string(),
        serialized_at: now_ms,
        migrated_at: None,
        migrated_from: None,
        state: state.clone(),
    };
    serde_json::to_vec(&envelope).map_err(|e| CodecError::Corrupt(e.to_string()))
}

/// Parses bytes into a current-schema state, running the migration chain if
/// the stored `_version` is older than [`CURRENT_SCHEMA_VERSION`].
pub fn decode(bytes: &[u8], now_ms: i64) -> Result<ReasoningState> {
    let raw: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| CodecError::Corrupt(e.to_string()))?;
    let version = raw
        .get("_version")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CodecError::Corrupt("missing _version field".to_string()))?
        .to_string();

    let migrated = if version != CURRENT_SCHEMA_VERSION {
        migrations::migrate(raw, &version, now_ms)?
    } else {
        raw
    };

    let envelope: StateEnvelope =
        serde_json::from_value(migrated).map_err(|e| CodecError::Corrupt(e.to_string()))?;
    Ok(envelope.state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReasoningStateBuilder;

    #[test]
    fn round_trip_is_lossless() {
        let state = ReasoningStateBuilder::new(1000).with_id("reasoning-x").build();
        let bytes = encode(&state, 1000).unwrap();
        let decoded = decode(&bytes, 2000).unwrap();
        assert_eq!(decoded.id, state.id);
        assert_eq!(decoded.current_step, state.current_step);
    }

    #[test]
    fn garbage_bytes_are_corrupt() {
        assert!(matches!(decode(b"not json", 0), Err(CodecError::Corrupt(_))));
    }

    #[test]
    fn missing_version_is_corrupt() {
        let bytes = serde_json::to_vec(&serde_json::json!({"id": "x"})).unwrap();
        assert!(matches!(decode(&bytes, 0), Err(CodecError::Corrupt(_))));
    }
}
