//! Ordered migration chain applied when a loaded envelope's `_version`
//! differs from [`super::CURRENT_SCHEMA_VERSION`].

use serde_json::Value;

use super::{CURRENT_SCHEMA_VERSION, CodecError, Result};

type MigrationFn = fn(Value) -> Value;

/// Each entry migrates from `from` to the next version in the chain.
/// Registered in ascending version order; `migrate` walks the chain
/// starting at the stored version.
const MIGRATIONS: &[(&str, &str, MigrationFn)] = &[("2.0.0", "3.0.0", migrate_2_0_0_to_3_0_0)];

/// Renamed `currentStepIndex` to `currentStep` in the 3.0.0 schema (§9 open
/// question: the two names referred to the same field).
fn migrate_2_0_0_to_3_0_0(mut value: Value) -> Value {
    if let Some(obj) = value.as_object_mut() {
        if let Some(old) = obj.remove("currentStepIndex") {
            obj.entry("currentStep".to_string()).or_insert(old);
        }
    }
    value
}

/// Walks the migration chain from `from_version` to
/// [`CURRENT_SCHEMA_VERSION`], stamping `_migratedAt`/`_migratedFrom` on the
/// final result. Fails with `UnsupportedVersion` if no chain reaches current.
pub fn migrate(mut value: Value, from_version: &str, now_ms: i64) -> Result<Value> {
    let original_version = from_version.to_string();
    let mut current = from_version.to_string();

    loop {
        if current == CURRENT_SCHEMA_VERSION {
            break;
        }
        let step = MIGRATIONS.iter().find(|(from, _, _)| *from == current);
        match step {
            Some((_, to, f)) => {
                value = f(value);
                current = (*to).to_string();
            }
            None => return Err(CodecError::UnsupportedVersion(original_version)),
        }
    }

    if let Some(obj) = value.as_object_mut() {
        obj.insert("_version".to_string(), Value::String(CURRENT_SCHEMA_VERSION.to_string()));
        obj.insert("_migratedAt".to_string(), Value::Number(now_ms.into()));
        obj.insert("_migratedFrom".to_string(), Value::String(original_version));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_version_is_unsupported() {
        let v = serde_json::json!({"_version": "0.1.0"});
        assert!(matches!(
            migrate(v, "0.1.0", 0),
            Err(CodecError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn renames_current_step_index() {
        let v = serde_json::json!({"currentStepIndex": 3});
        let migrated = migrate(v, "2.0.0", 100).unwrap();
        assert_eq!(migrated["currentStep"], 3);
        assert_eq!(migrated["_migratedFrom"], "2.0.0");
    }
}
