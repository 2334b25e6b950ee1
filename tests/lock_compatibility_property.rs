//! Property: the §4.6 lock compatibility matrix is exactly "both sides read
//! and neither scope is full-session" — generated pairs never disagree with
//! that rule, regardless of which side is "held" vs "requested".

#[macro_use]
extern crate proptest;

use proptest::prelude::*;

use reasoning_sessions::model::{Lock, LockScope, LockType};

fn lock_type() -> impl Strategy<Value = LockType> {
    prop_oneof![Just(LockType::Read), Just(LockType::Write), Just(LockType::Exclusive)]
}

fn lock_scope() -> impl Strategy<Value = LockScope> {
    prop_oneof![Just(LockScope::FullSession), Just(LockScope::StepExecution), Just(LockScope::MetadataOnly)]
}

fn held(lock_type: LockType, scope: LockScope) -> Lock {
    Lock {
        lock_id: "held".to_string(),
        session_id: "s".to_string(),
        client_id: "holder".to_string(),
        lock_type,
        scope,
        acquired_at: 0,
        expires_at: i64::MAX,
        reason: String::new(),
    }
}

proptest! {
    #[test]
    fn compatibility_matches_read_read_non_full_session_rule(
        held_type in lock_type(), held_scope in lock_scope(),
        req_type in lock_type(), req_scope in lock_scope(),
    ) {
        let expected = held_type == LockType::Read
            && req_type == LockType::Read
            && held_scope != LockScope::FullSession
            && req_scope != LockScope::FullSession;

        let actual = held(held_type, held_scope).is_compatible_with(req_type, req_scope);
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn compatibility_is_symmetric_in_the_two_lock_types(
        a_scope in lock_scope(), b_scope in lock_scope(),
    ) {
        // holding Read, requesting Read is compatible in both directions
        // exactly when holding Read, requesting Read is in the other order.
        let a_to_b = held(LockType::Read, a_scope).is_compatible_with(LockType::Read, b_scope);
        let b_to_a = held(LockType::Read, b_scope).is_compatible_with(LockType::Read, a_scope);
        prop_assert_eq!(a_to_b, b_to_a);
    }

    #[test]
    fn exclusive_never_compatible_with_anything(
        held_scope in lock_scope(), req_type in lock_type(), req_scope in lock_scope(),
    ) {
        prop_assert!(!held(LockType::Exclusive, held_scope).is_compatible_with(req_type, req_scope));
    }
}
