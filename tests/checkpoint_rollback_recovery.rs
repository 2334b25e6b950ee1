//! End-to-end scenario 5 (spec §8): a session's state blob is corrupted on
//! disk; recovery falls through the C5 ladder past `FullReload` and lands on
//! `CheckpointRollback`, restoring the last checkpointed step sequence.

use std::sync::Arc;

use reasoning_sessions::blob_store::{BlobStore, MemoryBlobStore};
use reasoning_sessions::chain_manager::ChainManager;
use reasoning_sessions::checkpoints::InMemoryCheckpointStore;
use reasoning_sessions::config::SessionManagerConfig;
use reasoning_sessions::event_bus::EventBus;
use reasoning_sessions::model::{Complexity, Problem, SessionStatus, Step, Strategy, StrategyName, StrategyType};
use reasoning_sessions::step_executor::NoopStepExecutor;

fn problem() -> Problem {
    Problem {
        description: "prove a lemma across several steps".to_string(),
        goal_state: "QED".to_string(),
        complexity: Complexity::Moderate,
        constraints: vec![],
        context: serde_json::Map::new(),
        domain: "mathematics".to_string(),
    }
}

fn strategy() -> Strategy {
    Strategy { name: StrategyName::Incremental, strategy_type: StrategyType::Sequential, parameters: serde_json::Map::new() }
}

#[tokio::test]
async fn corrupted_blob_falls_back_to_checkpoint_rollback() {
    let blob_store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    let manager = ChainManager::new(
        SessionManagerConfig::default(),
        blob_store.clone(),
        Arc::new(InMemoryCheckpointStore::new()),
        Arc::new(EventBus::default()),
        Arc::new(NoopStepExecutor),
    );

    let steps = vec![Step::new("s0", 0, "lemma 1"), Step::new("s1", 1, "lemma 2"), Step::new("s2", 2, "lemma 3")];
    let t0 = 1_700_000_000_000i64;
    let state = manager.create_state(problem(), steps, strategy(), t0).await.unwrap();

    // advance one step so there is real progress to lose if rollback goes
    // all the way back to the creation checkpoint
    let outcome = manager.execute_next_step(&state.id, t0 + 1_000).await.unwrap();
    assert!(outcome.ok);

    manager.remove(&state.id, SessionStatus::Completed, t0 + 2_000).await.unwrap();

    // simulate on-disk corruption of the persisted state blob
    let keys = blob_store.list_prefix("reasoning-sessions/active/").await.unwrap();
    let state_key = keys
        .into_iter()
        .find(|k| k.contains(&state.id) && k.ends_with("reasoning-state.json"))
        .expect("state blob should exist after create_state + save");
    blob_store.put(&state_key, b"not valid json at all".to_vec()).await.unwrap();

    let result = manager.recover(&state.id, t0 + 3_000).await.unwrap();

    assert!(result.ok, "recovery should succeed via a lower-priority strategy");
    assert_eq!(result.strategy_name, "checkpoint_rollback");
    assert!(result.confidence > 0.0 && result.confidence <= 0.9);

    let recovered = result.state.expect("recovered state");
    assert_eq!(recovered.id, state.id);
    assert!(!recovered.steps.is_empty());

    // the session is active again through the normal API
    let reloaded = manager.load(&state.id, t0 + 4_000).await.unwrap();
    assert_eq!(reloaded.id, state.id);
}
