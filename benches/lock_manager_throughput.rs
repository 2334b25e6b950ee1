use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use reasoning_sessions::locks::{AcquireRequest, LockManager};
use reasoning_sessions::model::{AccessLevel, LockScope, LockType};

const SESSION_COUNTS: &[usize] = &[1, 8, 64];

fn request(session_id: String, client_id: String) -> AcquireRequest {
    AcquireRequest {
        session_id,
        client_id,
        lock_type: LockType::Write,
        scope: LockScope::FullSession,
        access_level: AccessLevel::Write,
        timeout_ms: 30_000,
        reason: "bench".to_string(),
    }
}

/// Acquire-then-release a write lock across many independent sessions, the
/// uncontended fast path `LockManager` is expected to handle at high
/// throughput since each session's entry is reached through its own
/// table slot under one short-lived mutex critical section (§5).
fn lock_manager_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("lock_manager_acquire_release");

    for &sessions in SESSION_COUNTS {
        group.throughput(Throughput::Elements(sessions as u64));
        group.bench_with_input(BenchmarkId::from_parameter(sessions), &sessions, |b, &count| {
            b.iter(|| {
                let manager = LockManager::new();
                for i in 0..count {
                    let session_id = format!("session-{i}");
                    let lock = manager.acquire(request(session_id.clone(), "client-0".to_string()), 0).unwrap();
                    manager.release(&session_id, &lock.lock_id, 0).unwrap();
                }
            });
        });
    }

    group.finish();
}

fn lock_manager_queue_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("lock_manager_queue_drain");
    const WAITERS: &[usize] = &[2, 16, 128];

    for &waiters in WAITERS {
        group.throughput(Throughput::Elements(waiters as u64));
        group.bench_with_input(BenchmarkId::from_parameter(waiters), &waiters, |b, &count| {
            b.iter(|| {
                let manager = LockManager::new();
                let holder = manager.acquire(request("hot-session".to_string(), "holder".to_string()), 0).unwrap();
                for i in 0..count {
                    let _ = manager.acquire(request("hot-session".to_string(), format!("waiter-{i}")), 0);
                }
                manager.release("hot-session", &holder.lock_id, 0).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, lock_manager_throughput, lock_manager_queue_drain);
criterion_main!(benches);
