//! FIFO wait queue for unsatisfied lock requests within a single session.

use std::collections::VecDeque;

use crate::model::LockRequest;

#[derive(Default)]
pub struct WaitQueue {
    inner: VecDeque<LockRequest>,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, req: LockRequest) {
        self.inner.push_back(req);
    }

    /// Drains every queued request in FIFO order. Callers that re-queue
    /// still-conflicting requests must push them back in the same relative
    /// order to preserve P9 (no reordering among mutually-conflicting
    /// requests).
    pub fn drain_all(&mut self) -> Vec<LockRequest> {
        self.inner.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LockScope, LockType};

    fn req(id: &str) -> LockRequest {
        LockRequest {
            request_id: id.to_string(),
            session_id: "s".to_string(),
            client_id: id.to_string(),
            lock_type: LockType::Write,
            scope: LockScope::FullSession,
            requested_at: 0,
            timeout_ms: 1000,
            reason: String::new(),
        }
    }

    #[test]
    fn drains_in_fifo_order() {
        let mut q = WaitQueue::new();
        q.push(req("a"));
        q.push(req("b"));
        let drained = q.drain_all();
        assert_eq!(drained[0].request_id, "a");
        assert_eq!(drained[1].request_id, "b");
        assert!(q.is_empty());
    }
}
