//! C9: typed lifecycle events, priority-ordered subscribers, bounded history.
//!
//! Grounded on the teacher's `EventBus`/`EventHub` split (a broadcast core
//! plus a registration layer), generalized from "fan out to sinks" to the
//! closed-set dispatch described in §4.9: history first, then subscribers in
//! descending priority, sequentially, each bounded by its own timeout with
//! retry/backoff on failure.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::warn;

use super::emitter::EmitterError;
use super::event::Event;
use super::hub::{EventHub, EventStream};
use super::sink::EventSink;
use super::subscriber::{EventHandler, SinkHandler, Subscription, SubscriptionFilter};

/// Dispatch tuning, mirroring the §6 configuration surface defaults.
#[derive(Debug, Clone, Copy)]
pub struct EventBusConfig {
    pub max_history_size: usize,
    pub handler_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            max_history_size: 1000,
            handler_timeout_ms: 5000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

pub struct EventBus {
    hub: Arc<EventHub>,
    history: Mutex<VecDeque<Event>>,
    subscriptions: Mutex<Vec<Subscription>>,
    next_subscription_id: AtomicU64,
    config: EventBusConfig,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Self {
        Self {
            hub: EventHub::new(config.max_history_size),
            history: Mutex::new(VecDeque::with_capacity(config.max_history_size)),
            subscriptions: Mutex::new(Vec::new()),
            next_subscription_id: AtomicU64::new(1),
            config,
        }
    }

    /// Registers a handler for a subset of event types (empty = all),
    /// ordered by `priority` descending. Returns a subscription id usable
    /// with [`EventBus::unsubscribe`].
    pub fn subscribe_handler(
        &self,
        event_types: impl IntoIterator<Item = super::event::EventType>,
        priority: i32,
        filter: Option<SubscriptionFilter>,
        handler: Arc<dyn EventHandler>,
    ) -> u64 {
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        let mut subs = self.subscriptions.lock();
        subs.push(Subscription {
            id,
            event_types: event_types.into_iter().collect(),
            priority,
            filter,
            handler,
        });
        subs.sort_by(|a, b| b.priority.cmp(&a.priority));
        id
    }

    /// Convenience registration for a plain output sink (stdout, file,
    /// memory, channel) receiving every event type at priority 0.
    pub fn add_sink<T: EventSink + 'static>(&self, sink: T) -> u64 {
        self.subscribe_handler(std::iter::empty(), 0, None, Arc::new(SinkHandler::new(Box::new(sink))))
    }

    pub fn unsubscribe(&self, id: u64) {
        self.subscriptions.lock().retain(|s| s.id != id);
    }

    pub fn subscribe(&self) -> EventStream {
        self.hub.subscribe()
    }

    pub fn history_snapshot(&self) -> Vec<Event> {
        self.history.lock().iter().cloned().collect()
    }

    /// Appends to the bounded ring history (oldest dropped on overflow),
    /// publishes to streaming subscribers, then invokes matching handlers in
    /// priority order. Each handler gets `handlerTimeoutMs`; on timeout or
    /// error it is retried up to `maxRetries` with `retryDelayMs * attempt`
    /// backoff before being skipped. One handler's failure never blocks the
    /// next (§4.9, §5).
    pub async fn emit(&self, event: Event) {
        {
            let mut history = self.history.lock();
            if history.len() >= self.config.max_history_size {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        let _ = self.hub.publish(event.clone());

        let matching: Vec<Arc<dyn EventHandler>> = {
            let subs = self.subscriptions.lock();
            subs.iter().filter(|s| s.matches(&event)).map(|s| s.handler.clone()).collect()
        };

        for handler in matching {
            self.invoke_with_retry(handler.as_ref(), &event).await;
        }
    }

    async fn invoke_with_retry(&self, handler: &dyn EventHandler, event: &Event) {
        let timeout = Duration::from_millis(self.config.handler_timeout_ms);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = tokio::time::timeout(timeout, handler.handle(event)).await;
            match outcome {
                Ok(Ok(())) => return,
                Ok(Err(EmitterError::Closed)) => return,
                Ok(Err(err)) => {
                    warn!(handler = handler.name(), attempt, error = %err, "event handler failed");
                }
                Err(_) => {
                    warn!(handler = handler.name(), attempt, "event handler timed out");
                }
            }
            if attempt > self.config.max_retries {
                return;
            }
            tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms * attempt as u64)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::event::{EventData, EventType};
    use std::sync::atomic::AtomicUsize;

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _event: &Event) -> Result<(), EmitterError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn matching_handler_is_invoked() {
        let bus = EventBus::default();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe_handler(
            [EventType::SessionCreated],
            10,
            None,
            Arc::new(CountingHandler(count.clone())),
        );
        bus.emit(Event::new(
            "e1",
            EventType::SessionCreated,
            "s1",
            EventData::Session { status: "active".into() },
            chrono::Utc::now(),
        ))
        .await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_matching_event_type_is_skipped() {
        let bus = EventBus::default();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe_handler(
            [EventType::SessionFailed],
            10,
            None,
            Arc::new(CountingHandler(count.clone())),
        );
        bus.emit(Event::new(
            "e1",
            EventType::SessionCreated,
            "s1",
            EventData::Session { status: "active".into() },
            chrono::Utc::now(),
        ))
        .await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let bus = EventBus::new(EventBusConfig {
            max_history_size: 2,
            ..EventBusConfig::default()
        });
        for i in 0..5 {
            bus.emit(Event::new(
                format!("e{i}"),
                EventType::SessionUpdated,
                "s1",
                EventData::Session { status: "active".into() },
                chrono::Utc::now(),
            ))
            .await;
        }
        let snapshot = bus.history_snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, "e3");
        assert_eq!(snapshot[1].id, "e4");
    }
}
