use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::emitter::EmitterError;
use super::event::{Event, EventType};
use super::sink::EventSink;

/// A single handler capability: the only thing a subscriber must provide.
///
/// Kept to one method deliberately (§9 redesign note) so priority ordering
/// and the per-handler timeout/retry live entirely in [`super::bus::EventBus`],
/// never in the handler itself.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> Result<(), EmitterError>;

    fn name(&self) -> &str {
        "handler"
    }
}

/// Adapts the teacher's synchronous [`EventSink`] into an [`EventHandler`] so
/// stdout/file/memory/channel sinks can be registered as ordinary
/// subscribers instead of needing a separate dispatch path.
pub struct SinkHandler {
    sink: Mutex<Box<dyn EventSink>>,
}

impl SinkHandler {
    pub fn new(sink: Box<dyn EventSink>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl EventHandler for SinkHandler {
    async fn handle(&self, event: &Event) -> Result<(), EmitterError> {
        self.sink
            .lock()
            .handle(event)
            .map_err(|err| EmitterError::other(err.to_string()))
    }

    fn name(&self) -> &str {
        "sink"
    }
}

/// An optional predicate narrowing which events within `event_types` a
/// subscription actually receives (e.g. only events for one session).
pub type SubscriptionFilter = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

pub struct Subscription {
    pub id: u64,
    /// Empty set means "every event type".
    pub event_types: HashSet<EventType>,
    pub priority: i32,
    pub filter: Option<SubscriptionFilter>,
    pub handler: Arc<dyn EventHandler>,
}

impl Subscription {
    pub fn matches(&self, event: &Event) -> bool {
        let type_matches = self.event_types.is_empty() || self.event_types.contains(&event.event_type);
        type_matches && self.filter.as_ref().is_none_or(|f| f(event))
    }
}
