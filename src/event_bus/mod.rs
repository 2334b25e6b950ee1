//! C9: typed lifecycle events, priority-ordered subscribers, bounded history.
//!
//! Organised around a broadcast-based [`EventHub`] (streaming consumers) and
//! [`EventBus`] (bounded history + priority-ordered handler dispatch with
//! per-handler timeout/retry).

pub mod bus;
pub mod diagnostics;
pub mod emitter;
pub mod event;
pub mod hub;
pub mod sink;
pub mod subscriber;

pub use bus::{EventBus, EventBusConfig};
pub use diagnostics::DiagnosticsStream;
pub use emitter::{EmitterError, EventEmitter};
pub use event::{Event, EventData, EventType};
pub use hub::{BlockingEventIter, EventHub, EventHubMetrics, EventStream, HubEmitter};
pub use sink::{ChannelSink, EventSink, JsonLinesSink, MemorySink, StdOutSink};
pub use subscriber::{EventHandler, SinkHandler, Subscription, SubscriptionFilter};
