use std::any::type_name;
use std::fs::File;
use std::io::{self, Result as IoResult, Stdout, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex as ParkingMutex;

use super::event::Event;

/// Abstraction over an output target that consumes emitted [`Event`]s.
///
/// Implementations may perform blocking I/O; [`super::subscriber::SinkHandler`]
/// runs them behind a mutex rather than off-loading to a blocking pool, since
/// sink writes here are small and local (stdout, a file, an in-memory buffer).
pub trait EventSink: Sync + Send {
    fn handle(&mut self, event: &Event) -> IoResult<()>;

    /// A stable, human-friendly identifier for this sink instance.
    fn name(&self) -> String {
        type_name::<Self>().to_string()
    }
}

/// Writes one JSON line per event to stdout.
pub struct StdOutSink {
    handle: Stdout,
}

impl Default for StdOutSink {
    fn default() -> Self {
        Self { handle: io::stdout() }
    }
}

impl EventSink for StdOutSink {
    fn handle(&mut self, event: &Event) -> IoResult<()> {
        let line = event
            .to_json_string()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(self.handle, "{line}")?;
        self.handle.flush()
    }
}

/// In-memory sink for tests and snapshots.
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<ParkingMutex<Vec<Event>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.entries.lock().clone()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl EventSink for MemorySink {
    fn handle(&mut self, event: &Event) -> IoResult<()> {
        self.entries.lock().push(event.clone());
        Ok(())
    }
}

/// JSON Lines (JSONL) sink for log aggregation / stream processing targets.
pub struct JsonLinesSink {
    handle: Box<dyn Write + Send + Sync>,
    pretty: bool,
}

impl JsonLinesSink {
    pub fn new(handle: Box<dyn Write + Send + Sync>) -> Self {
        Self { handle, pretty: false }
    }

    pub fn with_pretty_print(handle: Box<dyn Write + Send + Sync>) -> Self {
        Self { handle, pretty: true }
    }

    pub fn to_stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    pub fn to_file(path: impl AsRef<Path>) -> IoResult<Self> {
        let file = File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }
}

impl EventSink for JsonLinesSink {
    fn handle(&mut self, event: &Event) -> IoResult<()> {
        let json = if self.pretty {
            serde_json::to_string_pretty(&event.to_json_value())
        } else {
            event.to_json_string()
        }
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        writeln!(self.handle, "{json}")?;
        self.handle.flush()
    }

    fn name(&self) -> String {
        if self.pretty {
            "JsonLinesSink(pretty)".to_string()
        } else {
            "JsonLinesSink".to_string()
        }
    }
}

/// Forwards events to a `flume` channel, for streaming to an external
/// consumer (SSE, WebSocket, a test harness) without coupling the bus to it.
pub struct ChannelSink {
    tx: flume::Sender<Event>,
}

impl ChannelSink {
    pub fn new(tx: flume::Sender<Event>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn handle(&mut self, event: &Event) -> IoResult<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "channel receiver dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::event::{EventData, EventType};

    #[test]
    fn memory_sink_accumulates_events() {
        let mut sink = MemorySink::new();
        sink.handle(&Event::new(
            "e1",
            EventType::SessionCreated,
            "s1",
            EventData::Session { status: "active".into() },
            chrono::Utc::now(),
        ))
        .unwrap();
        assert_eq!(sink.snapshot().len(), 1);
    }
}
