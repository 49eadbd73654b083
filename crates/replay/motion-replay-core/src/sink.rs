//! Scene sinks: consumers of the event stream.

use std::io::Write;

use crate::error::SinkError;
use crate::events::SceneEvent;

/// Receives scene events in emission order.
pub trait SceneSink {
    fn emit(&mut self, event: SceneEvent) -> Result<(), SinkError>;

    /// Called after the last event of a run. Default: nothing to flush.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<S: SceneSink + ?Sized> SceneSink for &mut S {
    fn emit(&mut self, event: SceneEvent) -> Result<(), SinkError> {
        (**self).emit(event)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}

/// Keeps every event in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<SceneEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Per-frame events only, in order.
    pub fn timed(&self) -> impl Iterator<Item = &SceneEvent> {
        self.events
            .iter()
            .filter(|e| !e.is_persistent() && !matches!(e, SceneEvent::PlaybackEnded { .. }))
    }
}

impl SceneSink for RecordingSink {
    fn emit(&mut self, event: SceneEvent) -> Result<(), SinkError> {
        self.events.push(event);
        Ok(())
    }
}

/// Writes one JSON object per line, with the entity path alongside the event.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> SceneSink for JsonLinesSink<W> {
    fn emit(&mut self, event: SceneEvent) -> Result<(), SinkError> {
        let mut value = serde_json::to_value(&event)?;
        if let serde_json::Value::Object(map) = &mut value {
            map.insert(
                "path".to_string(),
                serde_json::Value::String(event.entity_path()),
            );
            map.insert(
                "static".to_string(),
                serde_json::Value::Bool(event.is_persistent()),
            );
        }
        serde_json::to_writer(&mut self.writer, &value)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}
