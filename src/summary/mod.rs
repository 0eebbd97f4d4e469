//! Observability stream
//!
//! Models record scalars into a shared `SummaryHub` while their graphs are
//! evaluated; each event is stamped with the step active at record time,
//! and the `SummaryWriter` callback periodically drains the hub into a
//! JSON-lines stream. The stream format is opaque to the rest of the
//! system; an external viewer tails the file.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

/// One persisted observability event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalarEvent {
    pub step: u64,
    pub tag: String,
    pub value: f32,
}

/// Shared accumulation point for scalar observations
///
/// Clones share the same buffer and step cell. Events are stamped with the
/// current step as they are recorded, so a writer that drains on a coarser
/// cadence still emits the step each value was observed at.
#[derive(Clone, Default)]
pub struct SummaryHub {
    pending: Rc<RefCell<Vec<ScalarEvent>>>,
    current_step: Rc<Cell<u64>>,
}

impl SummaryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the step index stamped onto subsequent records
    pub fn set_step(&self, step: u64) {
        self.current_step.set(step);
    }

    /// Record a scalar observation at the current step
    pub fn record(&self, tag: &str, value: f32) {
        self.pending.borrow_mut().push(ScalarEvent {
            step: self.current_step.get(),
            tag: tag.to_string(),
            value,
        });
    }

    /// Take all pending observations
    pub fn drain(&self) -> Vec<ScalarEvent> {
        self.pending.borrow_mut().drain(..).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }
}

/// Append-only JSON-lines sink for scalar events
pub struct SummaryStream {
    writer: BufWriter<File>,
}

impl SummaryStream {
    /// Open (or create) the stream file for appending
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Append events without flushing
    pub fn append(&mut self, events: &[ScalarEvent]) -> Result<()> {
        for event in events {
            let line = serde_json::to_string(event)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            writeln!(self.writer, "{line}")?;
        }
        Ok(())
    }

    /// Flush buffered events to disk
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_stamps_step_at_record_time() {
        let hub = SummaryHub::new();
        hub.set_step(7);
        hub.record("g_loss", 0.5);
        hub.set_step(8);
        hub.record("d_loss", 1.5);

        // A late drain must preserve each event's recording step.
        let events = hub.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].step, 7);
        assert_eq!(events[0].tag, "g_loss");
        assert_eq!(events[1].step, 8);
        assert_eq!(events[1].value, 1.5);
        assert_eq!(hub.pending_len(), 0);
    }

    #[test]
    fn test_hub_clones_share_buffer() {
        let hub = SummaryHub::new();
        let alias = hub.clone();
        alias.record("x", 1.0);
        assert_eq!(hub.pending_len(), 1);
    }

    #[test]
    fn test_stream_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        let mut stream = SummaryStream::open(&path).unwrap();
        stream
            .append(&[ScalarEvent {
                step: 3,
                tag: "g_loss".to_string(),
                value: 0.25,
            }])
            .unwrap();
        stream.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let event: ScalarEvent = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(event.step, 3);
        assert_eq!(event.tag, "g_loss");
    }

    #[test]
    fn test_stream_is_append_only_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        for step in 0..2 {
            let mut stream = SummaryStream::open(&path).unwrap();
            stream
                .append(&[ScalarEvent {
                    step,
                    tag: "t".to_string(),
                    value: 0.0,
                }])
                .unwrap();
            stream.flush().unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
