//! Periodic summary flush to the run's event stream

use super::traits::{CallbackContext, TrainCallback};
use crate::error::Result;
use crate::summary::{SummaryHub, SummaryStream};

/// Drains the summary hub into a JSON-lines stream on its interval
pub struct SummaryWriter {
    hub: SummaryHub,
    stream: SummaryStream,
}

impl SummaryWriter {
    pub fn new(hub: SummaryHub, stream: SummaryStream) -> Self {
        Self { hub, stream }
    }

    fn flush(&mut self) -> Result<()> {
        let events = self.hub.drain();
        if events.is_empty() {
            return Ok(());
        }
        self.stream.append(&events)?;
        self.stream.flush()
    }
}

impl TrainCallback for SummaryWriter {
    fn name(&self) -> &'static str {
        "SummaryWriter"
    }

    fn on_step(&mut self, _ctx: &CallbackContext) -> Result<()> {
        self.flush()
    }

    fn on_train_end(&mut self, _ctx: &CallbackContext) -> Result<()> {
        self.flush()
    }
}
