//! In-memory sink.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{RecordHeader, TranscriptSink};
use crate::error::Result;
use crate::events::Event;

/// Sink that keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(RecordHeader, Event)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records written so far, in order.
    pub fn records(&self) -> Vec<(RecordHeader, Event)> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TranscriptSink for MemorySink {
    async fn write(&self, header: &RecordHeader, event: &Event) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((header.clone(), event.clone()));
        Ok(())
    }
}
