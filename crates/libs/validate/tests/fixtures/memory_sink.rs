//! In-memory output sink capturing rendered report text

use parking_lot::Mutex;
use remotemedia_validate::sink::{OutputSink, SinkError};
use std::sync::Arc;

/// Sink that keeps every written block
#[derive(Clone, Default)]
pub struct MemorySink {
    blocks: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, concatenated
    pub fn text(&self) -> String {
        self.blocks.lock().concat()
    }

    pub fn blocks(&self) -> Vec<String> {
        self.blocks.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.blocks.lock().len()
    }
}

impl OutputSink for MemorySink {
    fn write(&self, text: &str) -> Result<(), SinkError> {
        self.blocks.lock().push(text.to_string());
        Ok(())
    }
}
