use intake_core::DiagnosticsSink;
use std::sync::{Mutex, PoisonError};

/// Forwards controller-screen lines to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn write(&self, line: u8, text: &str) {
        tracing::info!(line, "{text}");
    }
}

/// Keeps every written line, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<(u8, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(u8, String)> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.count(text) > 0
    }

    pub fn count(&self, text: &str) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, t)| t == text)
            .count()
    }
}

impl DiagnosticsSink for RecordingSink {
    fn write(&self, line: u8, text: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((line, text.to_string()));
    }
}
