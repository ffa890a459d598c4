//! Shared output sink for demo objects

use std::sync::Arc;

use parking_lot::Mutex;

/// Lines printed by demo objects, shared between a class and its instances
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Transcript {
    /// Create an empty transcript
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line
    pub fn push(&self, line: impl Into<String>) {
        self.lines.lock().push(line.into());
    }

    /// Copy of every line so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Remove and return every line so far
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }

    /// Number of lines
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    /// Check if nothing has been printed
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}
