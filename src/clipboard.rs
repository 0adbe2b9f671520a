use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ClipboardError;

#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Keeps every write in memory; can be switched to refuse writes.
#[derive(Default)]
pub struct MemoryClipboard {
    writes: Mutex<Vec<String>>,
    refuse: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_with(&self, reason: impl Into<String>) {
        *self.refuse.lock().unwrap_or_else(|e| e.into_inner()) = Some(reason.into());
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last(&self) -> Option<String> {
        self.writes().pop()
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        if let Some(reason) = self.refuse.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(ClipboardError(reason));
        }
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
        Ok(())
    }
}
