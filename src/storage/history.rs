use std::sync::Arc;

use super::field_store::FieldStore;
use crate::models::tool::FIELD_PROMPT;

/// Maximum number of prompts remembered per tool
pub const HISTORY_CAPACITY: usize = 5;

const HISTORY_FIELD: &str = "saved_prompts";

/// Collapse line breaks into single spaces and trim every line.
///
/// Blank lines are dropped, so the result is a single trimmed line and
/// applying the function twice changes nothing.
pub fn normalize(prompt: &str) -> String {
    prompt
        .split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Receives the saved prompts when the history is rendered
pub trait HistoryView: Send + Sync {
    fn show_history(&self, namespace: &str, entries: &[String]);
}

/// Bounded, deduplicated list of recently submitted prompts, oldest first
#[derive(Clone)]
pub struct PromptHistory {
    store: Arc<dyn FieldStore>,
    capacity: usize,
}

impl PromptHistory {
    pub fn new(store: Arc<dyn FieldStore>) -> Self {
        Self {
            store,
            capacity: HISTORY_CAPACITY,
        }
    }

    /// Current entries, most recent last
    pub async fn list(&self, namespace: &str) -> Vec<String> {
        let raw = match self.store.get(namespace, HISTORY_FIELD).await {
            Some(raw) => raw,
            None => return Vec::new(),
        };

        let stored: Vec<String> = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Discarding unreadable prompt history for {}: {}", namespace, e);
                return Vec::new();
            }
        };

        // Older builds stored raw prompts; clean them up on the way out
        let mut entries = Vec::with_capacity(stored.len());
        for prompt in stored {
            let prompt = normalize(&prompt);
            if prompt.is_empty() {
                continue;
            }
            entries.retain(|e| e != &prompt);
            entries.push(prompt);
        }
        let overflow = entries.len().saturating_sub(self.capacity);
        entries.drain(..overflow);
        entries
    }

    /// Remember a submitted prompt and return the updated list.
    ///
    /// A prompt already present moves to the most recent position instead of
    /// being stored twice.
    pub async fn record(&self, namespace: &str, prompt: &str) -> Vec<String> {
        let prompt = normalize(prompt);
        let mut entries = self.list(namespace).await;
        if prompt.is_empty() {
            return entries;
        }

        entries.retain(|e| e != &prompt);
        entries.push(prompt);
        while entries.len() > self.capacity {
            let evicted = entries.remove(0);
            tracing::debug!("Evicted prompt from {} history: {}", namespace, evicted);
        }

        match serde_json::to_string(&entries) {
            Ok(json) => self.store.set(namespace, HISTORY_FIELD, &json).await,
            Err(e) => tracing::error!("Failed to serialize prompt history: {}", e),
        }

        entries
    }

    pub async fn render(&self, namespace: &str, view: &dyn HistoryView) {
        let entries = self.list(namespace).await;
        view.show_history(namespace, &entries);
    }

    /// Copy the entry at `index` into the prompt field
    pub async fn select(&self, namespace: &str, index: usize) -> Option<String> {
        let entry = self.list(namespace).await.into_iter().nth(index)?;
        self.store.set(namespace, FIELD_PROMPT, &entry).await;
        Some(entry)
    }
}
