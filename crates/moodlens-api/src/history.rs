//! Bounded in-memory list of recent analyses.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use moodlens_models::MediaKind;
use serde::Serialize;
use tokio::sync::RwLock;

/// One analysis as shown in the history view.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    /// Analysis or job ID
    pub id: String,
    pub filename: String,
    pub kind: MediaKind,
    pub summary: String,
    pub created_at: DateTime<Utc>,
    /// Whether an annotated image can be downloaded
    pub has_annotated: bool,
    #[serde(skip)]
    annotated: Option<Arc<Vec<u8>>>,
}

impl HistoryEntry {
    pub fn image(
        id: impl Into<String>,
        filename: impl Into<String>,
        summary: impl Into<String>,
        annotated_png: Vec<u8>,
    ) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            kind: MediaKind::Image,
            summary: summary.into(),
            created_at: Utc::now(),
            has_annotated: true,
            annotated: Some(Arc::new(annotated_png)),
        }
    }

    pub fn video(id: impl Into<String>, filename: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            kind: MediaKind::Video,
            summary: summary.into(),
            created_at: Utc::now(),
            has_annotated: false,
            annotated: None,
        }
    }
}

pub struct History {
    entries: RwLock<VecDeque<HistoryEntry>>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(limit)),
            limit,
        }
    }

    /// Add an entry, dropping the oldest once over the limit.
    pub async fn push(&self, entry: HistoryEntry) {
        if self.limit == 0 {
            return;
        }
        let mut entries = self.entries.write().await;
        entries.push_front(entry);
        entries.truncate(self.limit);
    }

    /// Newest first, at most `limit` entries.
    pub async fn list(&self, limit: Option<usize>) -> Vec<HistoryEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .take(limit.unwrap_or(self.limit))
            .cloned()
            .collect()
    }

    /// Annotated PNG for an entry still held in the history.
    pub async fn annotated(&self, id: &str) -> Option<Arc<Vec<u8>>> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|e| e.id == id)
            .and_then(|e| e.annotated.clone())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
