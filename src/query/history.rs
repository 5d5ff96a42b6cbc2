//! Bounded, newest-first record of finished query executions.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

pub const HISTORY_CAPACITY: usize = 100;
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub sql: String,
    pub catalog: String,
    pub schema: String,
    pub timestamp: DateTime<Utc>,
    pub status: HistoryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error kind for failed entries, as rendered in error responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

#[derive(Clone)]
pub struct QueryHistory {
    entries: Arc<RwLock<VecDeque<HistoryEntry>>>,
    capacity: usize,
}

impl Default for QueryHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl QueryHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Insert at the front, evicting the oldest entries beyond capacity.
    pub async fn record(&self, entry: HistoryEntry) {
        let mut entries = self.entries.write().await;
        entries.push_front(entry);
        entries.truncate(self.capacity);
    }

    /// Up to `limit` most recent entries, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        self.entries.read().await.iter().take(limit).cloned().collect()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry {
            id: format!("q-{}", n),
            sql: format!("SELECT {}", n),
            catalog: "iceberg_data".into(),
            schema: "default".into(),
            timestamp: Utc::now(),
            status: HistoryStatus::Completed,
            row_count: Some(1),
            execution_time_ms: 10,
            error: None,
            error_kind: None,
        }
    }

    #[tokio::test]
    async fn test_keeps_newest_hundred() {
        let history = QueryHistory::default();
        for n in 0..150 {
            history.record(entry(n)).await;
        }

        assert_eq!(history.len().await, HISTORY_CAPACITY);
        let all = history.recent(usize::MAX).await;
        assert_eq!(all.len(), 100);
        assert_eq!(all[0].id, "q-149");
        assert_eq!(all[99].id, "q-50");
    }

    #[tokio::test]
    async fn test_recent_respects_limit() {
        let history = QueryHistory::default();
        for n in 0..10 {
            history.record(entry(n)).await;
        }
        let ids: Vec<String> = history.recent(3).await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["q-9", "q-8", "q-7"]);
    }

    #[tokio::test]
    async fn test_clear() {
        let history = QueryHistory::default();
        history.record(entry(1)).await;
        history.clear().await;
        assert!(history.is_empty().await);
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let v = serde_json::to_value(entry(7)).unwrap();
        assert_eq!(v["status"], "completed");
        assert_eq!(v["rowCount"], 1);
        assert_eq!(v["executionTimeMs"], 10);
        assert!(v.get("error").is_none());
    }
}
