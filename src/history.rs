// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! In-memory result history, newest first

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::classifier::ScanResult;

/// A single completed scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub id: String,
    pub file_name: String,
    pub scanned_at: DateTime<Utc>,
    pub result: ScanResult,
}

/// Create a new history entry
pub fn create_entry(file_name: String, result: ScanResult) -> ScanEntry {
    ScanEntry {
        id: uuid::Uuid::new_v4().to_string(),
        file_name,
        scanned_at: Utc::now(),
        result,
    }
}

/// Results of the current session; never persisted
#[derive(Debug, Default)]
pub struct ResultHistory {
    entries: VecDeque<ScanEntry>,
    limit: Option<usize>,
}

impl ResultHistory {
    /// Unbounded history
    pub fn new() -> Self {
        Self::default()
    }

    /// History that drops the oldest entries beyond `limit`
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            limit: limit.map(|l| l.max(1)),
        }
    }

    /// Add an entry at the front
    pub fn push_front(&mut self, entry: ScanEntry) {
        self.entries.push_front(entry);
        if let Some(limit) = self.limit {
            self.entries.truncate(limit);
        }
    }

    /// Get the most recent N entries (newest first)
    pub fn recent(&self, count: usize) -> Vec<ScanEntry> {
        self.entries.iter().take(count).cloned().collect()
    }

    pub fn latest(&self) -> Option<&ScanEntry> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScanEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ScanStatus;

    fn entry(label: &str) -> ScanEntry {
        create_entry(format!("{}.jpg", label), ScanResult::new(label, 90, ScanStatus::Safe))
    }

    #[test]
    fn test_newest_first() {
        let mut history = ResultHistory::new();
        history.push_front(entry("one"));
        history.push_front(entry("two"));
        history.push_front(entry("three"));

        let labels: Vec<_> = history.iter().map(|e| e.result.label.as_str()).collect();
        assert_eq!(labels, ["three", "two", "one"]);
        assert_eq!(history.latest().unwrap().file_name, "three.jpg");
        assert_eq!(history.recent(2).len(), 2);
    }

    #[test]
    fn test_limit_evicts_oldest() {
        let mut history = ResultHistory::with_limit(Some(2));
        history.push_front(entry("one"));
        history.push_front(entry("two"));
        history.push_front(entry("three"));

        assert_eq!(history.len(), 2);
        let labels: Vec<_> = history.iter().map(|e| e.result.label.as_str()).collect();
        assert_eq!(labels, ["three", "two"]);
    }

    #[test]
    fn test_clear() {
        let mut history = ResultHistory::new();
        history.push_front(entry("one"));
        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn test_entry_ids_unique() {
        assert_ne!(entry("a").id, entry("a").id);
    }
}
