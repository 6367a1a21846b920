// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Running scan counters and their persistence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::classifier::ScanResult;
use crate::store::{KeyValueStore, SCAN_STATS_KEY};
use crate::{EcoClassError, Result};

/// Confidence above which a scan counts as safe
pub const SAFE_THRESHOLD: u8 = 80;

/// Confidence above which a non-safe scan counts as a warning
pub const WARNING_THRESHOLD: u8 = 50;

/// Aggregate counters describing cumulative scan outcomes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsRecord {
    pub total_scans: u64,
    pub safe_count: u64,
    pub warning_count: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl StatsRecord {
    pub fn new(total_scans: u64, safe_count: u64, warning_count: u64) -> Self {
        Self {
            total_scans,
            safe_count,
            warning_count,
            last_updated: None,
        }
    }

    /// Count one result into the record
    ///
    /// Scans at or below the warning threshold only count toward the total.
    /// Counters saturate; a band is only counted while it stays within the total.
    pub fn apply(&mut self, result: &ScanResult) {
        self.total_scans = self.total_scans.saturating_add(1);
        if self.safe_count.saturating_add(self.warning_count) >= self.total_scans {
            return;
        }
        if result.confidence > SAFE_THRESHOLD {
            self.safe_count += 1;
        } else if result.confidence > WARNING_THRESHOLD {
            self.warning_count += 1;
        }
    }

    /// Same counters, ignoring the timestamp
    pub fn same_counts(&self, other: &StatsRecord) -> bool {
        (self.total_scans, self.safe_count, self.warning_count)
            == (other.total_scans, other.safe_count, other.warning_count)
    }
}

/// Parse a stored stats blob
///
/// Absent, mistyped or negative fields read as zero; unparseable input yields
/// an empty record. A total lower than safe + warning is raised to match.
pub fn parse_record(raw: &str) -> StatsRecord {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("Ignoring unreadable stats record: {}", e);
            return StatsRecord::default();
        }
    };

    let counter = |name: &str| -> u64 {
        match value.get(name) {
            Some(v) => v
                .as_u64()
                .or_else(|| v.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
                .unwrap_or(0),
            None => 0,
        }
    };

    let mut record = StatsRecord {
        total_scans: counter("totalScans"),
        safe_count: counter("safeCount"),
        warning_count: counter("warningCount"),
        last_updated: value
            .get("lastUpdated")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    };

    let banded = record.safe_count.saturating_add(record.warning_count);
    if banded > record.total_scans {
        warn!("Stats record has {} banded scans but total {}; raising total", banded, record.total_scans);
        record.total_scans = banded;
    }

    record
}

/// Owns the counters of the running session
pub struct StatsManager {
    store: Arc<dyn KeyValueStore>,
    current: Mutex<StatsRecord>,
}

impl StatsManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            current: Mutex::new(StatsRecord::default()),
        }
    }

    fn lock_current(&self) -> Result<MutexGuard<'_, StatsRecord>> {
        self.current
            .lock()
            .map_err(|_| EcoClassError::Store("Stats lock poisoned".to_string()))
    }

    /// Read persisted counters; never fails
    pub fn load(&self) -> StatsRecord {
        let record = match self.store.get(SCAN_STATS_KEY) {
            Ok(Some(raw)) => parse_record(&raw),
            Ok(None) => StatsRecord::default(),
            Err(e) => {
                warn!("Failed to read stats: {}", e);
                StatsRecord::default()
            }
        };

        if let Ok(mut current) = self.lock_current() {
            *current = record.clone();
        }
        record
    }

    /// Count a completed scan and persist the result
    pub fn record_scan(&self, result: &ScanResult) -> Result<StatsRecord> {
        let mut current = self.lock_current()?;
        let mut next = current.clone();
        next.apply(result);
        next.last_updated = Some(Utc::now());

        self.persist(&next)?;
        *current = next.clone();
        debug!(
            "Stats: {} total, {} safe, {} warning",
            next.total_scans, next.safe_count, next.warning_count
        );
        Ok(next)
    }

    /// Persist a record as-is
    pub fn save(&self, record: &StatsRecord) -> Result<()> {
        let mut current = self.lock_current()?;
        self.persist(record)?;
        *current = record.clone();
        Ok(())
    }

    /// Zero the persisted counters
    pub fn reset(&self) -> Result<StatsRecord> {
        let record = StatsRecord {
            last_updated: Some(Utc::now()),
            ..StatsRecord::default()
        };
        self.save(&record)?;
        Ok(record)
    }

    /// Counters as last loaded or recorded
    pub fn current(&self) -> StatsRecord {
        self.lock_current().map(|c| c.clone()).unwrap_or_default()
    }

    fn persist(&self, record: &StatsRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        self.store.set(SCAN_STATS_KEY, &json)
    }
}
