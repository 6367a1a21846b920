// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Image classification backends

pub mod simulated;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pipeline::PreviewHandle;
use crate::Result;

pub use simulated::SimulatedClassifier;

/// Outcome band of a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Safe,
    Warning,
    Danger,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Safe => "safe",
            ScanStatus::Warning => "warning",
            ScanStatus::Danger => "danger",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classification outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub label: String,
    /// Confidence percentage (0 - 100)
    pub confidence: u8,
    pub status: ScanStatus,
}

impl ScanResult {
    pub fn new(label: impl Into<String>, confidence: u8, status: ScanStatus) -> Self {
        Self {
            label: label.into(),
            confidence,
            status,
        }
    }
}

/// Fixed set of outcomes sampled by the simulated classifier
#[derive(Debug, Clone)]
pub struct ClassificationCatalog {
    entries: Vec<ScanResult>,
}

impl ClassificationCatalog {
    /// Build a catalog; `None` if there is nothing to sample from
    pub fn new(entries: Vec<ScanResult>) -> Option<Self> {
        if entries.is_empty() {
            None
        } else {
            Some(Self { entries })
        }
    }

    /// Pick one entry uniformly at random
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &ScanResult {
        // non-empty by construction
        self.entries.choose(rng).unwrap_or(&self.entries[0])
    }

    pub fn entries(&self) -> &[ScanResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Trait for classification backends
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Name of this classifier
    fn name(&self) -> &'static str;

    /// Classify one accepted image
    async fn classify(&self, image: &PreviewHandle) -> Result<ScanResult>;
}
