// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for EcoClass

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::classifier::{ScanResult, ScanStatus};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Persistent store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Demo accounts
    #[serde(default)]
    pub auth: AuthConfig,

    /// Upload limits
    #[serde(default)]
    pub upload: UploadConfig,

    /// Simulated classifier settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// In-memory result history
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_users")]
    pub users: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_accepted_prefix")]
    pub accepted_prefix: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_catalog")]
    pub catalog: Vec<ScanResult>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct HistoryConfig {
    /// Keep at most this many results; unbounded when absent
    #[serde(default)]
    pub limit: Option<usize>,
}

// Default value functions
fn default_store_path() -> String { "ecoclass.db".to_string() }
fn default_max_bytes() -> u64 { 5 * 1024 * 1024 }
fn default_accepted_prefix() -> String { "image/".to_string() }
fn default_delay_ms() -> u64 { 3000 }

fn default_users() -> BTreeMap<String, String> {
    [("admin", "admin123"), ("user", "123456")]
        .into_iter()
        .map(|(u, p)| (u.to_string(), p.to_string()))
        .collect()
}

fn default_catalog() -> Vec<ScanResult> {
    use ScanStatus::*;
    [
        ("Sampah Plastik", 92, Danger),
        ("Kemasan Makanan", 87, Warning),
        ("Lingkungan Bersih", 95, Safe),
        ("Botol Plastik", 78, Danger),
        ("Polusi Air", 65, Warning),
        ("Daun Kering", 88, Safe),
        ("Kaleng Minuman", 91, Danger),
    ]
    .into_iter()
    .map(|(label, confidence, status)| ScanResult::new(label, confidence, status))
    .collect()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            users: default_users(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            accepted_prefix: default_accepted_prefix(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            catalog: default_catalog(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::EcoClassError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.classifier.catalog.is_empty() {
            return Err(crate::EcoClassError::Config("classifier.catalog must not be empty".to_string()));
        }
        if let Some(entry) = self.classifier.catalog.iter().find(|e| e.confidence > 100) {
            return Err(crate::EcoClassError::Config(format!(
                "confidence for '{}' is {}, expected 0-100",
                entry.label, entry.confidence
            )));
        }
        if self.history.limit == Some(0) {
            return Err(crate::EcoClassError::Config("history.limit must be at least 1".to_string()));
        }
        Ok(())
    }
}
