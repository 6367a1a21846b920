// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Stand-in classifier: waits, then draws from the catalog

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{ClassificationCatalog, Classifier, ScanResult};
use crate::config::ClassifierConfig;
use crate::pipeline::PreviewHandle;
use crate::{EcoClassError, Result};

/// Returns a random catalog entry after a fixed delay
pub struct SimulatedClassifier {
    catalog: ClassificationCatalog,
    delay: Duration,
}

impl SimulatedClassifier {
    pub fn new(catalog: ClassificationCatalog, delay: Duration) -> Self {
        Self { catalog, delay }
    }

    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        let catalog = ClassificationCatalog::new(config.catalog.clone())
            .ok_or_else(|| EcoClassError::Config("classifier.catalog must not be empty".to_string()))?;
        Ok(Self::new(catalog, Duration::from_millis(config.delay_ms)))
    }

    /// Same catalog, different delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn catalog(&self) -> &ClassificationCatalog {
        &self.catalog
    }
}

#[async_trait]
impl Classifier for SimulatedClassifier {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn classify(&self, image: &PreviewHandle) -> Result<ScanResult> {
        debug!("Simulating analysis of {} ({:?})", image.name, self.delay);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = self.catalog.sample(&mut rand::thread_rng()).clone();
        Ok(result)
    }
}
