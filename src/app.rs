// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! The scan-session controller
//!
//! Owns the session, stats, pipeline and history of one user-facing page and
//! exposes its actions: login, upload, analyze, logout.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::classifier::{Classifier, ScanResult, SimulatedClassifier};
use crate::config::AppConfig;
use crate::history::{create_entry, ResultHistory, ScanEntry};
use crate::pipeline::{PipelineState, PreviewHandle, ScanPipeline, Upload};
use crate::session::{Session, SessionManager, StaticCredentials};
use crate::stats::{StatsManager, StatsRecord};
use crate::store::{KeyValueStore, SqliteStore};
use crate::{EcoClassError, Result};

/// Confirmation text for the logout action
pub const LOGOUT_PROMPT: &str = "Yakin ingin logout? Data statistik akan disimpan. \
                                 (Log out? Statistics will be kept.)";

/// Notifications for the presentation layer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    LoggedIn { username: String },
    LoggedOut,
    ImageAccepted { preview: PreviewHandle },
    AnalysisStarted { file_name: String },
    ResultReady { entry: ScanEntry, stats: StatsRecord },
}

/// Scan-session state owner
pub struct EcoClass {
    session: Mutex<SessionManager>,
    stats: StatsManager,
    pipeline: ScanPipeline,
    history: Mutex<ResultHistory>,
    /// Bumped on every login and logout so late results skip the cleared history
    epoch: AtomicU64,
    events: broadcast::Sender<ScanEvent>,
}

impl EcoClass {
    /// Build a controller with the configured store and simulated classifier
    pub fn open(config: &AppConfig) -> Result<Self> {
        let store = SqliteStore::open(&config.store.path)?;
        let classifier = SimulatedClassifier::from_config(&config.classifier)?;
        Ok(Self::with_parts(config, Arc::new(store), Arc::new(classifier)))
    }

    /// Build a controller from explicit parts
    pub fn with_parts(
        config: &AppConfig,
        store: Arc<dyn KeyValueStore>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        let verifier = StaticCredentials::new(config.auth.users.clone());
        let (events, _) = broadcast::channel(64);

        Self {
            session: Mutex::new(SessionManager::new(store.clone(), Box::new(verifier))),
            stats: StatsManager::new(store),
            pipeline: ScanPipeline::new(config.upload.clone(), classifier),
            history: Mutex::new(ResultHistory::with_limit(config.history.limit)),
            epoch: AtomicU64::new(0),
            events,
        }
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, SessionManager>> {
        self.session
            .lock()
            .map_err(|_| EcoClassError::Store("Session lock poisoned".to_string()))
    }

    fn lock_history(&self) -> Result<MutexGuard<'_, ResultHistory>> {
        self.history
            .lock()
            .map_err(|_| EcoClassError::Store("History lock poisoned".to_string()))
    }

    fn emit(&self, event: ScanEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Receive presentation events
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    /// Restore a persisted session and load its stats
    pub fn restore(&self) -> Result<Option<Session>> {
        let restored = self.lock_session()?.restore_session();
        if let Some(ref session) = restored {
            self.enter(session);
        }
        Ok(restored)
    }

    pub fn login(&self, username: &str, password: &str) -> Result<Session> {
        let session = self.lock_session()?.login(username, password)?;
        self.enter(&session);
        Ok(session)
    }

    fn enter(&self, session: &Session) {
        self.stats.load();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut history) = self.lock_history() {
            history.clear();
        }
        self.emit(ScanEvent::LoggedIn {
            username: session.username.clone(),
        });
    }

    /// Text the caller should confirm before calling `logout`
    pub fn logout_prompt(&self) -> &'static str {
        LOGOUT_PROMPT
    }

    /// End the session; stats stay persisted, history is dropped
    pub fn logout(&self) -> Result<()> {
        self.lock_session()?.logout()?;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.lock_history()?.clear();
        self.pipeline.reset()?;
        self.emit(ScanEvent::LoggedOut);
        Ok(())
    }

    pub fn current_user(&self) -> Option<Session> {
        self.lock_session().ok()?.current().cloned()
    }

    pub fn is_logged_in(&self) -> bool {
        self.lock_session().map(|s| s.is_logged_in()).unwrap_or(false)
    }

    fn require_login(&self) -> Result<()> {
        if self.is_logged_in() {
            Ok(())
        } else {
            Err(EcoClassError::NotLoggedIn)
        }
    }

    /// Validate an image and arm the analyze action
    pub fn upload(&self, upload: Upload) -> Result<PreviewHandle> {
        self.require_login()?;
        let preview = self.pipeline.accept_image(upload)?;
        self.emit(ScanEvent::ImageAccepted {
            preview: preview.clone(),
        });
        Ok(preview)
    }

    /// Classify the armed image, record it and add it to the history
    pub async fn analyze(&self) -> Result<ScanEntry> {
        self.require_login()?;
        let epoch = self.epoch.load(Ordering::SeqCst);

        if let Some(image) = self.pipeline.armed_image() {
            self.emit(ScanEvent::AnalysisStarted { file_name: image.name });
        }
        let (image, result) = self.pipeline.analyze().await?;

        self.complete(epoch, image, result)
    }

    fn complete(&self, epoch: u64, image: PreviewHandle, result: ScanResult) -> Result<ScanEntry> {
        let entry = create_entry(image.name, result);
        let stats = self.stats.record_scan(&entry.result)?;

        if self.epoch.load(Ordering::SeqCst) == epoch {
            self.lock_history()?.push_front(entry.clone());
        } else {
            warn!("Session ended during analysis; result not added to history");
        }

        info!(
            "Result: {} ({}%, {}) - {} scans total",
            entry.result.label, entry.result.confidence, entry.result.status, stats.total_scans
        );
        self.emit(ScanEvent::ResultReady {
            entry: entry.clone(),
            stats,
        });
        Ok(entry)
    }

    pub fn stats(&self) -> StatsRecord {
        self.stats.current()
    }

    /// Re-read counters from the store
    pub fn reload_stats(&self) -> StatsRecord {
        self.stats.load()
    }

    pub fn reset_stats(&self) -> Result<StatsRecord> {
        self.stats.reset()
    }

    /// History snapshot, newest first
    pub fn history(&self) -> Vec<ScanEntry> {
        self.lock_history()
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn pipeline_state(&self) -> PipelineState {
        self.pipeline.state()
    }
}
