// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Upload validation and the analyze state machine
//!
//! `Idle -> (image accepted) -> Armed -> (analyze) -> Busy -> Idle`.
//! A second `analyze` while busy is rejected, not queued.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::classifier::{Classifier, ScanResult};
use crate::config::UploadConfig;
use crate::error::{PipelineError, ValidationError};
use crate::{EcoClassError, Result};

/// A file offered for analysis
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: bytes.len() as u64,
            bytes,
        }
    }

    /// Read an upload from disk
    ///
    /// Files at or above `max_bytes` are not read; only their size is kept so
    /// validation can reject them.
    pub fn from_path(path: &Path, max_bytes: u64) -> Result<Self> {
        let mut size = std::fs::metadata(path)?.len();
        let bytes = if size < max_bytes { std::fs::read(path)? } else { Vec::new() };
        // the file may have changed between the two calls
        if !bytes.is_empty() {
            size = bytes.len() as u64;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            mime_type: mime_for_path(path),
            size,
            bytes,
        })
    }
}

/// Guess a MIME type from the file extension
pub fn mime_for_path(path: &Path) -> String {
    if let Ok(format) = image::ImageFormat::from_path(path) {
        return format.to_mime_type().to_string();
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "txt" | "log" | "md" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "svg" => "image/svg+xml",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Displayable preview of an accepted image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewHandle {
    /// Content hash prefix
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    /// Width and height, when the bytes decode as a known format
    pub dimensions: Option<(u32, u32)>,
    /// `data:` URL of the file contents
    pub data_url: String,
}

/// Validate an upload and build its preview
pub fn prepare_preview(upload: Upload, config: &UploadConfig) -> std::result::Result<PreviewHandle, ValidationError> {
    if !upload.mime_type.starts_with(&config.accepted_prefix) {
        return Err(ValidationError::InvalidImage {
            reason: format!("{} is {}, not an image", upload.name, upload.mime_type),
        });
    }
    let size = upload.size.max(upload.bytes.len() as u64);
    if size >= config.max_bytes {
        return Err(ValidationError::InvalidImage {
            reason: format!("{} is {} bytes, limit is {}", upload.name, size, config.max_bytes),
        });
    }

    let hash = blake3::hash(&upload.bytes);
    let dimensions = probe_dimensions(&upload.bytes);
    let data_url = format!(
        "data:{};base64,{}",
        upload.mime_type,
        general_purpose::STANDARD.encode(&upload.bytes)
    );

    Ok(PreviewHandle {
        id: hash.to_hex()[..16].to_string(),
        name: upload.name,
        mime_type: upload.mime_type,
        size,
        dimensions,
        data_url,
    })
}

/// First upload whose MIME type looks like an image, as a drop of several files would pick
pub fn pick_image(uploads: Vec<Upload>, config: &UploadConfig) -> Option<Upload> {
    uploads
        .into_iter()
        .find(|u| u.mime_type.starts_with(&config.accepted_prefix))
}

fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Externally visible pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Armed,
    Busy,
}

impl PipelineState {
    pub fn is_busy(&self) -> bool {
        matches!(self, PipelineState::Busy)
    }
}

#[derive(Debug)]
enum Phase {
    Idle,
    Armed(PreviewHandle),
    Busy(PreviewHandle),
}

/// Accepts images and runs at most one analysis at a time
pub struct ScanPipeline {
    config: UploadConfig,
    classifier: Arc<dyn Classifier>,
    phase: Mutex<Phase>,
}

impl ScanPipeline {
    pub fn new(config: UploadConfig, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            config,
            classifier,
            phase: Mutex::new(Phase::Idle),
        }
    }

    fn lock_phase(&self) -> Result<MutexGuard<'_, Phase>> {
        self.phase
            .lock()
            .map_err(|_| EcoClassError::Classifier("Pipeline lock poisoned".to_string()))
    }

    pub fn state(&self) -> PipelineState {
        match self.lock_phase().as_deref() {
            Ok(Phase::Idle) => PipelineState::Idle,
            Ok(Phase::Armed(_)) => PipelineState::Armed,
            Ok(Phase::Busy(_)) => PipelineState::Busy,
            Err(_) => PipelineState::Idle,
        }
    }

    /// The image that the next `analyze` would use
    pub fn armed_image(&self) -> Option<PreviewHandle> {
        match &*self.lock_phase().ok()? {
            Phase::Armed(image) => Some(image.clone()),
            _ => None,
        }
    }

    /// Validate an upload and arm the analyze action with it
    ///
    /// A rejected upload leaves the current state (including an armed image) as is.
    pub fn accept_image(&self, upload: Upload) -> Result<PreviewHandle> {
        let mut phase = self.lock_phase()?;
        if matches!(*phase, Phase::Busy(_)) {
            return Err(PipelineError::Busy.into());
        }

        let preview = prepare_preview(upload, &self.config)?;
        info!("Accepted {} ({} bytes, {})", preview.name, preview.size, preview.mime_type);
        *phase = Phase::Armed(preview.clone());
        Ok(preview)
    }

    /// Drop an armed image; an in-flight analysis is left alone
    pub fn reset(&self) -> Result<()> {
        let mut phase = self.lock_phase()?;
        if matches!(*phase, Phase::Armed(_)) {
            *phase = Phase::Idle;
        }
        Ok(())
    }

    /// Classify the armed image
    ///
    /// Returns the analyzed image with its result. If the classifier fails the
    /// image stays armed.
    pub async fn analyze(&self) -> Result<(PreviewHandle, ScanResult)> {
        let guard = self.begin()?;
        info!("Analyzing {} with {} classifier", guard.image.name, self.classifier.name());

        let result = self.classifier.classify(&guard.image).await?;
        let image = guard.complete();

        debug!("{} -> {} ({}%, {})", image.name, result.label, result.confidence, result.status);
        Ok((image, result))
    }

    fn begin(&self) -> Result<BusyGuard<'_>> {
        let mut phase = self.lock_phase()?;
        match std::mem::replace(&mut *phase, Phase::Idle) {
            Phase::Armed(image) => {
                *phase = Phase::Busy(image.clone());
                Ok(BusyGuard {
                    pipeline: self,
                    image,
                    completed: false,
                })
            }
            Phase::Busy(image) => {
                *phase = Phase::Busy(image);
                Err(PipelineError::Busy.into())
            }
            Phase::Idle => Err(PipelineError::NotArmed.into()),
        }
    }
}

/// Holds the pipeline in `Busy`; re-arms the image if dropped before completion
struct BusyGuard<'a> {
    pipeline: &'a ScanPipeline,
    image: PreviewHandle,
    completed: bool,
}

impl BusyGuard<'_> {
    fn complete(mut self) -> PreviewHandle {
        self.completed = true;
        if let Ok(mut phase) = self.pipeline.lock_phase() {
            *phase = Phase::Idle;
        }
        self.image.clone()
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        if let Ok(mut phase) = self.pipeline.lock_phase() {
            *phase = Phase::Armed(self.image.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ScanStatus, SimulatedClassifier};
    use crate::config::AppConfig;
    use async_trait::async_trait;
    use std::time::Duration;

    const MIB: usize = 1024 * 1024;

    fn pipeline() -> ScanPipeline {
        let config = AppConfig::default();
        let classifier = SimulatedClassifier::from_config(&config.classifier)
            .unwrap()
            .with_delay(Duration::ZERO);
        ScanPipeline::new(config.upload, Arc::new(classifier))
    }

    #[test]
    fn test_rejects_oversized_and_non_image() {
        let pipeline = pipeline();

        let big = pipeline.accept_image(Upload::new("big.jpg", "image/jpeg", vec![0u8; 6 * MIB]));
        assert!(matches!(big, Err(EcoClassError::Validation(ValidationError::InvalidImage { .. }))));

        let text = pipeline.accept_image(Upload::new("notes.txt", "text/plain", b"hello".to_vec()));
        assert!(matches!(text, Err(EcoClassError::Validation(ValidationError::InvalidImage { .. }))));

        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[test]
    fn test_accepts_one_mib_image() {
        let pipeline = pipeline();
        let preview = pipeline
            .accept_image(Upload::new("photo.jpg", "image/jpeg", vec![0u8; MIB]))
            .unwrap();

        assert_eq!(preview.size, MIB as u64);
        assert!(preview.data_url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(preview.id.len(), 16);
        assert_eq!(pipeline.state(), PipelineState::Armed);
    }

    #[test]
    fn test_size_limit_is_exclusive() {
        let pipeline = pipeline();
        let at_limit = Upload::new("edge.png", "image/png", vec![0u8; 5 * MIB]);
        assert!(pipeline.accept_image(at_limit).is_err());

        let under = Upload::new("edge.png", "image/png", vec![0u8; 5 * MIB - 1]);
        assert!(pipeline.accept_image(under).is_ok());
    }

    #[test]
    fn test_size_checked_against_bytes() {
        let mut upload = Upload::new("liar.png", "image/png", vec![0u8; 6 * MIB]);
        upload.size = 10;
        let err = prepare_preview(upload, &UploadConfig::default()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidImage { .. }));

        let mut upload = Upload::new("ok.png", "image/png", vec![0u8; 100]);
        upload.size = 1;
        assert_eq!(prepare_preview(upload, &UploadConfig::default()).unwrap().size, 100);
    }

    #[test]
    fn test_rejected_upload_keeps_armed_image() {
        let pipeline = pipeline();
        pipeline.accept_image(Upload::new("a.png", "image/png", vec![1, 2, 3])).unwrap();
        assert!(pipeline.accept_image(Upload::new("b.txt", "text/plain", vec![1])).is_err());
        assert_eq!(pipeline.armed_image().unwrap().name, "a.png");
    }

    #[test]
    fn test_dimensions_probed_from_real_image() {
        let mut png = Vec::new();
        image::RgbImage::new(4, 3)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let preview = prepare_preview(Upload::new("tiny.png", "image/png", png), &UploadConfig::default()).unwrap();
        assert_eq!(preview.dimensions, Some((4, 3)));

        let junk = prepare_preview(Upload::new("junk.png", "image/png", vec![9; 10]), &UploadConfig::default()).unwrap();
        assert_eq!(junk.dimensions, None);
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_for_path(Path::new("a.txt")), "text/plain");
        assert_eq!(mime_for_path(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_pick_image_skips_non_images() {
        let uploads = vec![
            Upload::new("readme.txt", "text/plain", vec![1]),
            Upload::new("leaf.webp", "image/webp", vec![2]),
            Upload::new("can.png", "image/png", vec![3]),
        ];
        let picked = pick_image(uploads, &UploadConfig::default()).unwrap();
        assert_eq!(picked.name, "leaf.webp");
    }

    #[test]
    fn test_from_path_skips_reading_large_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.png");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        let upload = Upload::from_path(&path, 1024).unwrap();
        assert_eq!(upload.size, 2048);
        assert!(upload.bytes.is_empty());
        assert_eq!(upload.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_analyze_requires_armed_image() {
        let pipeline = pipeline();
        let err = pipeline.analyze().await.unwrap_err();
        assert!(matches!(err, EcoClassError::Pipeline(PipelineError::NotArmed)));
    }

    #[tokio::test]
    async fn test_analyze_returns_to_idle() {
        let pipeline = pipeline();
        pipeline.accept_image(Upload::new("leaf.png", "image/png", vec![1; 32])).unwrap();

        let (image, _result) = pipeline.analyze().await.unwrap();
        assert_eq!(image.name, "leaf.png");
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    struct Failing;

    #[async_trait]
    impl Classifier for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn classify(&self, _image: &PreviewHandle) -> Result<ScanResult> {
            Err(EcoClassError::Classifier("model offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_classification_rearms() {
        let pipeline = ScanPipeline::new(UploadConfig::default(), Arc::new(Failing));
        pipeline.accept_image(Upload::new("leaf.png", "image/png", vec![1; 8])).unwrap();

        assert!(pipeline.analyze().await.is_err());
        assert_eq!(pipeline.state(), PipelineState::Armed);
    }

    struct Gated(tokio::sync::Notify);

    #[async_trait]
    impl Classifier for Gated {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn classify(&self, _image: &PreviewHandle) -> Result<ScanResult> {
            self.0.notified().await;
            Ok(ScanResult::new("Daun Kering", 88, ScanStatus::Safe))
        }
    }

    #[tokio::test]
    async fn test_second_analyze_rejected_while_busy() {
        let gate = Arc::new(Gated(tokio::sync::Notify::new()));
        let pipeline = Arc::new(ScanPipeline::new(UploadConfig::default(), gate.clone()));
        pipeline.accept_image(Upload::new("leaf.png", "image/png", vec![1; 8])).unwrap();

        let first = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.analyze().await }
        });
        while !pipeline.state().is_busy() {
            tokio::task::yield_now().await;
        }

        let second = pipeline.analyze().await.unwrap_err();
        assert!(matches!(second, EcoClassError::Pipeline(PipelineError::Busy)));

        let upload = pipeline.accept_image(Upload::new("other.png", "image/png", vec![2; 8]));
        assert!(matches!(upload, Err(EcoClassError::Pipeline(PipelineError::Busy))));

        gate.0.notify_one();
        let (image, result) = first.await.unwrap().unwrap();
        assert_eq!(image.name, "leaf.png");
        assert_eq!(result.label, "Daun Kering");
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }
}
