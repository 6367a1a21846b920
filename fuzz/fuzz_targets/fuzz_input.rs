// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use ecoclass::classifier::{ScanResult, ScanStatus};
use ecoclass::config::UploadConfig;
use ecoclass::pipeline::{prepare_preview, Upload};
use ecoclass::stats::parse_record;

#[derive(Arbitrary, Debug)]
struct Input {
    stats_blob: String,
    name: String,
    mime_type: String,
    bytes: Vec<u8>,
    confidence: u8,
}

fuzz_target!(|input: Input| {
    let mut record = parse_record(&input.stats_blob);
    assert!(record.safe_count.saturating_add(record.warning_count) <= record.total_scans);
    record.apply(&ScanResult::new("fuzz", input.confidence, ScanStatus::Safe));
    assert!(record.safe_count.saturating_add(record.warning_count) <= record.total_scans);

    let config = UploadConfig {
        max_bytes: 4096,
        ..UploadConfig::default()
    };
    let upload = Upload::new(input.name, input.mime_type.clone(), input.bytes);
    if let Ok(preview) = prepare_preview(upload, &config) {
        assert!(input.mime_type.starts_with("image/"));
        assert!(preview.size < config.max_bytes);
    }
});
