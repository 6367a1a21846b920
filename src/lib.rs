// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! EcoClass: scan sessions with a login gate and simulated classification
//!
//! A mock login, an image upload step and a stand-in "AI" classifier that
//! draws from a fixed catalog, with running counters kept in a local store.

pub mod app;
pub mod classifier;
pub mod config;
pub mod error;
pub mod history;
pub mod pipeline;
pub mod session;
pub mod stats;
pub mod store;

pub use app::EcoClass;
pub use config::AppConfig;
pub use error::{EcoClassError, Result};
