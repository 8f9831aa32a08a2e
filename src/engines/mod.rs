//! OCR engine implementations
//!
//! Engines implement the [`OcrEngine`] trait. The server only ever talks to
//! the trait object, which keeps handlers testable with a stand-in engine.

pub mod tesseract;

use crate::config::Config;
use crate::engine::OcrEngine;
use std::sync::Arc;

/// Create the configured engine and report whether it is usable.
/// A missing engine is not fatal at startup; requests will fail instead.
pub fn create(config: &Config) -> Arc<dyn OcrEngine> {
    let engine = tesseract::TesseractEngine::new(config);

    match engine.version() {
        Ok(version) => tracing::info!("Using {} {}", engine.name(), version),
        Err(e) => tracing::warn!("{} engine is not available: {}", engine.name(), e),
    }

    Arc::new(engine)
}
