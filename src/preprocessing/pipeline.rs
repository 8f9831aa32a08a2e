use crate::error::OcrError;
use image::{DynamicImage, GrayImage};
use serde::Serialize;
use std::time::Instant;

use super::analyzer::{self, BrightnessProfile};
use super::binarizer::{Binarizer, Branch};
use super::intermediate::Intermediates;
use super::steps;

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Result of preprocessing including the decisions that were taken
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessingResult {
    /// Image handed to the OCR engine (not serialized)
    #[serde(skip)]
    pub image: GrayImage,
    /// Mean intensity of the decoded color image
    pub initial_brightness: f64,
    /// Whether the image was inverted as white-on-black input
    pub inverted: bool,
    pub profile: BrightnessProfile,
    /// Only set when optimizing
    pub branch: Option<Branch>,
    /// Total preprocessing time in milliseconds
    pub total_time_ms: u64,
    /// Individual step timings
    pub steps: Vec<StepTiming>,
}

/// Decode, normalize and binarize one uploaded image.
///
/// decode -> dark-mode inversion -> contrast stretch (optimize only)
/// -> grayscale -> brightness analysis -> binarization (optimize only)
#[derive(Debug, Clone, Copy)]
pub struct Pipeline {
    binarizer: Binarizer,
    patch_size: u32,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Binarizer::default(), analyzer::DEFAULT_PATCH_SIZE)
    }
}

impl Pipeline {
    pub fn new(binarizer: Binarizer, patch_size: u32) -> Self {
        Self {
            binarizer,
            patch_size,
        }
    }

    /// Process raw upload bytes
    pub fn process(
        &self,
        bytes: &[u8],
        optimize: bool,
        intermediates: Option<&Intermediates>,
    ) -> Result<PreprocessingResult, OcrError> {
        let decode_start = Instant::now();
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| OcrError::InvalidImageShape(format!("Failed to decode image: {}", e)))?;
        let decode_timing = StepTiming {
            name: "decode".to_string(),
            time_ms: decode_start.elapsed().as_millis() as u64,
        };

        let mut result = self.process_image(decoded, optimize, intermediates)?;
        result.steps.insert(0, decode_timing);
        Ok(result)
    }

    /// Process an already decoded image
    pub fn process_image(
        &self,
        image: DynamicImage,
        optimize: bool,
        intermediates: Option<&Intermediates>,
    ) -> Result<PreprocessingResult, OcrError> {
        let start = Instant::now();
        let mut steps_timing = Vec::new();

        if image.width() == 0 || image.height() == 0 {
            return Err(OcrError::InvalidImageShape(format!(
                "image has no pixels ({}x{})",
                image.width(),
                image.height()
            )));
        }

        let color = image.into_rgb8();
        let initial_brightness = steps::invert::mean_intensity(&color);
        let inverted = initial_brightness < steps::invert::DARK_MODE_MEAN;

        let mut color = self.run_step("dark_mode", color, &mut steps_timing, steps::invert::apply)?;

        if optimize {
            color = self.run_step("contrast", color, &mut steps_timing, steps::contrast::apply)?;
            if let Some(intermediates) = intermediates {
                intermediates.save_rgb("t0_", &color);
            }
        }

        let gray = self.run_step("grayscale", color, &mut steps_timing, steps::grayscale::apply)?;

        let patch_size = self.patch_size;
        let mut profile = None;
        let gray = self.run_step("analyze", gray, &mut steps_timing, |gray| {
            profile = Some(analyzer::analyze(&gray, patch_size)?);
            Ok(gray)
        })?;
        let profile = profile.ok_or_else(|| OcrError::Internal("analysis did not run".into()))?;

        tracing::debug!(
            initial_brightness,
            inverted,
            brightness = profile.global_mean,
            darkest_patch = profile.darkest_patch_ratio,
            width = gray.width(),
            height = gray.height(),
            "Analyzed image brightness"
        );

        let branch = self
            .binarizer
            .select(&profile, optimize)
            .map(|selection| selection.branch);

        let binarizer = self.binarizer;
        let image = self.run_step("binarize", gray, &mut steps_timing, |gray| {
            binarizer.binarize(gray, &profile, optimize, intermediates)
        })?;

        if let Some(intermediates) = intermediates {
            intermediates.save("", &image);
        }

        Ok(PreprocessingResult {
            image,
            initial_brightness,
            inverted,
            profile,
            branch,
            total_time_ms: start.elapsed().as_millis() as u64,
            steps: steps_timing,
        })
    }

    fn run_step<I, O, F>(
        &self,
        name: &str,
        input: I,
        timings: &mut Vec<StepTiming>,
        step_fn: F,
    ) -> Result<O, OcrError>
    where
        F: FnOnce(I) -> Result<O, OcrError>,
    {
        let step_start = Instant::now();
        let result = step_fn(input)?;
        timings.push(StepTiming {
            name: name.to_string(),
            time_ms: step_start.elapsed().as_millis() as u64,
        });
        Ok(result)
    }
}
