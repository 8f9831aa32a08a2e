//! Brightness statistics that drive the binarizer.

use crate::error::OcrError;
use image::GrayImage;
use serde::Serialize;

/// Side length of the darkest-patch window used by the server
pub const DEFAULT_PATCH_SIZE: u32 = 3;

/// A window this dark is as dark as it gets; the scan stops there.
const DARKEST_EARLY_EXIT: f64 = 0.01;

/// Global and local brightness of one image
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BrightnessProfile {
    /// Mean of all intensities, 0..=255
    pub global_mean: f64,
    /// Smallest mean (normalized to 0..=1) over all `patch x patch` windows
    pub darkest_patch_ratio: f64,
}

/// Analyze a grayscale image.
pub fn analyze(image: &GrayImage, patch_size: u32) -> Result<BrightnessProfile, OcrError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(OcrError::InvalidImageShape(format!(
            "image has no pixels ({width}x{height})"
        )));
    }
    if patch_size == 0 {
        return Err(OcrError::operation(
            "darkest_patch",
            "patch_size=0",
            "patch size must be positive",
        ));
    }

    let samples = image.as_raw();
    let total: u64 = samples.iter().map(|&v| v as u64).sum();
    let global_mean = total as f64 / samples.len() as f64;

    let darkest_patch_ratio = if patch_size > width || patch_size > height {
        global_mean / 255.0
    } else {
        darkest_patch(samples, width, height, patch_size)
    };

    Ok(BrightnessProfile {
        global_mean,
        darkest_patch_ratio,
    })
}

/// Row-major scan over every window that fits, using a summed-area table
/// so each window costs four lookups.
fn darkest_patch(samples: &[u8], width: u32, height: u32, patch: u32) -> f64 {
    let integral = compute_integral_image(samples, width, height);
    let stride = width as usize + 1;
    let window_len = (patch * patch) as f64;
    let patch = patch as usize;

    let mut darkest = f64::INFINITY;
    for y in 0..=(height as usize - patch) {
        for x in 0..=(width as usize - patch) {
            let (y2, x2) = (y + patch, x + patch);
            let sum = integral[y2 * stride + x2] + integral[y * stride + x]
                - integral[y * stride + x2]
                - integral[y2 * stride + x];
            let mean = sum as f64 / window_len;
            let ratio = mean / 255.0;
            if ratio <= DARKEST_EARLY_EXIT {
                return ratio;
            }
            if ratio < darkest {
                darkest = ratio;
            }
        }
    }
    darkest
}

/// `(width + 1) x (height + 1)` table of prefix sums
fn compute_integral_image(samples: &[u8], width: u32, height: u32) -> Vec<u64> {
    let (w, h) = (width as usize, height as usize);
    let stride = w + 1;
    let mut integral = vec![0u64; stride * (h + 1)];

    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += samples[y * w + x] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    integral
}
