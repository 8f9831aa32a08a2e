use super::replicate;
use crate::error::OcrError;
use image::{GrayImage, Luma};
use std::fmt;

/// How the local threshold surface is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptiveMethod {
    /// Plain box mean over the block
    Mean,
    /// Gaussian-weighted mean over the block
    Gaussian,
}

impl AdaptiveMethod {
    fn operator(&self) -> &'static str {
        match self {
            Self::Mean => "adaptive_threshold_mean",
            Self::Gaussian => "adaptive_threshold_gaussian",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdParams {
    /// Odd neighbourhood size, at least 3
    pub block_size: u32,
    /// Offset subtracted from the local mean
    pub c: f32,
}

impl ThresholdParams {
    pub const fn new(block_size: u32, c: f32) -> Self {
        Self { block_size, c }
    }
}

impl fmt::Display for ThresholdParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block_size={}, c={}", self.block_size, self.c)
    }
}

/// Adaptive binarization.
///
/// A pixel becomes white when it is brighter than its local mean minus `c`
/// and black otherwise. The local mean is computed with replicated borders
/// and rounded to 8 bits, and `c` is rounded up to a whole intensity step.
pub fn apply(
    image: &GrayImage,
    method: AdaptiveMethod,
    params: ThresholdParams,
) -> Result<GrayImage, OcrError> {
    if params.block_size < 3 || params.block_size % 2 == 0 {
        return Err(OcrError::operation(
            method.operator(),
            params.to_string(),
            "block size must be odd and greater than 1",
        ));
    }
    if !params.c.is_finite() {
        return Err(OcrError::operation(
            method.operator(),
            params.to_string(),
            "constant must be finite",
        ));
    }

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Ok(image.clone());
    }

    let kernel = match method {
        AdaptiveMethod::Mean => box_kernel(params.block_size as usize),
        AdaptiveMethod::Gaussian => gaussian_kernel(params.block_size as usize),
    };
    let mean = separable_mean(image, &kernel);
    let delta = params.c.ceil() as i32;

    Ok(GrayImage::from_fn(width, height, |x, y| {
        let pixel = image.get_pixel(x, y).0[0] as i32;
        let local = mean.get_pixel(x, y).0[0] as i32;
        if pixel - local > -delta {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    }))
}

fn box_kernel(size: usize) -> Vec<f32> {
    vec![1.0 / size as f32; size]
}

/// Normalized 1D Gaussian of `size` taps with sigma derived from the size.
/// Sizes up to 7 use the usual fixed binomial-like tables.
fn gaussian_kernel(size: usize) -> Vec<f32> {
    match size {
        1 => vec![1.0],
        3 => vec![0.25, 0.5, 0.25],
        5 => vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
        7 => vec![
            0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125,
        ],
        _ => {
            let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
            let scale = -0.5 / (sigma * sigma);
            let center = (size / 2) as f32;
            let raw: Vec<f32> = (0..size)
                .map(|i| {
                    let d = i as f32 - center;
                    (scale * d * d).exp()
                })
                .collect();
            let total: f32 = raw.iter().sum();
            raw.into_iter().map(|w| w / total).collect()
        }
    }
}

/// Horizontal then vertical pass of the same kernel, replicated borders
fn separable_mean(image: &GrayImage, kernel: &[f32]) -> GrayImage {
    let (width, height) = image.dimensions();
    let radius = (kernel.len() / 2) as i64;

    let mut horizontal = vec![0.0f32; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let sum: f32 = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    let sx = replicate(x as i64 + k as i64 - radius, width);
                    w * image.get_pixel(sx, y).0[0] as f32
                })
                .sum();
            horizontal[(y * width + x) as usize] = sum;
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let sum: f32 = kernel
            .iter()
            .enumerate()
            .map(|(k, w)| {
                let sy = replicate(y as i64 + k as i64 - radius, height);
                w * horizontal[(sy * width + x) as usize]
            })
            .sum();
        Luma([sum.round().clamp(0.0, 255.0) as u8])
    })
}
