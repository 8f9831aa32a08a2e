use super::reflect_101;
use crate::error::OcrError;
use image::{GrayImage, Luma};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BilateralParams {
    /// Diameter of the pixel neighbourhood
    pub diameter: u32,
    pub sigma_color: f32,
    pub sigma_space: f32,
}

impl BilateralParams {
    pub const fn new(diameter: u32, sigma_color: f32, sigma_space: f32) -> Self {
        Self {
            diameter,
            sigma_color,
            sigma_space,
        }
    }
}

impl fmt::Display for BilateralParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "d={}, sigma_color={}, sigma_space={}",
            self.diameter, self.sigma_color, self.sigma_space
        )
    }
}

/// Edge-preserving smoothing.
/// Each output pixel is a weighted mean over a circular neighbourhood, where
/// the weight falls off with both distance and intensity difference.
pub fn apply(image: &GrayImage, params: BilateralParams) -> Result<GrayImage, OcrError> {
    if !params.sigma_color.is_finite() || !params.sigma_space.is_finite() {
        return Err(OcrError::operation(
            "bilateral_filter",
            params.to_string(),
            "sigmas must be finite",
        ));
    }

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Ok(image.clone());
    }

    let sigma_color = if params.sigma_color <= 0.0 { 1.0 } else { params.sigma_color };
    let sigma_space = if params.sigma_space <= 0.0 { 1.0 } else { params.sigma_space };
    let radius = if params.diameter > 0 {
        (params.diameter / 2) as i64
    } else {
        (sigma_space * 1.5).round() as i64
    }
    .max(1);

    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    let color_weights: Vec<f32> = (0..256)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f32;
            if r2.sqrt() > radius as f32 {
                continue;
            }
            offsets.push((dx, dy, (r2 * space_coeff).exp()));
        }
    }

    Ok(GrayImage::from_fn(width, height, |x, y| {
        let center = image.get_pixel(x, y).0[0] as i32;
        let mut sum = 0.0f32;
        let mut weight_sum = 0.0f32;
        for &(dx, dy, space_weight) in &offsets {
            let sx = reflect_101(x as i64 + dx, width);
            let sy = reflect_101(y as i64 + dy, height);
            let value = image.get_pixel(sx, sy).0[0] as i32;
            let weight = space_weight * color_weights[(value - center).unsigned_abs() as usize];
            sum += weight * value as f32;
            weight_sum += weight;
        }
        Luma([(sum / weight_sum).round().clamp(0.0, 255.0) as u8])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bilateral_keeps_uniform_image() {
        let img = GrayImage::from_pixel(12, 12, Luma([77]));
        let result = apply(&img, BilateralParams::new(6, 40.0, 60.0)).unwrap();
        assert_eq!(result, img);
    }

    #[test]
    fn test_bilateral_preserves_strong_edge() {
        let img = GrayImage::from_fn(20, 10, |x, _| Luma([if x < 10 { 30 } else { 220 }]));

        let result = apply(&img, BilateralParams::new(4, 40.0, 70.0)).unwrap();

        // A 190-level step is far outside sigma_color, so both sides stay put
        assert!(result.get_pixel(9, 5).0[0] < 40);
        assert!(result.get_pixel(10, 5).0[0] > 210);
    }

    #[test]
    fn test_bilateral_smooths_small_noise() {
        let mut img = GrayImage::from_pixel(9, 9, Luma([128]));
        img.put_pixel(4, 4, Luma([140]));

        let result = apply(&img, BilateralParams::new(6, 40.0, 60.0)).unwrap();

        assert!(result.get_pixel(4, 4).0[0] < 140);
    }
}
