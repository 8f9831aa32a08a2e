use crate::error::OcrError;
use image::RgbImage;

/// Gain applied before grayscale conversion when optimizing.
pub const ALPHA: f32 = 1.1;
/// Offset applied before grayscale conversion when optimizing.
pub const BETA: f32 = 0.0;

/// Global linear contrast stretch: `saturate(round(|v * alpha + beta|))`.
pub fn apply(image: RgbImage) -> Result<RgbImage, OcrError> {
    scale_abs(image, ALPHA, BETA)
}

pub fn scale_abs(mut image: RgbImage, alpha: f32, beta: f32) -> Result<RgbImage, OcrError> {
    if !alpha.is_finite() || !beta.is_finite() {
        return Err(OcrError::operation(
            "scale_abs",
            format!("alpha={alpha}, beta={beta}"),
            "gain and offset must be finite",
        ));
    }

    for value in image.iter_mut() {
        let scaled = (*value as f32 * alpha + beta).abs().round();
        *value = scaled.min(255.0) as u8;
    }

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_contrast_scales_and_saturates() {
        let mut img = RgbImage::from_pixel(2, 1, Rgb([100, 200, 240]));
        img.put_pixel(1, 0, Rgb([0, 10, 255]));

        let result = apply(img).unwrap();

        assert_eq!(result.get_pixel(0, 0).0, [110, 220, 255]);
        assert_eq!(result.get_pixel(1, 0).0, [0, 11, 255]);
    }

    #[test]
    fn test_contrast_rejects_non_finite_gain() {
        let img = RgbImage::new(2, 2);
        assert!(scale_abs(img, f32::NAN, 0.0).is_err());
    }
}
