use crate::error::OcrError;
use image::{imageops, RgbImage};

/// Images darker than this on average are treated as white-on-black.
pub const DARK_MODE_MEAN: f64 = 100.0;

/// Mean over every channel value of the image.
pub fn mean_intensity(image: &RgbImage) -> f64 {
    let samples = image.as_raw();
    if samples.is_empty() {
        return 0.0;
    }
    let sum: u64 = samples.iter().map(|&v| v as u64).sum();
    sum as f64 / samples.len() as f64
}

pub fn is_dark_mode(image: &RgbImage) -> bool {
    mean_intensity(image) < DARK_MODE_MEAN
}

/// Flip dark-mode documents to black-on-white. Runs once per image.
pub fn apply(mut image: RgbImage) -> Result<RgbImage, OcrError> {
    if is_dark_mode(&image) {
        imageops::invert(&mut image);
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_black_image_becomes_white() {
        let img = RgbImage::from_pixel(50, 50, Rgb([0, 0, 0]));
        let result = apply(img).unwrap();
        assert!(result.pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn test_white_image_is_untouched() {
        let img = RgbImage::from_pixel(50, 50, Rgb([255, 255, 255]));
        let result = apply(img.clone()).unwrap();
        assert_eq!(result, img);
    }

    #[test]
    fn test_threshold_is_strict() {
        // mean exactly 100 stays as it is
        let img = RgbImage::from_pixel(8, 8, Rgb([100, 100, 100]));
        assert!(!is_dark_mode(&img));
        let img = RgbImage::from_pixel(8, 8, Rgb([99, 100, 100]));
        assert!(is_dark_mode(&img));
    }

    #[test]
    fn test_inversion_is_per_channel() {
        let img = RgbImage::from_pixel(3, 3, Rgb([10, 20, 30]));
        let result = apply(img).unwrap();
        assert_eq!(result.get_pixel(1, 1).0, [245, 235, 225]);
    }
}
