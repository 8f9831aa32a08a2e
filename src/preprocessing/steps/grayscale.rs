use crate::error::OcrError;
use image::{GrayImage, Luma, RgbImage};

/// BT.601 luma weights in 14-bit fixed point (0.299, 0.587, 0.114)
const R_WEIGHT: u32 = 4899;
const G_WEIGHT: u32 = 9617;
const B_WEIGHT: u32 = 1868;
const SHIFT: u32 = 14;

/// Convert the color image to a single-channel image.
/// Every step after this one works on grayscale only.
///
/// The brightness thresholds of the binarizer are calibrated against BT.601
/// luma, so this does not use the Rec.709 weights of `into_luma8`.
pub fn apply(image: RgbImage) -> Result<GrayImage, OcrError> {
    let (width, height) = image.dimensions();
    Ok(GrayImage::from_fn(width, height, |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        Luma([luma(r, g, b)])
    }))
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = r as u32 * R_WEIGHT + g as u32 * G_WEIGHT + b as u32 * B_WEIGHT;
    // weights sum to 1 << SHIFT, so the result never exceeds 255
    ((weighted + (1 << (SHIFT - 1))) >> SHIFT) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_grayscale_uses_bt601_weights() {
        let mut img = RgbImage::new(10, 10);
        img.put_pixel(0, 0, Rgb([255, 0, 0])); // Red
        img.put_pixel(1, 0, Rgb([0, 255, 0])); // Green
        img.put_pixel(2, 0, Rgb([0, 0, 255])); // Blue

        let gray = apply(img).unwrap();

        assert_eq!(gray.get_pixel(0, 0).0[0], 76);
        assert_eq!(gray.get_pixel(1, 0).0[0], 150);
        assert_eq!(gray.get_pixel(2, 0).0[0], 29);
    }

    #[test]
    fn test_grayscale_tinted_pixel() {
        // Rec.709 would give 196 here
        assert_eq!(luma(248, 182, 182), 202);
    }

    #[test]
    fn test_grayscale_keeps_neutral_values() {
        for v in [0u8, 1, 137, 254, 255] {
            let img = RgbImage::from_pixel(4, 4, Rgb([v, v, v]));
            let gray = apply(img).unwrap();
            assert!(gray.pixels().all(|p| p.0[0] == v), "value {v}");
        }
    }

    #[test]
    fn test_grayscale_preserves_dimensions() {
        let img = RgbImage::new(100, 50);
        let result = apply(img).unwrap();
        assert_eq!(result.dimensions(), (100, 50));
    }
}
