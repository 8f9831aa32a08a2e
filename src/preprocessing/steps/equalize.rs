use crate::error::OcrError;
use image::GrayImage;
use imageproc::contrast::equalize_histogram;

/// Global histogram equalization
pub fn apply(image: &GrayImage) -> Result<GrayImage, OcrError> {
    Ok(equalize_histogram(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_equalize_spreads_narrow_histogram() {
        let img = GrayImage::from_fn(16, 16, |x, _| Luma([100 + (x % 8) as u8]));

        let result = apply(&img).unwrap();

        let max = result.pixels().map(|p| p.0[0]).max().unwrap();
        let min = result.pixels().map(|p| p.0[0]).min().unwrap();
        assert!(max - min > 7);
        assert_eq!(result.dimensions(), (16, 16));
    }
}
