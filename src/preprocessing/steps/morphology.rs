use crate::error::OcrError;
use image::{GrayImage, Luma};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};

/// Side length of the square structuring element used for stroke closing
pub const CLOSE_KERNEL: u32 = 2;

/// Largest kernel side a [`Mask`] can hold
const MAX_KERNEL: u32 = 511;

/// Grayscale dilation with a `kernel_w x kernel_h` rectangle anchored at its centre
pub fn dilate(
    image: &GrayImage,
    kernel_w: u32,
    kernel_h: u32,
    iterations: u32,
) -> Result<GrayImage, OcrError> {
    morph("dilate", image, kernel_w, kernel_h, iterations, grayscale_dilate)
}

/// Grayscale erosion with a `kernel_w x kernel_h` rectangle anchored at its centre
pub fn erode(
    image: &GrayImage,
    kernel_w: u32,
    kernel_h: u32,
    iterations: u32,
) -> Result<GrayImage, OcrError> {
    morph("erode", image, kernel_w, kernel_h, iterations, grayscale_erode)
}

fn morph(
    operator: &'static str,
    image: &GrayImage,
    kernel_w: u32,
    kernel_h: u32,
    iterations: u32,
    op: fn(&GrayImage, &Mask) -> GrayImage,
) -> Result<GrayImage, OcrError> {
    let mask = rectangle(kernel_w, kernel_h).ok_or_else(|| {
        OcrError::operation(
            operator,
            format!("kernel={kernel_w}x{kernel_h}, iterations={iterations}"),
            format!("kernel sides must be within 1..={MAX_KERNEL}"),
        )
    })?;

    let mut current = image.clone();
    for _ in 0..iterations {
        current = op(&current, &mask);
    }
    Ok(current)
}

/// Filled rectangle with its anchor at `(w / 2, h / 2)`. Samples falling
/// outside the image are ignored by the imageproc operators.
fn rectangle(kernel_w: u32, kernel_h: u32) -> Option<Mask> {
    if !(1..=MAX_KERNEL).contains(&kernel_w) || !(1..=MAX_KERNEL).contains(&kernel_h) {
        return None;
    }
    let anchor_x = u8::try_from(kernel_w / 2).ok()?;
    let anchor_y = u8::try_from(kernel_h / 2).ok()?;
    let shape = GrayImage::from_pixel(kernel_w, kernel_h, Luma([255]));
    Some(Mask::from_image(&shape, anchor_x, anchor_y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dilate_grows_bright_pixel_down_and_right() {
        let mut img = GrayImage::from_pixel(5, 5, Luma([0]));
        img.put_pixel(2, 2, Luma([255]));

        let result = dilate(&img, 2, 2, 1).unwrap();

        // 2x2 kernel anchored at (1, 1) looks at offsets -1..=0
        for (x, y) in [(2, 2), (3, 2), (2, 3), (3, 3)] {
            assert_eq!(result.get_pixel(x, y).0[0], 255, "({x}, {y})");
        }
        assert_eq!(result.get_pixel(1, 2).0[0], 0);
        assert_eq!(result.get_pixel(2, 1).0[0], 0);
    }

    #[test]
    fn test_erode_removes_isolated_bright_pixel() {
        let mut img = GrayImage::from_pixel(5, 5, Luma([0]));
        img.put_pixel(2, 2, Luma([255]));

        let result = erode(&img, 2, 2, 1).unwrap();

        assert!(result.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_closing_fills_one_pixel_gap_in_dark_stroke() {
        // White page, black horizontal stroke with a single white gap
        let mut img = GrayImage::from_pixel(10, 5, Luma([255]));
        for x in 1..9 {
            img.put_pixel(x, 2, Luma([0]));
        }
        img.put_pixel(5, 2, Luma([255]));

        // erode of the white background == dilate of the dark stroke
        let eroded = erode(&img, 2, 2, 1).unwrap();
        let closed = dilate(&eroded, 2, 2, 1).unwrap();

        // the even kernel moves the stroke one row down
        assert_eq!(closed.get_pixel(5, 3).0[0], 0);
        assert_eq!(closed.get_pixel(5, 2).0[0], 255);
    }

    #[test]
    fn test_morph_rejects_empty_kernel() {
        let img = GrayImage::new(4, 4);
        assert!(dilate(&img, 0, 2, 1).is_err());
        assert!(erode(&img, 2, 600, 1).is_err());
    }

    #[test]
    fn test_matches_nested_loop_reference() {
        let mut state = 99u32;
        let img = GrayImage::from_fn(31, 17, |_, _| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            Luma([(state >> 24) as u8])
        });

        // out-of-range neighbours are skipped; the anchor is always in range
        let reference = |pick: fn(u8, u8) -> u8| {
            GrayImage::from_fn(31, 17, |x, y| {
                let mut acc = img.get_pixel(x, y).0[0];
                for (dx, dy) in [(1, 0), (0, 1), (1, 1)] {
                    if x >= dx && y >= dy {
                        acc = pick(acc, img.get_pixel(x - dx, y - dy).0[0]);
                    }
                }
                Luma([acc])
            })
        };

        assert_eq!(dilate(&img, 2, 2, 1).unwrap(), reference(u8::max));
        assert_eq!(erode(&img, 2, 2, 1).unwrap(), reference(u8::min));
    }

    #[test]
    fn test_iterations_repeat_the_operator() {
        let mut img = GrayImage::from_pixel(6, 6, Luma([0]));
        img.put_pixel(1, 1, Luma([255]));

        let twice = dilate(&img, 2, 2, 2).unwrap();
        let chained = dilate(&dilate(&img, 2, 2, 1).unwrap(), 2, 2, 1).unwrap();

        assert_eq!(twice, chained);
        assert_eq!(twice.get_pixel(3, 3).0[0], 255);
    }
}
