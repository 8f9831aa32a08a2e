use super::reflect_101;
use crate::error::OcrError;
use image::{GrayImage, Luma};
use std::fmt;

const BINS: usize = 256;

/// Contrast-limited adaptive histogram equalization parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaheParams {
    pub clip_limit: f32,
    pub tiles_x: u32,
    pub tiles_y: u32,
}

impl ClaheParams {
    /// Square tile grid, the only shape the binarizer uses
    pub const fn new(clip_limit: f32, tiles: u32) -> Self {
        Self {
            clip_limit,
            tiles_x: tiles,
            tiles_y: tiles,
        }
    }
}

impl fmt::Display for ClaheParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "clip_limit={}, tile_grid={}x{}",
            self.clip_limit, self.tiles_x, self.tiles_y
        )
    }
}

/// Apply CLAHE.
///
/// The image is split into `tiles_x * tiles_y` tiles (padded by reflection when
/// the size is not a multiple of the grid). Each tile gets its own equalization
/// LUT built from a clipped histogram, and every output pixel is a bilinear
/// blend of the LUTs of the four nearest tile centres.
pub fn apply(image: &GrayImage, params: ClaheParams) -> Result<GrayImage, OcrError> {
    if params.tiles_x == 0 || params.tiles_y == 0 {
        return Err(OcrError::operation(
            "clahe",
            params.to_string(),
            "tile grid must be at least 1x1",
        ));
    }
    if !params.clip_limit.is_finite() || params.clip_limit < 0.0 {
        return Err(OcrError::operation(
            "clahe",
            params.to_string(),
            "clip limit must be a non-negative number",
        ));
    }

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Ok(image.clone());
    }

    let tile_w = width.div_ceil(params.tiles_x);
    let tile_h = height.div_ceil(params.tiles_y);
    let tile_area = tile_w * tile_h;

    let clip = if params.clip_limit > 0.0 {
        ((params.clip_limit * tile_area as f32 / BINS as f32) as u32).max(1)
    } else {
        0
    };

    let luts: Vec<[u8; BINS]> = (0..params.tiles_y)
        .flat_map(|ty| (0..params.tiles_x).map(move |tx| (tx, ty)))
        .map(|(tx, ty)| {
            let mut hist = tile_histogram(image, tx * tile_w, ty * tile_h, tile_w, tile_h);
            if clip > 0 {
                clip_histogram(&mut hist, clip);
            }
            build_lut(&hist, tile_area)
        })
        .collect();

    let lut_at = |tx: u32, ty: u32| &luts[(ty * params.tiles_x + tx) as usize];
    let inv_tw = 1.0 / tile_w as f32;
    let inv_th = 1.0 / tile_h as f32;

    Ok(GrayImage::from_fn(width, height, |x, y| {
        let (ty1, ty2, ya) = neighbours(y as f32 * inv_th - 0.5, params.tiles_y);
        let (tx1, tx2, xa) = neighbours(x as f32 * inv_tw - 0.5, params.tiles_x);
        let v = image.get_pixel(x, y).0[0] as usize;

        let top = lut_at(tx1, ty1)[v] as f32 * (1.0 - xa) + lut_at(tx2, ty1)[v] as f32 * xa;
        let bottom = lut_at(tx1, ty2)[v] as f32 * (1.0 - xa) + lut_at(tx2, ty2)[v] as f32 * xa;
        let blended = top * (1.0 - ya) + bottom * ya;

        Luma([blended.round().clamp(0.0, 255.0) as u8])
    }))
}

/// Tile indices on both sides of a position in tile space, plus the weight
/// of the second one. Indices are clamped to the grid, the weight is not.
fn neighbours(pos: f32, tiles: u32) -> (u32, u32, f32) {
    let first = pos.floor();
    let weight = pos - first;
    let first = first as i64;
    let lo = first.max(0) as u32;
    let hi = (first + 1).min(tiles as i64 - 1) as u32;
    (lo, hi, weight)
}

fn tile_histogram(image: &GrayImage, x0: u32, y0: u32, w: u32, h: u32) -> [u32; BINS] {
    let (width, height) = image.dimensions();
    let mut hist = [0u32; BINS];
    for y in y0..y0 + h {
        let sy = reflect_101(y as i64, height);
        for x in x0..x0 + w {
            let sx = reflect_101(x as i64, width);
            hist[image.get_pixel(sx, sy).0[0] as usize] += 1;
        }
    }
    hist
}

/// Clip every bin at `limit` and hand the excess back out: an even share to
/// all bins first, then the remainder one by one at a fixed stride.
fn clip_histogram(hist: &mut [u32; BINS], limit: u32) {
    let mut clipped = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            clipped += *bin - limit;
            *bin = limit;
        }
    }

    let batch = clipped / BINS as u32;
    let mut residual = clipped - batch * BINS as u32;
    for bin in hist.iter_mut() {
        *bin += batch;
    }

    if residual > 0 {
        let step = (BINS as u32 / residual).max(1) as usize;
        for bin in hist.iter_mut().step_by(step) {
            if residual == 0 {
                break;
            }
            *bin += 1;
            residual -= 1;
        }
    }
}

fn build_lut(hist: &[u32; BINS], tile_area: u32) -> [u8; BINS] {
    let scale = (BINS - 1) as f32 / tile_area as f32;
    let mut lut = [0u8; BINS];
    let mut sum = 0u32;
    for (entry, &count) in lut.iter_mut().zip(hist.iter()) {
        sum += count;
        *entry = (sum as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clahe_changes_uniform_dark_image() {
        let img = GrayImage::from_pixel(20, 20, Luma([50]));

        let result = apply(&img, ClaheParams::new(1.4, 6)).unwrap();

        assert_eq!(result.dimensions(), (20, 20));
        assert_ne!(result, img);
        // Every tile sees the same histogram, so the output stays uniform
        let first = result.get_pixel(0, 0).0[0];
        assert!(result.pixels().all(|p| p.0[0] == first));
    }

    #[test]
    fn test_clahe_increases_local_contrast() {
        // Low-contrast stripes around 120..136
        let img = GrayImage::from_fn(48, 48, |x, _| Luma([if x % 4 < 2 { 120 } else { 136 }]));

        let result = apply(&img, ClaheParams::new(2.0, 6)).unwrap();

        let spread = |g: &GrayImage| {
            let (lo, hi) = g
                .pixels()
                .fold((255u8, 0u8), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
            hi - lo
        };
        assert!(spread(&result) > spread(&img));
    }

    #[test]
    fn test_clahe_handles_image_smaller_than_grid() {
        let img = GrayImage::from_fn(3, 2, |x, y| Luma([(x * 40 + y * 10) as u8]));
        let result = apply(&img, ClaheParams::new(1.4, 6)).unwrap();
        assert_eq!(result.dimensions(), (3, 2));
    }

    #[test]
    fn test_clahe_rejects_empty_grid() {
        let img = GrayImage::new(10, 10);
        let err = apply(&img, ClaheParams::new(1.4, 0)).unwrap_err();
        assert!(matches!(
            err,
            OcrError::ImageOperationFailed {
                operator: "clahe",
                ..
            }
        ));
    }

    #[test]
    fn test_clip_histogram_preserves_total() {
        let mut hist = [0u32; BINS];
        hist[50] = 400;
        hist[200] = 20;
        clip_histogram(&mut hist, 10);
        assert_eq!(hist.iter().sum::<u32>(), 420);
        assert!(hist[50] <= 12);
    }
}
