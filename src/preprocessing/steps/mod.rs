//! Individual preprocessing steps

pub mod bilateral;
pub mod clahe;
pub mod contrast;
pub mod equalize;
pub mod grayscale;
pub mod invert;
pub mod morphology;
pub mod threshold;

/// Map a possibly out-of-range coordinate back into `0..len` by mirroring
/// around the edge pixels without repeating them (`gfedcb|abcdefgh|gfedcba`).
pub(crate) fn reflect_101(index: i64, len: u32) -> u32 {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len as i64 - 1);
    let folded = index.rem_euclid(period);
    if folded < len as i64 {
        folded as u32
    } else {
        (period - folded) as u32
    }
}

/// Clamp a coordinate to the nearest edge pixel (`aaaaaa|abcdefgh|hhhhhhh`).
pub(crate) fn replicate(index: i64, len: u32) -> u32 {
    index.clamp(0, len as i64 - 1) as u32
}
