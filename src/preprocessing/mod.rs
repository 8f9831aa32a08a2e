//! Image normalization for OCR
//!
//! Turns an uploaded document image into a (near-)binarized grayscale image.
//! The brightness analyzer measures the page and the binarizer picks one of
//! several enhancement strategies from those measurements.

pub mod analyzer;
pub mod binarizer;
pub mod intermediate;
pub mod pipeline;
pub mod steps;

pub use binarizer::{Binarizer, DarkVariant, NormalVariant, Variants};
pub use intermediate::Intermediates;
pub use pipeline::Pipeline;
