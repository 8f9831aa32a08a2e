//! Per-request temporary files for the OCR engine.

use crate::error::OcrError;
use crate::preprocessing::intermediate::safe_stem;
use image::{GrayImage, ImageFormat};
use std::path::PathBuf;
use tempfile::TempDir;

const DIR_PREFIX: &str = "ocr_";

/// Temporary directory owning every file written for one request.
///
/// The directory is removed when the value is dropped, whatever path the
/// request took. Removal errors are logged, never returned.
#[derive(Debug)]
pub struct Scratch {
    dir: Option<TempDir>,
    path: PathBuf,
    id: String,
}

impl Scratch {
    pub fn new() -> Result<Self, OcrError> {
        let dir = tempfile::Builder::new()
            .prefix(DIR_PREFIX)
            .tempdir()
            .map_err(|e| OcrError::Internal(format!("Failed to create temp dir: {}", e)))?;

        let path = dir.path().to_path_buf();
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().trim_start_matches(DIR_PREFIX).to_string())
            .unwrap_or_default();

        Ok(Self {
            dir: Some(dir),
            path,
            id,
        })
    }

    /// Random identifier of this request, also used for intermediate images
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Write a preprocessed image as PNG for the engine to read
    pub fn write_image(
        &self,
        index: usize,
        file_name: &str,
        image: &GrayImage,
    ) -> Result<PathBuf, OcrError> {
        let path = self
            .path
            .join(format!("{}_{}.png", index, safe_stem(file_name)));
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| OcrError::Internal(format!("Failed to write temp image: {}", e)))?;
        Ok(path)
    }

    /// Path to hand to the engine: the image itself for a single image, or a
    /// list file with one path per line for several.
    pub fn engine_input(&self, image_paths: &[PathBuf]) -> Result<PathBuf, OcrError> {
        match image_paths {
            [] => Err(OcrError::MissingFile),
            [single] => Ok(single.clone()),
            many => {
                let list = many
                    .iter()
                    .map(|p| p.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("\n");
                let path = self.path.join("batch.txt");
                std::fs::write(&path, list).map_err(|e| {
                    OcrError::Internal(format!("Failed to write batch list: {}", e))
                })?;
                Ok(path)
            }
        }
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => tracing::debug!("Removed temp dir {:?}", self.path),
                Err(e) => tracing::warn!("Failed to remove temp dir {:?}: {}", self.path, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_single_image_is_used_directly() {
        let scratch = Scratch::new().unwrap();
        let img = GrayImage::from_pixel(4, 4, Luma([255]));

        let path = scratch.write_image(0, "a.jpg", &img).unwrap();
        let input = scratch.engine_input(std::slice::from_ref(&path)).unwrap();

        assert_eq!(input, path);
        assert_eq!(path.file_name().unwrap(), "0_a.png");
        assert!(path.exists());
    }

    #[test]
    fn test_batch_list_file_keeps_order() {
        let scratch = Scratch::new().unwrap();
        let img = GrayImage::from_pixel(4, 4, Luma([255]));
        let paths: Vec<PathBuf> = ["x.png", "y.png", "z.png"]
            .iter()
            .enumerate()
            .map(|(i, name)| scratch.write_image(i, name, &img).unwrap())
            .collect();

        let input = scratch.engine_input(&paths).unwrap();

        let listed = std::fs::read_to_string(&input).unwrap();
        let listed: Vec<PathBuf> = listed.lines().map(PathBuf::from).collect();
        assert_eq!(listed, paths);
    }

    #[test]
    fn test_no_images_is_missing_file() {
        let scratch = Scratch::new().unwrap();
        assert!(matches!(
            scratch.engine_input(&[]),
            Err(OcrError::MissingFile)
        ));
    }

    #[test]
    fn test_files_are_removed_on_drop() {
        let scratch = Scratch::new().unwrap();
        let img = GrayImage::from_pixel(2, 2, Luma([0]));
        let file = scratch.write_image(0, "b.png", &img).unwrap();
        let dir = file.parent().unwrap().to_path_buf();
        assert!(file.exists());

        drop(scratch);

        assert!(!file.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_id_is_not_empty() {
        let scratch = Scratch::new().unwrap();
        assert!(!scratch.id().is_empty());
        assert!(!scratch.id().starts_with(DIR_PREFIX));
    }
}
