//! Debug snapshots of the pipeline stages (`save_intermediate`).

use image::{GrayImage, ImageFormat, RgbImage};
use std::path::{Path, PathBuf};

/// Writes stage images as `<request>_<index>_<stage><stem>.png` into one
/// directory. Failures are logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct Intermediates {
    dir: PathBuf,
    prefix: String,
    stem: String,
}

impl Intermediates {
    pub fn new(dir: impl Into<PathBuf>, request_id: &str, index: usize, file_name: &str) -> Self {
        Self {
            dir: dir.into(),
            prefix: format!("{request_id}_{index}_"),
            stem: safe_stem(file_name),
        }
    }

    pub fn path_for(&self, stage: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}{}.png", self.prefix, stage, self.stem))
    }

    pub fn save(&self, stage: &str, image: &GrayImage) {
        self.write(stage, |path| image.save_with_format(path, ImageFormat::Png));
    }

    pub fn save_rgb(&self, stage: &str, image: &RgbImage) {
        self.write(stage, |path| image.save_with_format(path, ImageFormat::Png));
    }

    fn write<F>(&self, stage: &str, save: F)
    where
        F: FnOnce(&Path) -> image::ImageResult<()>,
    {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            tracing::warn!("Failed to create intermediate dir {:?}: {}", self.dir, e);
            return;
        }
        let path = self.path_for(stage);
        match save(&path) {
            Ok(()) => tracing::debug!("Saved intermediate image {:?}", path),
            Err(e) => tracing::warn!("Failed to save intermediate image {:?}: {}", path, e),
        }
    }
}

/// File stem of an uploaded file name, reduced to characters that are safe
/// in a flat directory.
pub fn safe_stem(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_safe_stem() {
        assert_eq!(safe_stem("scan 01.png"), "scan_01");
        assert_eq!(safe_stem("../../etc/passwd"), "passwd");
        assert_eq!(safe_stem(""), "upload");
        assert_eq!(safe_stem("résumé.jpg"), "r_sum_");
    }

    #[test]
    fn test_saves_stage_images() {
        let dir = tempfile::tempdir().unwrap();
        let intermediates = Intermediates::new(dir.path(), "abc", 2, "page.jpg");

        intermediates.save("t1_", &GrayImage::from_pixel(4, 4, Luma([9])));

        let expected = dir.path().join("abc_2_t1_page.png");
        assert_eq!(intermediates.path_for("t1_"), expected);
        assert!(expected.exists());
    }
}
