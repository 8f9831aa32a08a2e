use crate::preprocessing::Variants;
use crate::Args;
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub default_language: String,
    pub max_file_size: usize,
    pub tesseract_cmd: String,
    pub tessdata_path: Option<String>,
    /// Where `save_intermediate` writes stage images
    pub intermediate_dir: PathBuf,
    /// Window side of the darkest-patch scan
    pub patch_size: u32,
    pub variants: Variants,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9292,
            default_language: "eng+deu".to_string(),
            max_file_size: 52_428_800,
            tesseract_cmd: "tesseract".to_string(),
            tessdata_path: None,
            intermediate_dir: PathBuf::from("shared-assets"),
            patch_size: crate::preprocessing::analyzer::DEFAULT_PATCH_SIZE,
            variants: Variants::default(),
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            default_language: args.default_language,
            max_file_size: args.max_file_size,
            tesseract_cmd: args.tesseract_cmd,
            tessdata_path: args.tessdata_path,
            intermediate_dir: args.intermediate_dir,
            patch_size: args.patch_size,
            variants: Variants {
                dark: args.dark_variant,
                normal: args.normal_variant,
            },
        }
    }
}

