use crate::error::OcrError;
use crate::options::RequestOptions;
use std::path::Path;

/// Parameters passed to the engine for one recognition run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    /// Language codes joined by `+`
    pub lang: String,
    /// Extra command line flags such as `--psm 6`
    pub flags: Vec<String>,
}

impl From<&RequestOptions> for EngineRequest {
    fn from(options: &RequestOptions) -> Self {
        Self {
            lang: options.lang.clone(),
            flags: options.engine_flags(),
        }
    }
}

/// Trait that all OCR engines must implement
///
/// `input` is either an image or a text file listing one image path per
/// line; list files produce one page per listed image.
pub trait OcrEngine: Send + Sync {
    /// Returns the engine identifier
    fn name(&self) -> &'static str;

    /// Engine version string
    fn version(&self) -> Result<String, OcrError>;

    /// Installed recognition languages
    fn languages(&self) -> Result<Vec<String>, OcrError>;

    /// Recognize text and return the word table as TSV
    fn image_to_data(&self, input: &Path, request: &EngineRequest) -> Result<String, OcrError>;

    /// Recognize text and return a searchable PDF
    fn image_to_pdf(&self, input: &Path, request: &EngineRequest) -> Result<Vec<u8>, OcrError>;
}
