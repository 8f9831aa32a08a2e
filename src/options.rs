//! Per-request OCR options.
//!
//! Requests carry an optional `options` JSON string. It is merged once over
//! the defaults of the endpoint into an immutable [`RequestOptions`].

use crate::error::OcrError;
use serde::{Deserialize, Serialize};

/// Keys that only make sense for endpoints returning text
pub const TEXT_ONLY_OPTIONS: [&str; 2] = ["intra_block_breaks", "keep_details"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Ocr,
    OcrBatch,
    OcrToPdf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestOptions {
    /// Tesseract language codes joined by `+`
    pub lang: String,
    pub optimize_images: bool,
    pub save_intermediate: bool,
    /// Newline between boxes stacked on top of each other inside a block
    pub intra_block_breaks: bool,
    /// Return the block/box hierarchy instead of plain page content
    pub keep_details: bool,
    /// Tesseract page segmentation mode
    pub psm: Option<u32>,
    pub preserve_interword_spaces: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Lang {
    One(String),
    Many(Vec<String>),
}

impl Lang {
    fn joined(self) -> String {
        match self {
            Lang::One(lang) => lang,
            Lang::Many(langs) => langs.join("+"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct OptionOverrides {
    lang: Option<Lang>,
    optimize_images: Option<bool>,
    save_intermediate: Option<bool>,
    intra_block_breaks: Option<bool>,
    keep_details: Option<bool>,
    psm: Option<u32>,
    preserve_interword_spaces: Option<u32>,
}

impl RequestOptions {
    pub fn defaults(endpoint: Endpoint, default_language: &str) -> Self {
        Self {
            lang: default_language.to_string(),
            optimize_images: endpoint == Endpoint::OcrToPdf,
            save_intermediate: false,
            intra_block_breaks: true,
            keep_details: false,
            psm: None,
            preserve_interword_spaces: None,
        }
    }

    /// Merge the raw `options` form value over the endpoint defaults.
    /// A missing or blank value yields the defaults.
    pub fn parse(
        endpoint: Endpoint,
        default_language: &str,
        raw: Option<&str>,
    ) -> Result<Self, OcrError> {
        let mut options = Self::defaults(endpoint, default_language);

        let raw = match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(options),
        };

        let overrides: OptionOverrides = serde_json::from_str(raw)
            .map_err(|e| OcrError::InvalidRequest(format!("Invalid options: {}", e)))?;

        if endpoint == Endpoint::OcrToPdf {
            if overrides.intra_block_breaks.is_some() {
                return Err(OcrError::UnsupportedOption(TEXT_ONLY_OPTIONS[0].to_string()));
            }
            if overrides.keep_details.is_some() {
                return Err(OcrError::UnsupportedOption(TEXT_ONLY_OPTIONS[1].to_string()));
            }
        }

        if let Some(lang) = overrides.lang {
            options.lang = lang.joined();
        }
        if options.lang.trim().is_empty() {
            return Err(OcrError::InvalidRequest(
                "Option `lang` must not be empty".to_string(),
            ));
        }

        if let Some(v) = overrides.optimize_images {
            options.optimize_images = v;
        }
        if let Some(v) = overrides.save_intermediate {
            options.save_intermediate = v;
        }
        if let Some(v) = overrides.intra_block_breaks {
            options.intra_block_breaks = v;
        }
        if let Some(v) = overrides.keep_details {
            options.keep_details = v;
        }
        options.psm = overrides.psm.or(options.psm);
        options.preserve_interword_spaces = overrides
            .preserve_interword_spaces
            .or(options.preserve_interword_spaces);

        Ok(options)
    }

    /// Extra engine flags derived from the options
    pub fn engine_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if let Some(psm) = self.psm {
            flags.push("--psm".to_string());
            flags.push(psm.to_string());
        }
        if let Some(preserve) = self.preserve_interword_spaces {
            flags.push("-c".to_string());
            flags.push(format!("preserve_interword_spaces={}", preserve));
        }
        flags
    }
}
