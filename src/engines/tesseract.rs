//! Tesseract engine driven through its command line interface
//!
//! Each call spawns `tesseract <input> stdout ...` and reads the rendered
//! output from stdout. Calls block, so callers run them on the blocking pool.

use crate::config::Config;
use crate::engine::{EngineRequest, OcrEngine};
use crate::error::OcrError;
use std::path::Path;
use std::process::{Command, Output};

pub struct TesseractEngine {
    /// Executable name or path
    command: String,
    /// Passed as `--tessdata-dir` when set
    tessdata_path: Option<String>,
}

impl TesseractEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            command: config.tesseract_cmd.clone(),
            tessdata_path: config.tessdata_path.clone(),
        }
    }

    fn recognize(
        &self,
        input: &Path,
        request: &EngineRequest,
        renderer: &str,
    ) -> Result<Vec<u8>, OcrError> {
        let mut command = Command::new(&self.command);
        command.arg(input).arg("stdout");
        self.tessdata_args(&mut command);
        command
            .arg("-l")
            .arg(&request.lang)
            .args(&request.flags)
            .arg(renderer);

        tracing::debug!("Running {:?}", command);
        let output = self.run(command)?;
        Ok(output.stdout)
    }

    fn run(&self, mut command: Command) -> Result<Output, OcrError> {
        let output = command.output().map_err(|e| {
            OcrError::EngineError(format!("Failed to run `{}`: {}", self.command, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::EngineError(format!(
                "`{}` exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(output)
    }

    fn tessdata_args(&self, command: &mut Command) {
        if let Some(tessdata) = &self.tessdata_path {
            command.arg("--tessdata-dir").arg(tessdata);
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn version(&self) -> Result<String, OcrError> {
        let mut command = Command::new(&self.command);
        command.arg("--version");
        let output = self.run(command)?;
        // older releases print the version on stderr
        let text = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        parse_version(&String::from_utf8_lossy(&text))
            .ok_or_else(|| OcrError::EngineError("Unrecognized version output".to_string()))
    }

    fn languages(&self) -> Result<Vec<String>, OcrError> {
        let mut command = Command::new(&self.command);
        self.tessdata_args(&mut command);
        command.arg("--list-langs");
        let output = self.run(command)?;
        Ok(parse_languages(&String::from_utf8_lossy(&output.stdout)))
    }

    fn image_to_data(&self, input: &Path, request: &EngineRequest) -> Result<String, OcrError> {
        let stdout = self.recognize(input, request, "tsv")?;
        String::from_utf8(stdout)
            .map_err(|e| OcrError::EngineError(format!("TSV output is not UTF-8: {}", e)))
    }

    fn image_to_pdf(&self, input: &Path, request: &EngineRequest) -> Result<Vec<u8>, OcrError> {
        let pdf = self.recognize(input, request, "pdf")?;
        if !pdf.starts_with(b"%PDF-") {
            return Err(OcrError::EngineError(
                "Engine did not produce a PDF".to_string(),
            ));
        }
        Ok(pdf)
    }
}

/// `tesseract 5.3.0` -> `5.3.0`
fn parse_version(output: &str) -> Option<String> {
    let first = output.lines().find(|l| !l.trim().is_empty())?.trim();
    let version = first.strip_prefix("tesseract").map(str::trim).unwrap_or(first);
    (!version.is_empty()).then(|| version.to_string())
}

/// Skips the `List of available languages ...:` header
fn parse_languages(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of available languages"))
        .map(str::to_string)
        .collect()
}
