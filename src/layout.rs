//! Tesseract TSV output -> pages -> blocks -> word boxes.

use crate::error::OcrError;
use serde::Serialize;
use std::collections::HashMap;

/// Boxes below this confidence are dropped
const MIN_CONFIDENCE: f32 = 1.0;

const REQUIRED_COLUMNS: [&str; 8] = [
    "page_num", "block_num", "left", "top", "width", "height", "conf", "text",
];

/// One recognized word with its position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordBox {
    pub level: i32,
    pub page_num: i32,
    pub block_num: i32,
    pub par_num: i32,
    pub line_num: i32,
    pub word_num: i32,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    pub conf: f32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    /// Tesseract block number
    pub block: i32,
    pub text: String,
    pub boxes: Vec<WordBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub page: i32,
    /// Name of the uploaded file this page came from
    pub file: Option<String>,
    /// Block texts separated by blank lines (without `keep_details`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Full hierarchy (with `keep_details`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<Block>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutOptions {
    pub intra_block_breaks: bool,
    pub keep_details: bool,
}

/// Parse TSV rows, keeping confident word boxes only
pub fn parse_tsv(tsv: &str) -> Result<Vec<WordBox>, OcrError> {
    let mut lines = tsv.lines();
    let header = match lines.next() {
        Some(header) if !header.trim().is_empty() => header,
        _ => return Ok(Vec::new()),
    };

    let columns: HashMap<&str, usize> = header
        .split('\t')
        .enumerate()
        .map(|(i, name)| (name.trim(), i))
        .collect();

    if let Some(missing) = REQUIRED_COLUMNS.iter().find(|c| !columns.contains_key(*c)) {
        return Err(OcrError::EngineError(format!(
            "TSV output is missing column `{}`",
            missing
        )));
    }

    let mut boxes = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let values: Vec<&str> = line.split('\t').collect();
        let field = |name: &str| {
            columns
                .get(name)
                .and_then(|&i| values.get(i))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };
        let int = |name: &str| field(name).and_then(|v| v.parse::<i32>().ok());

        let parsed = (|| {
            Some(WordBox {
                level: int("level").unwrap_or(0),
                page_num: int("page_num")?,
                block_num: int("block_num")?,
                par_num: int("par_num").unwrap_or(0),
                line_num: int("line_num").unwrap_or(0),
                word_num: int("word_num").unwrap_or(0),
                left: int("left")?,
                top: int("top")?,
                width: int("width")?,
                height: int("height")?,
                conf: field("conf")?.parse().ok()?,
                text: columns
                    .get("text")
                    .and_then(|&i| values.get(i))
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            })
        })();

        match parsed {
            Some(word) if word.conf >= MIN_CONFIDENCE => boxes.push(word),
            Some(_) => {}
            None => tracing::debug!("Skipping invalid TSV row: {:?}", line),
        }
    }

    Ok(boxes)
}

/// Group TSV output into pages and blocks.
///
/// `file_names` are the uploads in engine input order. A single upload owns
/// every page; otherwise page `n` belongs to upload `n - 1`.
pub fn build_pages(
    file_names: &[String],
    tsv: &str,
    options: LayoutOptions,
) -> Result<Vec<Page>, OcrError> {
    let boxes = parse_tsv(tsv)?;

    let mut grouped: Vec<(i32, Vec<(i32, Vec<WordBox>)>)> = Vec::new();
    for word in boxes {
        if grouped.last().map(|(page, _)| *page) != Some(word.page_num) {
            grouped.push((word.page_num, Vec::new()));
        }
        let Some((_, blocks)) = grouped.last_mut() else {
            continue;
        };
        if blocks.last().map(|(block, _)| *block) != Some(word.block_num) {
            blocks.push((word.block_num, Vec::new()));
        }
        if let Some((_, words)) = blocks.last_mut() {
            words.push(word);
        }
    }

    let pages = grouped
        .into_iter()
        .map(|(page, blocks)| {
            let blocks: Vec<Block> = blocks
                .into_iter()
                .filter_map(|(block, boxes)| {
                    let text = block_text(&boxes, options.intra_block_breaks);
                    (!text.is_empty()).then_some(Block { block, text, boxes })
                })
                .collect();

            let file = if file_names.len() == 1 {
                file_names.first().cloned()
            } else {
                usize::try_from(page - 1)
                    .ok()
                    .and_then(|i| file_names.get(i))
                    .cloned()
            };

            if options.keep_details {
                Page {
                    page,
                    file,
                    content: None,
                    blocks: Some(blocks),
                }
            } else {
                let content = blocks
                    .iter()
                    .map(|b| b.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                Page {
                    page,
                    file,
                    content: Some(content),
                    blocks: None,
                }
            }
        })
        .collect();

    Ok(pages)
}

/// Join box texts with a newline when a box starts below the bottom edge of
/// the previous one, with a space otherwise.
fn block_text(boxes: &[WordBox], intra_block_breaks: bool) -> String {
    let mut text = String::new();
    let mut previous_bottom: Option<i32> = None;
    for word in boxes {
        match previous_bottom {
            Some(bottom) if intra_block_breaks && bottom < word.top => text.push('\n'),
            _ => text.push(' '),
        }
        text.push_str(&word.text);
        previous_bottom = Some(word.top + word.height);
    }
    text.trim().to_string()
}
