//! Built-in content transformers: HTML strip, Markdown link strip,
//! first-N-lines, CSV head, and line numbering.

use super::{
    extension_of, DataType, TransformContext, Transformer, TransformerBucket,
    TransformerDescriptor,
};
use crate::constants::LINE_NUMBER_WIDTH;
use crate::core_types::{FileContent, FileRecord};
use crate::errors::Result;
use once_cell::sync::Lazy;
use regex::Regex;

fn text_of(record: &FileRecord) -> Option<&str> {
    match &record.content {
        Some(FileContent::Text(text)) => Some(text),
        _ => None,
    }
}

fn replace_text(record: &mut FileRecord, text: String, transformer: &str) {
    record.size = text.len() as u64;
    record.content = Some(FileContent::Text(text));
    record.mark_transformed(transformer);
}

/// Strips tags from HTML files and decodes the common entities.
#[derive(Clone)]
pub struct HtmlStrip {
    descriptor: TransformerDescriptor,
}

static SCRIPT_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)\b.*?</(script|style)>").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

impl HtmlStrip {
    pub fn new() -> Self {
        Self {
            descriptor: TransformerDescriptor::new(
                "html-strip",
                TransformerBucket::Converter,
                &[DataType::Html],
                &[DataType::Text],
            ),
        }
    }

    fn strip(input: &str) -> String {
        let without_blocks = SCRIPT_STYLE.replace_all(input, "");
        let without_tags = TAG.replace_all(&without_blocks, "");
        let decoded = without_tags
            .replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&amp;", "&");
        BLANK_RUNS.replace_all(decoded.trim(), "\n\n").into_owned()
    }
}

impl Default for HtmlStrip {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for HtmlStrip {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn can_transform(&self, record: &FileRecord) -> bool {
        matches!(extension_of(&record.path).as_deref(), Some("html" | "htm"))
            && text_of(record).is_some()
    }

    fn apply(&self, mut record: FileRecord, _ctx: &TransformContext) -> Result<FileRecord> {
        if let Some(text) = text_of(&record) {
            let stripped = Self::strip(text);
            replace_text(&mut record, stripped, "html-strip");
        }
        Ok(record)
    }
}

/// Replaces Markdown links with their text and drops reference
/// definitions.
#[derive(Clone)]
pub struct MarkdownLinkStrip {
    descriptor: TransformerDescriptor,
}

static INLINE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").unwrap());
static REFERENCE_DEF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\[[^\]]+\]:\s+\S+.*$\n?").unwrap());

impl MarkdownLinkStrip {
    pub fn new() -> Self {
        Self {
            descriptor: TransformerDescriptor::new(
                "markdown-link-strip",
                TransformerBucket::Converter,
                &[DataType::Markdown],
                &[DataType::Markdown],
            ),
        }
    }
}

impl Default for MarkdownLinkStrip {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for MarkdownLinkStrip {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn can_transform(&self, record: &FileRecord) -> bool {
        matches!(
            extension_of(&record.path).as_deref(),
            Some("md" | "markdown")
        ) && text_of(record).is_some()
    }

    fn apply(&self, mut record: FileRecord, _ctx: &TransformContext) -> Result<FileRecord> {
        if let Some(text) = text_of(&record) {
            let without_links = INLINE_LINK.replace_all(text, "$1");
            let cleaned = REFERENCE_DEF.replace_all(&without_links, "").into_owned();
            replace_text(&mut record, cleaned, "markdown-link-strip");
        }
        Ok(record)
    }
}

/// Keeps only the first N lines of a file.
#[derive(Clone)]
pub struct FirstLines {
    descriptor: TransformerDescriptor,
}

impl FirstLines {
    const DEFAULT_LINES: usize = 20;

    pub fn new() -> Self {
        Self {
            descriptor: TransformerDescriptor::new(
                "first-lines",
                TransformerBucket::Converter,
                &[DataType::Text],
                &[DataType::Text],
            ),
        }
    }
}

impl Default for FirstLines {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for FirstLines {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn can_transform(&self, record: &FileRecord) -> bool {
        text_of(record).is_some()
    }

    fn apply(&self, mut record: FileRecord, ctx: &TransformContext) -> Result<FileRecord> {
        let limit = ctx.options["lines"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(Self::DEFAULT_LINES);
        if let Some(text) = text_of(&record) {
            let total = text.lines().count();
            if total > limit {
                let mut truncated: String = text
                    .lines()
                    .take(limit)
                    .map(|line| format!("{line}\n"))
                    .collect();
                truncated.push_str(&format!("[... truncated after {limit} lines]\n"));
                record
                    .metadata
                    .insert("truncated_lines".into(), serde_json::json!(total - limit));
                replace_text(&mut record, truncated, "first-lines");
            } else {
                record.mark_transformed("first-lines");
            }
        }
        Ok(record)
    }
}

/// Keeps the CSV header plus the first N data rows.
#[derive(Clone)]
pub struct CsvHead {
    descriptor: TransformerDescriptor,
}

impl CsvHead {
    const DEFAULT_ROWS: usize = 10;

    pub fn new() -> Self {
        Self {
            descriptor: TransformerDescriptor::new(
                "csv-head",
                TransformerBucket::Converter,
                &[DataType::Structured],
                &[DataType::Structured],
            ),
        }
    }
}

impl Default for CsvHead {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for CsvHead {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn can_transform(&self, record: &FileRecord) -> bool {
        matches!(extension_of(&record.path).as_deref(), Some("csv" | "tsv"))
            && text_of(record).is_some()
    }

    fn apply(&self, mut record: FileRecord, ctx: &TransformContext) -> Result<FileRecord> {
        let rows = ctx.options["rows"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(Self::DEFAULT_ROWS);
        if let Some(text) = text_of(&record) {
            let total_rows = text.lines().count().saturating_sub(1);
            if total_rows > rows {
                let mut truncated: String = text
                    .lines()
                    .take(rows + 1)
                    .map(|line| format!("{line}\n"))
                    .collect();
                truncated.push_str(&format!("[... {} more rows]\n", total_rows - rows));
                record
                    .metadata
                    .insert("total_rows".into(), serde_json::json!(total_rows));
                replace_text(&mut record, truncated, "csv-head");
            } else {
                record.mark_transformed("csv-head");
            }
        }
        Ok(record)
    }
}

/// Prefixes each content line with a right-aligned line number.
///
/// Not idempotent: a second application would number the gutter itself,
/// so the registry refuses to schedule it twice.
#[derive(Clone)]
pub struct LineNumbers {
    descriptor: TransformerDescriptor,
}

impl LineNumbers {
    pub fn new() -> Self {
        let mut descriptor = TransformerDescriptor::new(
            "line-numbers",
            TransformerBucket::Converter,
            &[DataType::Text],
            &[DataType::Text],
        );
        descriptor.idempotent = false;
        Self { descriptor }
    }
}

impl Default for LineNumbers {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for LineNumbers {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn can_transform(&self, record: &FileRecord) -> bool {
        text_of(record).is_some()
    }

    fn apply(&self, mut record: FileRecord, _ctx: &TransformContext) -> Result<FileRecord> {
        if let Some(text) = text_of(&record) {
            let numbered: String = text
                .lines()
                .enumerate()
                .map(|(i, line)| format!("{:>width$}: {line}\n", i + 1, width = LINE_NUMBER_WIDTH))
                .collect();
            replace_text(&mut record, numbered, "line-numbers");
        }
        Ok(record)
    }
}
