//! The binary probe and the mandatory content loader.
//!
//! The probe samples the head of a file and decides text vs binary before
//! any content exists. The loader then populates `content`: text files are
//! read with a byte ceiling and encoding detection, binary files follow
//! the per-category policy map.

use super::{
    extension_of, DataType, TransformContext, Transformer, TransformerBucket,
    TransformerDescriptor,
};
use crate::constants::{
    BINARY_SAMPLE_SIZE, DEFAULT_MAX_FILE_SIZE, NON_PRINTABLE_THRESHOLD,
};
use crate::core_types::{Encoding, FileContent, FileRecord};
use crate::errors::{Error, Result};
use base64::Engine;
use content_inspector::ContentType;
use log::debug;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::sync::Arc;

/// Category a binary file falls into, keyed by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BinaryCategory {
    /// Raster and vector images.
    Image,
    /// Audio and video.
    Media,
    /// Archives and compressed blobs.
    Archive,
    /// Executables and shared objects.
    Exec,
    /// Font files.
    Font,
    /// Database files.
    Database,
    /// Certificates and key material.
    Cert,
    /// Office and PDF documents.
    Document,
    /// Anything else that sampled as binary.
    Other,
    /// Not binary at all.
    Text,
}

/// What the loader does with a binary file of a given category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryAction {
    /// Replace content with a one-line descriptive comment (the default).
    Comment,
    /// Drop the record entirely.
    Skip,
    /// Replace content with a generic placeholder.
    Placeholder,
    /// Carry the raw bytes, base64-encoded.
    Base64,
    /// Hand the file to a registered document converter; falls back to
    /// `Comment` when conversion is unavailable or fails.
    Convert,
    /// Read it as (lossy) text anyway.
    Load,
}

/// Per-category action map.
#[derive(Debug, Clone)]
pub struct BinaryPolicy {
    actions: BTreeMap<BinaryCategory, BinaryAction>,
}

impl Default for BinaryPolicy {
    fn default() -> Self {
        let mut actions = BTreeMap::new();
        for category in [
            BinaryCategory::Image,
            BinaryCategory::Media,
            BinaryCategory::Archive,
            BinaryCategory::Exec,
            BinaryCategory::Font,
            BinaryCategory::Database,
            BinaryCategory::Cert,
            BinaryCategory::Document,
            BinaryCategory::Other,
        ] {
            actions.insert(category, BinaryAction::Comment);
        }
        actions.insert(BinaryCategory::Text, BinaryAction::Load);
        Self { actions }
    }
}

impl BinaryPolicy {
    /// Overrides the action for one category.
    pub fn set(&mut self, category: BinaryCategory, action: BinaryAction) {
        self.actions.insert(category, action);
    }

    /// The action for a category.
    pub fn action_for(&self, category: BinaryCategory) -> BinaryAction {
        self.actions
            .get(&category)
            .copied()
            .unwrap_or(BinaryAction::Comment)
    }
}

/// Converts a document file to text. The conversion itself is an external
/// collaborator; the core only defines the contract and the fallback.
pub trait DocumentConverter: Send + Sync {
    /// Produces a text rendition of the file, or an error to trigger the
    /// `Comment` fallback.
    fn convert(&self, record: &FileRecord) -> Result<String>;
}

/// Maps an extension to its binary category.
pub fn categorize(path: &str) -> BinaryCategory {
    let Some(ext) = extension_of(path) else {
        return BinaryCategory::Other;
    };
    match ext.as_str() {
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" | "ico" | "tiff" | "svg" => {
            BinaryCategory::Image
        }
        "mp3" | "wav" | "flac" | "ogg" | "mp4" | "mkv" | "avi" | "mov" | "webm" => {
            BinaryCategory::Media
        }
        "zip" | "tar" | "gz" | "bz2" | "xz" | "zst" | "7z" | "rar" | "jar" => {
            BinaryCategory::Archive
        }
        "exe" | "dll" | "so" | "dylib" | "bin" | "wasm" | "o" | "a" => BinaryCategory::Exec,
        "ttf" | "otf" | "woff" | "woff2" | "eot" => BinaryCategory::Font,
        "db" | "sqlite" | "sqlite3" | "mdb" => BinaryCategory::Database,
        "pem" | "crt" | "cer" | "der" | "p12" | "pfx" | "key" => BinaryCategory::Cert,
        "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "odt" => {
            BinaryCategory::Document
        }
        _ => BinaryCategory::Other,
    }
}

/// Decides text vs binary from a head sample: a null byte or more than 30%
/// non-printable bytes means binary, cross-checked with the inspector.
pub fn sample_is_binary(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }
    let non_printable = sample
        .iter()
        .filter(|&&b| b < 0x09 || (b > 0x0D && b < 0x20) || b == 0x7F)
        .count();
    if (non_printable as f64) / (sample.len() as f64) > NON_PRINTABLE_THRESHOLD {
        return true;
    }
    matches!(content_inspector::inspect(sample), ContentType::BINARY)
}

/// The binary probe: samples up to 8 KiB and sets `is_binary`.
#[derive(Clone)]
pub struct BinaryProbe {
    descriptor: TransformerDescriptor,
}

impl BinaryProbe {
    pub fn new() -> Self {
        Self {
            descriptor: TransformerDescriptor::new(
                "binary-probe",
                TransformerBucket::Filter,
                &[DataType::Binary, DataType::Text],
                &[DataType::Binary, DataType::Text],
            ),
        }
    }
}

impl Default for BinaryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for BinaryProbe {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn can_transform(&self, record: &FileRecord) -> bool {
        record.is_binary.is_none() && record.content.is_none()
    }

    fn apply(&self, mut record: FileRecord, _ctx: &TransformContext) -> Result<FileRecord> {
        let mut file = File::open(&record.absolute_path)
            .map_err(|e| transformer_error("binary-probe", &record, e.to_string()))?;
        let mut sample = vec![0u8; BINARY_SAMPLE_SIZE.min(record.size as usize).max(1)];
        let read = file
            .read(&mut sample)
            .map_err(|e| transformer_error("binary-probe", &record, e.to_string()))?;
        record.is_binary = Some(sample_is_binary(&sample[..read]));
        record.mark_transformed("binary-probe");
        Ok(record)
    }
}

/// The mandatory loader: populates `content` per the text path or the
/// binary-policy map.
#[derive(Clone)]
pub struct Loader {
    descriptor: TransformerDescriptor,
    policy: BinaryPolicy,
    byte_ceiling: u64,
    converter: Option<Arc<dyn DocumentConverter>>,
}

impl Loader {
    pub fn new(
        policy: BinaryPolicy,
        byte_ceiling: Option<u64>,
        converter: Option<Arc<dyn DocumentConverter>>,
    ) -> Self {
        Self {
            descriptor: TransformerDescriptor::new(
                "loader",
                TransformerBucket::Loader,
                &[DataType::Binary, DataType::Text],
                &[DataType::Text, DataType::Binary],
            ),
            policy,
            byte_ceiling: byte_ceiling.unwrap_or(DEFAULT_MAX_FILE_SIZE),
            converter,
        }
    }

    fn load_text(&self, record: &FileRecord) -> Result<String> {
        let bytes = self.read_capped(record)?;
        // Valid UTF-8 loads as-is; anything else degrades lossily so a
        // stray byte never drops a source file from the output.
        match String::from_utf8(bytes) {
            Ok(text) => Ok(text),
            Err(err) => {
                debug!("Lossy decode for {}", record.path);
                Ok(String::from_utf8_lossy(err.as_bytes()).into_owned())
            }
        }
    }

    fn read_capped(&self, record: &FileRecord) -> Result<Vec<u8>> {
        let file = File::open(&record.absolute_path)
            .map_err(|e| transformer_error("loader", record, e.to_string()))?;
        let mut bytes = Vec::with_capacity(record.size.min(self.byte_ceiling) as usize);
        file.take(self.byte_ceiling)
            .read_to_end(&mut bytes)
            .map_err(|e| transformer_error("loader", record, e.to_string()))?;
        Ok(bytes)
    }
}

impl Transformer for Loader {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn can_transform(&self, record: &FileRecord) -> bool {
        // Placeholder records (e.g. over the size limit) stay as they are.
        record.content.is_none()
    }

    fn apply(&self, mut record: FileRecord, _ctx: &TransformContext) -> Result<FileRecord> {
        let is_binary = record.is_binary.unwrap_or(false);
        if !is_binary {
            let text = self.load_text(&record)?;
            record.size = text.len() as u64;
            record.encoding = Encoding::Utf8;
            record.content = Some(FileContent::Text(text));
            record.mark_transformed("loader");
            return Ok(record);
        }

        let category = categorize(&record.path);
        let action = self.policy.action_for(category);
        match action {
            BinaryAction::Skip => {
                record.skipped = true;
            }
            BinaryAction::Comment => {
                record.encoding = Encoding::Binary;
                record.content = Some(FileContent::Placeholder(binary_comment(
                    category,
                    record.size,
                )));
            }
            BinaryAction::Placeholder => {
                record.encoding = Encoding::Binary;
                record.content =
                    Some(FileContent::Placeholder("[Binary file not included]".into()));
            }
            BinaryAction::Base64 => {
                let bytes = self.read_capped(&record)?;
                record.metadata.insert(
                    "base64_size".into(),
                    serde_json::json!(
                        base64::engine::general_purpose::STANDARD.encode(&bytes).len()
                    ),
                );
                record.encoding = Encoding::Base64;
                record.content = Some(FileContent::Bytes(bytes));
            }
            BinaryAction::Convert => match self.converter.as_ref() {
                Some(converter) => match converter.convert(&record) {
                    Ok(text) => {
                        record.size = text.len() as u64;
                        record.encoding = Encoding::Utf8;
                        record.content = Some(FileContent::Text(text));
                    }
                    Err(e) => {
                        debug!("Conversion failed for {}: {e}; using comment", record.path);
                        record.encoding = Encoding::Binary;
                        record.content = Some(FileContent::Placeholder(binary_comment(
                            category,
                            record.size,
                        )));
                    }
                },
                None => {
                    record.encoding = Encoding::Binary;
                    record.content = Some(FileContent::Placeholder(binary_comment(
                        category,
                        record.size,
                    )));
                }
            },
            BinaryAction::Load => {
                let text = self.load_text(&record)?;
                record.size = text.len() as u64;
                record.encoding = Encoding::Utf8;
                record.content = Some(FileContent::Text(text));
            }
        }
        record.mark_transformed("loader");
        Ok(record)
    }
}

fn binary_comment(category: BinaryCategory, size: u64) -> String {
    let label = format!("{category:?}").to_lowercase();
    format!("[Binary {label} file, {size} bytes]")
}

fn transformer_error(name: &str, record: &FileRecord, reason: String) -> Error {
    Error::Transformer {
        transformer: name.to_string(),
        path: record.path.clone(),
        reason,
    }
}
