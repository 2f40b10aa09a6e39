//! Streaming output formatters.
//!
//! A formatter turns the finalized record stream into a stream of output
//! string chunks: header first, then the directory tree, then one section
//! per file as it arrives, then the footer. All six formats share the
//! record model and the tree renderer.

mod json;
mod markdown;
mod ndjson;
mod sarif;
mod tree;
mod tree_render;
pub mod writer;
mod xml;

pub use tree_render::{render_tree, TreeEntry};

use crate::cancellation::CancellationToken;
use crate::core_types::{Encoding, FileContent, FileRecord};
use crate::errors::{Error, Result};
use crate::options::OutputFormat;
use base64::Engine;
use chrono::{SecondsFormat, Utc};
use crossbeam_channel::{bounded, Receiver};
use std::thread;

/// Everything a formatter knows before the first record arrives.
#[derive(Debug, Clone)]
pub struct FormatMeta {
    /// RFC 3339 generation timestamp.
    pub generated_at: String,
    /// Number of files that will be emitted.
    pub file_count: usize,
    /// Sum of file sizes in bytes.
    pub total_size: u64,
    /// The scan base, as given by the caller.
    pub base_path: String,
    /// Optional user instructions carried into the header.
    pub instructions: Option<String>,
    /// Annotate the tree with sizes.
    pub show_size: bool,
    /// Emit header and tree only.
    pub only_tree: bool,
    /// Every record's `{path, size}`, in emission order.
    pub tree_entries: Vec<TreeEntry>,
}

impl FormatMeta {
    /// Builds the metadata for a known record list.
    pub fn from_entries(
        base_path: String,
        tree_entries: Vec<TreeEntry>,
        instructions: Option<String>,
        show_size: bool,
        only_tree: bool,
    ) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            file_count: tree_entries.len(),
            total_size: tree_entries.iter().map(|entry| entry.size).sum(),
            base_path,
            instructions,
            show_size,
            only_tree,
            tree_entries,
        }
    }
}

/// Receives chunks from a formatter. `chunk` returns an error once the
/// consumer has gone away, which formatters propagate to stop early.
pub trait ChunkSink {
    /// Delivers one chunk.
    fn chunk(&mut self, chunk: String) -> Result<()>;
}

/// A formatter renders the record stream into chunks, in order: header,
/// tree, per-file sections, footer.
pub trait OutputFormatter: Send + Sync {
    /// Writes the whole document into `out`.
    fn write(
        &self,
        meta: &FormatMeta,
        records: &mut dyn Iterator<Item = Result<FileRecord>>,
        out: &mut dyn ChunkSink,
    ) -> Result<()>;
}

/// Selects the formatter for a format.
pub fn formatter_for(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Xml => Box::new(xml::XmlFormatter),
        OutputFormat::Json => Box::new(json::JsonFormatter),
        OutputFormat::Markdown => Box::new(markdown::MarkdownFormatter),
        OutputFormat::Tree => Box::new(tree::TreeFormatter),
        OutputFormat::Ndjson => Box::new(ndjson::NdjsonFormatter),
        OutputFormat::Sarif => Box::new(sarif::SarifFormatter),
    }
}

/// Whether a format may emit records in completion order instead of input
/// order.
pub fn allows_completion_order(format: OutputFormat) -> bool {
    matches!(format, OutputFormat::Ndjson)
}

struct StringSink {
    buffer: String,
}

impl ChunkSink for StringSink {
    fn chunk(&mut self, chunk: String) -> Result<()> {
        self.buffer.push_str(&chunk);
        Ok(())
    }
}

/// Renders the whole document into one string.
pub fn render_to_string(
    format: OutputFormat,
    meta: &FormatMeta,
    records: &mut dyn Iterator<Item = Result<FileRecord>>,
) -> Result<String> {
    let formatter = formatter_for(format);
    let mut sink = StringSink {
        buffer: String::new(),
    };
    formatter.write(meta, records, &mut sink)?;
    Ok(sink.buffer)
}

struct ChannelSink {
    sender: crossbeam_channel::Sender<Result<String>>,
}

impl ChunkSink for ChannelSink {
    fn chunk(&mut self, chunk: String) -> Result<()> {
        self.sender
            .send(Ok(chunk))
            .map_err(|_| Error::Output("output consumer disconnected".into()))
    }
}

/// A stream of rendered chunks backed by a formatter thread. Dropping the
/// stream early disconnects the channel, which stops the formatter and,
/// transitively, the pipeline and walker feeding it.
pub struct ChunkStream {
    receiver: Receiver<Result<String>>,
    token: CancellationToken,
    aborted: bool,
}

impl ChunkStream {
    /// Spawns the formatter on a background thread.
    pub fn spawn<I>(
        format: OutputFormat,
        meta: FormatMeta,
        records: I,
        token: CancellationToken,
        capacity: usize,
    ) -> Self
    where
        I: Iterator<Item = Result<FileRecord>> + Send + 'static,
    {
        let (sender, receiver) = bounded(capacity.max(1));
        thread::spawn(move || {
            let formatter = formatter_for(format);
            let mut records = records;
            let mut sink = ChannelSink {
                sender: sender.clone(),
            };
            if let Err(e) = formatter.write(&meta, &mut records, &mut sink) {
                // A disconnected consumer is normal early termination;
                // anything else is surfaced on the stream.
                if !matches!(&e, Error::Output(msg) if msg.contains("disconnected")) {
                    let _ = sender.send(Err(e));
                }
            }
        });
        Self {
            receiver,
            token,
            aborted: false,
        }
    }
}

impl Iterator for ChunkStream {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.aborted {
            return None;
        }
        if self.token.is_cancelled() {
            self.aborted = true;
            return Some(Err(Error::ScanAborted));
        }
        match self.receiver.recv() {
            Ok(item) => {
                if item.is_err() {
                    self.aborted = true;
                }
                Some(item)
            }
            Err(_) => None,
        }
    }
}

/// The JSON object shared by the JSON, NDJSON, and SARIF emitters.
pub(crate) fn file_json(record: &FileRecord) -> serde_json::Value {
    let content = match &record.content {
        Some(FileContent::Text(text)) | Some(FileContent::Placeholder(text)) => {
            serde_json::Value::String(text.clone())
        }
        Some(FileContent::Bytes(bytes)) => serde_json::Value::String(
            base64::engine::general_purpose::STANDARD.encode(bytes),
        ),
        None => serde_json::Value::Null,
    };
    let mut object = serde_json::json!({
        "path": record.path,
        "size": record.size,
        "encoding": record.encoding,
        "content": content,
    });
    if let Some(modified) = record.modified_epoch() {
        object["modified"] = serde_json::json!(modified);
    }
    if let Some(is_binary) = record.is_binary {
        object["isBinary"] = serde_json::json!(is_binary);
    }
    if !record.trail.is_empty() {
        object["transformedBy"] = serde_json::json!(record.trail);
    }
    if !record.metadata.is_empty() {
        object["metadata"] = serde_json::json!(record.metadata);
    }
    if let Some(error) = &record.error {
        object["error"] = serde_json::json!(error);
        object["transformed"] = serde_json::json!(false);
    }
    object
}

pub(crate) fn encoding_label(encoding: Encoding) -> &'static str {
    match encoding {
        Encoding::Utf8 => "utf8",
        Encoding::Base64 => "base64",
        Encoding::Binary => "binary",
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::path::PathBuf;

    /// A loaded text record for formatter tests.
    pub fn text_record(path: &str, content: &str) -> FileRecord {
        let mut record = FileRecord::new(
            path.into(),
            PathBuf::from("/base").join(path),
            content.len() as u64,
            None,
        );
        record.is_binary = Some(false);
        record.content = Some(FileContent::Text(content.into()));
        record
    }

    pub fn meta_for(records: &[FileRecord]) -> FormatMeta {
        FormatMeta::from_entries(
            "/base".into(),
            records
                .iter()
                .map(|record| TreeEntry {
                    path: record.path.clone(),
                    size: record.size,
                })
                .collect(),
            None,
            false,
            false,
        )
    }

    pub fn render(
        format: OutputFormat,
        meta: &FormatMeta,
        records: Vec<FileRecord>,
    ) -> String {
        render_to_string(format, meta, &mut records.into_iter().map(Ok)).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn meta_counts_and_sums() {
        let records = vec![text_record("a.txt", "A\n"), text_record("b.txt", "B")];
        let meta = meta_for(&records);
        assert_eq!(meta.file_count, 2);
        assert_eq!(meta.total_size, 3);
        assert!(meta.generated_at.ends_with('Z'));
    }

    #[test]
    fn file_json_shape() {
        let mut record = text_record("src/a.rs", "fn a() {}");
        record.trail = vec!["loader".into()];
        let value = file_json(&record);
        assert_eq!(value["path"], "src/a.rs");
        assert_eq!(value["content"], "fn a() {}");
        assert_eq!(value["encoding"], "utf8");
        assert_eq!(value["transformedBy"][0], "loader");
    }

    #[test]
    fn chunk_stream_survives_early_drop() {
        let records = vec![text_record("a.txt", "A"), text_record("b.txt", "B")];
        let meta = meta_for(&records);
        let mut stream = ChunkStream::spawn(
            OutputFormat::Xml,
            meta,
            records.into_iter().map(Ok),
            CancellationToken::new(),
            1,
        );
        assert!(stream.next().unwrap().is_ok());
        drop(stream);
    }
}
