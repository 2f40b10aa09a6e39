//! The transformer model: typed descriptors, the `Transformer` trait, and
//! the built-in transformer set.
//!
//! Transformers are registered once at startup and never mutated. Each is
//! a pure function from `FileRecord` to `FileRecord` with declared traits;
//! scheduling derives entirely from the descriptor (bucket, heaviness,
//! batching), never from string-keyed dispatch.

pub mod filters;
pub mod loader;
pub mod pipeline;
pub mod registry;
pub mod summarize;

pub use pipeline::{PipelineConfig, RecordStream, TransformPipeline};
pub use registry::TransformerRegistry;
pub use summarize::Summarizer;

use crate::core_types::FileRecord;
use crate::errors::Result;
use dyn_clone::DynClone;

/// Content type labels a transformer consumes or produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Plain text.
    Text,
    /// Raw bytes.
    Binary,
    /// Structured data (JSON, CSV).
    Structured,
    /// Markdown text.
    Markdown,
    /// HTML text.
    Html,
}

/// Scheduling bucket. For a given record the chain runs filters first,
/// loaders second, converters third, and heavy transformers last; ties
/// within a bucket break by the profile's declared order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransformerBucket {
    /// Record-level probes and gates that run before content exists.
    Filter,
    /// Content population (the mandatory loader).
    Loader,
    /// Content rewriting on loaded records.
    Converter,
    /// Resource-intensive work (network, OCR, LLM); cacheable.
    Heavy,
}

/// Static description of one transformer. Registered at process start and
/// never mutated thereafter.
#[derive(Debug, Clone)]
pub struct TransformerDescriptor {
    /// Kebab-case identifier.
    pub name: &'static str,
    /// Version string folded into cache keys.
    pub version: &'static str,
    /// Scheduling bucket.
    pub bucket: TransformerBucket,
    /// Labels of accepted inputs. Must be non-empty.
    pub input_types: &'static [DataType],
    /// Labels of produced outputs. Must be non-empty.
    pub output_types: &'static [DataType],
    /// Re-application yields identical output.
    pub idempotent: bool,
    /// Resource-intensive; scheduled last, bounded by the heavy
    /// semaphore, and eligible for the on-disk cache.
    pub heavy: bool,
    /// Records buffered per batch call; 1 disables batching.
    pub batch_size: usize,
    /// External tools required; probed at registration, and the
    /// transformer is skipped when any is missing.
    pub dependencies: &'static [&'static str],
    /// Transformers that must not be enabled together with this one.
    pub conflicts_with: &'static [&'static str],
}

impl TransformerDescriptor {
    /// A minimal descriptor with the common defaults.
    pub const fn new(
        name: &'static str,
        bucket: TransformerBucket,
        input_types: &'static [DataType],
        output_types: &'static [DataType],
    ) -> Self {
        Self {
            name,
            version: "1",
            bucket,
            input_types,
            output_types,
            idempotent: true,
            heavy: false,
            batch_size: 1,
            dependencies: &[],
            conflicts_with: &[],
        }
    }
}

/// Context handed to every `apply` call.
pub struct TransformContext {
    /// Options from the active profile for this transformer, when any.
    pub options: serde_json::Value,
}

impl TransformContext {
    /// Context without options.
    pub fn empty() -> Self {
        Self {
            options: serde_json::Value::Null,
        }
    }
}

/// A pure record transformer with declared traits.
///
/// `apply` consumes the record and yields a new logical record; a
/// transformer never mutates shared state. Failures are localized: the
/// pipeline catches the error, returns the record unmodified with its
/// `error` field set, and continues.
pub trait Transformer: DynClone + Send + Sync {
    /// The static descriptor.
    fn descriptor(&self) -> &TransformerDescriptor;

    /// Cheap predicate deciding whether this transformer applies to a
    /// record (typically an extension and/or size check).
    fn can_transform(&self, record: &FileRecord) -> bool;

    /// Transforms one record.
    fn apply(&self, record: FileRecord, ctx: &TransformContext) -> Result<FileRecord>;

    /// Transforms a batch. The default applies records one by one;
    /// transformers advertising `batch_size > 1` override this. Results
    /// are positional: one per input record, failures independent.
    fn apply_batch(
        &self,
        records: Vec<FileRecord>,
        ctx: &TransformContext,
    ) -> Vec<Result<FileRecord>> {
        records
            .into_iter()
            .map(|record| self.apply(record, ctx))
            .collect()
    }
}

dyn_clone::clone_trait_object!(Transformer);

/// Extension of `path`, lowercased, without the dot.
pub(crate) fn extension_of(path: &str) -> Option<String> {
    let basename = path.rsplit('/').next()?;
    let (stem, ext) = basename.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_order_schedules_heavy_last() {
        assert!(TransformerBucket::Filter < TransformerBucket::Loader);
        assert!(TransformerBucket::Loader < TransformerBucket::Converter);
        assert!(TransformerBucket::Converter < TransformerBucket::Heavy);
    }

    #[test]
    fn extension_lowercased() {
        assert_eq!(extension_of("src/Main.RS"), Some("rs".to_string()));
        assert_eq!(extension_of("a/b/Makefile"), None);
        assert_eq!(extension_of(".gitignore"), None);
    }
}
