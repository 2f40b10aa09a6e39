//! The abstract summarizer seam and the heavy `ai-summary` transformer.
//!
//! Provider clients are external collaborators; the core only sees the
//! [`Summarizer`] trait. Results land in the record's metadata under
//! `ai_summary` and are cacheable by content hash.

use super::{
    DataType, TransformContext, Transformer, TransformerBucket, TransformerDescriptor,
};
use crate::core_types::{FileContent, FileRecord};
use crate::errors::{Error, Result};
use std::sync::Arc;

/// Produces a short summary of a file's text. Implementations live outside
/// the core (AI providers); tests use fakes.
pub trait Summarizer: Send + Sync {
    /// Summarizes one file.
    fn summarize(&self, path: &str, text: &str) -> Result<String>;

    /// Summarizes several files in one call. The default loops; batching
    /// backends override it. One result per input, failures independent.
    fn summarize_batch(&self, inputs: &[(String, String)]) -> Vec<Result<String>> {
        inputs
            .iter()
            .map(|(path, text)| self.summarize(path, text))
            .collect()
    }
}

/// Heavy transformer attaching an `ai_summary` metadata entry.
#[derive(Clone)]
pub struct AiSummary {
    descriptor: TransformerDescriptor,
    summarizer: Arc<dyn Summarizer>,
    /// Files larger than this are not worth a summary call.
    max_input_bytes: u64,
}

impl AiSummary {
    const DEFAULT_MAX_INPUT: u64 = 256 * 1024;

    /// Wraps a summarizer backend. `batch_size` above 1 lets the pipeline
    /// buffer eligible records into one backend call.
    pub fn new(summarizer: Arc<dyn Summarizer>, batch_size: usize) -> Self {
        let mut descriptor = TransformerDescriptor::new(
            "ai-summary",
            TransformerBucket::Heavy,
            &[DataType::Text],
            &[DataType::Text],
        );
        descriptor.heavy = true;
        descriptor.idempotent = false;
        descriptor.batch_size = batch_size.max(1);
        Self {
            descriptor,
            summarizer,
            max_input_bytes: Self::DEFAULT_MAX_INPUT,
        }
    }

    fn attach(record: &mut FileRecord, summary: String) {
        record
            .metadata
            .insert("ai_summary".into(), serde_json::Value::String(summary));
        record.mark_transformed("ai-summary");
    }
}

impl Transformer for AiSummary {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn can_transform(&self, record: &FileRecord) -> bool {
        record.size <= self.max_input_bytes
            && matches!(record.content, Some(FileContent::Text(_)))
    }

    fn apply(&self, mut record: FileRecord, _ctx: &TransformContext) -> Result<FileRecord> {
        let Some(FileContent::Text(text)) = &record.content else {
            return Ok(record);
        };
        let summary =
            self.summarizer
                .summarize(&record.path, text)
                .map_err(|e| Error::Transformer {
                    transformer: "ai-summary".into(),
                    path: record.path.clone(),
                    reason: e.to_string(),
                })?;
        Self::attach(&mut record, summary);
        Ok(record)
    }

    fn apply_batch(
        &self,
        records: Vec<FileRecord>,
        _ctx: &TransformContext,
    ) -> Vec<Result<FileRecord>> {
        let inputs: Vec<(String, String)> = records
            .iter()
            .map(|record| {
                let text = record
                    .content
                    .as_ref()
                    .and_then(|c| c.as_text())
                    .unwrap_or_default()
                    .to_string();
                (record.path.clone(), text)
            })
            .collect();
        let summaries = self.summarizer.summarize_batch(&inputs);
        records
            .into_iter()
            .zip(summaries)
            .map(|(mut record, summary)| match summary {
                Ok(summary) => {
                    Self::attach(&mut record, summary);
                    Ok(record)
                }
                Err(e) => Err(Error::Transformer {
                    transformer: "ai-summary".into(),
                    path: record.path.clone(),
                    reason: e.to_string(),
                }),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSummarizer {
        calls: AtomicUsize,
    }

    impl Summarizer for FakeSummarizer {
        fn summarize(&self, path: &str, _text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("summary of {path}"))
        }
    }

    fn text_record(path: &str, content: &str) -> FileRecord {
        let mut record = FileRecord::new(
            path.into(),
            PathBuf::from("/base").join(path),
            content.len() as u64,
            None,
        );
        record.content = Some(FileContent::Text(content.into()));
        record
    }

    #[test]
    fn summary_lands_in_metadata() {
        let summarizer = Arc::new(FakeSummarizer {
            calls: AtomicUsize::new(0),
        });
        let transformer = AiSummary::new(summarizer, 1);
        let out = transformer
            .apply(text_record("src/lib.rs", "pub fn x() {}"), &TransformContext::empty())
            .unwrap();
        assert_eq!(
            out.metadata["ai_summary"],
            serde_json::json!("summary of src/lib.rs")
        );
        assert!(out.trail.contains(&"ai-summary".to_string()));
    }

    #[test]
    fn batch_failures_are_per_record() {
        struct Flaky;
        impl Summarizer for Flaky {
            fn summarize(&self, path: &str, _text: &str) -> Result<String> {
                if path.ends_with("bad.rs") {
                    Err(Error::Validation("backend refused".into()))
                } else {
                    Ok("ok".into())
                }
            }
        }
        let transformer = AiSummary::new(Arc::new(Flaky), 2);
        let results = transformer.apply_batch(
            vec![text_record("good.rs", "a"), text_record("bad.rs", "b")],
            &TransformContext::empty(),
        );
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn oversized_records_not_eligible() {
        let summarizer = Arc::new(FakeSummarizer {
            calls: AtomicUsize::new(0),
        });
        let transformer = AiSummary::new(summarizer, 1);
        let mut record = text_record("huge.txt", "x");
        record.size = 10 * 1024 * 1024;
        assert!(!transformer.can_transform(&record));
    }

    #[test]
    fn descriptor_is_heavy_and_scheduled_last() {
        let t = AiSummary::new(
            Arc::new(FakeSummarizer {
                calls: AtomicUsize::new(0),
            }),
            4,
        );
        assert!(t.descriptor().heavy);
        assert_eq!(t.descriptor().bucket, TransformerBucket::Heavy);
        assert_eq!(t.descriptor().batch_size, 4);
    }
}
