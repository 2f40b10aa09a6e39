//! The streaming NDJSON emitter: one JSON object per line. First line is
//! the metadata, then one line per file, last line the summary.

use super::{file_json, ChunkSink, FormatMeta, OutputFormatter};
use crate::core_types::FileRecord;
use crate::errors::{Error, Result};

pub struct NdjsonFormatter;

impl OutputFormatter for NdjsonFormatter {
    fn write(
        &self,
        meta: &FormatMeta,
        records: &mut dyn Iterator<Item = Result<FileRecord>>,
        out: &mut dyn ChunkSink,
    ) -> Result<()> {
        let metadata = serde_json::json!({
            "type": "metadata",
            "generated": meta.generated_at,
            "basePath": meta.base_path,
            "fileCount": meta.file_count,
            "totalSize": meta.total_size,
            "instructions": meta.instructions,
        });
        out.chunk(line(&metadata)?)?;

        let mut emitted = 0usize;
        if !meta.only_tree {
            for record in records {
                let record = record?;
                let mut value = file_json(&record);
                value["type"] = serde_json::json!("file");
                out.chunk(line(&value)?)?;
                emitted += 1;
            }
        }

        let summary = serde_json::json!({
            "type": "summary",
            "fileCount": emitted,
            "totalSize": meta.total_size,
        });
        out.chunk(line(&summary)?)?;
        Ok(())
    }
}

fn line(value: &serde_json::Value) -> Result<String> {
    serde_json::to_string(value)
        .map(|mut s| {
            s.push('\n');
            s
        })
        .map_err(|e| Error::Output(e.to_string()))
}
