//! The JSON emitter: one object `{metadata, files: […]}` streamed as
//! serde-produced fragments.

use super::{file_json, render_tree, ChunkSink, FormatMeta, OutputFormatter};
use crate::core_types::FileRecord;
use crate::errors::{Error, Result};

pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn write(
        &self,
        meta: &FormatMeta,
        records: &mut dyn Iterator<Item = Result<FileRecord>>,
        out: &mut dyn ChunkSink,
    ) -> Result<()> {
        let metadata = serde_json::json!({
            "fileCount": meta.file_count,
            "totalSize": meta.total_size,
            "generated": meta.generated_at,
            "basePath": meta.base_path,
            "instructions": meta.instructions,
            "directoryStructure": render_tree(&meta.base_path, &meta.tree_entries, meta.show_size),
        });
        let metadata =
            serde_json::to_string(&metadata).map_err(|e| Error::Output(e.to_string()))?;
        out.chunk(format!("{{\"metadata\":{metadata},\"files\":["))?;

        if !meta.only_tree {
            let mut first = true;
            for record in records {
                let record = record?;
                let serialized = serde_json::to_string(&file_json(&record))
                    .map_err(|e| Error::Output(e.to_string()))?;
                let separator = if first { "" } else { "," };
                first = false;
                out.chunk(format!("{separator}{serialized}"))?;
            }
        }

        out.chunk("]}\n".to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::options::OutputFormat;

    #[test]
    fn output_parses_and_counts_match() {
        let records = vec![text_record("a.txt", "A\n"), text_record("b.txt", "B")];
        let meta = meta_for(&records);
        let json = render(OutputFormat::Json, &meta, records);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["metadata"]["fileCount"], 2);
        assert_eq!(value["metadata"]["totalSize"], 3);
        assert_eq!(value["files"].as_array().unwrap().len(), 2);
        assert_eq!(value["files"][0]["path"], "a.txt");
        assert_eq!(value["files"][0]["content"], "A\n");
        assert_eq!(value["files"][1]["content"], "B");
    }

    #[test]
    fn directory_structure_included() {
        let records = vec![text_record("src/main.rs", "x")];
        let meta = meta_for(&records);
        let json = render(OutputFormat::Json, &meta, records);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let tree = value["metadata"]["directoryStructure"].as_str().unwrap();
        assert!(tree.contains("└── src"));
    }

    #[test]
    fn empty_scan_yields_empty_files_array() {
        let meta = meta_for(&[]);
        let json = render(OutputFormat::Json, &meta, vec![]);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["files"].as_array().unwrap().len(), 0);
        assert_eq!(value["metadata"]["fileCount"], 0);
    }
}
