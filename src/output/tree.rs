//! The tree-only emitter.

use super::{render_tree, ChunkSink, FormatMeta, OutputFormatter};
use crate::core_types::FileRecord;
use crate::errors::Result;

pub struct TreeFormatter;

impl OutputFormatter for TreeFormatter {
    fn write(
        &self,
        meta: &FormatMeta,
        records: &mut dyn Iterator<Item = Result<FileRecord>>,
        out: &mut dyn ChunkSink,
    ) -> Result<()> {
        out.chunk(format!(
            "# {} ({} files, {} bytes, generated {})\n",
            meta.base_path, meta.file_count, meta.total_size, meta.generated_at
        ))?;
        out.chunk(render_tree(
            &meta.base_path,
            &meta.tree_entries,
            meta.show_size,
        ))?;
        // Drain the stream so upstream stages can finish; the per-file
        // section of this format is empty.
        for record in records {
            record?;
        }
        out.chunk(String::new())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::options::OutputFormat;

    #[test]
    fn emits_header_line_and_connectors() {
        let records = vec![
            text_record("src/main.rs", "abc"),
            text_record("Cargo.toml", "x"),
        ];
        let meta = meta_for(&records);
        let tree = render(OutputFormat::Tree, &meta, records);
        assert!(tree.starts_with("# /base (2 files, 4 bytes"));
        assert!(tree.contains("└── main.rs") || tree.contains("├── main.rs"));
        assert!(!tree.contains("abc"));
    }

    #[test]
    fn size_annotation_honored() {
        let records = vec![text_record("a.bin", "12345")];
        let mut meta = meta_for(&records);
        meta.show_size = true;
        let tree = render(OutputFormat::Tree, &meta, records);
        assert!(tree.contains("a.bin (5 B)"));
    }
}
