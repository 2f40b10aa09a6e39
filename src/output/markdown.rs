//! The Markdown emitter: YAML front matter, fenced tree, fenced per-file
//! blocks bracketed by HTML comments for unambiguous parsing.

use super::{render_tree, ChunkSink, FormatMeta, OutputFormatter};
use crate::core_types::{FileContent, FileRecord};
use crate::errors::Result;
use crate::transform::extension_of;
use base64::Engine;

pub struct MarkdownFormatter;

impl OutputFormatter for MarkdownFormatter {
    fn write(
        &self,
        meta: &FormatMeta,
        records: &mut dyn Iterator<Item = Result<FileRecord>>,
        out: &mut dyn ChunkSink,
    ) -> Result<()> {
        let mut header = String::new();
        header.push_str("---\n");
        header.push_str("format: copytree-md@1\n");
        header.push_str(&format!("generated: {}\n", meta.generated_at));
        header.push_str(&format!("base: {}\n", meta.base_path));
        header.push_str(&format!("files: {}\n", meta.file_count));
        header.push_str(&format!("total_size: {}\n", meta.total_size));
        header.push_str("---\n\n");
        if let Some(instructions) = &meta.instructions {
            header.push_str(&format!("> {instructions}\n\n"));
        }
        header.push_str("## Directory tree\n\n```\n");
        header.push_str(&render_tree(
            &meta.base_path,
            &meta.tree_entries,
            meta.show_size,
        ));
        header.push_str("```\n");
        out.chunk(header)?;

        if !meta.only_tree {
            for record in records {
                let record = record?;
                out.chunk(file_block(&record))?;
            }
        }

        out.chunk(format!("\n<!-- copytree: {} files -->\n", meta.file_count))?;
        Ok(())
    }
}

fn file_block(record: &FileRecord) -> String {
    let mut block = String::new();
    block.push_str(&format!("\n<!-- BEGIN FILE: {} -->\n", record.path));
    block.push_str(&format!("### {}\n\n", record.path));

    let language = extension_of(&record.path).unwrap_or_default();
    let body = match &record.content {
        Some(FileContent::Text(text)) | Some(FileContent::Placeholder(text)) => text.clone(),
        Some(FileContent::Bytes(bytes)) => {
            base64::engine::general_purpose::STANDARD.encode(bytes)
        }
        None => String::new(),
    };
    // A fence longer than any backtick run in the body keeps the block
    // well-formed for files that themselves contain fences.
    let fence = "`".repeat(longest_backtick_run(&body).max(2) + 1);
    block.push_str(&format!("{fence}{language}\n"));
    block.push_str(&body);
    if !body.ends_with('\n') {
        block.push('\n');
    }
    block.push_str(&format!("{fence}\n"));
    block.push_str(&format!("<!-- END FILE: {} -->\n", record.path));
    block
}

fn longest_backtick_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}
