//! The `ct:`-namespaced XML emitter (the default format).

use super::{encoding_label, render_tree, ChunkSink, FormatMeta, OutputFormatter};
use crate::core_types::{FileContent, FileRecord};
use crate::errors::Result;
use base64::Engine;

pub struct XmlFormatter;

const NAMESPACE: &str = "https://copytree.dev/schema/1";

impl OutputFormatter for XmlFormatter {
    fn write(
        &self,
        meta: &FormatMeta,
        records: &mut dyn Iterator<Item = Result<FileRecord>>,
        out: &mut dyn ChunkSink,
    ) -> Result<()> {
        let mut header = String::new();
        header.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        header.push_str(&format!("<ct:document xmlns:ct=\"{NAMESPACE}\">\n"));
        header.push_str("  <ct:metadata>\n");
        header.push_str(&format!(
            "    <ct:generated_at>{}</ct:generated_at>\n",
            escape(&meta.generated_at)
        ));
        header.push_str(&format!(
            "    <ct:file_count>{}</ct:file_count>\n",
            meta.file_count
        ));
        header.push_str(&format!(
            "    <ct:total_size>{}</ct:total_size>\n",
            meta.total_size
        ));
        header.push_str(&format!(
            "    <ct:base_path>{}</ct:base_path>\n",
            escape(&meta.base_path)
        ));
        if let Some(instructions) = &meta.instructions {
            header.push_str(&format!(
                "    <ct:instructions>{}</ct:instructions>\n",
                escape(instructions)
            ));
        }
        header.push_str("  </ct:metadata>\n");
        header.push_str("  <ct:tree>\n");
        header.push_str(&escape(&render_tree(
            &meta.base_path,
            &meta.tree_entries,
            meta.show_size,
        )));
        header.push_str("  </ct:tree>\n");
        out.chunk(header)?;

        if !meta.only_tree {
            out.chunk("  <ct:files>\n".to_string())?;
            for record in records {
                let record = record?;
                out.chunk(file_element(&record))?;
            }
            out.chunk("  </ct:files>\n".to_string())?;
        }

        out.chunk("</ct:document>\n".to_string())?;
        Ok(())
    }
}

fn file_element(record: &FileRecord) -> String {
    let mut element = format!(
        "    <ct:file path=\"{}\" size=\"{}\" encoding=\"{}\"",
        escape(&record.path),
        record.size,
        encoding_label(record.encoding)
    );
    if let Some(modified) = record.modified_epoch() {
        element.push_str(&format!(" modified=\"{modified}\""));
    }
    if !record.trail.is_empty() {
        element.push_str(&format!(
            " transformed_by=\"{}\"",
            escape(&record.trail.join(","))
        ));
    }
    element.push_str(">\n");
    match &record.content {
        Some(FileContent::Text(text)) | Some(FileContent::Placeholder(text)) => {
            element.push_str("      <ct:content>");
            element.push_str(&escape(text));
            element.push_str("</ct:content>\n");
        }
        Some(FileContent::Bytes(bytes)) => {
            element.push_str("      <ct:content><![CDATA[");
            element.push_str(&base64::engine::general_purpose::STANDARD.encode(bytes));
            element.push_str("]]></ct:content>\n");
        }
        None => {}
    }
    element.push_str("    </ct:file>\n");
    element
}

fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
