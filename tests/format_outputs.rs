// tests/format_outputs.rs
//
// Round-trip and shape checks for the JSON, NDJSON, XML, Markdown, and
// tree formats, end to end through `copy`.

mod common;

use common::create_file;
use copytree::{copy, Options, OutputFormat};
use tempfile::tempdir;

fn options(format: OutputFormat) -> Options {
    Options {
        format,
        use_cache: false,
        ..Options::default()
    }
}

fn two_file_tree() -> tempfile::TempDir {
    let temp = tempdir().unwrap();
    create_file(temp.path(), "a.txt", "A\n");
    create_file(temp.path(), "b.txt", "B");
    temp
}

#[test]
fn json_round_trip() {
    let temp = two_file_tree();
    let result = copy(temp.path(), options(OutputFormat::Json)).unwrap();

    let value: serde_json::Value = serde_json::from_str(&result.output).unwrap();
    assert_eq!(value["metadata"]["fileCount"], 2);
    assert_eq!(value["metadata"]["totalSize"], 3);
    let files = value["files"].as_array().unwrap();
    assert_eq!(files.len(), value["metadata"]["fileCount"].as_u64().unwrap() as usize);
    assert_eq!(files[0]["path"], "a.txt");
    assert_eq!(files[0]["content"], "A\n");
    assert_eq!(files[1]["path"], "b.txt");
    assert_eq!(files[1]["content"], "B");
}

#[test]
fn ndjson_line_protocol() {
    let temp = two_file_tree();
    let result = copy(temp.path(), options(OutputFormat::Ndjson)).unwrap();

    let lines: Vec<serde_json::Value> = result
        .output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.first().unwrap()["type"], "metadata");
    assert_eq!(lines.last().unwrap()["type"], "summary");
    let file_lines = lines
        .iter()
        .filter(|line| line["type"] == "file")
        .count();
    assert_eq!(
        file_lines,
        lines[0]["fileCount"].as_u64().unwrap() as usize
    );
}

#[test]
fn xml_document_structure() {
    let temp = two_file_tree();
    let result = copy(temp.path(), options(OutputFormat::Xml)).unwrap();

    assert!(result.output.starts_with("<?xml version=\"1.0\""));
    assert!(result.output.contains("<ct:metadata>"));
    assert!(result.output.contains("<ct:tree>"));
    assert!(result.output.contains("<ct:file path=\"a.txt\""));
    assert!(result.output.trim_end().ends_with("</ct:document>"));
}

#[test]
fn xml_escapes_content() {
    let temp = tempdir().unwrap();
    create_file(temp.path(), "snippet.html", "<b>bold & brash</b>");
    let result = copy(temp.path(), options(OutputFormat::Xml)).unwrap();
    assert!(result.output.contains("&lt;b&gt;bold &amp; brash&lt;/b&gt;"));
}

#[test]
fn markdown_front_matter_and_blocks() {
    let temp = two_file_tree();
    let result = copy(temp.path(), options(OutputFormat::Markdown)).unwrap();

    assert!(result.output.starts_with("---\nformat: copytree-md@1\n"));
    assert!(result.output.contains("<!-- BEGIN FILE: a.txt -->"));
    assert!(result.output.contains("<!-- END FILE: b.txt -->"));
    assert!(result.output.contains("## Directory tree"));
}

#[test]
fn tree_format_has_no_contents() {
    let temp = two_file_tree();
    let result = copy(temp.path(), options(OutputFormat::Tree)).unwrap();
    assert!(result.output.contains("a.txt"));
    assert!(!result.output.contains("A\n"));
    assert!(result.output.contains("(2 files, 3 bytes"));
}

#[test]
fn sarif_shell() {
    let temp = two_file_tree();
    let result = copy(temp.path(), options(OutputFormat::Sarif)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&result.output).unwrap();
    assert_eq!(value["version"], "2.1.0");
    assert_eq!(value["runs"][0]["tool"]["driver"]["name"], "CopyTree");
    assert_eq!(value["runs"][0]["artifacts"].as_array().unwrap().len(), 2);
}

#[test]
fn only_tree_omits_file_sections() {
    let temp = two_file_tree();
    let mut opts = options(OutputFormat::Xml);
    opts.only_tree = true;
    let result = copy(temp.path(), opts).unwrap();
    assert!(result.output.contains("<ct:tree>"));
    assert!(!result.output.contains("<ct:files>"));
}

#[test]
fn line_numbers_option_prefixes_lines() {
    let temp = tempdir().unwrap();
    create_file(temp.path(), "main.rs", "fn main() {\n}\n");
    let mut opts = options(OutputFormat::Markdown);
    opts.add_line_numbers = true;
    let result = copy(temp.path(), opts).unwrap();
    assert!(result.output.contains("   1: fn main() {"));
    assert!(result.output.contains("   2: }"));
}

#[test]
fn show_size_annotates_tree() {
    let temp = tempdir().unwrap();
    create_file(temp.path(), "data.bin", "12345");
    let mut opts = options(OutputFormat::Tree);
    opts.show_size = true;
    let result = copy(temp.path(), opts).unwrap();
    assert!(result.output.contains("data.bin (5 B)"));
}
