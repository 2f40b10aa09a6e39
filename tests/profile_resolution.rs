// tests/profile_resolution.rs
//
// Profile discovery, merging precedence, and transformer enablement end
// to end.

mod common;

use common::create_file;
use copytree::{copy, Options, OutputFormat, Profile, ProfileSelection, Result};
use tempfile::tempdir;

fn options() -> Options {
    Options {
        format: OutputFormat::Json,
        use_cache: false,
        ..Options::default()
    }
}

fn paths_of(result: &copytree::CopyResult) -> Vec<&str> {
    result.files.iter().map(|f| f.path.as_str()).collect()
}

#[test]
fn discovered_yaml_profile_restricts_include() {
    let temp = tempdir().unwrap();
    create_file(temp.path(), ".copytree.yml", "include:\n  - 'src/**'\n");
    create_file(temp.path(), "src/lib.rs", "x");
    create_file(temp.path(), "docs/readme.md", "x");

    let result = copy(temp.path(), options()).unwrap();
    assert_eq!(paths_of(&result), vec!["src/lib.rs"]);
}

#[test]
fn cli_filter_replaces_profile_include() {
    let temp = tempdir().unwrap();
    create_file(temp.path(), ".copytree.yml", "include:\n  - 'src/**'\n");
    create_file(temp.path(), "src/lib.rs", "x");
    create_file(temp.path(), "docs/readme.md", "x");

    let mut opts = options();
    opts.filter = vec!["docs/**".to_string()];
    let result = copy(temp.path(), opts).unwrap();
    assert_eq!(paths_of(&result), vec!["docs/readme.md"]);
}

#[test]
fn cli_exclude_merges_with_profile_exclude() {
    let temp = tempdir().unwrap();
    create_file(temp.path(), ".copytree.yml", "exclude:\n  - '*.md'\n");
    create_file(temp.path(), "a.md", "x");
    create_file(temp.path(), "b.txt", "x");
    create_file(temp.path(), "c.rs", "x");

    let mut opts = options();
    opts.exclude = vec!["*.txt".to_string()];
    let result = copy(temp.path(), opts).unwrap();
    assert_eq!(paths_of(&result), vec![".copytree.yml", "c.rs"]);
}

#[test]
fn named_profile_selected_explicitly() {
    let temp = tempdir().unwrap();
    create_file(
        temp.path(),
        ".copytree-docs.yml",
        "include:\n  - 'docs/**'\n",
    );
    create_file(temp.path(), "docs/guide.md", "x");
    create_file(temp.path(), "src/lib.rs", "x");

    let mut opts = options();
    opts.profile = ProfileSelection::Named("docs".to_string());
    let result = copy(temp.path(), opts).unwrap();
    assert_eq!(paths_of(&result), vec!["docs/guide.md"]);
}

#[test]
fn inline_profile_object() {
    let temp = tempdir().unwrap();
    create_file(temp.path(), "keep/a.txt", "x");
    create_file(temp.path(), "drop/b.txt", "x");

    let mut opts = options();
    opts.profile = ProfileSelection::Inline(Profile {
        name: "inline".into(),
        include: vec!["keep/**".into()],
        ..Profile::default()
    });
    let result = copy(temp.path(), opts).unwrap();
    assert_eq!(paths_of(&result), vec!["keep/a.txt"]);
}

#[test]
fn ini_profile_supported() {
    let temp = tempdir().unwrap();
    create_file(
        temp.path(),
        ".copytree",
        "[profile]\nname = legacy\n[include]\nsrc/**\n[exclude]\n*.bak\n",
    );
    create_file(temp.path(), "src/keep.rs", "x");
    create_file(temp.path(), "src/old.bak", "x");
    create_file(temp.path(), "other.txt", "x");

    let result = copy(temp.path(), options()).unwrap();
    assert_eq!(paths_of(&result), vec!["src/keep.rs"]);
}

#[test]
fn profile_enables_first_lines_transformer() {
    let temp = tempdir().unwrap();
    create_file(
        temp.path(),
        ".copytree.yml",
        "transformers:\n  - first-lines: {lines: 2}\n",
    );
    let body: String = (1..=10).map(|i| format!("line {i}\n")).collect();
    create_file(temp.path(), "long.txt", &body);

    let result = copy(temp.path(), options()).unwrap();
    let record = result
        .files
        .iter()
        .find(|f| f.path == "long.txt")
        .unwrap();
    let text = record.content.as_ref().unwrap().as_text().unwrap();
    assert!(text.contains("line 1"));
    assert!(!text.contains("line 3\n"));
    assert!(record.trail.contains(&"first-lines".to_string()));
}

#[test]
fn scan_decisions_are_idempotent() {
    let temp = tempdir().unwrap();
    create_file(temp.path(), ".copytree.yml", "include:\n  - '**/*.rs'\n");
    create_file(temp.path(), "a.rs", "x");
    create_file(temp.path(), "b.txt", "x");

    let first: Vec<String> = copytree::scan(temp.path(), options())
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap()
        .into_iter()
        .map(|r| r.path)
        .collect();
    let second: Vec<String> = copytree::scan(temp.path(), options())
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap()
        .into_iter()
        .map(|r| r.path)
        .collect();
    assert_eq!(first, second);
}
