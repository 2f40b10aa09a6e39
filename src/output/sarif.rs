//! The SARIF 2.1.0 emitter: a `CopyTree` driver shell with one artifact
//! per file.

use super::{ChunkSink, FormatMeta, OutputFormatter};
use crate::core_types::{FileContent, FileRecord};
use crate::errors::{Error, Result};

pub struct SarifFormatter;

const SCHEMA: &str =
    "https://schemastore.azurewebsites.net/schemas/json/sarif-2.1.0-rtm.5.json";

impl OutputFormatter for SarifFormatter {
    fn write(
        &self,
        meta: &FormatMeta,
        records: &mut dyn Iterator<Item = Result<FileRecord>>,
        out: &mut dyn ChunkSink,
    ) -> Result<()> {
        let driver = serde_json::json!({
            "name": "CopyTree",
            "version": env!("CARGO_PKG_VERSION"),
            "informationUri": "https://github.com/gregpriday/copytree-rust",
        });
        out.chunk(format!(
            "{{\"$schema\":{},\"version\":\"2.1.0\",\"runs\":[{{\"tool\":{{\"driver\":{}}},\"artifacts\":[",
            serde_json::to_string(SCHEMA).map_err(|e| Error::Output(e.to_string()))?,
            serde_json::to_string(&driver).map_err(|e| Error::Output(e.to_string()))?,
        ))?;

        let mut first = true;
        if !meta.only_tree {
            for record in records {
                let record = record?;
                let artifact = artifact_json(&record);
                let serialized = serde_json::to_string(&artifact)
                    .map_err(|e| Error::Output(e.to_string()))?;
                let separator = if first { "" } else { "," };
                first = false;
                out.chunk(format!("{separator}{serialized}"))?;
            }
        }

        out.chunk("],\"results\":[]}]}\n".to_string())?;
        Ok(())
    }
}

fn artifact_json(record: &FileRecord) -> serde_json::Value {
    let mut artifact = serde_json::json!({
        "location": {"uri": record.path},
        "length": record.size,
    });
    if let Some(FileContent::Text(text)) = &record.content {
        artifact["contents"] = serde_json::json!({"text": text});
    }
    if record.is_binary == Some(true) {
        artifact["roles"] = serde_json::json!(["binary"]);
    }
    artifact
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::options::OutputFormat;

    #[test]
    fn sarif_shell_parses() {
        let records = vec![text_record("src/a.rs", "fn a() {}")];
        let meta = meta_for(&records);
        let sarif = render(OutputFormat::Sarif, &meta, records);
        let value: serde_json::Value = serde_json::from_str(&sarif).unwrap();
        assert_eq!(value["version"], "2.1.0");
        assert_eq!(value["runs"][0]["tool"]["driver"]["name"], "CopyTree");
        let artifacts = value["runs"][0]["artifacts"].as_array().unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0]["location"]["uri"], "src/a.rs");
        assert_eq!(artifacts[0]["contents"]["text"], "fn a() {}");
    }

    #[test]
    fn empty_artifacts_are_valid() {
        let meta = meta_for(&[]);
        let sarif = render(OutputFormat::Sarif, &meta, vec![]);
        let value: serde_json::Value = serde_json::from_str(&sarif).unwrap();
        assert!(value["runs"][0]["artifacts"].as_array().unwrap().is_empty());
    }
}
