//! The transformer registry: registration, availability probing, and
//! per-record chain ordering.

use super::{TransformContext, Transformer};
use crate::core_types::FileRecord;
use crate::errors::{Error, Result};
use crate::profile::Profile;
use log::{debug, warn};
use std::path::Path;

struct Entry {
    transformer: Box<dyn Transformer>,
    /// Runs for every record regardless of the profile (probe, loader,
    /// option-driven transformers).
    mandatory: bool,
    /// All declared external dependencies were found on PATH.
    available: bool,
    registration_index: usize,
}

/// Registered transformers, fixed after startup.
///
/// Chain order for a record: filters, loaders, converters, then heavy
/// transformers; ties within a bucket break by the profile's declared
/// order, then registration order.
#[derive(Default)]
pub struct TransformerRegistry {
    entries: Vec<Entry>,
}

impl TransformerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an opt-in transformer (enabled via the profile).
    pub fn register(&mut self, transformer: Box<dyn Transformer>) -> Result<()> {
        self.register_entry(transformer, false)
    }

    /// Registers a transformer that runs for every eligible record.
    pub fn register_mandatory(&mut self, transformer: Box<dyn Transformer>) -> Result<()> {
        self.register_entry(transformer, true)
    }

    fn register_entry(&mut self, transformer: Box<dyn Transformer>, mandatory: bool) -> Result<()> {
        let descriptor = transformer.descriptor();
        if descriptor.input_types.is_empty() || descriptor.output_types.is_empty() {
            return Err(Error::Validation(format!(
                "transformer '{}' declares empty input or output types",
                descriptor.name
            )));
        }
        if self.find(descriptor.name).is_some() {
            return Err(Error::Validation(format!(
                "transformer '{}' registered twice",
                descriptor.name
            )));
        }
        let missing: Vec<&str> = descriptor
            .dependencies
            .iter()
            .copied()
            .filter(|tool| !dependency_available(tool))
            .collect();
        let available = missing.is_empty();
        if !available {
            warn!(
                "Transformer '{}' unavailable; missing dependencies: {}",
                descriptor.name,
                missing.join(", ")
            );
        }
        debug!(
            "Registered transformer '{}' (bucket {:?}, mandatory={mandatory}, available={available})",
            descriptor.name, descriptor.bucket
        );
        self.entries.push(Entry {
            registration_index: self.entries.len(),
            transformer,
            mandatory,
            available,
        });
        Ok(())
    }

    fn find(&self, name: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|entry| entry.transformer.descriptor().name == name)
    }

    /// Checks that the profile does not enable transformers that declare
    /// each other as conflicts, and warns about unknown names.
    pub fn validate_profile(&self, profile: &Profile) -> Result<()> {
        let enabled: Vec<&str> = profile
            .transformers
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        for name in &enabled {
            let Some(entry) = self.find(name) else {
                warn!("Profile enables unknown transformer '{name}'");
                continue;
            };
            for conflict in entry.transformer.descriptor().conflicts_with {
                if enabled.contains(conflict) {
                    return Err(Error::Validation(format!(
                        "transformers '{name}' and '{conflict}' cannot be enabled together"
                    )));
                }
            }
        }
        Ok(())
    }

    /// The ordered transformer chain for one record. Unavailable
    /// transformers are skipped; the record passes through untouched.
    pub fn chain_for<'a>(
        &'a self,
        record: &FileRecord,
        profile: &Profile,
    ) -> Vec<(&'a dyn Transformer, TransformContext)> {
        let mut selected: Vec<(&Entry, Option<usize>)> = self
            .entries
            .iter()
            .filter_map(|entry| {
                if !entry.available {
                    return None;
                }
                let name = entry.transformer.descriptor().name;
                let profile_order = profile.transformer_order(name);
                if !entry.mandatory && profile_order.is_none() {
                    return None;
                }
                entry
                    .transformer
                    .can_transform(record)
                    .then_some((entry, profile_order))
            })
            .collect();

        selected.sort_by_key(|(entry, profile_order)| {
            (
                entry.transformer.descriptor().bucket,
                profile_order.unwrap_or(usize::MAX),
                entry.registration_index,
            )
        });

        selected
            .into_iter()
            .map(|(entry, _)| {
                let name = entry.transformer.descriptor().name;
                let ctx = TransformContext {
                    options: profile
                        .transformer_options(name)
                        .cloned()
                        .unwrap_or(serde_json::Value::Null),
                };
                (entry.transformer.as_ref(), ctx)
            })
            .collect()
    }

    /// Names of all registered transformers, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries
            .iter()
            .map(|entry| entry.transformer.descriptor().name)
            .collect()
    }
}

/// Looks for an executable on PATH (capability check only; nothing runs).
fn dependency_available(tool: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| {
        let candidate = dir.join(tool);
        is_executable(&candidate) || {
            cfg!(windows) && is_executable(&dir.join(format!("{tool}.exe")))
        }
    })
}

fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::super::{DataType, TransformerBucket, TransformerDescriptor};
    use super::*;

    #[derive(Clone)]
    struct Dummy {
        descriptor: TransformerDescriptor,
        eligible: bool,
    }

    impl Dummy {
        fn new(name: &'static str, bucket: TransformerBucket) -> Self {
            Self {
                descriptor: TransformerDescriptor::new(
                    name,
                    bucket,
                    &[DataType::Text],
                    &[DataType::Text],
                ),
                eligible: true,
            }
        }
    }

    impl Transformer for Dummy {
        fn descriptor(&self) -> &TransformerDescriptor {
            &self.descriptor
        }
        fn can_transform(&self, _record: &FileRecord) -> bool {
            self.eligible
        }
        fn apply(
            &self,
            mut record: FileRecord,
            _ctx: &TransformContext,
        ) -> Result<FileRecord> {
            record.mark_transformed(self.descriptor.name);
            Ok(record)
        }
    }

    fn record() -> FileRecord {
        FileRecord::new("a.txt".into(), "/base/a.txt".into(), 0, None)
    }

    fn profile_enabling(names: &[&str]) -> Profile {
        Profile {
            transformers: names
                .iter()
                .map(|n| (n.to_string(), serde_json::Value::Null))
                .collect(),
            ..Profile::default()
        }
    }

    #[test]
    fn empty_io_types_rejected() {
        let mut registry = TransformerRegistry::new();
        let mut dummy = Dummy::new("broken", TransformerBucket::Converter);
        dummy.descriptor.input_types = &[];
        assert!(registry.register(Box::new(dummy)).is_err());
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut registry = TransformerRegistry::new();
        registry
            .register(Box::new(Dummy::new("dup", TransformerBucket::Converter)))
            .unwrap();
        assert!(registry
            .register(Box::new(Dummy::new("dup", TransformerBucket::Heavy)))
            .is_err());
    }

    #[test]
    fn chain_orders_by_bucket_then_profile_order() {
        let mut registry = TransformerRegistry::new();
        registry
            .register(Box::new(Dummy::new("heavy-a", TransformerBucket::Heavy)))
            .unwrap();
        registry
            .register_mandatory(Box::new(Dummy::new("probe", TransformerBucket::Filter)))
            .unwrap();
        registry
            .register(Box::new(Dummy::new("conv-b", TransformerBucket::Converter)))
            .unwrap();
        registry
            .register(Box::new(Dummy::new("conv-a", TransformerBucket::Converter)))
            .unwrap();
        registry
            .register_mandatory(Box::new(Dummy::new("load", TransformerBucket::Loader)))
            .unwrap();

        // Profile enables conv-b before conv-a; declared order wins.
        let profile = profile_enabling(&["heavy-a", "conv-b", "conv-a"]);
        let chain = registry.chain_for(&record(), &profile);
        let names: Vec<_> = chain
            .iter()
            .map(|(t, _)| t.descriptor().name)
            .collect();
        assert_eq!(names, vec!["probe", "load", "conv-b", "conv-a", "heavy-a"]);
    }

    #[test]
    fn opt_in_transformers_need_profile() {
        let mut registry = TransformerRegistry::new();
        registry
            .register(Box::new(Dummy::new("conv", TransformerBucket::Converter)))
            .unwrap();
        let chain = registry.chain_for(&record(), &Profile::default_profile());
        assert!(chain.is_empty());
    }

    #[test]
    fn ineligible_records_skip_transformers() {
        let mut registry = TransformerRegistry::new();
        let mut dummy = Dummy::new("conv", TransformerBucket::Converter);
        dummy.eligible = false;
        registry.register_mandatory(Box::new(dummy)).unwrap();
        assert!(registry.chain_for(&record(), &Profile::default_profile()).is_empty());
    }

    #[test]
    fn missing_dependency_marks_unavailable() {
        let mut registry = TransformerRegistry::new();
        let mut dummy = Dummy::new("needs-tool", TransformerBucket::Converter);
        dummy.descriptor.dependencies = &["copytree-test-tool-that-does-not-exist"];
        registry.register_mandatory(Box::new(dummy)).unwrap();
        // Registered but never scheduled.
        assert_eq!(registry.names(), vec!["needs-tool"]);
        assert!(registry.chain_for(&record(), &Profile::default_profile()).is_empty());
    }

    #[test]
    fn conflicting_transformers_rejected_together() {
        let mut registry = TransformerRegistry::new();
        let mut first = Dummy::new("one", TransformerBucket::Converter);
        first.descriptor.conflicts_with = &["two"];
        registry.register(Box::new(first)).unwrap();
        registry
            .register(Box::new(Dummy::new("two", TransformerBucket::Converter)))
            .unwrap();

        assert!(registry.validate_profile(&profile_enabling(&["one"])).is_ok());
        assert!(registry
            .validate_profile(&profile_enabling(&["one", "two"]))
            .is_err());
    }
}
