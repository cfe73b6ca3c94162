//! Module metadata loading
//!
//! Turns candidate resources into module containers by extracting and
//! validating their descriptors. Malformed descriptors and duplicate ids
//! are logged, non-fatal skips: the first-loaded module with a given id
//! wins, in the locator's enumeration order.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Span};

use crate::module::descriptor::{ModuleDescriptor, DESCRIPTOR_ENTRY};
use crate::module::resource::CandidateResource;
use crate::module::traits::EngineError;
use crate::module::validation::{DescriptorValidator, ValidationResult};

/// Per-module configuration entry name
const CONFIG_ENTRY: &str = "config.toml";

/// The canonical unit the resolver and manager operate on
#[derive(Debug, Clone)]
pub struct ModuleContainer {
    /// Module id (unique)
    pub id: String,
    /// Module version
    pub version: String,
    /// Parsed descriptor
    pub descriptor: ModuleDescriptor,
    /// Backing resource
    pub resource: Arc<CandidateResource>,
    /// Logger scope for everything this module does
    pub span: Span,
}

impl ModuleContainer {
    fn new(descriptor: ModuleDescriptor, resource: Arc<CandidateResource>) -> Self {
        let span = info_span!("module", id = %descriptor.id);
        Self {
            id: descriptor.id.clone(),
            version: descriptor.version.clone(),
            descriptor,
            resource,
            span,
        }
    }

    /// Load the module's optional `config.toml`, flattened to string pairs
    ///
    /// A missing config file yields an empty map; a malformed one is logged
    /// and treated as empty.
    pub fn load_config(&self) -> HashMap<String, String> {
        let contents = match self.resource.read_entry_text(CONFIG_ENTRY) {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                debug!("No config file for module {}, using defaults", self.id);
                return HashMap::new();
            }
            Err(e) => {
                warn!("Failed to read config for module {}: {}", self.id, e);
                return HashMap::new();
            }
        };

        match toml::from_str::<HashMap<String, toml::Value>>(&contents) {
            Ok(values) => {
                let mut config = HashMap::new();
                for (key, value) in values {
                    let value_str = match value {
                        toml::Value::String(s) => s,
                        toml::Value::Integer(i) => i.to_string(),
                        toml::Value::Float(f) => f.to_string(),
                        toml::Value::Boolean(b) => b.to_string(),
                        other => other.to_string(),
                    };
                    config.insert(key, value_str);
                }
                config
            }
            Err(e) => {
                warn!("Malformed config for module {}: {}", self.id, e);
                HashMap::new()
            }
        }
    }

    /// Read an auxiliary resource declared in the descriptor
    ///
    /// Only declared entries are served; undeclared names yield `None` the
    /// same as entries missing from the package.
    pub fn auxiliary_resource(&self, entry: &str) -> Result<Option<Vec<u8>>, EngineError> {
        if !self
            .descriptor
            .auxiliary_resources
            .iter()
            .any(|declared| declared == entry)
        {
            return Ok(None);
        }
        self.resource.read_entry(entry)
    }
}

/// Module metadata loader
pub struct MetadataLoader {
    validator: DescriptorValidator,
}

impl MetadataLoader {
    pub fn new() -> Self {
        Self {
            validator: DescriptorValidator::new(),
        }
    }

    /// Load containers from candidates
    ///
    /// Candidates without a parseable, valid descriptor are skipped with a
    /// warning. Duplicate ids are skipped with a warning (first wins).
    pub fn load(&self, candidates: Vec<CandidateResource>) -> Vec<ModuleContainer> {
        let mut containers: Vec<ModuleContainer> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for candidate in candidates {
            let descriptor = match self.extract_descriptor(&candidate) {
                Ok(Some(descriptor)) => descriptor,
                Ok(None) => {
                    warn!(
                        "Candidate {:?} has no {} entry, skipping",
                        candidate.path(),
                        DESCRIPTOR_ENTRY
                    );
                    continue;
                }
                Err(e) => {
                    warn!(
                        "Failed to load descriptor from {:?}: {}",
                        candidate.path(),
                        e
                    );
                    continue;
                }
            };

            if let ValidationResult::Invalid(errors) = self.validator.validate(&descriptor) {
                warn!(
                    "Skipping module {} from {:?}: {:?}",
                    descriptor.id,
                    candidate.path(),
                    errors
                );
                continue;
            }

            if !seen.insert(descriptor.id.clone()) {
                warn!(
                    "Duplicate module id {} from {:?}, first-loaded wins",
                    descriptor.id,
                    candidate.path()
                );
                continue;
            }

            // Declared auxiliary resources are checked up front so a broken
            // package surfaces at load time, not on first access.
            for entry in &descriptor.auxiliary_resources {
                if !candidate.has_entry(entry) {
                    warn!(
                        "Module {} declares auxiliary resource {} which is not in the package",
                        descriptor.id, entry
                    );
                }
            }

            debug!(
                "Loaded module {} v{} from {:?} ({})",
                descriptor.id,
                descriptor.version,
                candidate.path(),
                candidate.origin()
            );
            containers.push(ModuleContainer::new(descriptor, Arc::new(candidate)));
        }

        info!("Loaded {} module containers", containers.len());
        containers
    }

    /// Embedded descriptor for synthetic candidates, otherwise parsed from
    /// the descriptor entry inside the container.
    fn extract_descriptor(
        &self,
        candidate: &CandidateResource,
    ) -> Result<Option<ModuleDescriptor>, EngineError> {
        if let Some(descriptor) = candidate.embedded_descriptor() {
            return Ok(Some(descriptor.clone()));
        }
        match candidate.read_entry_text(DESCRIPTOR_ENTRY)? {
            Some(contents) => ModuleDescriptor::from_toml(&contents).map(Some),
            None => Ok(None),
        }
    }
}

impl Default for MetadataLoader {
    fn default() -> Self {
        Self::new()
    }
}
