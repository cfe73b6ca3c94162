//! Module descriptor parsing
//!
//! Handles parsing the declarative `module.toml` descriptor every module
//! package carries, and the synthetic descriptors attached to the engine
//! and host candidates.

use serde::{Deserialize, Serialize};

use crate::module::traits::EngineError;

/// Well-known descriptor entry probed for inside candidate packages
pub const DESCRIPTOR_ENTRY: &str = "module.toml";

/// Module descriptor (`module.toml` structure)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Module id (unique identifier)
    pub id: String,
    /// Module version (semantic versioning)
    pub version: String,
    /// Fully-qualified entry point artifact, if the module has one
    #[serde(default)]
    pub entry_point: Option<String>,
    /// Required dependencies (module ids)
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Optional dependencies (module ids)
    #[serde(default)]
    pub optional_dependencies: Vec<String>,
    /// Instrumentation config entries inside the same package
    #[serde(default)]
    pub instrumentation_configs: Vec<String>,
    /// Auxiliary resource entries inside the same package
    #[serde(default)]
    pub auxiliary_resources: Vec<String>,
}

impl ModuleDescriptor {
    /// Parse a descriptor from TOML contents
    ///
    /// A descriptor without an id or version is a load-time rejection.
    pub fn from_toml(contents: &str) -> Result<Self, EngineError> {
        let descriptor: ModuleDescriptor = toml::from_str(contents).map_err(|e| {
            EngineError::InvalidDescriptor(format!("Failed to parse descriptor TOML: {}", e))
        })?;

        if descriptor.id.is_empty() {
            return Err(EngineError::InvalidDescriptor(
                "Module id cannot be empty".to_string(),
            ));
        }
        if descriptor.version.is_empty() {
            return Err(EngineError::InvalidDescriptor(
                "Module version cannot be empty".to_string(),
            ));
        }

        Ok(descriptor)
    }

    /// Build a synthetic descriptor for the engine or host candidates
    ///
    /// These never declare dependencies or instrumentation; they exist so
    /// both archives flow through the same metadata and transformation
    /// machinery as ordinary modules.
    pub fn synthetic(id: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            entry_point: None,
            dependencies: Vec::new(),
            optional_dependencies: Vec::new(),
            instrumentation_configs: Vec::new(),
            auxiliary_resources: Vec::new(),
        }
    }
}
