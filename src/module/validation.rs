//! Descriptor validation framework
//!
//! Validates module descriptors for structure and dependency sanity before
//! they become containers. Invalid descriptors are a module-level
//! recoverable failure: the module is skipped, siblings load normally.

use tracing::{debug, warn};

use crate::module::descriptor::ModuleDescriptor;

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Descriptor is valid
    Valid,
    /// Descriptor is invalid with specific errors
    Invalid(Vec<String>),
}

/// Descriptor validator
pub struct DescriptorValidator {
    /// Maximum id length
    max_id_len: usize,
}

impl DescriptorValidator {
    pub fn new() -> Self {
        Self { max_id_len: 64 }
    }

    /// Validate a module descriptor
    pub fn validate(&self, descriptor: &ModuleDescriptor) -> ValidationResult {
        let mut errors = Vec::new();

        if descriptor.id.is_empty() {
            errors.push("Module id cannot be empty".to_string());
        } else if !self.is_valid_id(&descriptor.id) {
            errors.push(format!(
                "Invalid module id: {} (must be alphanumeric with dashes/underscores)",
                descriptor.id
            ));
        }

        if descriptor.version.is_empty() {
            errors.push("Module version cannot be empty".to_string());
        } else if !self.is_valid_version(&descriptor.version) {
            errors.push(format!(
                "Invalid version format: {} (expected semantic versioning)",
                descriptor.version
            ));
        }

        // A self-dependency would put a self-loop in the dependency graph.
        for dep in descriptor
            .dependencies
            .iter()
            .chain(descriptor.optional_dependencies.iter())
        {
            if dep == &descriptor.id {
                errors.push(format!("Module {} depends on itself", descriptor.id));
            } else if !self.is_valid_id(dep) {
                errors.push(format!("Invalid dependency id: {}", dep));
            }
        }

        if errors.is_empty() {
            debug!("Descriptor validated for module: {}", descriptor.id);
            ValidationResult::Valid
        } else {
            warn!(
                "Descriptor validation failed for module {}: {:?}",
                descriptor.id, errors
            );
            ValidationResult::Invalid(errors)
        }
    }

    /// Validate module id format
    #[inline]
    fn is_valid_id(&self, id: &str) -> bool {
        if id.is_empty() || id.len() > self.max_id_len {
            return false;
        }

        // Must start with alphanumeric
        if !id.chars().next().map_or(false, |c| c.is_alphanumeric()) {
            return false;
        }

        id.chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    }

    /// Validate semantic-versioning shape (major.minor.patch, numeric parts,
    /// optional pre-release suffix after a dash)
    #[inline]
    fn is_valid_version(&self, version: &str) -> bool {
        let base = version.split('-').next().unwrap_or(version);
        let parts: Vec<&str> = base.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return false;
        }
        parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
    }
}

impl Default for DescriptorValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str, version: &str) -> ModuleDescriptor {
        ModuleDescriptor::synthetic(id, version)
    }

    #[test]
    fn accepts_valid_descriptor() {
        let validator = DescriptorValidator::new();
        assert_eq!(
            validator.validate(&descriptor("metrics-core", "1.2.3")),
            ValidationResult::Valid
        );
    }

    #[test]
    fn rejects_bad_id_and_version() {
        let validator = DescriptorValidator::new();
        assert!(matches!(
            validator.validate(&descriptor("-bad", "1.0.0")),
            ValidationResult::Invalid(_)
        ));
        assert!(matches!(
            validator.validate(&descriptor("ok", "not.a.version")),
            ValidationResult::Invalid(_)
        ));
    }

    #[test]
    fn rejects_self_dependency() {
        let validator = DescriptorValidator::new();
        let mut d = descriptor("a", "1.0.0");
        d.dependencies.push("a".to_string());
        match validator.validate(&d) {
            ValidationResult::Invalid(errors) => {
                assert!(errors.iter().any(|e| e.contains("depends on itself")))
            }
            ValidationResult::Valid => panic!("self-dependency accepted"),
        }
    }
}
