//! Loader scopes
//!
//! The dynamic scope is the ordered list of module- and engine-contributed
//! sources consulted first (registration order, first match wins). When no
//! source supplies an artifact the loader falls back to the parent scope:
//! an explicit, finite two-level chain with no sibling discovery.

use std::sync::Arc;
use tracing::warn;

use crate::module::descriptor::ModuleDescriptor;
use crate::module::resource::CandidateResource;

/// Map a canonical artifact name to its archive entry path
///
/// `ext.metrics.main` loads from `ext/metrics/main.mfb`. Non-code resources
/// are addressed by their literal entry path instead.
pub fn artifact_entry(canonical_name: &str) -> String {
    format!("{}.mfb", canonical_name.replace('.', "/"))
}

/// Package portion of a canonical name (`ext.metrics` for `ext.metrics.main`)
pub fn package_of(canonical_name: &str) -> &str {
    canonical_name
        .rsplit_once('.')
        .map(|(package, _)| package)
        .unwrap_or("")
}

/// Parent scope: the host environment consulted after the dynamic scope
pub trait ParentScope: Send + Sync {
    /// Load an entry by path, or `None` when the parent does not have it
    fn load(&self, entry_path: &str) -> Option<Vec<u8>>;
}

/// Parent scope backed by the host archive
pub struct HostArchiveScope {
    resource: Arc<CandidateResource>,
}

impl HostArchiveScope {
    pub fn new(resource: Arc<CandidateResource>) -> Self {
        Self { resource }
    }
}

impl ParentScope for HostArchiveScope {
    fn load(&self, entry_path: &str) -> Option<Vec<u8>> {
        match self.resource.read_entry(entry_path) {
            Ok(found) => found,
            Err(e) => {
                warn!("Host archive read failed for {}: {}", entry_path, e);
                None
            }
        }
    }
}

/// Parent scope with nothing in it (tests, host-less tools)
pub struct EmptyParentScope;

impl ParentScope for EmptyParentScope {
    fn load(&self, _entry_path: &str) -> Option<Vec<u8>> {
        None
    }
}

/// One source contributed to the dynamic scope
pub struct ScopeSource {
    /// Contributing module id
    pub module_id: String,
    /// Contributing module descriptor (package metadata comes from here)
    pub descriptor: ModuleDescriptor,
    /// Byte container the entries are read from
    pub resource: Arc<CandidateResource>,
}

/// Ordered dynamic scope
#[derive(Default)]
pub struct DynamicScope {
    sources: Vec<ScopeSource>,
}

impl DynamicScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source; lookup honors insertion order
    pub fn push(&mut self, source: ScopeSource) {
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn source(&self, index: usize) -> Option<&ScopeSource> {
        self.sources.get(index)
    }

    /// Source contributed by a given module
    pub fn find_by_module(&self, module_id: &str) -> Option<&ScopeSource> {
        self.sources.iter().find(|s| s.module_id == module_id)
    }

    /// Find an entry across sources, first match wins
    ///
    /// Returns the index of the supplying source plus the bytes.
    pub fn find(&self, entry_path: &str) -> Option<(usize, Vec<u8>)> {
        for (index, source) in self.sources.iter().enumerate() {
            match source.resource.read_entry(entry_path) {
                Ok(Some(bytes)) => return Some((index, bytes)),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        "Skipping unreadable source {} for {}: {}",
                        source.module_id, entry_path, e
                    );
                }
            }
        }
        None
    }
}
