//! Layered loader
//!
//! Runtime front end for artifact lookups. Resolution order: the dynamic
//! scope (module- and engine-contributed sources, registration order, first
//! match wins), then the parent scope. A configurable prefix list excludes
//! the loader's own support namespaces from the dynamic scope and from
//! transformation entirely, which is what keeps the loader from transforming
//! or shadowing the code that implements the loader.

pub mod cache;
pub mod scope;

use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

use crate::module::metadata::ModuleContainer;
use crate::module::traits::EngineError;
use crate::transform::pipeline::{Phase, TransformPipeline};

pub use cache::{ArtifactCache, LoadedArtifact, PackageMeta, PackageMetaCache};
pub use scope::{
    artifact_entry, package_of, DynamicScope, EmptyParentScope, HostArchiveScope, ParentScope,
    ScopeSource,
};

/// Namespaces never served from the dynamic scope nor transformed
pub const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &["modforge."];

/// Layered artifact loader
pub struct LayeredLoader {
    dynamic: DynamicScope,
    parent: Arc<dyn ParentScope>,
    excluded_prefixes: Vec<String>,
    /// Installed late; a transforming lookup before installation is fatal
    pipeline: Mutex<Option<Arc<TransformPipeline>>>,
    cache: ArtifactCache,
    packages: PackageMetaCache,
}

impl LayeredLoader {
    pub fn new(parent: Arc<dyn ParentScope>) -> Self {
        Self {
            dynamic: DynamicScope::new(),
            parent,
            excluded_prefixes: DEFAULT_EXCLUDED_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            pipeline: Mutex::new(None),
            cache: ArtifactCache::new(),
            packages: PackageMetaCache::new(),
        }
    }

    /// Add prefixes to the exclusion list
    pub fn exclude_prefixes<I: IntoIterator<Item = String>>(&mut self, prefixes: I) {
        self.excluded_prefixes.extend(prefixes);
    }

    /// Contribute a module's resource to the dynamic scope
    ///
    /// Sources are consulted in the order they were added.
    pub fn add_source(&mut self, container: &ModuleContainer) {
        debug!("Adding {} to dynamic scope", container.id);
        self.dynamic.push(ScopeSource {
            module_id: container.id.clone(),
            descriptor: container.descriptor.clone(),
            resource: Arc::clone(&container.resource),
        });
    }

    /// Install the transformation pipeline
    pub fn install_pipeline(&self, pipeline: Arc<TransformPipeline>) {
        *self.pipeline.lock().unwrap_or_else(|e| e.into_inner()) = Some(pipeline);
    }

    /// Whether a canonical name matches an excluded prefix
    pub fn is_excluded(&self, canonical_name: &str) -> bool {
        self.excluded_prefixes
            .iter()
            .any(|prefix| canonical_name.starts_with(prefix.as_str()))
    }

    /// Whether a literal entry path falls under an excluded namespace
    ///
    /// Prefixes are declared in dotted form (`modforge.`); resource lookups
    /// address entries by path (`modforge/support.dat`), so both spellings
    /// are matched.
    pub fn is_excluded_entry(&self, entry_path: &str) -> bool {
        self.excluded_prefixes.iter().any(|prefix| {
            entry_path.starts_with(prefix.as_str())
                || entry_path.starts_with(&prefix.replace('.', "/"))
        })
    }

    /// Resolve a code artifact by canonical name for a phase
    ///
    /// Excluded names delegate straight to the parent, untransformed.
    /// Everything else is resolved once per (name, phase), transformed, and
    /// memoized for the loader's lifetime.
    pub fn load_artifact(
        &self,
        canonical_name: &str,
        phase: Phase,
    ) -> Result<Option<Arc<LoadedArtifact>>, EngineError> {
        if self.is_excluded(canonical_name) {
            trace!("{} is excluded, delegating to parent", canonical_name);
            return Ok(self.parent.load(&artifact_entry(canonical_name)).map(|bytes| {
                Arc::new(LoadedArtifact {
                    canonical_name: canonical_name.to_string(),
                    bytes,
                    package: None,
                })
            }));
        }

        self.cache.get_or_compute(canonical_name, phase, || {
            self.resolve_and_transform(canonical_name, phase)
        })
    }

    /// Resolve a non-code resource by literal entry path
    ///
    /// Resources bypass the pipeline; lookup order matches code artifacts,
    /// including the exclusion rule: excluded namespaces are never served
    /// from the dynamic scope even when a module packages them.
    pub fn load_resource(&self, entry_path: &str) -> Result<Option<Vec<u8>>, EngineError> {
        if self.is_excluded_entry(entry_path) {
            trace!("{} is excluded, delegating to parent", entry_path);
            return Ok(self.parent.load(entry_path));
        }
        if let Some((_, bytes)) = self.dynamic.find(entry_path) {
            return Ok(Some(bytes));
        }
        Ok(self.parent.load(entry_path))
    }

    /// Resolve one phase's input and run the applicable transformers
    ///
    /// `Entry` consumes the raw bytes from the scopes; later phases consume
    /// the previous phase's memoized output, which is what keeps a patching
    /// transformer from re-entering its own output.
    fn resolve_and_transform(
        &self,
        canonical_name: &str,
        phase: Phase,
    ) -> Result<Option<Arc<LoadedArtifact>>, EngineError> {
        let (input, package) = match phase.previous() {
            None => {
                let entry = artifact_entry(canonical_name);
                match self.dynamic.find(&entry) {
                    Some((index, bytes)) => {
                        let source = self.dynamic.source(index);
                        let package = source.map(|s| {
                            self.packages.resolve(package_of(canonical_name), || PackageMeta {
                                package: package_of(canonical_name).to_string(),
                                module_id: s.module_id.clone(),
                                version: s.descriptor.version.clone(),
                            })
                        });
                        (bytes, package)
                    }
                    None => match self.parent.load(&entry) {
                        Some(bytes) => (bytes, None),
                        None => {
                            trace!("Artifact {} not found in any scope", canonical_name);
                            return Ok(None);
                        }
                    },
                }
            }
            Some(previous) => match self.load_artifact(canonical_name, previous)? {
                Some(artifact) => (artifact.bytes.clone(), artifact.package.clone()),
                None => return Ok(None),
            },
        };

        let pipeline = self
            .pipeline
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| EngineError::PipelineUnavailable(canonical_name.to_string()))?;

        let source_descriptor = package
            .as_ref()
            .and_then(|p| self.dynamic.find_by_module(&p.module_id))
            .map(|s| s.descriptor.clone());
        let transformed = pipeline.transform(
            canonical_name,
            input,
            phase,
            source_descriptor.as_ref(),
        );

        debug!(
            "Resolved {} in {:?} ({} bytes)",
            canonical_name,
            phase,
            transformed.len()
        );
        Ok(Some(Arc::new(LoadedArtifact {
            canonical_name: canonical_name.to_string(),
            bytes: transformed,
            package,
        })))
    }
}
