//! Loader caches
//!
//! Artifact resolution triggers file I/O and the pipeline is not guaranteed
//! idempotent byte-for-byte, so every (name, phase) result is memoized for
//! the loader's lifetime. The cache guarantees at most one transformation
//! run per key even under concurrent callers: the first caller computes
//! while holding the entry's slot, later callers block on it and reuse the
//! stored result.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::module::traits::EngineError;
use crate::transform::pipeline::Phase;

/// Package-level descriptive attributes
///
/// Associated at package granularity, not per artifact, and resolved lazily
/// the first time any artifact from the package is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMeta {
    /// Package portion of the canonical name
    pub package: String,
    /// Module that supplied the package
    pub module_id: String,
    /// Supplying module's version
    pub version: String,
}

/// A resolved, transformed artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedArtifact {
    /// Canonical artifact name
    pub canonical_name: String,
    /// Transformed bytes
    pub bytes: Vec<u8>,
    /// Package attributes, when a dynamic-scope module supplied the artifact
    pub package: Option<Arc<PackageMeta>>,
}

/// Cache lookup result; `None` memoizes "not found"
pub type Lookup = Option<Arc<LoadedArtifact>>;

type Slot = Arc<Mutex<Option<Lookup>>>;

/// (name, phase) -> artifact memo
#[derive(Default)]
pub struct ArtifactCache {
    slots: Mutex<HashMap<(String, Phase), Slot>>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached result or run `compute` exactly once
    ///
    /// Concurrent callers for the same key serialize on the entry slot:
    /// the first computes, the rest wait and observe the same result.
    /// A failed computation is not cached, so a later caller may retry.
    pub fn get_or_compute<F>(
        &self,
        canonical_name: &str,
        phase: Phase,
        compute: F,
    ) -> Result<Lookup, EngineError>
    where
        F: FnOnce() -> Result<Lookup, EngineError>,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots
                .entry((canonical_name.to_string(), phase))
                .or_default()
                .clone()
        };

        let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(result) = guard.as_ref() {
            return Ok(result.clone());
        }
        let result = compute()?;
        *guard = Some(result.clone());
        Ok(result)
    }

    /// Number of memoized (name, phase) entries
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lazy package metadata cache, keyed by package name
#[derive(Default)]
pub struct PackageMetaCache {
    packages: Mutex<HashMap<String, Arc<PackageMeta>>>,
}

impl PackageMetaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve and memoize attributes for `package`
    pub fn resolve<F>(&self, package: &str, resolve: F) -> Arc<PackageMeta>
    where
        F: FnOnce() -> PackageMeta,
    {
        let mut packages = self.packages.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(meta) = packages.get(package) {
            return Arc::clone(meta);
        }
        let meta = Arc::new(resolve());
        packages.insert(package.to_string(), Arc::clone(&meta));
        meta
    }
}
