//! Module location
//!
//! Scans the configured module directory for candidate resources and always
//! emits two synthetic candidates for the engine's own archive and the host
//! archive, so both flow through the same metadata and transformation
//! machinery as ordinary modules.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::module::descriptor::{ModuleDescriptor, DESCRIPTOR_ENTRY};
use crate::module::resource::CandidateResource;
use crate::module::traits::EngineError;

/// Origin tag for the engine's synthetic candidate
pub const ORIGIN_ENGINE: &str = "engine";
/// Origin tag for the host's synthetic candidate
pub const ORIGIN_HOST: &str = "host";
/// Origin tag for candidates found in the module directory
pub const ORIGIN_MODULES_DIR: &str = "modules-dir";

/// Module id assigned to the synthetic host candidate
pub const HOST_MODULE_ID: &str = "host";
/// Module id assigned to the synthetic engine candidate
pub const ENGINE_MODULE_ID: &str = "modforge";

/// How directory entries are enumerated
///
/// The original inherits the platform's directory-walk order, which decides
/// which of two same-id modules wins. That order is an explicit parameter
/// here instead of an incidental platform quirk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnumerationOrder {
    /// Whatever order the filesystem reports (documented non-determinism)
    #[default]
    Filesystem,
    /// Sorted by file name, reproducible across platforms
    Lexicographic,
}

/// Module locator
pub struct ModuleLocator {
    module_dir: PathBuf,
    engine_archive: PathBuf,
    host_archive: PathBuf,
    host_version: String,
    order: EnumerationOrder,
}

impl ModuleLocator {
    pub fn new<P: AsRef<Path>>(
        module_dir: P,
        engine_archive: P,
        host_archive: P,
        host_version: &str,
        order: EnumerationOrder,
    ) -> Self {
        Self {
            module_dir: module_dir.as_ref().to_path_buf(),
            engine_archive: engine_archive.as_ref().to_path_buf(),
            host_archive: host_archive.as_ref().to_path_buf(),
            host_version: host_version.to_string(),
            order,
        }
    }

    /// Locate all candidate resources
    ///
    /// A missing host archive is fatal; everything else found in the module
    /// directory that is not a module is silently skipped.
    pub fn locate(&self) -> Result<Vec<CandidateResource>, EngineError> {
        info!("Locating module candidates in {:?}", self.module_dir);

        if !self.host_archive.is_file() {
            return Err(EngineError::HostArchiveMissing(
                self.host_archive.display().to_string(),
            ));
        }

        let mut candidates = vec![
            CandidateResource::synthetic(
                ORIGIN_ENGINE,
                self.engine_archive.clone(),
                ModuleDescriptor::synthetic(ENGINE_MODULE_ID, env!("CARGO_PKG_VERSION")),
            ),
            CandidateResource::synthetic(
                ORIGIN_HOST,
                self.host_archive.clone(),
                ModuleDescriptor::synthetic(HOST_MODULE_ID, &self.host_version),
            ),
        ];

        candidates.extend(self.scan_module_dir()?);

        info!("Located {} candidate resources", candidates.len());
        Ok(candidates)
    }

    /// Non-recursive scan of the module directory
    fn scan_module_dir(&self) -> Result<Vec<CandidateResource>, EngineError> {
        if !self.module_dir.exists() {
            debug!(
                "Module directory does not exist, creating: {:?}",
                self.module_dir
            );
            fs::create_dir_all(&self.module_dir)?;
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.module_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();

        if self.order == EnumerationOrder::Lexicographic {
            paths.sort();
        }

        let mut candidates = Vec::new();
        for path in paths {
            if path.is_dir() {
                // Exploded module: admitted only when the marker entry exists.
                if path.join(DESCRIPTOR_ENTRY).is_file() {
                    candidates.push(CandidateResource::directory(ORIGIN_MODULES_DIR, path));
                } else {
                    debug!("No {} in {:?}, skipping", DESCRIPTOR_ENTRY, path);
                }
            } else if path.is_file() {
                // Archive-like file: probe for the marker entry. Most files
                // found here are not modules, so failures are not an error.
                if CandidateResource::probe_archive(&path, DESCRIPTOR_ENTRY) {
                    candidates.push(CandidateResource::archive(ORIGIN_MODULES_DIR, path));
                } else {
                    debug!("Not a module archive, skipping: {:?}", path);
                }
            }
        }

        Ok(candidates)
    }
}
