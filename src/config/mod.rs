//! Engine configuration
//!
//! The bootstrap stage computes these values (from the CLI or its own
//! probing) and publishes them on the blackboard; the engine reads them back
//! without sharing a constructor graph with the bootstrap.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::blackboard::Blackboard;
use crate::module::locator::EnumerationOrder;
use crate::module::traits::EngineError;

/// Well-known blackboard key names populated by the bootstrap
pub mod keys {
    /// `bool`: verbose diagnostics
    pub const DEBUG: &str = "modforge.debug";
    /// `PathBuf`: the host archive to launch
    pub const HOST_ARCHIVE: &str = "modforge.host_archive";
    /// `String`: canonical name of the host entry point artifact
    pub const HOST_ENTRY_POINT: &str = "modforge.host_entry_point";
    /// `String`: host version advertised by the synthetic host module
    pub const HOST_VERSION: &str = "modforge.host_version";
    /// `PathBuf`: directory scanned for module packages
    pub const MODULE_DIR: &str = "modforge.module_dir";
    /// `PathBuf`: directory holding the engine's own support libraries
    pub const LIBRARY_DIR: &str = "modforge.library_dir";
    /// `Vec<String>`: extra excluded namespace prefixes
    pub const EXCLUDED_PREFIXES: &str = "modforge.excluded_prefixes";
    /// `EnumerationOrder`: module directory enumeration order
    pub const ENUMERATION_ORDER: &str = "modforge.enumeration_order";
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Verbose diagnostics
    #[serde(default)]
    pub debug: bool,

    /// Host archive to launch
    pub host_archive: PathBuf,

    /// Canonical name of the host entry point artifact
    pub host_entry_point: String,

    /// Host version advertised by the synthetic host module
    #[serde(default = "default_host_version")]
    pub host_version: String,

    /// Directory scanned for module packages
    #[serde(default = "default_module_dir")]
    pub module_dir: PathBuf,

    /// Directory holding the engine's own support libraries
    #[serde(default = "default_library_dir")]
    pub library_dir: PathBuf,

    /// Extra excluded namespace prefixes, on top of the engine defaults
    #[serde(default)]
    pub excluded_prefixes: Vec<String>,

    /// Module directory enumeration order
    #[serde(default)]
    pub enumeration_order: EnumerationOrder,
}

fn default_host_version() -> String {
    "0".to_string()
}

fn default_module_dir() -> PathBuf {
    PathBuf::from("modules")
}

fn default_library_dir() -> PathBuf {
    PathBuf::from("libraries")
}

impl EngineConfig {
    /// Publish this configuration on the blackboard
    ///
    /// Write-once: installing twice on the same registry is an error.
    pub fn install(&self, blackboard: &Blackboard) -> Result<(), EngineError> {
        blackboard.put(&blackboard.key::<bool>(keys::DEBUG)?, self.debug)?;
        blackboard.put(
            &blackboard.key::<PathBuf>(keys::HOST_ARCHIVE)?,
            self.host_archive.clone(),
        )?;
        blackboard.put(
            &blackboard.key::<String>(keys::HOST_ENTRY_POINT)?,
            self.host_entry_point.clone(),
        )?;
        blackboard.put(
            &blackboard.key::<String>(keys::HOST_VERSION)?,
            self.host_version.clone(),
        )?;
        blackboard.put(
            &blackboard.key::<PathBuf>(keys::MODULE_DIR)?,
            self.module_dir.clone(),
        )?;
        blackboard.put(
            &blackboard.key::<PathBuf>(keys::LIBRARY_DIR)?,
            self.library_dir.clone(),
        )?;
        blackboard.put(
            &blackboard.key::<Vec<String>>(keys::EXCLUDED_PREFIXES)?,
            self.excluded_prefixes.clone(),
        )?;
        blackboard.put(
            &blackboard.key::<EnumerationOrder>(keys::ENUMERATION_ORDER)?,
            self.enumeration_order,
        )?;
        Ok(())
    }

    /// Rebuild the configuration from blackboard values
    ///
    /// The host archive and entry point are required; everything else falls
    /// back to defaults when the bootstrap left it unset.
    pub fn from_blackboard(blackboard: &Blackboard) -> Result<Self, EngineError> {
        let host_archive = blackboard
            .get(&blackboard.key::<PathBuf>(keys::HOST_ARCHIVE)?)
            .ok_or_else(|| {
                EngineError::Blackboard("bootstrap did not set the host archive path".to_string())
            })?;
        let host_entry_point = blackboard
            .get(&blackboard.key::<String>(keys::HOST_ENTRY_POINT)?)
            .ok_or_else(|| {
                EngineError::Blackboard("bootstrap did not set the host entry point".to_string())
            })?;

        Ok(Self {
            debug: blackboard
                .get(&blackboard.key::<bool>(keys::DEBUG)?)
                .map(|v| *v)
                .unwrap_or(false),
            host_archive: (*host_archive).clone(),
            host_entry_point: (*host_entry_point).clone(),
            host_version: blackboard
                .get(&blackboard.key::<String>(keys::HOST_VERSION)?)
                .map(|v| (*v).clone())
                .unwrap_or_else(default_host_version),
            module_dir: blackboard
                .get(&blackboard.key::<PathBuf>(keys::MODULE_DIR)?)
                .map(|v| (*v).clone())
                .unwrap_or_else(default_module_dir),
            library_dir: blackboard
                .get(&blackboard.key::<PathBuf>(keys::LIBRARY_DIR)?)
                .map(|v| (*v).clone())
                .unwrap_or_else(default_library_dir),
            excluded_prefixes: blackboard
                .get(&blackboard.key::<Vec<String>>(keys::EXCLUDED_PREFIXES)?)
                .map(|v| (*v).clone())
                .unwrap_or_default(),
            enumeration_order: blackboard
                .get(&blackboard.key::<EnumerationOrder>(keys::ENUMERATION_ORDER)?)
                .map(|v| *v)
                .unwrap_or_default(),
        })
    }
}
