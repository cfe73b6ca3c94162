//! Candidate resources
//!
//! A candidate resource is an opaque handle over a byte container (a module
//! directory or a zip archive) plus an optional embedded descriptor. Probing
//! opens and closes the backing store per operation; reads that happen after
//! admission go through a single lazily-created archive view kept for the
//! resource's lifetime.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use zip::result::ZipError;
use zip::ZipArchive;

use crate::module::descriptor::ModuleDescriptor;
use crate::module::traits::EngineError;

/// How a candidate's bytes are stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceBacking {
    /// An exploded module directory
    Directory,
    /// A zip archive
    Archive,
}

/// An unparsed candidate that may or may not turn out to be a module
pub struct CandidateResource {
    /// Where this candidate came from ("engine", "host", "modules-dir")
    origin: String,
    path: PathBuf,
    backing: ResourceBacking,
    /// Embedded descriptor for synthetic candidates
    descriptor: Option<ModuleDescriptor>,
    /// Lazily-created archive view, kept open for later entry reads
    view: Mutex<Option<ZipArchive<File>>>,
}

impl CandidateResource {
    /// Candidate over an exploded module directory
    pub fn directory(origin: &str, path: PathBuf) -> Self {
        Self {
            origin: origin.to_string(),
            path,
            backing: ResourceBacking::Directory,
            descriptor: None,
            view: Mutex::new(None),
        }
    }

    /// Candidate over a zip archive
    pub fn archive(origin: &str, path: PathBuf) -> Self {
        Self {
            origin: origin.to_string(),
            path,
            backing: ResourceBacking::Archive,
            descriptor: None,
            view: Mutex::new(None),
        }
    }

    /// Synthetic candidate with an embedded descriptor (engine, host)
    pub fn synthetic(origin: &str, path: PathBuf, descriptor: ModuleDescriptor) -> Self {
        Self {
            origin: origin.to_string(),
            path,
            backing: ResourceBacking::Archive,
            descriptor: Some(descriptor),
            view: Mutex::new(None),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backing(&self) -> ResourceBacking {
        self.backing
    }

    /// Embedded descriptor, if this is a synthetic candidate
    pub fn embedded_descriptor(&self) -> Option<&ModuleDescriptor> {
        self.descriptor.as_ref()
    }

    /// Probe whether `path` is a zip archive containing `entry`
    ///
    /// Open-scan-close; used during location where most files probed are
    /// not modules at all.
    pub fn probe_archive(path: &Path, entry: &str) -> bool {
        let Ok(file) = File::open(path) else {
            return false;
        };
        let Ok(mut archive) = ZipArchive::new(file) else {
            return false;
        };
        let found = archive.by_name(entry).is_ok();
        found
    }

    /// Whether the container holds the named entry
    ///
    /// Opens and closes the backing store; does not create the kept view.
    pub fn has_entry(&self, entry: &str) -> bool {
        match self.backing {
            ResourceBacking::Directory => self.path.join(entry).is_file(),
            ResourceBacking::Archive => Self::probe_archive(&self.path, entry),
        }
    }

    /// Read an entry's bytes, or `None` when the entry does not exist
    ///
    /// Archive reads go through the kept view, created on first use.
    pub fn read_entry(&self, entry: &str) -> Result<Option<Vec<u8>>, EngineError> {
        match self.backing {
            ResourceBacking::Directory => {
                let full = self.path.join(entry);
                if !full.is_file() {
                    return Ok(None);
                }
                Ok(Some(std::fs::read(full)?))
            }
            ResourceBacking::Archive => {
                if !self.path.is_file() {
                    return Ok(None);
                }
                let mut guard = self.view.lock().unwrap_or_else(|e| e.into_inner());
                if guard.is_none() {
                    let file = File::open(&self.path)?;
                    *guard = Some(ZipArchive::new(file)?);
                }
                let archive = guard.as_mut().ok_or_else(|| {
                    EngineError::Resource(format!("archive view unavailable: {:?}", self.path))
                })?;
                let result = match archive.by_name(entry) {
                    Ok(mut file) => {
                        let mut bytes = Vec::with_capacity(file.size() as usize);
                        file.read_to_end(&mut bytes)?;
                        Ok(Some(bytes))
                    }
                    Err(ZipError::FileNotFound) => Ok(None),
                    Err(e) => Err(e.into()),
                };
                result
            }
        }
    }

    /// Read an entry as UTF-8 text
    pub fn read_entry_text(&self, entry: &str) -> Result<Option<String>, EngineError> {
        match self.read_entry(entry)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| EngineError::Resource(format!("{} is not UTF-8: {}", entry, e))),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for CandidateResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateResource")
            .field("origin", &self.origin)
            .field("path", &self.path)
            .field("backing", &self.backing)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}
