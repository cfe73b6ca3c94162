//! Shared test fixtures and helpers
#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use zip::write::FileOptions;

use modforge::loader::ParentScope;
use modforge::module::metadata::ModuleContainer;
use modforge::module::resource::CandidateResource;
use modforge::module::traits::{
    EngineError, LifecycleSink, ModuleContext, ModuleEntryPoint, ModuleFactory,
};
use modforge::module::{EnumerationOrder, ModuleDescriptor};
use modforge::transform::bundle::{Bundle, Export, Visibility};
use modforge::EngineConfig;

/// Temp-dir backed engine layout: module dir, library dir, host archive
pub struct Fixture {
    pub temp: TempDir,
    pub modules_dir: PathBuf,
    pub library_dir: PathBuf,
    pub host_archive: PathBuf,
}

impl Fixture {
    /// Layout with a host archive containing the `host.main` entry bundle
    /// (one internal `run` export, body `HOSTBODY`) and a data resource.
    pub fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let modules_dir = temp.path().join("modules");
        let library_dir = temp.path().join("libraries");
        fs::create_dir_all(&modules_dir).unwrap();
        fs::create_dir_all(&library_dir).unwrap();

        let host_archive = temp.path().join("host.zip");
        write_zip(
            &host_archive,
            &[
                ("host/main.mfb", bundle(&[("run", false)], b"HOSTBODY")),
                ("host/data.txt", b"host data".to_vec()),
            ],
        );

        Self {
            temp,
            modules_dir,
            library_dir,
            host_archive,
        }
    }

    /// Engine config over this layout, lexicographic for reproducibility
    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            debug: false,
            host_archive: self.host_archive.clone(),
            host_entry_point: "host.main".to_string(),
            host_version: "1.0.0".to_string(),
            module_dir: self.modules_dir.clone(),
            library_dir: self.library_dir.clone(),
            excluded_prefixes: Vec::new(),
            enumeration_order: EnumerationOrder::Lexicographic,
        }
    }

    /// Write an exploded module directory
    pub fn write_module_dir(&self, dir_name: &str, descriptor: &str, extra: &[(&str, Vec<u8>)]) {
        let dir = self.modules_dir.join(dir_name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("module.toml"), descriptor).unwrap();
        for (entry, bytes) in extra {
            let path = dir.join(entry);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, bytes).unwrap();
        }
    }

    /// Write a zip-backed module archive
    pub fn write_module_archive(&self, file_name: &str, descriptor: &str, extra: &[(&str, Vec<u8>)]) {
        let mut entries: Vec<(&str, Vec<u8>)> =
            vec![("module.toml", descriptor.as_bytes().to_vec())];
        entries.extend(extra.iter().map(|(e, b)| (*e, b.clone())));
        write_zip(&self.modules_dir.join(file_name), &entries);
    }
}

/// Write a zip archive with the given entries
pub fn write_zip(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (entry, bytes) in entries {
        zip.start_file(*entry, FileOptions::default()).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

/// Encode a bundle; exports are (name, public) pairs
pub fn bundle(exports: &[(&str, bool)], body: &[u8]) -> Vec<u8> {
    Bundle {
        exports: exports
            .iter()
            .map(|(name, public)| Export {
                name: name.to_string(),
                visibility: if *public {
                    Visibility::Public
                } else {
                    Visibility::Internal
                },
            })
            .collect(),
        body: body.to_vec(),
    }
    .encode()
    .unwrap()
}

/// Render a module descriptor
pub fn module_toml(
    id: &str,
    version: &str,
    deps: &[&str],
    optional: &[&str],
    entry_point: Option<&str>,
    instrumentation: &[&str],
) -> String {
    let mut out = format!("id = \"{}\"\nversion = \"{}\"\n", id, version);
    if let Some(entry) = entry_point {
        out.push_str(&format!("entry_point = \"{}\"\n", entry));
    }
    let list = |items: &[&str]| {
        items
            .iter()
            .map(|i| format!("\"{}\"", i))
            .collect::<Vec<_>>()
            .join(", ")
    };
    if !deps.is_empty() {
        out.push_str(&format!("dependencies = [{}]\n", list(deps)));
    }
    if !optional.is_empty() {
        out.push_str(&format!("optional_dependencies = [{}]\n", list(optional)));
    }
    if !instrumentation.is_empty() {
        out.push_str(&format!(
            "instrumentation_configs = [{}]\n",
            list(instrumentation)
        ));
    }
    out
}

/// In-memory container for resolver tests; no files behind it
pub fn container(id: &str, version: &str, deps: &[&str], optional: &[&str]) -> ModuleContainer {
    let descriptor = ModuleDescriptor {
        id: id.to_string(),
        version: version.to_string(),
        entry_point: None,
        dependencies: deps.iter().map(|d| d.to_string()).collect(),
        optional_dependencies: optional.iter().map(|d| d.to_string()).collect(),
        instrumentation_configs: Vec::new(),
        auxiliary_resources: Vec::new(),
    };
    ModuleContainer {
        id: descriptor.id.clone(),
        version: descriptor.version.clone(),
        descriptor,
        resource: Arc::new(CandidateResource::directory(
            "test",
            PathBuf::from("/nonexistent"),
        )),
        span: tracing::info_span!("module", id = %id),
    }
}

/// Parent scope over an in-memory entry map
pub struct MapParentScope(pub HashMap<String, Vec<u8>>);

impl MapParentScope {
    pub fn new(entries: &[(&str, Vec<u8>)]) -> Self {
        Self(
            entries
                .iter()
                .map(|(e, b)| (e.to_string(), b.clone()))
                .collect(),
        )
    }
}

impl ParentScope for MapParentScope {
    fn load(&self, entry_path: &str) -> Option<Vec<u8>> {
        self.0.get(entry_path).cloned()
    }
}

/// Factory recording construction order
#[derive(Clone, Default)]
pub struct RecordingFactory {
    pub constructed: Arc<Mutex<Vec<String>>>,
}

impl ModuleFactory for RecordingFactory {
    fn instantiate(
        &self,
        container: &ModuleContainer,
        _entry_point: &str,
    ) -> Result<Box<dyn ModuleEntryPoint>, EngineError> {
        Ok(Box::new(RecordingEntryPoint {
            module_id: container.id.clone(),
            constructed: Arc::clone(&self.constructed),
        }))
    }
}

struct RecordingEntryPoint {
    module_id: String,
    constructed: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ModuleEntryPoint for RecordingEntryPoint {
    async fn construct(&mut self, _context: ModuleContext) -> Result<(), EngineError> {
        self.constructed.lock().unwrap().push(self.module_id.clone());
        Ok(())
    }

    async fn initialize(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Lifecycle sink recording milestone order
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub events: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl LifecycleSink for RecordingSink {
    async fn on_construct(&self, module_id: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("construct:{}", module_id));
    }

    async fn on_initialize(&self) {
        self.events.lock().unwrap().push("initialize".to_string());
    }
}
