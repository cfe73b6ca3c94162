//! Engine orchestration
//!
//! Wires the whole launch together: locate candidates, load metadata,
//! resolve the dependency order, build the layered loader and pipeline,
//! instantiate modules in order, fire lifecycle milestones, and resolve the
//! host entry point artifact. Fatal errors propagate out of `run`;
//! module-level failures only exclude the module they belong to.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::blackboard::Blackboard;
use crate::config::EngineConfig;
use crate::loader::{HostArchiveScope, LayeredLoader, LoadedArtifact};
use crate::module::locator::{ModuleLocator, ENGINE_MODULE_ID, HOST_MODULE_ID};
use crate::module::manager::ModuleManager;
use crate::module::metadata::{MetadataLoader, ModuleContainer};
use crate::module::resolver::{DependencyResolver, ResolveError};
use crate::module::traits::{EngineError, LifecycleSink, ModuleFactory};
use crate::transform::patcher::register_from_containers;
use crate::transform::pipeline::{Phase, TransformPipeline};

/// Entry archive name inside the library directory
const ENGINE_ARCHIVE_NAME: &str = "modforge.zip";

/// Outcome of a launch
#[derive(Debug)]
pub struct LaunchReport {
    /// Module ids in the order they were loaded
    pub loaded: Vec<String>,
    /// Recoverable resolution errors (modules excluded, run continued)
    pub errors: Vec<ResolveError>,
    /// The transformed host entry point artifact, when the host supplies one
    pub entry_artifact: Option<Arc<LoadedArtifact>>,
}

/// Engine front end
pub struct Engine {
    config: EngineConfig,
    blackboard: Arc<Blackboard>,
    factory: Arc<dyn ModuleFactory>,
    lifecycle: Arc<dyn LifecycleSink>,
    loader: Option<Arc<LayeredLoader>>,
    manager: Option<ModuleManager>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        blackboard: Arc<Blackboard>,
        factory: Arc<dyn ModuleFactory>,
        lifecycle: Arc<dyn LifecycleSink>,
    ) -> Self {
        Self {
            config,
            blackboard,
            factory,
            lifecycle,
            loader: None,
            manager: None,
        }
    }

    /// Build an engine from bootstrap-populated blackboard values
    pub fn from_blackboard(
        blackboard: Arc<Blackboard>,
        factory: Arc<dyn ModuleFactory>,
        lifecycle: Arc<dyn LifecycleSink>,
    ) -> Result<Self, EngineError> {
        let config = EngineConfig::from_blackboard(&blackboard)?;
        Ok(Self::new(config, blackboard, factory, lifecycle))
    }

    /// The layered loader, once `run` has built it
    pub fn loader(&self) -> Option<&Arc<LayeredLoader>> {
        self.loader.as_ref()
    }

    /// The module manager, once `run` has built it
    pub fn manager(&self) -> Option<&ModuleManager> {
        self.manager.as_ref()
    }

    /// Execute the full launch sequence
    pub async fn run(&mut self) -> Result<LaunchReport, EngineError> {
        info!("Starting modforge {}", env!("CARGO_PKG_VERSION"));

        // Locate and load module metadata.
        let engine_archive: PathBuf = self.config.library_dir.join(ENGINE_ARCHIVE_NAME);
        let locator = ModuleLocator::new(
            &self.config.module_dir,
            &engine_archive,
            &self.config.host_archive,
            &self.config.host_version,
            self.config.enumeration_order,
        );
        let candidates = locator.locate()?;
        let containers = MetadataLoader::new().load(candidates);

        // Resolve the load order; a cycle is fatal for the whole run.
        let resolution = DependencyResolver::resolve(containers);
        if let Some(fatal) = resolution.fatal_error() {
            return Err(EngineError::CircularDependency(fatal.to_string()));
        }
        for error in &resolution.errors {
            warn!("Module excluded: {}", error);
        }

        // Build the layered loader: the host archive is the parent scope,
        // the engine plus every resolved module contribute the dynamic scope.
        let host = resolution
            .load_order
            .iter()
            .find(|c| c.id == HOST_MODULE_ID)
            .cloned()
            .ok_or_else(|| {
                EngineError::HostArchiveMissing(self.config.host_archive.display().to_string())
            })?;

        let mut loader = LayeredLoader::new(Arc::new(HostArchiveScope::new(Arc::clone(
            &host.resource,
        ))));
        loader.exclude_prefixes(self.config.excluded_prefixes.iter().cloned());
        for container in &resolution.load_order {
            if container.id == HOST_MODULE_ID {
                continue;
            }
            loader.add_source(container);
        }

        // Register transformers declared by the resolved modules, then make
        // the pipeline available to the loader.
        let mut pipeline = TransformPipeline::new();
        register_from_containers(&mut pipeline, &resolution.load_order);
        info!("Registered {} transformers", pipeline.len());
        loader.install_pipeline(Arc::new(pipeline));
        let loader = Arc::new(loader);
        self.loader = Some(Arc::clone(&loader));

        // Instantiate entry points in dependency order, then initialize.
        let mut manager = ModuleManager::new(
            Arc::clone(&self.factory),
            Arc::clone(&self.lifecycle),
            Arc::clone(&self.blackboard),
            self.config.module_dir.join("config"),
        );
        let load_order: Vec<ModuleContainer> = resolution
            .load_order
            .iter()
            .filter(|c| c.id != HOST_MODULE_ID && c.id != ENGINE_MODULE_ID)
            .cloned()
            .collect();
        let loaded: Vec<String> = load_order.iter().map(|c| c.id.clone()).collect();
        manager.construct_all(load_order).await;
        manager.initialize_all().await;
        self.manager = Some(manager);

        // Resolve the host entry point through the loader so control is
        // handed to fully-instrumented code.
        let entry_artifact = loader.load_artifact(&self.config.host_entry_point, Phase::Patch)?;
        if entry_artifact.is_none() {
            warn!(
                "Host entry point {} not found in any scope",
                self.config.host_entry_point
            );
        }

        info!("Launch complete: {} modules loaded", loaded.len());
        Ok(LaunchReport {
            loaded,
            errors: resolution.errors,
            entry_artifact,
        })
    }
}
