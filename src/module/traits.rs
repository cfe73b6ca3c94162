//! Module system traits and interfaces
//!
//! Defines the core traits the engine and module entry points use to
//! communicate, plus the engine-wide error taxonomy.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::blackboard::Blackboard;
use crate::module::metadata::ModuleContainer;

/// Module lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleState {
    /// Container is known but no entry point has been constructed
    Discovered,
    /// Entry point instantiated and constructed
    Constructed,
    /// Entry point fully initialized
    Initialized,
    /// Instantiation or construction failed; module is excluded
    Failed(String),
}

/// Context handed to a module entry point at construction
///
/// Carries the per-module scoped values the original resolved through
/// dependency injection: a stable instance id, the module's config
/// directory, its flattened configuration, and the shared blackboard.
#[derive(Debug, Clone)]
pub struct ModuleContext {
    /// Unique id for this module instance
    pub instance_id: String,
    /// Module id from the descriptor
    pub module_id: String,
    /// Module-specific configuration directory
    pub config_dir: PathBuf,
    /// Flattened module configuration (key-value pairs)
    pub config: HashMap<String, String>,
    /// Shared property registry
    pub blackboard: Arc<Blackboard>,
}

impl ModuleContext {
    /// Get a configuration value
    pub fn get_config(&self, key: &str) -> Option<&String> {
        self.config.get(key)
    }

    /// Get a configuration value with default
    pub fn get_config_or(&self, key: &str, default: &str) -> String {
        self.config
            .get(key)
            .map(|s| s.as_str())
            .unwrap_or(default)
            .to_string()
    }
}

/// Entry point implemented by loadable modules
///
/// `construct` is called per module in dependency order; `initialize` is
/// called for every module only after all entry points exist, so a module
/// may look up its dependencies' instances during `initialize`.
#[async_trait]
pub trait ModuleEntryPoint: Send + Sync {
    /// Called once, in dependency order, with the module's context
    async fn construct(&mut self, context: ModuleContext) -> Result<(), EngineError>;

    /// Called once after every module's entry point has been constructed
    async fn initialize(&mut self) -> Result<(), EngineError>;
}

/// Explicit instantiation factory
///
/// Replaces the original's reflective injector: given a container and the
/// descriptor's fully-qualified entry point name, produce an instance.
pub trait ModuleFactory: Send + Sync {
    fn instantiate(
        &self,
        container: &ModuleContainer,
        entry_point: &str,
    ) -> Result<Box<dyn ModuleEntryPoint>, EngineError>;
}

/// Sink for lifecycle milestone notifications
#[async_trait]
pub trait LifecycleSink: Send + Sync {
    /// A module's entry point was instantiated and constructed
    async fn on_construct(&self, module_id: &str);

    /// All entry points exist and have been initialized
    async fn on_initialize(&self);
}

/// Factory used by the standalone binary
///
/// Embedding hosts supply their own factory that knows how to execute entry
/// point artifacts; this one produces entry points that only log their
/// lifecycle, which is enough to exercise discovery, ordering, and
/// instrumentation end to end.
pub struct LoggingModuleFactory;

impl ModuleFactory for LoggingModuleFactory {
    fn instantiate(
        &self,
        container: &ModuleContainer,
        entry_point: &str,
    ) -> Result<Box<dyn ModuleEntryPoint>, EngineError> {
        Ok(Box::new(LoggingEntryPoint {
            module_id: container.id.clone(),
            entry_point: entry_point.to_string(),
        }))
    }
}

struct LoggingEntryPoint {
    module_id: String,
    entry_point: String,
}

#[async_trait]
impl ModuleEntryPoint for LoggingEntryPoint {
    async fn construct(&mut self, context: ModuleContext) -> Result<(), EngineError> {
        tracing::info!(
            "Constructed {} ({}) as {}",
            self.module_id,
            self.entry_point,
            context.instance_id
        );
        Ok(())
    }

    async fn initialize(&mut self) -> Result<(), EngineError> {
        tracing::info!("Initialized {}", self.module_id);
        Ok(())
    }
}

/// Lifecycle sink that only logs milestones
pub struct LoggingLifecycleSink;

#[async_trait]
impl LifecycleSink for LoggingLifecycleSink {
    async fn on_construct(&self, module_id: &str) {
        tracing::debug!("Module {} constructed", module_id);
    }

    async fn on_initialize(&self) {
        tracing::debug!("All modules initialized");
    }
}

/// Engine errors
///
/// Fatal variants (missing host archive, circular dependency, pipeline
/// unavailable) abort the run; the rest are recoverable at the scope of a
/// single module or transformer.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Host archive not found: {0}")]
    HostArchiveMissing(String),

    #[error("{0}")]
    CircularDependency(String),

    #[error("Transformation pipeline not installed before artifact lookup for {0}")]
    PipelineUnavailable(String),

    #[error("Invalid module descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Module dependency missing: {0}")]
    DependencyMissing(String),

    #[error("Duplicate module id: {0}")]
    DuplicateId(String),

    #[error("Module instantiation failed: {0}")]
    Instantiation(String),

    #[error("Malformed bundle: {0}")]
    MalformedBundle(String),

    #[error("Transformer error: {0}")]
    Transform(String),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Property registry error: {0}")]
    Blackboard(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether this error aborts the run rather than excluding one module
    /// or one transformer.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::HostArchiveMissing(_)
                | EngineError::CircularDependency(_)
                | EngineError::PipelineUnavailable(_)
        )
    }
}

impl From<zip::result::ZipError> for EngineError {
    fn from(e: zip::result::ZipError) -> Self {
        EngineError::Resource(e.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(e: toml::de::Error) -> Self {
        EngineError::InvalidDescriptor(e.to_string())
    }
}
