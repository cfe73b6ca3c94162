//! Module manager
//!
//! Orchestrates resolver output: instantiates each module's entry point in
//! resolved order through the explicit factory, wires it to host-provided
//! services, records instance-container associations, and fires lifecycle
//! milestones. Instantiation failures exclude that one module and leave its
//! siblings untouched.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

use crate::blackboard::Blackboard;
use crate::module::metadata::ModuleContainer;
use crate::module::traits::{
    EngineError, LifecycleSink, ModuleContext, ModuleEntryPoint, ModuleFactory, ModuleState,
};

/// Managed module instance
struct ManagedModule {
    /// Container this instance was built from
    container: ModuleContainer,
    /// Entry point instance, when the descriptor declares one
    entry: Option<Box<dyn ModuleEntryPoint>>,
    /// Module state
    state: ModuleState,
}

/// Module manager coordinating all loaded modules
pub struct ModuleManager {
    factory: Arc<dyn ModuleFactory>,
    lifecycle: Arc<dyn LifecycleSink>,
    blackboard: Arc<Blackboard>,
    /// Base directory for per-module configuration
    config_dir: PathBuf,
    /// Managed modules (id -> instance + container)
    modules: HashMap<String, ManagedModule>,
    /// Instantiation order, kept for the initialize pass
    order: Vec<String>,
}

impl ModuleManager {
    pub fn new(
        factory: Arc<dyn ModuleFactory>,
        lifecycle: Arc<dyn LifecycleSink>,
        blackboard: Arc<Blackboard>,
        config_dir: PathBuf,
    ) -> Self {
        Self {
            factory,
            lifecycle,
            blackboard,
            config_dir,
            modules: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Instantiate and construct every module's entry point, in load order
    ///
    /// The resolver's order is respected as a strict happens-before between
    /// a module and each of its dependencies. Modules without an entry point
    /// are recorded as containers only.
    pub async fn construct_all(&mut self, load_order: Vec<ModuleContainer>) {
        info!("Constructing {} modules", load_order.len());

        for container in load_order {
            let id = container.id.clone();
            let span = container.span.clone();

            let Some(entry_point) = container.descriptor.entry_point.clone() else {
                span.in_scope(|| debug!("Module {} has no entry point, container only", id));
                self.record(container, None, ModuleState::Discovered);
                continue;
            };

            // The entered-guard form is only safe around synchronous code;
            // the awaits below attach the span via Instrument instead, which
            // keeps this future Send and spawnable.
            let instantiated = {
                let _scope = span.clone().entered();
                self.factory.instantiate(&container, &entry_point)
            };
            let mut entry = match instantiated {
                Ok(entry) => entry,
                Err(e) => {
                    span.in_scope(|| warn!("Failed to instantiate module {}: {}", id, e));
                    self.record(container, None, ModuleState::Failed(e.to_string()));
                    continue;
                }
            };

            let context = self.context_for(&container);
            match entry.construct(context).instrument(span.clone()).await {
                Ok(()) => {
                    self.record(container, Some(entry), ModuleState::Constructed);
                    self.lifecycle.on_construct(&id).instrument(span.clone()).await;
                    span.in_scope(|| info!("Module {} constructed", id));
                }
                Err(e) => {
                    span.in_scope(|| warn!("Module {} construction failed: {}", id, e));
                    self.record(container, None, ModuleState::Failed(e.to_string()));
                }
            }
        }
    }

    /// Initialize every constructed entry point, then signal the milestone
    ///
    /// Runs only after all instances exist, so modules can reach their
    /// dependencies' instances here.
    pub async fn initialize_all(&mut self) {
        for id in self.order.clone() {
            let Some(managed) = self.modules.get_mut(&id) else {
                continue;
            };
            if managed.state != ModuleState::Constructed {
                continue;
            }
            let Some(entry) = managed.entry.as_mut() else {
                continue;
            };
            let span = managed.container.span.clone();
            match entry.initialize().instrument(span).await {
                Ok(()) => {
                    managed.state = ModuleState::Initialized;
                    debug!("Module {} initialized", id);
                }
                Err(e) => {
                    warn!("Module {} initialization failed: {}", id, e);
                    managed.state = ModuleState::Failed(e.to_string());
                }
            }
        }
        self.lifecycle.on_initialize().await;
    }

    /// Container for a managed module
    pub fn container(&self, id: &str) -> Option<&ModuleContainer> {
        self.modules.get(id).map(|m| &m.container)
    }

    /// Current state of a managed module
    pub fn state(&self, id: &str) -> Option<&ModuleState> {
        self.modules.get(id).map(|m| &m.state)
    }

    /// Managed ids in instantiation order
    pub fn module_ids(&self) -> &[String] {
        &self.order
    }

    fn record(
        &mut self,
        container: ModuleContainer,
        entry: Option<Box<dyn ModuleEntryPoint>>,
        state: ModuleState,
    ) {
        let id = container.id.clone();
        self.order.push(id.clone());
        self.modules.insert(
            id,
            ManagedModule {
                container,
                entry,
                state,
            },
        );
    }

    fn context_for(&self, container: &ModuleContainer) -> ModuleContext {
        ModuleContext {
            instance_id: format!("{}_{}", container.id, uuid::Uuid::new_v4()),
            module_id: container.id.clone(),
            config_dir: self.config_dir.join(&container.id),
            config: container.load_config(),
            blackboard: Arc::clone(&self.blackboard),
        }
    }
}
