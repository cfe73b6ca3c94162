//! Module system
//!
//! Discovery, metadata loading, dependency resolution, and lifecycle
//! orchestration for extension modules.

pub mod descriptor;
pub mod locator;
pub mod manager;
pub mod metadata;
pub mod resolver;
pub mod resource;
pub mod traits;
pub mod validation;

pub use descriptor::{ModuleDescriptor, DESCRIPTOR_ENTRY};
pub use locator::{EnumerationOrder, ModuleLocator};
pub use manager::ModuleManager;
pub use metadata::{MetadataLoader, ModuleContainer};
pub use resolver::{DependencyResolver, Resolution, ResolveError};
pub use resource::CandidateResource;
pub use traits::{
    EngineError, LifecycleSink, ModuleContext, ModuleEntryPoint, ModuleFactory, ModuleState,
};
pub use validation::{DescriptorValidator, ValidationResult};
