//! Modforge - module loading and code instrumentation engine
//!
//! Modforge discovers installable extension packages ("modules"), resolves
//! their declared dependencies into a safe load order, and routes every code
//! artifact through a phase-aware pipeline of transformer plugins before
//! handing control to a host entry point.
//!
//! ## Architecture
//!
//! - [`blackboard`]: typed, write-once property registry passed between
//!   bootstrap stages
//! - [`module`]: candidate location, descriptor loading, dependency
//!   resolution, and lifecycle orchestration
//! - [`transform`]: the bundle codec and the phase-aware transformer
//!   pipeline
//! - [`loader`]: the layered artifact loader (dynamic scope, parent
//!   fallback, exclusions, memoization)
//! - [`engine`]: ties the launch sequence together
//!
//! ## Design Principles
//!
//! 1. **Explicit context**: no global registries; every component receives
//!    its collaborators at construction
//! 2. **Graceful degradation**: per-module and per-transformer failures
//!    exclude one thing and never the run
//! 3. **Deterministic resolution**: containers are id-sorted before graph
//!    construction; enumeration order is an explicit parameter

pub mod blackboard;
pub mod config;
pub mod engine;
pub mod loader;
pub mod module;
pub mod transform;
pub mod utils;

pub use blackboard::{Blackboard, Key};
pub use config::EngineConfig;
pub use engine::{Engine, LaunchReport};
pub use loader::{LayeredLoader, LoadedArtifact, PackageMeta, ParentScope};
pub use module::{
    CandidateResource, DependencyResolver, EngineError, EnumerationOrder, LifecycleSink,
    MetadataLoader, ModuleContainer, ModuleContext, ModuleDescriptor, ModuleEntryPoint,
    ModuleFactory, ModuleLocator, ModuleManager, ModuleState, Resolution, ResolveError,
};
pub use transform::{ArtifactTransformer, Bundle, Phase, TransformPipeline};
