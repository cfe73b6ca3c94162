//! Artifact transformation
//!
//! The bundle codec, the phase-aware transformer pipeline, and the built-in
//! transformers driven by module instrumentation configs.

pub mod bundle;
pub mod patcher;
pub mod pipeline;

pub use bundle::{Bundle, Export, Visibility};
pub use patcher::{register_from_containers, InstrumentationConfig};
pub use pipeline::{ArtifactTransformer, Phase, TransformPipeline, TransformRequest};
