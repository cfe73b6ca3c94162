//! Transformation pipeline
//!
//! A registry of transformer plugins, each exposing a per-phase priority and
//! an applicability predicate. For a given request the pipeline computes the
//! applicable subset, sorts it ascending by priority (registration order
//! breaks ties), and feeds each transformer's output forward as the next
//! one's input. A transformer that fails is logged with its identity and the
//! artifact's, and contributes no change; one misbehaving plugin cannot
//! break unrelated artifacts.

use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::module::descriptor::ModuleDescriptor;
use crate::module::traits::EngineError;

/// A named stage of the pipeline
///
/// `Entry` runs early structural patches (visibility widening and the like)
/// before `Patch` runs pattern-based rewrites. `Inspect` exists only to hand
/// already-patched artifacts back to inspecting tools: patching transformers
/// return no priority for it, so nothing is double-patched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Entry,
    Patch,
    Inspect,
}

impl Phase {
    /// The phase whose output feeds this one
    ///
    /// `Entry` consumes raw bytes; `Patch` consumes `Entry` output; `Inspect`
    /// consumes `Patch` output, so patching transformers never see their own
    /// earlier output again.
    pub fn previous(self) -> Option<Phase> {
        match self {
            Phase::Entry => None,
            Phase::Patch => Some(Phase::Entry),
            Phase::Inspect => Some(Phase::Patch),
        }
    }
}

/// One transformation request; ephemeral, created per lookup
#[derive(Debug)]
pub struct TransformRequest<'a> {
    /// Canonical artifact name
    pub canonical_name: &'a str,
    /// Pipeline phase
    pub phase: Phase,
    /// Current artifact bytes (previous transformer's output)
    pub bytes: &'a [u8],
    /// Descriptor of the module that supplied the artifact, if any
    pub source: Option<&'a ModuleDescriptor>,
}

/// A transformer plugin
pub trait ArtifactTransformer: Send + Sync {
    /// Identity used in logs
    fn name(&self) -> &str;

    /// Priority for `phase`; `None` means this transformer never runs in
    /// that phase.
    fn priority(&self, phase: Phase) -> Option<i32>;

    /// Whether this transformer wants the named artifact at all
    fn applicable(&self, canonical_name: &str, bytes: &[u8]) -> bool;

    /// Apply the transformation; `Ok(None)` means "no change"
    fn transform(&self, request: &TransformRequest<'_>) -> Result<Option<Vec<u8>>, EngineError>;
}

/// Transformer registry and pipeline executor
#[derive(Default)]
pub struct TransformPipeline {
    /// Registration order doubles as the priority tie-break
    transformers: Vec<Arc<dyn ArtifactTransformer>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transformer; registration happens once at startup
    pub fn register(&mut self, transformer: Arc<dyn ArtifactTransformer>) {
        debug!("Registered transformer {}", transformer.name());
        self.transformers.push(transformer);
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Run the applicable transformers over one artifact
    ///
    /// Ordering is recomputed per request because priority may depend on
    /// the phase. If no transformer modifies the artifact the input buffer
    /// is returned unchanged, preserving identity for downstream caching.
    pub fn transform(
        &self,
        canonical_name: &str,
        bytes: Vec<u8>,
        phase: Phase,
        source: Option<&ModuleDescriptor>,
    ) -> Vec<u8> {
        let mut applicable: Vec<(i32, usize, &Arc<dyn ArtifactTransformer>)> = self
            .transformers
            .iter()
            .enumerate()
            .filter_map(|(idx, t)| {
                let priority = t.priority(phase)?;
                if t.applicable(canonical_name, &bytes) {
                    Some((priority, idx, t))
                } else {
                    None
                }
            })
            .collect();
        applicable.sort_by_key(|&(priority, idx, _)| (priority, idx));

        if applicable.is_empty() {
            trace!("No applicable transformers for {} in {:?}", canonical_name, phase);
            return bytes;
        }

        let mut current = bytes;
        for (_, _, transformer) in applicable {
            let request = TransformRequest {
                canonical_name,
                phase,
                bytes: &current,
                source,
            };
            match transformer.transform(&request) {
                Ok(Some(output)) => {
                    trace!(
                        "Transformer {} rewrote {} in {:?}",
                        transformer.name(),
                        canonical_name,
                        phase
                    );
                    current = output;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        "Transformer {} failed on {} in {:?}: {}; skipping",
                        transformer.name(),
                        canonical_name,
                        phase,
                        e
                    );
                }
            }
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Appender {
        name: String,
        priority: i32,
        suffix: Vec<u8>,
    }

    impl ArtifactTransformer for Appender {
        fn name(&self) -> &str {
            &self.name
        }

        fn priority(&self, phase: Phase) -> Option<i32> {
            (phase == Phase::Patch).then_some(self.priority)
        }

        fn applicable(&self, _name: &str, _bytes: &[u8]) -> bool {
            true
        }

        fn transform(
            &self,
            request: &TransformRequest<'_>,
        ) -> Result<Option<Vec<u8>>, EngineError> {
            let mut out = request.bytes.to_vec();
            out.extend_from_slice(&self.suffix);
            Ok(Some(out))
        }
    }

    #[test]
    fn applies_in_ascending_priority_order() {
        let mut pipeline = TransformPipeline::new();
        pipeline.register(Arc::new(Appender {
            name: "second".to_string(),
            priority: 10,
            suffix: b"B".to_vec(),
        }));
        pipeline.register(Arc::new(Appender {
            name: "first".to_string(),
            priority: -5,
            suffix: b"A".to_vec(),
        }));

        let out = pipeline.transform("x", b"_".to_vec(), Phase::Patch, None);
        assert_eq!(out, b"_AB");
    }

    #[test]
    fn skip_priority_excludes_phase() {
        let mut pipeline = TransformPipeline::new();
        pipeline.register(Arc::new(Appender {
            name: "patch-only".to_string(),
            priority: 0,
            suffix: b"!".to_vec(),
        }));

        let out = pipeline.transform("x", b"_".to_vec(), Phase::Inspect, None);
        assert_eq!(out, b"_");
    }

    #[test]
    fn unmodified_artifact_is_returned_unchanged() {
        let pipeline = TransformPipeline::new();
        let input = b"payload".to_vec();
        let out = pipeline.transform("x", input.clone(), Phase::Patch, None);
        assert_eq!(out, input);
    }
}
