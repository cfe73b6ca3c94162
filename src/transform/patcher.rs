//! Built-in transformers
//!
//! Modules declare instrumentation config entries in their descriptor; each
//! config is a TOML file of widen and patch rules. Widen rules run in the
//! `Entry` phase and flip a bundle export to public; patch rules run in the
//! `Patch` phase and rewrite raw byte patterns. Patch transformers report no
//! priority for `Inspect`, so artifacts handed to inspecting tools are never
//! patched twice.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::module::metadata::ModuleContainer;
use crate::module::traits::EngineError;
use crate::utils::log_error;
use crate::transform::bundle::{Bundle, Visibility};
use crate::transform::pipeline::{
    ArtifactTransformer, Phase, TransformPipeline, TransformRequest,
};

/// One instrumentation config file
#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentationConfig {
    /// Priority shared by the transformers this config produces
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub widen: Vec<WidenRule>,
    #[serde(default)]
    pub patch: Vec<PatchRule>,
}

/// Flip a bundle export to public
#[derive(Debug, Clone, Deserialize)]
pub struct WidenRule {
    /// Canonical artifact name
    pub target: String,
    /// Export to widen
    pub export: String,
}

/// Rewrite a byte pattern (hex-encoded find/replace)
#[derive(Debug, Clone, Deserialize)]
pub struct PatchRule {
    /// Canonical artifact name
    pub target: String,
    pub find: String,
    pub replace: String,
}

impl InstrumentationConfig {
    pub fn from_toml(contents: &str) -> Result<Self, EngineError> {
        toml::from_str(contents)
            .map_err(|e| EngineError::Transform(format!("bad instrumentation config: {}", e)))
    }
}

/// Entry-phase structural transformer widening export visibility
pub struct ExportWidener {
    name: String,
    priority: i32,
    rules: Vec<WidenRule>,
}

impl ArtifactTransformer for ExportWidener {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self, phase: Phase) -> Option<i32> {
        (phase == Phase::Entry).then_some(self.priority)
    }

    fn applicable(&self, canonical_name: &str, _bytes: &[u8]) -> bool {
        self.rules.iter().any(|r| r.target == canonical_name)
    }

    fn transform(&self, request: &TransformRequest<'_>) -> Result<Option<Vec<u8>>, EngineError> {
        // Structural edit: a malformed envelope is this transformer's
        // failure, not a pass-through.
        let mut bundle = Bundle::decode(request.bytes)?;
        let mut changed = false;

        for rule in self.rules.iter().filter(|r| r.target == request.canonical_name) {
            match bundle.export_mut(&rule.export) {
                Some(export) => {
                    if export.visibility != Visibility::Public {
                        export.visibility = Visibility::Public;
                        changed = true;
                    }
                }
                None => {
                    warn!(
                        "Widen rule for {} names unknown export {}",
                        rule.target, rule.export
                    );
                }
            }
        }

        if changed {
            bundle.encode().map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Patch-phase transformer rewriting raw byte patterns
///
/// Returns no priority in `Inspect`: that phase only re-serves its own
/// earlier output, and pattern rewrites are not idempotent in general.
pub struct PatternPatcher {
    name: String,
    priority: i32,
    rules: Vec<CompiledPatch>,
}

struct CompiledPatch {
    target: String,
    find: Vec<u8>,
    replace: Vec<u8>,
}

impl ArtifactTransformer for PatternPatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self, phase: Phase) -> Option<i32> {
        (phase == Phase::Patch).then_some(self.priority)
    }

    fn applicable(&self, canonical_name: &str, _bytes: &[u8]) -> bool {
        self.rules.iter().any(|r| r.target == canonical_name)
    }

    fn transform(&self, request: &TransformRequest<'_>) -> Result<Option<Vec<u8>>, EngineError> {
        let mut current = request.bytes.to_vec();
        let mut changed = false;
        for rule in self.rules.iter().filter(|r| r.target == request.canonical_name) {
            if let Some(rewritten) = replace_all(&current, &rule.find, &rule.replace) {
                current = rewritten;
                changed = true;
            }
        }
        Ok(changed.then_some(current))
    }
}

/// Replace every occurrence of `find`; `None` when nothing matched
fn replace_all(haystack: &[u8], find: &[u8], replace: &[u8]) -> Option<Vec<u8>> {
    if find.is_empty() || haystack.len() < find.len() {
        return None;
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut pos = 0;
    let mut matched = false;
    while pos + find.len() <= haystack.len() {
        if &haystack[pos..pos + find.len()] == find {
            out.extend_from_slice(replace);
            pos += find.len();
            matched = true;
        } else {
            out.push(haystack[pos]);
            pos += 1;
        }
    }
    out.extend_from_slice(&haystack[pos..]);
    matched.then_some(out)
}

/// Register the built-in transformers declared by a set of containers
///
/// Each instrumentation config a module names yields up to one widener and
/// one patcher. Unreadable or malformed configs are logged and skipped;
/// they never block other modules' instrumentation.
pub fn register_from_containers(pipeline: &mut TransformPipeline, containers: &[ModuleContainer]) {
    for container in containers {
        for entry in &container.descriptor.instrumentation_configs {
            let contents = match container.resource.read_entry_text(entry) {
                Ok(Some(contents)) => contents,
                Ok(None) => {
                    warn!(
                        "Module {} names missing instrumentation config {}",
                        container.id, entry
                    );
                    continue;
                }
                Err(e) => {
                    warn!(
                        "Failed to read instrumentation config {} from {}: {}",
                        entry, container.id, e
                    );
                    continue;
                }
            };

            let Some(config) = log_error(
                || InstrumentationConfig::from_toml(&contents),
                &format!(
                    "Skipping instrumentation config {} from {}",
                    entry, container.id
                ),
            ) else {
                continue;
            };

            if !config.widen.is_empty() {
                pipeline.register(Arc::new(ExportWidener {
                    name: format!("{}:{}:widen", container.id, entry),
                    priority: config.priority,
                    rules: config.widen.clone(),
                }));
            }

            match compile_patches(&config.patch) {
                Ok(rules) if !rules.is_empty() => {
                    pipeline.register(Arc::new(PatternPatcher {
                        name: format!("{}:{}:patch", container.id, entry),
                        priority: config.priority,
                        rules,
                    }));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        "Skipping patch rules in {} from {}: {}",
                        entry, container.id, e
                    );
                }
            }

            debug!(
                "Registered instrumentation from {} config {}",
                container.id, entry
            );
        }
    }
}

fn compile_patches(rules: &[PatchRule]) -> Result<Vec<CompiledPatch>, EngineError> {
    rules
        .iter()
        .map(|rule| {
            let find = hex::decode(&rule.find)
                .map_err(|e| EngineError::Transform(format!("bad find pattern: {}", e)))?;
            let replace = hex::decode(&rule.replace)
                .map_err(|e| EngineError::Transform(format!("bad replace pattern: {}", e)))?;
            if find.is_empty() {
                return Err(EngineError::Transform("empty find pattern".to_string()));
            }
            Ok(CompiledPatch {
                target: rule.target.clone(),
                find,
                replace,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::bundle::Export;

    #[test]
    fn replace_all_rewrites_every_occurrence() {
        let out = replace_all(b"abcabc", b"bc", b"XY").unwrap();
        assert_eq!(out, b"aXYaXY");
        assert!(replace_all(b"abc", b"zz", b"XY").is_none());
    }

    #[test]
    fn widener_flips_named_export() {
        let bundle = Bundle {
            exports: vec![Export {
                name: "hidden".to_string(),
                visibility: Visibility::Internal,
            }],
            body: vec![1, 2, 3],
        };
        let widener = ExportWidener {
            name: "test:widen".to_string(),
            priority: 0,
            rules: vec![WidenRule {
                target: "a.b".to_string(),
                export: "hidden".to_string(),
            }],
        };

        let request = TransformRequest {
            canonical_name: "a.b",
            phase: Phase::Entry,
            bytes: &bundle.encode().unwrap(),
            source: None,
        };
        let out = widener.transform(&request).unwrap().unwrap();
        let decoded = Bundle::decode(&out).unwrap();
        assert_eq!(decoded.exports[0].visibility, Visibility::Public);

        // Already-public exports mean no change.
        let request = TransformRequest {
            canonical_name: "a.b",
            phase: Phase::Entry,
            bytes: &out,
            source: None,
        };
        assert!(widener.transform(&request).unwrap().is_none());
    }

    #[test]
    fn widener_reports_malformed_bundle() {
        let widener = ExportWidener {
            name: "test:widen".to_string(),
            priority: 0,
            rules: vec![WidenRule {
                target: "a.b".to_string(),
                export: "x".to_string(),
            }],
        };
        let request = TransformRequest {
            canonical_name: "a.b",
            phase: Phase::Entry,
            bytes: b"not a bundle",
            source: None,
        };
        assert!(widener.transform(&request).is_err());
    }

    #[test]
    fn patcher_skips_inspect_phase() {
        let patcher = PatternPatcher {
            name: "test:patch".to_string(),
            priority: 0,
            rules: Vec::new(),
        };
        assert_eq!(patcher.priority(Phase::Patch), Some(0));
        assert_eq!(patcher.priority(Phase::Inspect), None);
        assert_eq!(patcher.priority(Phase::Entry), None);
    }
}
