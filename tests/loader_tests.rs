//! Layered loader tests
//!
//! Scope ordering, exclusion, phase chaining, caching, and resource lookups.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use common::{module_toml, Fixture, MapParentScope};
use modforge::loader::{LayeredLoader, LoadedArtifact};
use modforge::module::metadata::{MetadataLoader, ModuleContainer};
use modforge::module::resource::CandidateResource;
use modforge::module::traits::EngineError;
use modforge::transform::pipeline::{
    ArtifactTransformer, Phase, TransformPipeline, TransformRequest,
};

/// Load a single archive-backed module container from the fixture
fn archive_container(fixture: &Fixture, file_name: &str) -> ModuleContainer {
    let candidates = vec![CandidateResource::archive(
        "modules-dir",
        fixture.modules_dir.join(file_name),
    )];
    let mut containers = MetadataLoader::new().load(candidates);
    assert_eq!(containers.len(), 1, "expected one valid module in {}", file_name);
    containers.remove(0)
}

/// Appends the phase name to every artifact and counts its invocations
struct PhaseStamp {
    runs: Arc<AtomicUsize>,
}

impl ArtifactTransformer for PhaseStamp {
    fn name(&self) -> &str {
        "phase-stamp"
    }

    fn priority(&self, _phase: Phase) -> Option<i32> {
        Some(0)
    }

    fn applicable(&self, _name: &str, _bytes: &[u8]) -> bool {
        true
    }

    fn transform(&self, request: &TransformRequest<'_>) -> Result<Option<Vec<u8>>, EngineError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let mut out = request.bytes.to_vec();
        out.extend_from_slice(format!("|{:?}", request.phase).as_bytes());
        Ok(Some(out))
    }
}

fn stamped_pipeline() -> (Arc<TransformPipeline>, Arc<AtomicUsize>) {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut pipeline = TransformPipeline::new();
    pipeline.register(Arc::new(PhaseStamp {
        runs: Arc::clone(&runs),
    }));
    (Arc::new(pipeline), runs)
}

#[test]
fn dynamic_scope_wins_over_parent_and_honors_source_order() {
    let fixture = Fixture::new();
    fixture.write_module_archive(
        "first.zip",
        &module_toml("first", "1.0.0", &[], &[], None, &[]),
        &[("ext/app/main.mfb", b"from-first".to_vec())],
    );
    fixture.write_module_archive(
        "second.zip",
        &module_toml("second", "1.0.0", &[], &[], None, &[]),
        &[("ext/app/main.mfb", b"from-second".to_vec())],
    );

    let parent = MapParentScope::new(&[("ext/app/main.mfb", b"from-parent".to_vec())]);
    let mut loader = LayeredLoader::new(Arc::new(parent));
    loader.add_source(&archive_container(&fixture, "first.zip"));
    loader.add_source(&archive_container(&fixture, "second.zip"));
    loader.install_pipeline(Arc::new(TransformPipeline::new()));

    let artifact = loader
        .load_artifact("ext.app.main", Phase::Entry)
        .unwrap()
        .expect("artifact must resolve");
    assert_eq!(artifact.bytes, b"from-first");
}

#[test]
fn parent_scope_serves_unshadowed_artifacts() {
    let parent = MapParentScope::new(&[("ext/only/parent.mfb", b"parent-bytes".to_vec())]);
    let loader = {
        let loader = LayeredLoader::new(Arc::new(parent));
        loader.install_pipeline(Arc::new(TransformPipeline::new()));
        loader
    };

    let artifact = loader
        .load_artifact("ext.only.parent", Phase::Entry)
        .unwrap()
        .expect("artifact must resolve");
    assert_eq!(artifact.bytes, b"parent-bytes");
    assert!(artifact.package.is_none());

    assert!(loader.load_artifact("ext.only.absent", Phase::Entry).unwrap().is_none());
}

#[test]
fn excluded_prefixes_bypass_dynamic_scope_and_pipeline() {
    let fixture = Fixture::new();
    fixture.write_module_archive(
        "shadow.zip",
        &module_toml("shadow", "1.0.0", &[], &[], None, &[]),
        &[("sys/core.mfb", b"module-shadow".to_vec())],
    );

    let parent = MapParentScope::new(&[("sys/core.mfb", b"parent-core".to_vec())]);
    let mut loader = LayeredLoader::new(Arc::new(parent));
    loader.exclude_prefixes(vec!["sys.".to_string()]);
    loader.add_source(&archive_container(&fixture, "shadow.zip"));
    let (pipeline, runs) = stamped_pipeline();
    loader.install_pipeline(pipeline);

    let artifact = loader
        .load_artifact("sys.core", Phase::Patch)
        .unwrap()
        .expect("excluded artifact resolves through the parent");
    assert_eq!(artifact.bytes, b"parent-core");
    assert!(artifact.package.is_none());
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_pipeline_is_fatal_for_transforming_lookups_only() {
    let parent = MapParentScope::new(&[
        ("ext/app/main.mfb", b"app".to_vec()),
        ("modforge/runtime.mfb", b"runtime".to_vec()),
    ]);
    let loader = LayeredLoader::new(Arc::new(parent));

    let err = loader
        .load_artifact("ext.app.main", Phase::Entry)
        .expect_err("transforming lookup without a pipeline must fail");
    assert!(matches!(err, EngineError::PipelineUnavailable(_)));
    assert!(err.is_fatal());

    // The engine's own namespace never goes through the pipeline.
    let artifact = loader
        .load_artifact("modforge.runtime", Phase::Entry)
        .unwrap()
        .expect("excluded artifact resolves without a pipeline");
    assert_eq!(artifact.bytes, b"runtime");
}

#[test]
fn phases_chain_on_the_previous_phase_output() {
    let parent = MapParentScope::new(&[("ext/app/main.mfb", b"raw".to_vec())]);
    let loader = LayeredLoader::new(Arc::new(parent));
    let (pipeline, runs) = stamped_pipeline();
    loader.install_pipeline(pipeline);

    let inspect = loader
        .load_artifact("ext.app.main", Phase::Inspect)
        .unwrap()
        .expect("artifact must resolve");
    assert_eq!(inspect.bytes, b"raw|Entry|Patch|Inspect");

    // The intermediate phases were memoized along the way.
    let patch = loader
        .load_artifact("ext.app.main", Phase::Patch)
        .unwrap()
        .unwrap();
    assert_eq!(patch.bytes, b"raw|Entry|Patch");
    let entry = loader
        .load_artifact("ext.app.main", Phase::Entry)
        .unwrap()
        .unwrap();
    assert_eq!(entry.bytes, b"raw|Entry");

    // One transformer run per phase, nothing recomputed.
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

#[test]
fn concurrent_lookups_compute_once() {
    let parent = MapParentScope::new(&[("ext/app/main.mfb", b"raw".to_vec())]);
    let loader = LayeredLoader::new(Arc::new(parent));
    let (pipeline, runs) = stamped_pipeline();
    loader.install_pipeline(pipeline);
    let loader = Arc::new(loader);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let loader = Arc::clone(&loader);
            thread::spawn(move || {
                loader
                    .load_artifact("ext.app.main", Phase::Entry)
                    .unwrap()
                    .unwrap()
            })
        })
        .collect();

    let artifacts: Vec<Arc<LoadedArtifact>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    for artifact in &artifacts {
        assert!(Arc::ptr_eq(artifact, &artifacts[0]));
        assert_eq!(artifact.bytes, b"raw|Entry");
    }
}

#[test]
fn package_metadata_identifies_the_supplying_module() {
    let fixture = Fixture::new();
    fixture.write_module_archive(
        "metrics.zip",
        &module_toml("metrics", "2.1.0", &[], &[], None, &[]),
        &[
            ("ext/metrics/main.mfb", b"main".to_vec()),
            ("ext/metrics/export.mfb", b"export".to_vec()),
        ],
    );

    let mut loader = LayeredLoader::new(Arc::new(MapParentScope::new(&[])));
    loader.add_source(&archive_container(&fixture, "metrics.zip"));
    loader.install_pipeline(Arc::new(TransformPipeline::new()));

    let main = loader
        .load_artifact("ext.metrics.main", Phase::Entry)
        .unwrap()
        .unwrap();
    let package = main.package.as_ref().expect("module artifacts carry package metadata");
    assert_eq!(package.package, "ext.metrics");
    assert_eq!(package.module_id, "metrics");
    assert_eq!(package.version, "2.1.0");

    // Artifacts of the same package share the cached metadata instance.
    let export = loader
        .load_artifact("ext.metrics.export", Phase::Entry)
        .unwrap()
        .unwrap();
    assert!(Arc::ptr_eq(package, export.package.as_ref().unwrap()));
}

#[test]
fn resources_bypass_the_pipeline() {
    let fixture = Fixture::new();
    fixture.write_module_archive(
        "assets.zip",
        &module_toml("assets", "1.0.0", &[], &[], None, &[]),
        &[("data/info.txt", b"module data".to_vec())],
    );

    let parent = MapParentScope::new(&[("data/fallback.txt", b"parent data".to_vec())]);
    let mut loader = LayeredLoader::new(Arc::new(parent));
    loader.add_source(&archive_container(&fixture, "assets.zip"));
    let (pipeline, runs) = stamped_pipeline();
    loader.install_pipeline(pipeline);

    assert_eq!(
        loader.load_resource("data/info.txt").unwrap(),
        Some(b"module data".to_vec())
    );
    assert_eq!(
        loader.load_resource("data/fallback.txt").unwrap(),
        Some(b"parent data".to_vec())
    );
    assert_eq!(loader.load_resource("data/absent.txt").unwrap(), None);
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[test]
fn excluded_resources_come_from_the_parent() {
    let fixture = Fixture::new();
    // A module packaging entries under the engine's own namespace must not
    // shadow the parent's copy.
    fixture.write_module_archive(
        "rogue.zip",
        &module_toml("rogue", "1.0.0", &[], &[], None, &[]),
        &[("modforge/support.dat", b"module-shadow".to_vec())],
    );

    let parent = MapParentScope::new(&[("modforge/support.dat", b"parent-copy".to_vec())]);
    let mut loader = LayeredLoader::new(Arc::new(parent));
    loader.add_source(&archive_container(&fixture, "rogue.zip"));
    loader.install_pipeline(Arc::new(TransformPipeline::new()));

    assert_eq!(
        loader.load_resource("modforge/support.dat").unwrap(),
        Some(b"parent-copy".to_vec())
    );
}
