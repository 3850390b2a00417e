//! Type-set serialization tests
//!
//! These tests drive `TypeSet::serialize` against an in-memory metadata graph
//! and inspect the committed checkpoint segments.

use otter_typeset::{
    ArtifactHandle, ArtifactKind, ArtifactRef, BufferedCheckpointWriter, CheckpointWriter,
    ClassInfo, InMemoryGraph, InvariantViolation, SegmentHeader, SegmentKind, TraceId, TypeRecord,
    TypeSet, TypeSetConfig, TypeSetError, WriterError,
};
use rustc_hash::FxHashSet;

/// `A extends B`; both loaded by `L` into package `P` of module `M`
struct Hierarchy {
    graph: InMemoryGraph,
    module: ArtifactHandle,
    package: ArtifactHandle,
    loader: ArtifactHandle,
    base: ArtifactHandle,
    derived: ArtifactHandle,
}

fn hierarchy() -> Hierarchy {
    let mut graph = InMemoryGraph::new();
    let module = graph.add_named_module("com.acme.app");
    let package = graph.add_package("com/acme", Some(module));
    let loader = graph.add_loader(Some("app"), "com/acme/AppLoader");

    let mut base = ClassInfo::new("com/acme/B");
    base.loader = Some(loader);
    base.package = Some(package);
    let base = graph.add_class(base);

    let mut derived = ClassInfo::new("com/acme/A");
    derived.loader = Some(loader);
    derived.package = Some(package);
    derived.super_class = Some(base);
    let derived = graph.add_class(derived);

    Hierarchy {
        graph,
        module,
        package,
        loader,
        base,
        derived,
    }
}

/// Non-symbol records of one segment, as (kind, id)
fn artifacts(records: &[TypeRecord]) -> Vec<(ArtifactKind, TraceId)> {
    records
        .iter()
        .filter(|r| r.kind() != ArtifactKind::Symbol)
        .map(|r| (r.kind(), r.id()))
        .collect()
}

/// Every identifier a record refers to must be defined earlier in the stream
fn assert_dependency_first<'a>(records: impl Iterator<Item = &'a TypeRecord>) {
    let mut defined: FxHashSet<TraceId> = FxHashSet::default();
    for record in records {
        for reference in record.references() {
            assert!(
                defined.contains(&reference),
                "{:?} refers to {} before it was written",
                record,
                reference
            );
        }
        defined.insert(record.id());
    }
}

#[test]
fn test_superclass_chain_written_in_dependency_order() {
    let h = hierarchy();
    let mut types = TypeSet::new();
    let mut writer = BufferedCheckpointWriter::new();

    types.tag_class(h.derived);
    let bytes = types
        .serialize(&h.graph, &mut writer, None, false, false)
        .unwrap();
    assert!(bytes > 0);
    assert_eq!(bytes, writer.committed_bytes());

    let segment = &writer.segments()[0];
    assert_eq!(segment.header.kind, SegmentKind::TypeSet);
    assert!(!segment.header.flushpoint);

    let id = |artifact| types.id_of(artifact).unwrap();
    assert_eq!(
        artifacts(&segment.records),
        vec![
            (ArtifactKind::Module, id(ArtifactRef::module(h.module))),
            (ArtifactKind::Package, id(ArtifactRef::package(h.package))),
            (ArtifactKind::ClassLoader, id(ArtifactRef::loader(h.loader))),
            (ArtifactKind::Class, id(ArtifactRef::class(h.base))),
            (ArtifactKind::Class, id(ArtifactRef::class(h.derived))),
        ]
    );
    assert_dependency_first(segment.records.iter());

    let ids: FxHashSet<TraceId> = segment.records.iter().map(|r| r.id()).collect();
    assert_eq!(ids.len(), segment.records.len());
    assert!(!types.is_tagged(ArtifactRef::class(h.derived)));
}

#[test]
fn test_second_serialize_without_tags_writes_nothing() {
    let h = hierarchy();
    let mut types = TypeSet::new();
    let mut writer = BufferedCheckpointWriter::new();

    types.tag_class(h.derived);
    types
        .serialize(&h.graph, &mut writer, None, false, false)
        .unwrap();
    let committed = writer.committed_bytes();

    let bytes = types
        .serialize(&h.graph, &mut writer, None, false, false)
        .unwrap();
    assert_eq!(bytes, 0);
    assert_eq!(writer.segments().len(), 1);
    assert_eq!(writer.committed_bytes(), committed);
    assert_eq!(types.stats().serializations, 2);
}

#[test]
fn test_retagging_reuses_identifier_and_skips_written_dependencies() {
    let h = hierarchy();
    let mut types = TypeSet::new();
    let mut writer = BufferedCheckpointWriter::new();

    types.tag_class(h.derived);
    types
        .serialize(&h.graph, &mut writer, None, false, false)
        .unwrap();
    let first = types.id_of(ArtifactRef::class(h.derived)).unwrap();

    types.tag_class(h.derived);
    types
        .serialize(&h.graph, &mut writer, None, false, false)
        .unwrap();

    let second = &writer.segments()[1];
    assert_eq!(artifacts(&second.records), vec![(ArtifactKind::Class, first)]);
    // Name symbol already written this epoch
    assert_eq!(second.records.len(), 1);
    assert_dependency_first(writer.records());
}

#[test]
fn test_flushpoint_keeps_tags() {
    let h = hierarchy();
    let mut types = TypeSet::new();
    let mut writer = BufferedCheckpointWriter::new();

    types.tag_class(h.derived);
    types
        .serialize(&h.graph, &mut writer, None, false, true)
        .unwrap();
    assert!(writer.segments()[0].header.flushpoint);
    assert!(types.is_tagged(ArtifactRef::class(h.derived)));
    let id = types.id_of(ArtifactRef::class(h.derived));

    types
        .serialize(&h.graph, &mut writer, None, false, false)
        .unwrap();
    assert_eq!(writer.segments().len(), 2);
    assert_eq!(
        artifacts(&writer.segments()[1].records),
        vec![(ArtifactKind::Class, id.unwrap())]
    );
    assert!(!types.is_tagged(ArtifactRef::class(h.derived)));
    assert_eq!(types.stats().flushpoints, 1);
}

#[test]
fn test_epoch_rotation_rewrites_dependencies_with_same_ids() {
    let h = hierarchy();
    let mut types = TypeSet::new();
    let mut writer = BufferedCheckpointWriter::new();

    types.tag_class(h.derived);
    types
        .serialize(&h.graph, &mut writer, None, false, false)
        .unwrap();
    let before = artifacts(&writer.segments()[0].records);

    let epoch = types.rotate_epoch();
    assert_eq!(epoch.generation, 1);

    types.tag_class(h.derived);
    types
        .serialize(&h.graph, &mut writer, None, false, false)
        .unwrap();
    let after = &writer.segments()[1];
    assert_eq!(after.header.generation, 1);
    assert_eq!(artifacts(&after.records), before);
    assert_dependency_first(after.records.iter());
}

#[test]
fn test_methods_and_threads_follow_their_dependencies() {
    let mut h = hierarchy();
    let run = h.graph.add_method(h.derived, "run", "()V");
    let worker = h.graph.add_thread("worker-1", 4242);
    let mut types = TypeSet::new();
    let mut writer = BufferedCheckpointWriter::new();

    types.tag_thread(worker);
    types.tag_method(run);
    types
        .serialize(&h.graph, &mut writer, None, false, false)
        .unwrap();
    assert_dependency_first(writer.records());

    let kinds: Vec<ArtifactKind> = artifacts(&writer.segments()[0].records)
        .into_iter()
        .map(|(kind, _)| kind)
        .collect();
    assert_eq!(kinds.last(), Some(&ArtifactKind::Thread));
    assert!(kinds.contains(&ArtifactKind::Method));

    let summary = types.last_summary().unwrap();
    assert_eq!(summary.methods, 1);
    assert_eq!(summary.threads, 1);
    assert_eq!(summary.classes, 2);
}

#[test]
fn test_bootstrap_loaded_class_references_reserved_loader() {
    let mut graph = InMemoryGraph::new();
    let object = graph.add_class(ClassInfo::new("java/lang/Object"));
    let mut types = TypeSet::with_config(TypeSetConfig {
        bootstrap_loader_name: "boot".to_string(),
        ..TypeSetConfig::default()
    });
    let mut writer = BufferedCheckpointWriter::new();

    types.tag_class(object);
    types.serialize(&graph, &mut writer, None, false, false).unwrap();

    let loader = writer
        .records()
        .find(|r| r.kind() == ArtifactKind::ClassLoader)
        .cloned()
        .unwrap();
    assert_eq!(loader.id(), TraceId::BOOTSTRAP);
    assert!(
        writer
            .records()
            .any(|r| matches!(r, TypeRecord::Symbol { text, .. } if text == "boot"))
    );
    match writer.records().last().unwrap() {
        TypeRecord::Class { loader, .. } => assert!(loader.is_bootstrap()),
        other => panic!("expected class record, got {other:?}"),
    }
    assert_dependency_first(writer.records());
}

#[test]
fn test_writer_failure_leaves_tags_and_ids_untouched() {
    let h = hierarchy();
    let mut types = TypeSet::new();
    let mut writer = BufferedCheckpointWriter::with_capacity_limit(16);

    types.tag_class(h.derived);
    let err = types
        .serialize(&h.graph, &mut writer, None, false, false)
        .unwrap_err();
    assert!(matches!(
        err,
        TypeSetError::Writer(WriterError::CapacityExceeded { .. })
    ));
    assert!(err.is_recoverable());
    assert!(!types.is_poisoned());

    assert!(writer.segments().is_empty());
    assert!(!writer.is_open());
    assert!(types.is_tagged(ArtifactRef::class(h.derived)));
    assert_eq!(types.id_of(ArtifactRef::class(h.derived)), None);
    assert_eq!(types.id_of(ArtifactRef::class(h.base)), None);
    assert_eq!(types.registries().ids().live_count(), 0);
    assert_eq!(types.stats().writer_failures, 1);
    assert!(types.last_summary().is_none());

    writer.set_capacity_limit(None);
    types
        .serialize(&h.graph, &mut writer, None, false, false)
        .unwrap();
    assert_eq!(artifacts(&writer.segments()[0].records).len(), 5);
    assert!(!types.is_tagged(ArtifactRef::class(h.derived)));
}

#[test]
fn test_dangling_dependency_poisons_type_set() {
    let mut h = hierarchy();
    h.graph.remove(ArtifactRef::class(h.base));
    let mut types = TypeSet::new();
    let mut writer = BufferedCheckpointWriter::new();

    types.tag_class(h.derived);
    let err = types
        .serialize(&h.graph, &mut writer, None, false, false)
        .unwrap_err();
    match &err {
        TypeSetError::Invariant(InvariantViolation::DanglingArtifact(artifact)) => {
            assert_eq!(*artifact, ArtifactRef::class(h.base));
        }
        other => panic!("expected dangling artifact, got {other:?}"),
    }
    assert!(!err.is_recoverable());
    assert!(types.is_poisoned());
    assert!(writer.segments().is_empty());
    assert_eq!(types.registries().ids().live_count(), 0);

    assert!(matches!(
        types.serialize(&h.graph, &mut writer, None, false, false),
        Err(TypeSetError::Poisoned)
    ));
    assert!(matches!(
        types.on_unloading_classes(&h.graph, &mut writer),
        Err(TypeSetError::Poisoned)
    ));

    types.clear(&mut writer, None);
    assert!(!types.is_tagged(ArtifactRef::class(h.derived)));
}

#[test]
fn test_superclass_cycle_is_reported() {
    let mut graph = InMemoryGraph::new();
    let x = graph.add_class(ClassInfo::new("X"));
    let y = graph.add_class(ClassInfo::new("Y"));
    graph.class_mut(x).unwrap().super_class = Some(y);
    graph.class_mut(y).unwrap().super_class = Some(x);

    let mut types = TypeSet::new();
    let mut writer = BufferedCheckpointWriter::new();
    types.tag_class(x);
    let err = types
        .serialize(&graph, &mut writer, None, false, false)
        .unwrap_err();
    assert!(matches!(
        err,
        TypeSetError::Invariant(InvariantViolation::DependencyCycle(_))
    ));
}

#[test]
fn test_depth_bound_from_config() {
    let mut graph = InMemoryGraph::new();
    let mut parent = graph.add_class(ClassInfo::new("C0"));
    for n in 1..8 {
        let mut info = ClassInfo::new(format!("C{n}"));
        info.super_class = Some(parent);
        parent = graph.add_class(info);
    }

    let config = TypeSetConfig::from_toml_str("max_dependency_depth = 4\n").unwrap();
    let mut types = TypeSet::with_config(config);
    let mut writer = BufferedCheckpointWriter::new();
    types.tag_class(parent);
    let err = types
        .serialize(&graph, &mut writer, None, false, false)
        .unwrap_err();
    assert!(matches!(
        err,
        TypeSetError::Invariant(InvariantViolation::DependencyTooDeep { limit: 4, .. })
    ));

    let mut types = TypeSet::new();
    types.tag_class(parent);
    types.serialize(&graph, &mut writer, None, false, false).unwrap();
    assert_eq!(types.last_summary().unwrap().classes, 8);
}

#[test]
fn test_class_unload_pass_retires_unloading_classes() {
    let mut h = hierarchy();
    let mut types = TypeSet::new();
    let mut writer = BufferedCheckpointWriter::new();

    types.tag_class(h.derived);
    h.graph.begin_unloading(&[h.derived]);
    types
        .serialize(&h.graph, &mut writer, None, true, false)
        .unwrap();

    let derived_id = match writer.records().last().unwrap() {
        TypeRecord::Class { id, unloading, .. } => {
            assert!(*unloading);
            *id
        }
        other => panic!("expected class record, got {other:?}"),
    };
    assert!(matches!(
        writer.segments()[0].records.iter().find(|r| r.kind() == ArtifactKind::Class),
        Some(TypeRecord::Class { unloading: false, .. })
    ));

    assert_eq!(types.id_of(ArtifactRef::class(h.derived)), None);
    assert!(types.id_of(ArtifactRef::class(h.base)).is_some());
    assert_eq!(types.last_summary().unwrap().unloaded, 1);
    assert!(matches!(
        types.resolve(derived_id),
        Err(TypeSetError::Invariant(InvariantViolation::ForgottenId(id))) if id == derived_id
    ));

    types.rotate_epoch();
    assert_eq!(types.resolve(derived_id).unwrap(), None);
}

#[test]
fn test_leak_stream_is_independent_of_main_stream() {
    let mut h = hierarchy();
    let mut types = TypeSet::new();
    let mut writer = BufferedCheckpointWriter::new();
    let mut leak_writer = BufferedCheckpointWriter::new();

    // Sampled only by the leak profiler: no main-stream record
    types.tag_leakp(h.base);
    types.tag_class(h.derived);
    types
        .serialize(&h.graph, &mut writer, Some(&mut leak_writer), false, false)
        .unwrap();

    let segment = &leak_writer.segments()[0];
    assert_eq!(segment.header.kind, SegmentKind::LeakProfiler);
    let names: Vec<&str> = segment
        .records
        .iter()
        .map(|r| match r {
            TypeRecord::LeakClass { name, .. } => name.as_str(),
            other => panic!("unexpected leak record {other:?}"),
        })
        .collect();
    assert_eq!(names, vec!["com/acme/B", "com/acme/A"]);
    assert_eq!(types.last_summary().unwrap().leak_classes, 2);

    let leak_id = types.leak_id_of(h.base).unwrap();
    let lookup = types.leak_lookup();

    types.clear(&mut writer, Some(&mut leak_writer));
    types.rotate_epoch();
    h.graph.begin_unloading(&[h.derived, h.base]);
    types.on_unloading_classes(&h.graph, &mut writer).unwrap();
    h.graph.finish_unloading();

    let entry = lookup.resolve(leak_id).unwrap();
    assert_eq!(entry.name, "com/acme/B");
    assert_eq!(entry.loader_name, "app");
    assert_eq!(entry.generation, 0);
    assert_eq!(lookup.len(), 2);
    assert_eq!(types.id_of(ArtifactRef::class(h.base)), None);
}

#[test]
fn test_leak_ids_are_stable_across_passes() {
    let h = hierarchy();
    let mut types = TypeSet::new();
    let mut writer = BufferedCheckpointWriter::new();
    let mut leak_writer = BufferedCheckpointWriter::new();

    types.tag_leakp(h.base);
    types
        .serialize(&h.graph, &mut writer, Some(&mut leak_writer), false, false)
        .unwrap();
    let first = types.leak_id_of(h.base).unwrap();
    // Leak tags are consumed by the pass
    assert!(!types.tagger().is_leakp_tagged(ArtifactRef::class(h.base)));

    types.tag_leakp(h.base);
    types
        .serialize(&h.graph, &mut writer, Some(&mut leak_writer), false, false)
        .unwrap();
    assert_eq!(leak_writer.segments().len(), 2);
    assert_eq!(leak_writer.segments()[1].records[0].id(), first);
    // Nothing was tagged for the main stream
    assert!(writer.segments().is_empty());
}

#[test]
fn test_leak_writer_failure_abandons_both_segments() {
    let h = hierarchy();
    let mut types = TypeSet::new();
    let mut writer = BufferedCheckpointWriter::new();
    let mut leak_writer = BufferedCheckpointWriter::with_capacity_limit(2);

    types.tag_class(h.derived);
    types.tag_leakp(h.derived);
    let err = types
        .serialize(&h.graph, &mut writer, Some(&mut leak_writer), false, false)
        .unwrap_err();
    assert!(err.is_recoverable());

    // Both segments are staged before either commits
    assert!(writer.segments().is_empty());
    assert!(leak_writer.segments().is_empty());
    assert!(types.is_tagged(ArtifactRef::class(h.derived)));
    assert!(types.tagger().is_leakp_tagged(ArtifactRef::class(h.derived)));
    assert_eq!(types.leak_id_of(h.derived), None);
    assert!(types.leak_lookup().is_empty());
}

/// Writer that stages normally but cannot commit
#[derive(Default)]
struct CommitFailingWriter {
    inner: BufferedCheckpointWriter,
}

impl CheckpointWriter for CommitFailingWriter {
    fn begin_checkpoint(&mut self, header: SegmentHeader) -> Result<(), WriterError> {
        self.inner.begin_checkpoint(header)
    }

    fn write_record(&mut self, record: &TypeRecord) -> Result<usize, WriterError> {
        self.inner.write_record(record)
    }

    fn end_checkpoint(&mut self) -> Result<usize, WriterError> {
        Err(WriterError::Io(std::io::Error::other("device full")))
    }

    fn cancel_checkpoint(&mut self) {
        self.inner.cancel_checkpoint();
    }
}

#[test]
fn test_leak_commit_failure_keeps_main_pass() {
    let h = hierarchy();
    let mut types = TypeSet::new();
    let mut writer = BufferedCheckpointWriter::new();
    let mut leak_writer = CommitFailingWriter::default();

    types.tag_class(h.derived);
    types.tag_leakp(h.derived);
    let err = types
        .serialize(&h.graph, &mut writer, Some(&mut leak_writer), false, false)
        .unwrap_err();
    assert!(matches!(err, TypeSetError::Writer(WriterError::Io(_))));

    // Main segment committed and its side-state applied
    assert_eq!(writer.segments().len(), 1);
    assert!(!types.is_tagged(ArtifactRef::class(h.derived)));
    assert!(types.id_of(ArtifactRef::class(h.derived)).is_some());

    // Leak pass rolled back; its samples wait for the next checkpoint
    assert!(leak_writer.inner.segments().is_empty());
    assert!(!leak_writer.inner.is_open());
    assert_eq!(types.leak_id_of(h.derived), None);
    assert!(types.leak_lookup().is_empty());
    assert!(types.tagger().is_leakp_tagged(ArtifactRef::class(h.derived)));

    let summary = types.last_summary().unwrap();
    assert_eq!(summary.leak_bytes, 0);
    assert_eq!(types.stats().writer_failures, 1);
    assert_eq!(types.stats().serializations, 1);
}

#[test]
fn test_clear_keeps_pending_leak_samples() {
    let h = hierarchy();
    let mut types = TypeSet::new();
    let mut writer = BufferedCheckpointWriter::new();
    let mut leak_writer = BufferedCheckpointWriter::new();

    types.tag_class(h.derived);
    types.tag_leakp(h.base);
    types.clear(&mut writer, Some(&mut leak_writer));
    assert!(!types.is_tagged(ArtifactRef::class(h.derived)));
    assert!(types.tagger().is_leakp_tagged(ArtifactRef::class(h.base)));

    types
        .serialize(&h.graph, &mut writer, Some(&mut leak_writer), false, false)
        .unwrap();
    assert!(writer.segments().is_empty());
    let leak_id = types.leak_id_of(h.base).unwrap();
    assert_eq!(
        leak_writer.records().map(|r| r.id()).collect::<Vec<_>>(),
        vec![leak_id]
    );
}

#[test]
fn test_class_unload_pass_forgets_leak_handle() {
    let mut h = hierarchy();
    let mut types = TypeSet::new();
    let mut writer = BufferedCheckpointWriter::new();
    let mut leak_writer = BufferedCheckpointWriter::new();

    types.tag_class(h.derived);
    h.graph.begin_unloading(&[h.derived]);
    types
        .serialize(&h.graph, &mut writer, Some(&mut leak_writer), true, false)
        .unwrap();
    h.graph.finish_unloading();

    let retained = leak_writer.records().last().unwrap().id();
    assert_eq!(types.leak_id_of(h.derived), None);
    assert!(types.leak_id_of(h.base).is_some());
    assert_eq!(types.leak_lookup().resolve(retained).unwrap().name, "com/acme/A");
}

#[test]
fn test_segments_dump_as_json() {
    let h = hierarchy();
    let mut types = TypeSet::new();
    let mut writer = BufferedCheckpointWriter::new();
    types.tag_class(h.base);
    types.serialize(&h.graph, &mut writer, None, false, false).unwrap();

    let json = writer.to_json();
    assert_eq!(json["committed_bytes"], writer.committed_bytes());
    let records = json["segments"][0]["records"].as_array().unwrap();
    assert_eq!(records[0]["type"], "symbol");
    assert_eq!(records.last().unwrap()["type"], "class");

    let stats = serde_json::to_value(types.stats()).unwrap();
    assert_eq!(stats["serializations"], 1);
}

#[test]
fn test_config_loaded_from_file() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "emit_bootstrap_loader = false").unwrap();
    writeln!(file, "retain_leak_records = false").unwrap();
    let config = TypeSetConfig::load(file.path()).unwrap();

    let mut graph = InMemoryGraph::new();
    let object = graph.add_class(ClassInfo::new("java/lang/Object"));
    let mut types = TypeSet::with_config(config);
    let mut writer = BufferedCheckpointWriter::new();
    let mut leak_writer = BufferedCheckpointWriter::new();

    types.tag_class(object);
    types
        .serialize(&graph, &mut writer, Some(&mut leak_writer), false, false)
        .unwrap();
    assert!(writer.records().all(|r| r.kind() != ArtifactKind::ClassLoader));
    assert_eq!(leak_writer.records().count(), 1);
    assert!(types.leak_lookup().is_empty());
}
