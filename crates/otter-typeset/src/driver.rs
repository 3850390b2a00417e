//! Type-set driver
//!
//! `TypeSet` owns all side-state of the serializer: tags, identifiers,
//! interned symbols, the epoch and the leak-profiler stream. The recorder
//! calls it at three moments:
//!
//! - `serialize` at checkpoint time, with the main writer and optionally the
//!   leak-profiler writer
//! - `on_unloading_classes` from the class-unloading safepoint
//! - `clear` when a checkpoint attempt is abandoned
//!
//! ## Pass structure
//!
//! A serialize pass is planned completely in memory first: tagged artifacts
//! are expanded dependency-first, identifiers are assigned and records are
//! built. Only then is anything written. Side-state (serialized marks, tag
//! clears, forgets) is applied after the writer has committed the segment, so
//! a writer failure leaves tags and identifiers exactly as they were.
//!
//! Only one call is ever in flight; `&mut self` enforces it.

use rustc_hash::FxHashSet;

use crate::artifact::{ArtifactHandle, ArtifactKind, ArtifactRef, TraceId};
use crate::config::TypeSetConfig;
use crate::epoch::{Epoch, EpochCounter};
use crate::error::{InvariantViolation, Result, TypeSetError};
use crate::graph::{ArtifactInfo, ClassInfo, MetadataGraph};
use crate::leak::{LeakLookup, LeakProfilerStream};
use crate::record::{SegmentHeader, SegmentKind, TypeRecord};
use crate::registry::Registries;
use crate::resolver::EmissionPlan;
use crate::stats::{SerializeSummary, TypeSetStats};
use crate::symbol::SymbolTable;
use crate::tagger::ArtifactTagger;
use crate::unload::UnloadSet;
use crate::writer::{CheckpointWriter, WriterError};

const LOG_TARGET: &str = "otter::typeset";

/// Type-set checkpoint serializer
#[derive(Debug)]
pub struct TypeSet {
    config: TypeSetConfig,
    tagger: ArtifactTagger,
    registries: Registries,
    symbols: SymbolTable,
    epochs: EpochCounter,
    leak: LeakProfilerStream,
    /// Bootstrap loader record emitted in the current epoch
    bootstrap_written: bool,
    poisoned: Option<InvariantViolation>,
    stats: TypeSetStats,
    last_summary: Option<SerializeSummary>,
}

impl TypeSet {
    /// Create a type set with default configuration
    pub fn new() -> Self {
        Self::with_config(TypeSetConfig::default())
    }

    /// Create a type set with custom configuration
    pub fn with_config(config: TypeSetConfig) -> Self {
        Self {
            leak: LeakProfilerStream::new(config.retain_leak_records),
            config,
            tagger: ArtifactTagger::new(),
            registries: Registries::new(),
            symbols: SymbolTable::new(),
            epochs: EpochCounter::new(),
            bootstrap_written: false,
            poisoned: None,
            stats: TypeSetStats::default(),
            last_summary: None,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &TypeSetConfig {
        &self.config
    }

    // --- Tagging -----------------------------------------------------------

    /// Mark an artifact as referenced by a trace event
    pub fn tag(&mut self, artifact: ArtifactRef) -> bool {
        self.tagger.tag(artifact)
    }

    /// Mark a class as referenced
    pub fn tag_class(&mut self, class: ArtifactHandle) -> bool {
        self.tag(ArtifactRef::class(class))
    }

    /// Mark a method as referenced
    pub fn tag_method(&mut self, method: ArtifactHandle) -> bool {
        self.tag(ArtifactRef::method(method))
    }

    /// Mark a thread as referenced
    pub fn tag_thread(&mut self, thread: ArtifactHandle) -> bool {
        self.tag(ArtifactRef::thread(thread))
    }

    /// Mark a class as referenced by a leak-profiler sample
    pub fn tag_leakp(&mut self, class: ArtifactHandle) -> bool {
        self.tagger.tag_leakp(ArtifactRef::class(class))
    }

    /// Whether an artifact is tagged
    pub fn is_tagged(&self, artifact: ArtifactRef) -> bool {
        self.tagger.is_tagged(artifact)
    }

    /// Read access to tag state
    pub fn tagger(&self) -> &ArtifactTagger {
        &self.tagger
    }

    // --- Lookups -----------------------------------------------------------

    /// Identifier currently assigned to an artifact
    pub fn id_of(&self, artifact: ArtifactRef) -> Option<TraceId> {
        self.registries.lookup(artifact)
    }

    /// Artifact owning an identifier.
    ///
    /// Resolving the identifier of a forgotten artifact is an invariant
    /// violation until the next epoch rotation.
    pub fn resolve(&self, id: TraceId) -> Result<Option<ArtifactRef>> {
        Ok(self.registries.resolve(id)?)
    }

    /// Read access to the registries
    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Leak-profiler identifier of a class
    pub fn leak_id_of(&self, class: ArtifactHandle) -> Option<TraceId> {
        self.leak.id_of(class)
    }

    /// Shareable lookup into the leak-profiler stream
    pub fn leak_lookup(&self) -> LeakLookup {
        self.leak.lookup()
    }

    // --- Epoch, stats ------------------------------------------------------

    /// Current epoch
    pub fn epoch(&self) -> Epoch {
        self.epochs.current()
    }

    /// Advance the epoch.
    ///
    /// Called by the recorder at chunk rotation. The next checkpoint must be
    /// self-contained, so every serialized mark is reset. Identifiers are kept.
    pub fn rotate_epoch(&mut self) -> Epoch {
        let epoch = self.epochs.rotate();
        self.tagger.reset_serialized();
        let purged = self.registries.purge_retired();
        self.bootstrap_written = false;
        self.stats.rotations += 1;
        tracing::debug!(
            target: LOG_TARGET,
            generation = epoch.generation,
            purged_tombstones = purged,
            "Epoch rotated"
        );
        epoch
    }

    /// Cumulative statistics
    pub fn stats(&self) -> &TypeSetStats {
        &self.stats
    }

    /// Summary of the last successful serialize pass
    pub fn last_summary(&self) -> Option<&SerializeSummary> {
        self.last_summary.as_ref()
    }

    /// Whether an invariant violation has been reported
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    fn check_poisoned(&self) -> Result<()> {
        if self.poisoned.is_some() {
            return Err(TypeSetError::Poisoned);
        }
        Ok(())
    }

    fn poison(&mut self, violation: InvariantViolation) -> TypeSetError {
        tracing::error!(
            target: LOG_TARGET,
            %violation,
            "Metadata graph invariant violated; type set poisoned"
        );
        self.poisoned = Some(violation.clone());
        TypeSetError::Invariant(violation)
    }

    // --- Operations --------------------------------------------------------

    /// Reset main-stream tags without writing anything.
    ///
    /// The writers are accepted for symmetry with `serialize`; no bytes are
    /// written to either. Identifiers, serialized marks and pending
    /// leak-profiler tags are kept.
    pub fn clear(
        &mut self,
        _writer: &mut dyn CheckpointWriter,
        _leakp_writer: Option<&mut dyn CheckpointWriter>,
    ) {
        let tagged = self.tagger.tagged_count();
        self.tagger.clear_all();
        self.stats.clears += 1;
        tracing::debug!(target: LOG_TARGET, cleared = tagged, "Type set tags cleared");
    }

    /// Write every tagged artifact, dependencies first, as one checkpoint.
    ///
    /// Returns the number of bytes committed to `writer` (segment header
    /// included). `Ok(0)` means nothing was tagged and no segment was opened.
    ///
    /// With `flushpoint` the tags survive the pass. With `class_unload`,
    /// classes the graph reports as unloading are written with the unloading
    /// marker and forgotten afterwards. When `leakp_writer` is given, a
    /// reduced record for every class in the pass (plus leak-profiler tagged
    /// classes) is written there with leak-stream identifiers.
    ///
    /// If the main segment committed but the leak segment failed, the main
    /// pass is kept and the writer error is still returned.
    pub fn serialize<G: MetadataGraph + ?Sized>(
        &mut self,
        graph: &G,
        writer: &mut dyn CheckpointWriter,
        mut leakp_writer: Option<&mut dyn CheckpointWriter>,
        class_unload: bool,
        flushpoint: bool,
    ) -> Result<usize> {
        self.check_poisoned()?;
        let epoch = self.epochs.current();

        tracing::debug!(
            target: LOG_TARGET,
            generation = epoch.generation,
            tagged = self.tagger.tagged_count(),
            class_unload,
            flushpoint,
            leakp = leakp_writer.is_some(),
            "Type set serialization starting"
        );

        let mut output = match self.plan(graph, class_unload, leakp_writer.is_some()) {
            Ok(output) => output,
            Err((violation, fresh)) => {
                for artifact in fresh.into_iter().rev() {
                    self.registries.unregister(artifact);
                }
                return Err(self.poison(violation));
            }
        };

        let leak_pending = if leakp_writer.is_some() {
            match self.leak.prepare(
                graph,
                &output.leak_classes,
                &self.config.bootstrap_loader_name,
                epoch.generation,
            ) {
                Ok(pending) => Some(pending),
                Err(violation) => {
                    self.rollback(&mut output);
                    return Err(self.poison(violation));
                }
            }
        } else {
            None
        };

        let main_header = SegmentHeader {
            kind: SegmentKind::TypeSet,
            generation: epoch.generation,
            flushpoint,
        };
        let leak_header = SegmentHeader {
            kind: SegmentKind::LeakProfiler,
            ..main_header
        };

        // Stage both segments before committing either
        let staged = stage(&mut *writer, main_header, &output.records).and_then(|_| {
            match (leakp_writer.as_deref_mut(), leak_pending.as_ref()) {
                (Some(leak_writer), Some(pending)) => {
                    stage(leak_writer, leak_header, &pending.records)
                }
                _ => Ok(()),
            }
        });
        let main_bytes = staged.and_then(|_| finish(&mut *writer, &output.records));

        let main_bytes = match main_bytes {
            Ok(bytes) => bytes,
            Err(err) => {
                writer.cancel_checkpoint();
                if let Some(leak_writer) = leakp_writer.as_deref_mut() {
                    leak_writer.cancel_checkpoint();
                }
                self.rollback(&mut output);
                if let Some(pending) = leak_pending {
                    self.leak.rollback(pending);
                }
                return Err(self.writer_failed(err));
            }
        };

        let mut summary = SerializeSummary {
            bytes: main_bytes,
            flushpoint,
            class_unload,
            generation: epoch.generation,
            ..Default::default()
        };
        for record in &output.records {
            summary.count(record);
        }

        let mut leak_failure = None;
        if let (Some(leak_writer), Some(pending)) = (leakp_writer.as_deref_mut(), leak_pending) {
            match finish(leak_writer, &pending.records) {
                Ok(bytes) => {
                    summary.leak_bytes = bytes;
                    summary.leak_classes = pending.records.len();
                    for (handle, _) in &output.leak_classes {
                        self.tagger.untag_leakp(ArtifactRef::class(*handle));
                    }
                    self.leak.commit(pending);
                }
                Err(err) => {
                    leak_writer.cancel_checkpoint();
                    self.leak.rollback(pending);
                    leak_failure = Some(err);
                }
            }
        }

        summary.unloaded = self.commit(output, flushpoint);
        self.stats.record_pass(&summary);

        tracing::info!(
            target: LOG_TARGET,
            generation = summary.generation,
            bytes = summary.bytes,
            records = summary.total_records(),
            classes = summary.classes,
            methods = summary.methods,
            symbols = summary.symbols,
            unloaded = summary.unloaded,
            leak_classes = summary.leak_classes,
            flushpoint,
            "Type set serialized"
        );
        self.last_summary = Some(summary);

        match leak_failure {
            Some(err) => Err(self.writer_failed(err)),
            None => Ok(main_bytes),
        }
    }

    /// Capture and write every class the runtime is about to reclaim.
    ///
    /// Runs inside the unloading safepoint. Each class is written as a
    /// terminal record and then forgotten together with its methods; its
    /// identifier is never handed out again. Tag state of other artifacts is
    /// left alone. Returns the number of classes captured.
    pub fn on_unloading_classes<G: MetadataGraph + ?Sized>(
        &mut self,
        graph: &G,
        writer: &mut dyn CheckpointWriter,
    ) -> Result<usize> {
        self.check_poisoned()?;

        let set = match UnloadSet::capture(
            graph,
            &mut self.registries,
            &self.config.bootstrap_loader_name,
        ) {
            Ok(set) => set,
            Err(violation) => return Err(self.poison(violation)),
        };
        if set.is_empty() {
            return Ok(0);
        }

        let header = SegmentHeader {
            kind: SegmentKind::ClassUnload,
            generation: self.epochs.current().generation,
            flushpoint: false,
        };
        let records: Vec<TypeRecord> = set.classes().iter().map(|c| c.to_record()).collect();
        let written = stage(&mut *writer, header, &records).and_then(|_| finish(&mut *writer, &records));

        let bytes = match written {
            Ok(bytes) => bytes,
            Err(err) => {
                writer.cancel_checkpoint();
                set.rollback(&mut self.registries);
                return Err(self.writer_failed(err));
            }
        };

        let mut methods = 0;
        for class in set.classes() {
            methods += self.forget_class(graph, class.handle);
        }

        let count = set.len();
        self.stats.unload_captures += 1;
        self.stats.classes_unloaded += count as u64;
        tracing::info!(
            target: LOG_TARGET,
            classes = count,
            methods,
            bytes,
            "Captured unloading classes"
        );
        Ok(count)
    }

    // --- Internals ---------------------------------------------------------

    fn writer_failed(&mut self, err: WriterError) -> TypeSetError {
        self.stats.writer_failures += 1;
        tracing::warn!(
            target: LOG_TARGET,
            error = %err,
            "Checkpoint writer failed; pass abandoned"
        );
        TypeSetError::Writer(err)
    }

    fn plan<G: MetadataGraph + ?Sized>(
        &mut self,
        graph: &G,
        class_unload: bool,
        with_leak: bool,
    ) -> std::result::Result<PassOutput, (InvariantViolation, Vec<ArtifactRef>)> {
        let mut pass = Pass {
            graph,
            tagger: &self.tagger,
            registries: &mut self.registries,
            symbols: &mut self.symbols,
            config: &self.config,
            class_unload,
            bootstrap_written: self.bootstrap_written,
            plan: EmissionPlan::new(self.config.max_dependency_depth),
            out: PassOutput::default(),
        };
        match pass.run(with_leak) {
            Ok(()) => Ok(pass.out),
            Err(violation) => Err((violation, pass.out.fresh)),
        }
    }

    fn rollback(&mut self, output: &mut PassOutput) {
        for artifact in output.fresh.drain(..).rev() {
            self.registries.unregister(artifact);
        }
    }

    /// Apply the side effects of a committed pass; returns classes forgotten
    fn commit(&mut self, output: PassOutput, flushpoint: bool) -> usize {
        for artifact in &output.emitted {
            self.tagger.mark_serialized(*artifact);
        }
        if !flushpoint {
            for artifact in &output.processed {
                self.tagger.untag(*artifact);
            }
        }
        if output.bootstrap_emitted {
            self.bootstrap_written = true;
        }
        for class in &output.unloading {
            let class_ref = ArtifactRef::class(*class);
            for method in self.registries.of(ArtifactKind::Method).owned_by(*class) {
                let method_ref = ArtifactRef::method(method);
                self.registries.forget(method_ref);
                self.tagger.forget(method_ref);
            }
            self.registries.forget(class_ref);
            self.tagger.forget(class_ref);
            self.leak.forget(*class);
        }
        output.unloading.len()
    }

    /// Forget a class and its methods; returns how many methods went with it
    fn forget_class<G: MetadataGraph + ?Sized>(&mut self, graph: &G, class: ArtifactHandle) -> usize {
        let mut methods: Vec<ArtifactHandle> =
            self.registries.of(ArtifactKind::Method).owned_by(class);
        // Methods tagged but never written have no registry owner yet
        for method in self.tagger.tagged(ArtifactKind::Method) {
            if !methods.contains(&method)
                && graph.method(method).is_some_and(|m| m.holder == class)
            {
                methods.push(method);
            }
        }
        for method in &methods {
            let method_ref = ArtifactRef::method(*method);
            self.registries.forget(method_ref);
            self.tagger.forget(method_ref);
        }
        let class_ref = ArtifactRef::class(class);
        self.registries.forget(class_ref);
        self.tagger.forget(class_ref);
        self.leak.forget(class);
        methods.len()
    }
}

impl Default for TypeSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Open a segment and write all records into it
fn stage<W: CheckpointWriter + ?Sized>(
    writer: &mut W,
    header: SegmentHeader,
    records: &[TypeRecord],
) -> std::result::Result<(), WriterError> {
    if records.is_empty() {
        return Ok(());
    }
    writer.begin_checkpoint(header)?;
    for record in records {
        writer.write_record(record)?;
    }
    Ok(())
}

/// Commit a segment opened by `stage`
fn finish<W: CheckpointWriter + ?Sized>(
    writer: &mut W,
    records: &[TypeRecord],
) -> std::result::Result<usize, WriterError> {
    if records.is_empty() {
        return Ok(0);
    }
    writer.end_checkpoint()
}

/// Everything a planned pass produces
#[derive(Debug, Default)]
struct PassOutput {
    /// Records in emission order
    records: Vec<TypeRecord>,
    /// Registrations made by this pass, for rollback
    fresh: Vec<ArtifactRef>,
    /// Artifacts written by this pass
    emitted: Vec<ArtifactRef>,
    /// Tagged artifacts the pass consumed
    processed: Vec<ArtifactRef>,
    /// Classes written with the unloading marker
    unloading: Vec<ArtifactHandle>,
    /// Classes for the leak-profiler stream
    leak_classes: Vec<(ArtifactHandle, ClassInfo)>,
    bootstrap_emitted: bool,
}

struct Pass<'a, G: ?Sized> {
    graph: &'a G,
    tagger: &'a ArtifactTagger,
    registries: &'a mut Registries,
    symbols: &'a mut SymbolTable,
    config: &'a TypeSetConfig,
    class_unload: bool,
    bootstrap_written: bool,
    plan: EmissionPlan,
    out: PassOutput,
}

impl<G: MetadataGraph + ?Sized> Pass<'_, G> {
    fn run(&mut self, with_leak: bool) -> std::result::Result<(), InvariantViolation> {
        let mut leak_seen: FxHashSet<ArtifactHandle> = FxHashSet::default();

        for kind in ArtifactKind::ALL {
            let tagged: Vec<ArtifactRef> = self
                .registries
                .of(kind)
                .tagged_entries(self.tagger)
                .collect();

            for artifact in tagged {
                self.out.processed.push(artifact);
                if kind == ArtifactKind::Symbol {
                    self.tagged_symbol(artifact)?;
                    continue;
                }

                let tagger = self.tagger;
                let order = self.plan.expand(self.graph, artifact, |dep| {
                    tagger.is_serialized(dep) && !tagger.is_tagged(dep)
                })?;
                for (planned, info) in order {
                    if with_leak {
                        if let ArtifactInfo::Class(class) = &info {
                            if leak_seen.insert(planned.handle) {
                                self.out.leak_classes.push((planned.handle, class.clone()));
                            }
                        }
                    }
                    self.emit(planned, info)?;
                }
            }
        }

        if with_leak {
            let leakp: Vec<ArtifactHandle> = self.tagger.leakp_tagged(ArtifactKind::Class).collect();
            for handle in leakp {
                if leak_seen.insert(handle) {
                    let info = self
                        .graph
                        .class(handle)
                        .ok_or(InvariantViolation::DanglingArtifact(ArtifactRef::class(handle)))?;
                    self.out.leak_classes.push((handle, info));
                }
            }
        }
        Ok(())
    }

    fn register(&mut self, artifact: ArtifactRef) -> std::result::Result<TraceId, InvariantViolation> {
        let (id, fresh) = self.registries.register(artifact)?;
        if fresh {
            self.out.fresh.push(artifact);
        }
        Ok(id)
    }

    /// Identifier of a dependency that must already be written or still valid
    fn dependency(&self, dep: ArtifactRef) -> std::result::Result<TraceId, InvariantViolation> {
        self.registries
            .lookup(dep)
            .ok_or(InvariantViolation::DanglingArtifact(dep))
    }

    fn symbol(&mut self, text: &str) -> std::result::Result<TraceId, InvariantViolation> {
        let symbol = self.symbols.intern(text);
        let id = self.register(symbol)?;
        if !self.plan.is_done(symbol) && !self.tagger.is_serialized(symbol) {
            self.plan.mark_done(symbol);
            self.out.emitted.push(symbol);
            self.out.records.push(TypeRecord::Symbol {
                id,
                text: text.to_string(),
            });
        }
        Ok(id)
    }

    fn opt_symbol(&mut self, text: Option<&str>) -> std::result::Result<Option<TraceId>, InvariantViolation> {
        text.map(|t| self.symbol(t)).transpose()
    }

    fn tagged_symbol(&mut self, symbol: ArtifactRef) -> std::result::Result<(), InvariantViolation> {
        if self.plan.is_done(symbol) {
            return Ok(());
        }
        let text = self
            .symbols
            .text(symbol.handle)
            .ok_or(InvariantViolation::DanglingArtifact(symbol))?
            .to_string();
        let id = self.register(symbol)?;
        self.plan.mark_done(symbol);
        self.out.emitted.push(symbol);
        self.out.records.push(TypeRecord::Symbol { id, text });
        Ok(())
    }

    fn bootstrap(&mut self) -> std::result::Result<TraceId, InvariantViolation> {
        if self.config.emit_bootstrap_loader && !self.bootstrap_written && !self.out.bootstrap_emitted {
            let name = self.config.bootstrap_loader_name.clone();
            let symbol = self.symbol(&name)?;
            self.out.bootstrap_emitted = true;
            self.out.records.push(TypeRecord::ClassLoader {
                id: TraceId::BOOTSTRAP,
                name: Some(symbol),
                type_name: symbol,
            });
        }
        Ok(TraceId::BOOTSTRAP)
    }

    fn emit(&mut self, artifact: ArtifactRef, info: ArtifactInfo) -> std::result::Result<(), InvariantViolation> {
        let record = match info {
            ArtifactInfo::Class(class) => {
                let name = self.symbol(&class.name)?;
                let loader = match class.loader {
                    None => self.bootstrap()?,
                    Some(loader) => self.dependency(ArtifactRef::loader(loader))?,
                };
                let package = class
                    .package
                    .map(|p| self.dependency(ArtifactRef::package(p)))
                    .transpose()?;
                let element = class
                    .element
                    .map(|e| self.dependency(ArtifactRef::class(e)))
                    .transpose()?;
                let super_class = class
                    .super_class
                    .map(|s| self.dependency(ArtifactRef::class(s)))
                    .transpose()?;
                let unloading = self.class_unload && self.graph.is_unloading(artifact.handle);
                if unloading {
                    self.out.unloading.push(artifact.handle);
                }
                TypeRecord::Class {
                    id: self.register(artifact)?,
                    name,
                    loader,
                    package,
                    super_class,
                    element,
                    modifiers: class.modifiers,
                    hidden: class.hidden,
                    unloading,
                }
            }
            ArtifactInfo::Method(method) => {
                let class = self.dependency(ArtifactRef::class(method.holder))?;
                let name = self.symbol(&method.name)?;
                let descriptor = self.symbol(&method.descriptor)?;
                let id = self.register(artifact)?;
                self.registries
                    .of_mut(ArtifactKind::Method)
                    .set_owner(artifact.handle, method.holder);
                TypeRecord::Method {
                    id,
                    class,
                    name,
                    descriptor,
                    modifiers: method.modifiers,
                    hidden: method.hidden,
                }
            }
            ArtifactInfo::Package(package) => {
                let name = self.symbol(&package.name)?;
                let module = package
                    .module
                    .map(|m| self.dependency(ArtifactRef::module(m)))
                    .transpose()?;
                TypeRecord::Package {
                    id: self.register(artifact)?,
                    name,
                    module,
                    exported: package.exported,
                }
            }
            ArtifactInfo::Module(module) => {
                let name = self.symbol(&module.name)?;
                let version = self.opt_symbol(module.version.as_deref())?;
                let location = self.opt_symbol(module.location.as_deref())?;
                TypeRecord::Module {
                    id: self.register(artifact)?,
                    name,
                    version,
                    location,
                }
            }
            ArtifactInfo::ClassLoader(loader) => {
                let name = self.opt_symbol(loader.name.as_deref())?;
                let type_name = self.symbol(&loader.type_name)?;
                TypeRecord::ClassLoader {
                    id: self.register(artifact)?,
                    name,
                    type_name,
                }
            }
            ArtifactInfo::Thread(thread) => {
                let name = self.symbol(&thread.name)?;
                TypeRecord::Thread {
                    id: self.register(artifact)?,
                    name,
                    os_thread_id: thread.os_thread_id,
                    managed_thread_id: thread.managed_thread_id,
                }
            }
        };
        self.out.emitted.push(artifact);
        self.out.records.push(record);
        Ok(())
    }
}
