//! Dependency resolution
//!
//! A class needs its module, package, loader, element class and superclass
//! written before it; a method needs its declaring class; a package needs its
//! module. `DependencyResolver` lists the direct edges of one artifact and
//! `EmissionPlan` expands them depth-first into a post-order, so every
//! artifact appears after everything it refers to.
//!
//! The type hierarchy is acyclic by construction. The walk still tracks
//! in-progress artifacts and a depth bound so corrupted input is reported
//! instead of looping.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::artifact::{ArtifactKind, ArtifactRef};
use crate::error::InvariantViolation;
use crate::graph::{ArtifactInfo, MetadataGraph};

/// Direct predecessors of one artifact
pub type Dependencies = SmallVec<[ArtifactRef; 6]>;

/// Derives structural predecessors from the metadata graph
pub struct DependencyResolver;

impl DependencyResolver {
    /// Read an artifact's fields, failing if the graph no longer has it
    pub fn describe<G: MetadataGraph + ?Sized>(
        graph: &G,
        artifact: ArtifactRef,
    ) -> Result<ArtifactInfo, InvariantViolation> {
        graph
            .describe(artifact)
            .ok_or(InvariantViolation::DanglingArtifact(artifact))
    }

    /// Direct predecessors of `artifact`, most fundamental first.
    ///
    /// For a class: module, package, loader, element class, superclass.
    pub fn dependencies_of<G: MetadataGraph + ?Sized>(
        graph: &G,
        artifact: ArtifactRef,
        info: &ArtifactInfo,
    ) -> Result<Dependencies, InvariantViolation> {
        let mut deps = Dependencies::new();
        match info {
            ArtifactInfo::Class(class) => {
                if let Some(package) = class.package {
                    let package_ref = ArtifactRef::package(package);
                    let package_info = graph
                        .package(package)
                        .ok_or(InvariantViolation::DanglingArtifact(package_ref))?;
                    if let Some(module) = package_info.module {
                        deps.push(ArtifactRef::module(module));
                    }
                    deps.push(package_ref);
                }
                if let Some(loader) = class.loader {
                    deps.push(ArtifactRef::loader(loader));
                }
                if let Some(element) = class.element {
                    deps.push(ArtifactRef::class(element));
                }
                if let Some(super_class) = class.super_class {
                    deps.push(ArtifactRef::class(super_class));
                }
            }
            ArtifactInfo::Method(method) => deps.push(ArtifactRef::class(method.holder)),
            ArtifactInfo::Package(package) => {
                if let Some(module) = package.module {
                    deps.push(ArtifactRef::module(module));
                }
            }
            ArtifactInfo::Module(_) | ArtifactInfo::ClassLoader(_) | ArtifactInfo::Thread(_) => {}
        }
        debug_assert!(deps.iter().all(|d| d.kind != ArtifactKind::Symbol));
        deps.retain(|d| *d != artifact);
        Ok(deps)
    }
}

struct Frame {
    artifact: ArtifactRef,
    info: ArtifactInfo,
    deps: Dependencies,
    next: usize,
}

/// Per-call emission order with a visited set.
///
/// One plan lives for one serialize pass; an artifact planned once is never
/// planned again in that pass.
#[derive(Debug)]
pub struct EmissionPlan {
    done: FxHashSet<ArtifactRef>,
    max_depth: usize,
}

impl EmissionPlan {
    /// Create a plan bounded to `max_depth` nested dependencies
    pub fn new(max_depth: usize) -> Self {
        Self {
            done: FxHashSet::default(),
            max_depth,
        }
    }

    /// Whether `artifact` was already planned in this pass
    pub fn is_done(&self, artifact: ArtifactRef) -> bool {
        self.done.contains(&artifact)
    }

    /// Mark an artifact as planned without walking it
    pub fn mark_done(&mut self, artifact: ArtifactRef) {
        self.done.insert(artifact);
    }

    /// Number of artifacts planned so far
    pub fn len(&self) -> usize {
        self.done.len()
    }

    /// Whether nothing was planned yet
    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    /// Expand `root` into dependency-first order.
    ///
    /// Dependencies for which `still_valid` returns true are left out: their
    /// earlier record remains usable. The root itself is always included
    /// unless it was already planned in this pass.
    pub fn expand<G, F>(
        &mut self,
        graph: &G,
        root: ArtifactRef,
        still_valid: F,
    ) -> Result<Vec<(ArtifactRef, ArtifactInfo)>, InvariantViolation>
    where
        G: MetadataGraph + ?Sized,
        F: Fn(ArtifactRef) -> bool,
    {
        let mut order = Vec::new();
        if self.done.contains(&root) {
            return Ok(order);
        }

        let mut in_progress: FxHashSet<ArtifactRef> = FxHashSet::default();
        let mut stack: Vec<Frame> = Vec::new();

        let info = DependencyResolver::describe(graph, root)?;
        let deps = DependencyResolver::dependencies_of(graph, root, &info)?;
        in_progress.insert(root);
        stack.push(Frame {
            artifact: root,
            info,
            deps,
            next: 0,
        });

        while let Some(frame) = stack.last_mut() {
            if frame.next < frame.deps.len() {
                let dep = frame.deps[frame.next];
                frame.next += 1;

                if self.done.contains(&dep) || still_valid(dep) {
                    continue;
                }
                if in_progress.contains(&dep) {
                    return Err(InvariantViolation::DependencyCycle(dep));
                }
                if stack.len() >= self.max_depth {
                    return Err(InvariantViolation::DependencyTooDeep {
                        root,
                        limit: self.max_depth,
                    });
                }

                let info = DependencyResolver::describe(graph, dep)?;
                let deps = DependencyResolver::dependencies_of(graph, dep, &info)?;
                in_progress.insert(dep);
                stack.push(Frame {
                    artifact: dep,
                    info,
                    deps,
                    next: 0,
                });
            } else if let Some(frame) = stack.pop() {
                in_progress.remove(&frame.artifact);
                self.done.insert(frame.artifact);
                order.push((frame.artifact, frame.info));
            }
        }

        Ok(order)
    }
}
