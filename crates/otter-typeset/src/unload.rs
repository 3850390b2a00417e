//! Unload capture
//!
//! Runs inside the class-unloading safepoint, before class memory is freed.
//! Everything needed for the terminal record is copied out of the graph into
//! an `UnloadSet`, which lives only for the duration of one call.

use rustc_hash::FxHashSet;

use crate::artifact::{ArtifactHandle, ArtifactRef, TraceId};
use crate::error::InvariantViolation;
use crate::graph::MetadataGraph;
use crate::record::TypeRecord;
use crate::registry::Registries;

/// A class captured by value just before reclamation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedClass {
    /// Runtime handle (about to become invalid)
    pub handle: ArtifactHandle,
    /// Identifier: the existing one, or a fresh one for never-written classes
    pub id: TraceId,
    /// Whether `id` was allocated by this capture
    pub fresh: bool,
    /// Class name
    pub name: String,
    /// Loader identifier, if the loader was ever written
    pub loader: Option<TraceId>,
    /// Loader name, copied because the loader may be unloading too
    pub loader_name: Option<String>,
}

impl CapturedClass {
    /// Terminal record for this class
    pub fn to_record(&self) -> TypeRecord {
        TypeRecord::ClassUnload {
            id: self.id,
            name: self.name.clone(),
            loader: self.loader,
            loader_name: self.loader_name.clone(),
        }
    }
}

/// Transient set of classes captured during one unloading safepoint
#[derive(Debug, Default)]
pub struct UnloadSet {
    classes: Vec<CapturedClass>,
}

impl UnloadSet {
    /// Capture every class the graph reports as unloading.
    ///
    /// Reads only; tag state is never touched. Classes without an identifier
    /// get a fresh one so the terminal record can name them.
    pub fn capture<G: MetadataGraph + ?Sized>(
        graph: &G,
        registries: &mut Registries,
        bootstrap_name: &str,
    ) -> Result<UnloadSet, InvariantViolation> {
        let unloading = graph.unloading_classes();
        let mut seen = FxHashSet::default();

        let mut set = UnloadSet {
            classes: Vec::with_capacity(unloading.len()),
        };
        for handle in unloading {
            if !seen.insert(handle) {
                continue;
            }
            match Self::capture_one(graph, registries, bootstrap_name, handle) {
                Ok(class) => set.classes.push(class),
                Err(violation) => {
                    set.rollback(registries);
                    return Err(violation);
                }
            }
        }
        Ok(set)
    }

    fn capture_one<G: MetadataGraph + ?Sized>(
        graph: &G,
        registries: &mut Registries,
        bootstrap_name: &str,
        handle: ArtifactHandle,
    ) -> Result<CapturedClass, InvariantViolation> {
        let artifact = ArtifactRef::class(handle);
        let info = graph
            .class(handle)
            .ok_or(InvariantViolation::DanglingArtifact(artifact))?;
        let (id, fresh) = registries.register(artifact)?;

        let (loader, loader_name) = match info.loader {
            None => (Some(TraceId::BOOTSTRAP), Some(bootstrap_name.to_string())),
            Some(loader) => {
                let name = graph.loader(loader).map(|l| l.name.unwrap_or(l.type_name));
                (registries.lookup(ArtifactRef::loader(loader)), name)
            }
        };

        Ok(CapturedClass {
            handle,
            id,
            fresh,
            name: info.name,
            loader,
            loader_name,
        })
    }

    /// Captured classes
    pub fn classes(&self) -> &[CapturedClass] {
        &self.classes
    }

    /// Number of captured classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether nothing was captured
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Undo identifiers allocated by the capture
    pub fn rollback(self, registries: &mut Registries) {
        for class in self.classes.into_iter().filter(|c| c.fresh) {
            registries.unregister(ArtifactRef::class(class.handle));
        }
    }
}
