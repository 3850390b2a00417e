//! Leak-profiler stream
//!
//! The leak profiler attributes sampled objects to their declaring classes
//! long after the main checkpoint may have cleared its tags or the class may
//! have been unloaded. Its stream therefore keeps separate identifiers and a
//! separate retention table; it shares nothing with the main stream except
//! read access to the metadata graph.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::Arc;

use crate::artifact::{ArtifactHandle, ArtifactRef, TraceId};
use crate::error::InvariantViolation;
use crate::graph::{ClassInfo, MetadataGraph};
use crate::registry::Registries;
use crate::record::TypeRecord;

/// A class as the leak-profiler stream last described it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeakClassEntry {
    /// Leak-stream identifier
    pub id: TraceId,
    /// Class name
    pub name: String,
    /// Defining loader name
    pub loader_name: String,
    /// Epoch generation of the checkpoint that carried it
    pub generation: u64,
}

/// Shareable read handle on the leak stream's retention table
#[derive(Debug, Clone, Default)]
pub struct LeakLookup {
    entries: Arc<RwLock<FxHashMap<TraceId, LeakClassEntry>>>,
}

impl LeakLookup {
    /// Resolve a leak-stream identifier
    pub fn resolve(&self, id: TraceId) -> Option<LeakClassEntry> {
        self.entries.read().get(&id).cloned()
    }

    /// Number of retained classes
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is retained
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn insert(&self, entry: LeakClassEntry) {
        self.entries.write().insert(entry.id, entry);
    }
}

/// Records prepared for one leak-stream checkpoint, not yet committed
#[derive(Debug, Default)]
pub struct PendingLeakWrite {
    /// Records to write, in order
    pub records: Vec<TypeRecord>,
    registered: Vec<ArtifactRef>,
    entries: Vec<LeakClassEntry>,
}

impl PendingLeakWrite {
    /// Whether there is nothing to write
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Independent state behind the leak-profiler stream
#[derive(Debug)]
pub struct LeakProfilerStream {
    ids: Registries,
    retained: LeakLookup,
    retain: bool,
}

impl LeakProfilerStream {
    /// Create a stream; `retain` keeps every written class resolvable
    pub fn new(retain: bool) -> Self {
        Self {
            ids: Registries::new(),
            retained: LeakLookup::default(),
            retain,
        }
    }

    /// Read handle on the retention table
    pub fn lookup(&self) -> LeakLookup {
        self.retained.clone()
    }

    /// Leak-stream identifier of a class, if it was ever written
    pub fn id_of(&self, class: ArtifactHandle) -> Option<TraceId> {
        self.ids.lookup(ArtifactRef::class(class))
    }

    /// Drop the handle of a reclaimed class.
    ///
    /// The handle may be reused by a later class, which then gets a fresh
    /// identifier. Retained entries for the old identifier stay resolvable.
    pub fn forget(&mut self, class: ArtifactHandle) -> Option<TraceId> {
        self.ids.forget(ArtifactRef::class(class))
    }

    /// Build reduced records for `classes`.
    ///
    /// Identifiers allocated here are rolled back by `rollback` if the write
    /// fails.
    pub fn prepare<G: MetadataGraph + ?Sized>(
        &mut self,
        graph: &G,
        classes: &[(ArtifactHandle, ClassInfo)],
        bootstrap_name: &str,
        generation: u64,
    ) -> Result<PendingLeakWrite, InvariantViolation> {
        let mut pending = PendingLeakWrite::default();
        for (handle, info) in classes {
            let artifact = ArtifactRef::class(*handle);
            let (id, fresh) = self.ids.register(artifact)?;
            if fresh {
                pending.registered.push(artifact);
            }
            let loader_name = match info.loader {
                None => bootstrap_name.to_string(),
                Some(loader) => {
                    let loader_info = graph
                        .loader(loader)
                        .ok_or(InvariantViolation::DanglingArtifact(ArtifactRef::loader(loader)))?;
                    loader_info.name.unwrap_or(loader_info.type_name)
                }
            };
            pending.records.push(TypeRecord::LeakClass {
                id,
                name: info.name.clone(),
                loader_name: loader_name.clone(),
            });
            pending.entries.push(LeakClassEntry {
                id,
                name: info.name.clone(),
                loader_name,
                generation,
            });
        }
        Ok(pending)
    }

    /// Make a written batch resolvable
    pub fn commit(&mut self, pending: PendingLeakWrite) {
        if self.retain {
            for entry in pending.entries {
                self.retained.insert(entry);
            }
        }
    }

    /// Undo identifier allocation for a batch that was not written
    pub fn rollback(&mut self, pending: PendingLeakWrite) {
        for artifact in pending.registered {
            self.ids.unregister(artifact);
        }
    }
}
