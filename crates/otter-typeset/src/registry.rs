//! Per-kind artifact registries and the shared identifier allocator
//!
//! Identifiers come from a single allocator shared by every kind. They are
//! monotonic for the life of the type set and never handed out twice, so a
//! checkpoint written many epochs ago still resolves unambiguously. When an
//! artifact is forgotten its identifier is retired; looking it up afterwards
//! is an invariant violation until the next epoch purges the tombstone.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::artifact::{ArtifactHandle, ArtifactKind, ArtifactRef, TraceId};
use crate::error::InvariantViolation;
use crate::tagger::ArtifactTagger;

/// Process-wide identifier source
#[derive(Debug)]
pub struct IdAllocator {
    next: u64,
    owners: FxHashMap<TraceId, ArtifactRef>,
    retired: FxHashSet<TraceId>,
}

impl IdAllocator {
    /// First identifier handed out; 0 is the bootstrap loader
    pub const FIRST_ID: u64 = 1;

    /// Create a fresh allocator
    pub fn new() -> Self {
        Self {
            next: Self::FIRST_ID,
            owners: FxHashMap::default(),
            retired: FxHashSet::default(),
        }
    }

    /// Hand out the next identifier to `artifact`
    pub fn allocate(&mut self, artifact: ArtifactRef) -> Result<TraceId, InvariantViolation> {
        let id = TraceId(self.next);
        if let Some(owner) = self.owners.get(&id) {
            return Err(InvariantViolation::IdCollision {
                id,
                owner: *owner,
                requested: artifact,
            });
        }
        self.next += 1;
        self.owners.insert(id, artifact);
        Ok(id)
    }

    /// Owner of a live identifier
    pub fn owner(&self, id: TraceId) -> Result<Option<ArtifactRef>, InvariantViolation> {
        if self.retired.contains(&id) {
            return Err(InvariantViolation::ForgottenId(id));
        }
        Ok(self.owners.get(&id).copied())
    }

    /// Retire an identifier whose artifact was forgotten
    pub fn retire(&mut self, id: TraceId) {
        self.owners.remove(&id);
        self.retired.insert(id);
    }

    /// Drop an identifier that was never committed to a checkpoint
    pub fn release(&mut self, id: TraceId) {
        self.owners.remove(&id);
    }

    /// Forget retired tombstones (epoch rotation)
    pub fn purge_retired(&mut self) -> usize {
        let purged = self.retired.len();
        self.retired.clear();
        purged
    }

    /// Next identifier that would be handed out
    pub fn peek_next(&self) -> TraceId {
        TraceId(self.next)
    }

    /// Number of live identifiers
    pub fn live_count(&self) -> usize {
        self.owners.len()
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry entry for one artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Assigned identifier
    pub id: TraceId,
    /// Owning artifact handle (declaring class for methods)
    pub owner: Option<ArtifactHandle>,
}

/// Identifier table for one artifact kind
#[derive(Debug)]
pub struct ArtifactRegistry {
    kind: ArtifactKind,
    entries: FxHashMap<ArtifactHandle, RegistryEntry>,
}

impl ArtifactRegistry {
    /// Create an empty registry for `kind`
    pub fn new(kind: ArtifactKind) -> Self {
        Self {
            kind,
            entries: FxHashMap::default(),
        }
    }

    /// Kind this registry holds
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Return the existing identifier or allocate a new one.
    ///
    /// The flag is true when the identifier was freshly allocated.
    pub fn register(
        &mut self,
        handle: ArtifactHandle,
        ids: &mut IdAllocator,
    ) -> Result<(TraceId, bool), InvariantViolation> {
        if let Some(entry) = self.entries.get(&handle) {
            return Ok((entry.id, false));
        }
        let id = ids.allocate(ArtifactRef::new(self.kind, handle))?;
        self.entries.insert(handle, RegistryEntry { id, owner: None });
        Ok((id, true))
    }

    /// Identifier of a registered artifact
    pub fn lookup(&self, handle: ArtifactHandle) -> Option<TraceId> {
        self.entries.get(&handle).map(|e| e.id)
    }

    /// Full entry of a registered artifact
    pub fn entry(&self, handle: ArtifactHandle) -> Option<RegistryEntry> {
        self.entries.get(&handle).copied()
    }

    /// Record the owning artifact of a registered entry
    pub fn set_owner(&mut self, handle: ArtifactHandle, owner: ArtifactHandle) {
        if let Some(entry) = self.entries.get_mut(&handle) {
            entry.owner = Some(owner);
        }
    }

    /// Handles whose owner is `owner`
    pub fn owned_by(&self, owner: ArtifactHandle) -> Vec<ArtifactHandle> {
        let mut owned: Vec<ArtifactHandle> = self
            .entries
            .iter()
            .filter(|(_, e)| e.owner == Some(owner))
            .map(|(h, _)| *h)
            .collect();
        owned.sort();
        owned
    }

    /// Remove an artifact; further lookups miss
    pub fn forget(&mut self, handle: ArtifactHandle) -> Option<RegistryEntry> {
        self.entries.remove(&handle)
    }

    /// Tagged artifacts of this kind, in the tagger's stable order.
    ///
    /// The sequence reflects tag state at the time it is consumed; callers
    /// snapshot it before mutating tags.
    pub fn tagged_entries<'a>(
        &self,
        tagger: &'a ArtifactTagger,
    ) -> impl Iterator<Item = ArtifactRef> + 'a {
        let kind = self.kind;
        tagger
            .tagged(kind)
            .map(move |handle| ArtifactRef::new(kind, handle))
    }

    /// Number of registered artifacts
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One registry per kind plus the shared allocator
#[derive(Debug)]
pub struct Registries {
    registries: [ArtifactRegistry; ArtifactKind::COUNT],
    ids: IdAllocator,
}

impl Registries {
    /// Create empty registries
    pub fn new() -> Self {
        Self {
            registries: ArtifactKind::ALL.map(ArtifactRegistry::new),
            ids: IdAllocator::new(),
        }
    }

    /// Registry for one kind
    pub fn of(&self, kind: ArtifactKind) -> &ArtifactRegistry {
        &self.registries[kind.index()]
    }

    /// Mutable registry for one kind
    pub fn of_mut(&mut self, kind: ArtifactKind) -> &mut ArtifactRegistry {
        &mut self.registries[kind.index()]
    }

    /// Register an artifact in its kind's registry
    pub fn register(&mut self, artifact: ArtifactRef) -> Result<(TraceId, bool), InvariantViolation> {
        self.registries[artifact.kind.index()].register(artifact.handle, &mut self.ids)
    }

    /// Identifier of an artifact, if registered
    pub fn lookup(&self, artifact: ArtifactRef) -> Option<TraceId> {
        self.of(artifact.kind).lookup(artifact.handle)
    }

    /// Artifact owning an identifier
    pub fn resolve(&self, id: TraceId) -> Result<Option<ArtifactRef>, InvariantViolation> {
        self.ids.owner(id)
    }

    /// Forget an artifact and retire its identifier
    pub fn forget(&mut self, artifact: ArtifactRef) -> Option<TraceId> {
        let entry = self.of_mut(artifact.kind).forget(artifact.handle)?;
        self.ids.retire(entry.id);
        Some(entry.id)
    }

    /// Undo a registration that was never committed
    pub fn unregister(&mut self, artifact: ArtifactRef) {
        if let Some(entry) = self.of_mut(artifact.kind).forget(artifact.handle) {
            self.ids.release(entry.id);
        }
    }

    /// Shared allocator
    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    /// Purge retired tombstones (epoch rotation)
    pub fn purge_retired(&mut self) -> usize {
        self.ids.purge_retired()
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}
