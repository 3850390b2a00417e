//! Out-of-band artifact tagging
//!
//! Tag state lives in a side table keyed by artifact identity, never in the
//! runtime's metadata. A slot is created the first time an artifact is seen
//! and kept across clears, so re-tagging a known artifact does not allocate.
//!
//! Per-kind tables are insertion ordered: enumeration follows first-tag order
//! until an artifact is forgotten, and stays stable while the table is not
//! mutated.

use indexmap::IndexMap;

use crate::artifact::{ArtifactHandle, ArtifactKind, ArtifactRef};

/// Referenced since the last checkpoint
pub const TAG_REFERENCED: u8 = 1 << 0;
/// Referenced by the leak profiler since its last write
pub const TAG_LEAKP: u8 = 1 << 1;
/// Emitted in an earlier checkpoint of the current epoch
pub const TAG_SERIALIZED: u8 = 1 << 2;

/// Tag side table for every artifact kind
#[derive(Debug)]
pub struct ArtifactTagger {
    tables: [IndexMap<ArtifactHandle, u8>; ArtifactKind::COUNT],
}

impl ArtifactTagger {
    /// Create an empty tagger
    pub fn new() -> Self {
        Self {
            tables: std::array::from_fn(|_| IndexMap::new()),
        }
    }

    #[inline]
    fn bits(&self, artifact: ArtifactRef) -> u8 {
        self.tables[artifact.kind.index()]
            .get(&artifact.handle)
            .copied()
            .unwrap_or(0)
    }

    #[inline]
    fn set(&mut self, artifact: ArtifactRef, bit: u8) -> bool {
        let slot = self.tables[artifact.kind.index()]
            .entry(artifact.handle)
            .or_insert(0);
        let was_set = *slot & bit != 0;
        *slot |= bit;
        !was_set
    }

    #[inline]
    fn unset(&mut self, artifact: ArtifactRef, bit: u8) {
        if let Some(slot) = self.tables[artifact.kind.index()].get_mut(&artifact.handle) {
            *slot &= !bit;
        }
    }

    /// Mark an artifact as referenced. Returns true if it was not tagged before.
    pub fn tag(&mut self, artifact: ArtifactRef) -> bool {
        self.set(artifact, TAG_REFERENCED)
    }

    /// Mark an artifact as referenced by the leak profiler
    pub fn tag_leakp(&mut self, artifact: ArtifactRef) -> bool {
        self.set(artifact, TAG_LEAKP)
    }

    /// Whether the artifact is tagged as referenced
    pub fn is_tagged(&self, artifact: ArtifactRef) -> bool {
        self.bits(artifact) & TAG_REFERENCED != 0
    }

    /// Whether the artifact carries the leak-profiler tag
    pub fn is_leakp_tagged(&self, artifact: ArtifactRef) -> bool {
        self.bits(artifact) & TAG_LEAKP != 0
    }

    /// Whether the artifact was already emitted in this epoch
    pub fn is_serialized(&self, artifact: ArtifactRef) -> bool {
        self.bits(artifact) & TAG_SERIALIZED != 0
    }

    /// Record that the artifact was emitted in this epoch
    pub fn mark_serialized(&mut self, artifact: ArtifactRef) {
        self.set(artifact, TAG_SERIALIZED);
    }

    /// Clear the referenced tag of one artifact
    pub fn untag(&mut self, artifact: ArtifactRef) {
        self.unset(artifact, TAG_REFERENCED);
    }

    /// Clear the leak-profiler tag of one artifact
    pub fn untag_leakp(&mut self, artifact: ArtifactRef) {
        self.unset(artifact, TAG_LEAKP);
    }

    /// Reset every referenced tag. Leak-profiler tags and serialized marks are kept.
    pub fn clear_all(&mut self) {
        for table in &mut self.tables {
            for bits in table.values_mut() {
                *bits &= !TAG_REFERENCED;
            }
        }
    }

    /// Reset every serialized mark (epoch rotation)
    pub fn reset_serialized(&mut self) {
        for table in &mut self.tables {
            for bits in table.values_mut() {
                *bits &= !TAG_SERIALIZED;
            }
        }
    }

    /// Handles of `kind` currently tagged as referenced
    pub fn tagged(&self, kind: ArtifactKind) -> impl Iterator<Item = ArtifactHandle> + '_ {
        self.with_bit(kind, TAG_REFERENCED)
    }

    /// Handles of `kind` currently carrying the leak-profiler tag
    pub fn leakp_tagged(&self, kind: ArtifactKind) -> impl Iterator<Item = ArtifactHandle> + '_ {
        self.with_bit(kind, TAG_LEAKP)
    }

    fn with_bit(&self, kind: ArtifactKind, bit: u8) -> impl Iterator<Item = ArtifactHandle> + '_ {
        self.tables[kind.index()]
            .iter()
            .filter(move |(_, bits)| **bits & bit != 0)
            .map(|(handle, _)| *handle)
    }

    /// Number of artifacts tagged as referenced, across all kinds
    pub fn tagged_count(&self) -> usize {
        ArtifactKind::ALL
            .iter()
            .map(|kind| self.tagged(*kind).count())
            .sum()
    }

    /// Drop all tag state for an artifact.
    ///
    /// The last slot of the table moves into the freed position.
    pub fn forget(&mut self, artifact: ArtifactRef) {
        self.tables[artifact.kind.index()].swap_remove(&artifact.handle);
    }

    /// Whether the tagger holds a slot for the artifact
    pub fn knows(&self, artifact: ArtifactRef) -> bool {
        self.tables[artifact.kind.index()].contains_key(&artifact.handle)
    }
}

impl Default for ArtifactTagger {
    fn default() -> Self {
        Self::new()
    }
}
