//! Artifact identity types
//!
//! An artifact is a reference to one metadata entity owned by the runtime.
//! The type set never owns or copies the entity; it only keys side-state by
//! the entity's opaque handle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of metadata entity.
///
/// The declaration order is the fixed emission order used by a serialize
/// pass: symbols first, threads last.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// Interned name string
    Symbol = 0,
    /// Class loader
    ClassLoader = 1,
    /// Module
    Module = 2,
    /// Package
    Package = 3,
    /// Class (including array and hidden classes)
    Class = 4,
    /// Method
    Method = 5,
    /// Thread
    Thread = 6,
}

impl ArtifactKind {
    /// Number of kinds
    pub const COUNT: usize = 7;

    /// All kinds in emission order
    pub const ALL: [ArtifactKind; Self::COUNT] = [
        ArtifactKind::Symbol,
        ArtifactKind::ClassLoader,
        ArtifactKind::Module,
        ArtifactKind::Package,
        ArtifactKind::Class,
        ArtifactKind::Method,
        ArtifactKind::Thread,
    ];

    /// Dense index, usable for per-kind arrays
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Lowercase display name
    pub const fn name(self) -> &'static str {
        match self {
            ArtifactKind::Symbol => "symbol",
            ArtifactKind::ClassLoader => "classloader",
            ArtifactKind::Module => "module",
            ArtifactKind::Package => "package",
            ArtifactKind::Class => "class",
            ArtifactKind::Method => "method",
            ArtifactKind::Thread => "thread",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque handle into runtime-owned metadata memory (an address or table slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ArtifactHandle(pub u64);

impl ArtifactHandle {
    /// Create a handle from a raw value
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw handle value
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for ArtifactHandle {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Identity of one artifact: its kind plus its handle.
///
/// Handles are only unique within a kind, so the pair is the key for all
/// side tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Entity kind
    pub kind: ArtifactKind,
    /// Runtime handle
    pub handle: ArtifactHandle,
}

impl ArtifactRef {
    /// Create a new artifact reference
    #[inline]
    pub const fn new(kind: ArtifactKind, handle: ArtifactHandle) -> Self {
        Self { kind, handle }
    }

    /// Class artifact
    #[inline]
    pub const fn class(handle: ArtifactHandle) -> Self {
        Self::new(ArtifactKind::Class, handle)
    }

    /// Method artifact
    #[inline]
    pub const fn method(handle: ArtifactHandle) -> Self {
        Self::new(ArtifactKind::Method, handle)
    }

    /// Package artifact
    #[inline]
    pub const fn package(handle: ArtifactHandle) -> Self {
        Self::new(ArtifactKind::Package, handle)
    }

    /// Module artifact
    #[inline]
    pub const fn module(handle: ArtifactHandle) -> Self {
        Self::new(ArtifactKind::Module, handle)
    }

    /// Class loader artifact
    #[inline]
    pub const fn loader(handle: ArtifactHandle) -> Self {
        Self::new(ArtifactKind::ClassLoader, handle)
    }

    /// Thread artifact
    #[inline]
    pub const fn thread(handle: ArtifactHandle) -> Self {
        Self::new(ArtifactKind::Thread, handle)
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}", self.kind, self.handle.0)
    }
}

/// Identifier written into checkpoints in place of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TraceId(pub u64);

impl TraceId {
    /// Reserved id of the synthetic bootstrap class loader
    pub const BOOTSTRAP: TraceId = TraceId(0);

    /// Raw id value
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whether this is the bootstrap loader id
    #[inline]
    pub const fn is_bootstrap(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access flags carried on class and method records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Modifiers(pub u32);

impl Modifiers {
    /// public
    pub const PUBLIC: u32 = 0x0001;
    /// private
    pub const PRIVATE: u32 = 0x0002;
    /// protected
    pub const PROTECTED: u32 = 0x0004;
    /// static
    pub const STATIC: u32 = 0x0008;
    /// final
    pub const FINAL: u32 = 0x0010;
    /// interface
    pub const INTERFACE: u32 = 0x0200;
    /// abstract
    pub const ABSTRACT: u32 = 0x0400;
    /// synthetic
    pub const SYNTHETIC: u32 = 0x1000;

    /// Build from raw bits
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether all of `flag` is set
    #[inline]
    pub const fn contains(self, flag: u32) -> bool {
        self.0 & flag == flag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_order_is_emission_order() {
        let mut sorted = ArtifactKind::ALL;
        sorted.sort();
        assert_eq!(sorted, ArtifactKind::ALL);
        for (i, kind) in ArtifactKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_artifact_ref_display() {
        let r = ArtifactRef::class(ArtifactHandle::new(0x40));
        assert_eq!(r.to_string(), "class@0x40");
    }

    #[test]
    fn test_modifiers() {
        let m = Modifiers::from_bits(Modifiers::PUBLIC | Modifiers::FINAL);
        assert!(m.contains(Modifiers::PUBLIC));
        assert!(!m.contains(Modifiers::ABSTRACT));
    }
}
