//! Checkpoint record types

use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactKind, Modifiers, TraceId};

/// What a checkpoint segment contains
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentKind {
    /// Regular type-set checkpoint
    TypeSet = 0,
    /// Terminal records captured during a class-unloading safepoint
    ClassUnload = 1,
    /// Reduced records for the leak-profiler stream
    LeakProfiler = 2,
}

/// Header written when a checkpoint segment is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentHeader {
    /// Segment contents
    pub kind: SegmentKind,
    /// Epoch generation the identifiers in this segment belong to
    pub generation: u64,
    /// Whether the segment was written at a flushpoint
    pub flushpoint: bool,
}

/// One typed record in a checkpoint segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypeRecord {
    /// Interned name
    Symbol {
        /// Symbol id
        id: TraceId,
        /// Text
        text: String,
    },
    /// Class loader
    ClassLoader {
        /// Loader id
        id: TraceId,
        /// Loader name symbol, if the loader is named
        name: Option<TraceId>,
        /// Symbol of the loader's type name
        type_name: TraceId,
    },
    /// Module
    Module {
        /// Module id
        id: TraceId,
        /// Name symbol
        name: TraceId,
        /// Version symbol
        version: Option<TraceId>,
        /// Location symbol
        location: Option<TraceId>,
    },
    /// Package
    Package {
        /// Package id
        id: TraceId,
        /// Name symbol
        name: TraceId,
        /// Owning module, if any
        module: Option<TraceId>,
        /// Whether the package is exported by its module
        exported: bool,
    },
    /// Class
    Class {
        /// Class id
        id: TraceId,
        /// Name symbol
        name: TraceId,
        /// Defining loader (bootstrap when the runtime reports none)
        loader: TraceId,
        /// Package, absent for array and primitive classes
        package: Option<TraceId>,
        /// Superclass
        super_class: Option<TraceId>,
        /// Element class for array classes
        element: Option<TraceId>,
        /// Access flags
        modifiers: Modifiers,
        /// Hidden (anonymous) class
        hidden: bool,
        /// Written during an unloading pass; the id is retired afterwards
        unloading: bool,
    },
    /// Method
    Method {
        /// Method id
        id: TraceId,
        /// Declaring class
        class: TraceId,
        /// Name symbol
        name: TraceId,
        /// Descriptor symbol
        descriptor: TraceId,
        /// Access flags
        modifiers: Modifiers,
        /// Hidden frame
        hidden: bool,
    },
    /// Thread
    Thread {
        /// Thread id
        id: TraceId,
        /// Name symbol
        name: TraceId,
        /// OS-level thread id
        os_thread_id: u64,
        /// Runtime-level thread id, if the thread is attached
        managed_thread_id: Option<u64>,
    },
    /// Terminal record for a class about to be reclaimed
    ClassUnload {
        /// Class id
        id: TraceId,
        /// Class name
        name: String,
        /// Defining loader id, if the loader was ever written
        loader: Option<TraceId>,
        /// Defining loader name
        loader_name: Option<String>,
    },
    /// Reduced class record on the leak-profiler stream
    LeakClass {
        /// Leak-stream class id
        id: TraceId,
        /// Class name
        name: String,
        /// Defining loader name
        loader_name: String,
    },
}

impl TypeRecord {
    /// Identifier this record defines
    pub fn id(&self) -> TraceId {
        match self {
            TypeRecord::Symbol { id, .. }
            | TypeRecord::ClassLoader { id, .. }
            | TypeRecord::Module { id, .. }
            | TypeRecord::Package { id, .. }
            | TypeRecord::Class { id, .. }
            | TypeRecord::Method { id, .. }
            | TypeRecord::Thread { id, .. }
            | TypeRecord::ClassUnload { id, .. }
            | TypeRecord::LeakClass { id, .. } => *id,
        }
    }

    /// Artifact kind the record describes
    pub fn kind(&self) -> ArtifactKind {
        match self {
            TypeRecord::Symbol { .. } => ArtifactKind::Symbol,
            TypeRecord::ClassLoader { .. } => ArtifactKind::ClassLoader,
            TypeRecord::Module { .. } => ArtifactKind::Module,
            TypeRecord::Package { .. } => ArtifactKind::Package,
            TypeRecord::Class { .. }
            | TypeRecord::ClassUnload { .. }
            | TypeRecord::LeakClass { .. } => ArtifactKind::Class,
            TypeRecord::Method { .. } => ArtifactKind::Method,
            TypeRecord::Thread { .. } => ArtifactKind::Thread,
        }
    }

    /// Wire tag of the record
    pub fn tag(&self) -> u8 {
        match self {
            TypeRecord::Symbol { .. } => 1,
            TypeRecord::ClassLoader { .. } => 2,
            TypeRecord::Module { .. } => 3,
            TypeRecord::Package { .. } => 4,
            TypeRecord::Class { .. } => 5,
            TypeRecord::Method { .. } => 6,
            TypeRecord::Thread { .. } => 7,
            TypeRecord::ClassUnload { .. } => 8,
            TypeRecord::LeakClass { .. } => 9,
        }
    }

    /// Identifiers this record refers to (excluding its own)
    pub fn references(&self) -> Vec<TraceId> {
        let mut refs = Vec::new();
        match self {
            TypeRecord::Symbol { .. } | TypeRecord::LeakClass { .. } => {}
            TypeRecord::ClassLoader {
                name, type_name, ..
            } => {
                refs.extend(*name);
                refs.push(*type_name);
            }
            TypeRecord::Module {
                name,
                version,
                location,
                ..
            } => {
                refs.push(*name);
                refs.extend(*version);
                refs.extend(*location);
            }
            TypeRecord::Package { name, module, .. } => {
                refs.push(*name);
                refs.extend(*module);
            }
            TypeRecord::Class {
                name,
                loader,
                package,
                super_class,
                element,
                ..
            } => {
                refs.push(*name);
                refs.push(*loader);
                refs.extend(*package);
                refs.extend(*super_class);
                refs.extend(*element);
            }
            TypeRecord::Method {
                class,
                name,
                descriptor,
                ..
            } => {
                refs.push(*class);
                refs.push(*name);
                refs.push(*descriptor);
            }
            TypeRecord::Thread { name, .. } => refs.push(*name),
            TypeRecord::ClassUnload { loader, .. } => refs.extend(*loader),
        }
        refs
    }
}
