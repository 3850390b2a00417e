//! # Otter Type Set
//!
//! Checkpoint serializer for the type metadata referenced by trace events.
//!
//! ## Design
//!
//! - **Tagging**: Events mark the classes, methods and threads they mention
//! - **Identifiers**: Stable per artifact, never reused after the artifact is forgotten
//! - **Dependencies**: Every record is preceded by the records it refers to
//! - **Unloading**: Classes about to be reclaimed are captured by value and retired
//! - **Leak profiler**: A reduced class stream with its own identifier space

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod artifact;
pub mod config;
pub mod driver;
pub mod epoch;
pub mod error;
pub mod graph;
pub mod leak;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod stats;
pub mod symbol;
pub mod tagger;
pub mod unload;
pub mod writer;

pub use artifact::{ArtifactHandle, ArtifactKind, ArtifactRef, Modifiers, TraceId};
pub use config::TypeSetConfig;
pub use driver::TypeSet;
pub use epoch::Epoch;
pub use error::{ConfigError, InvariantViolation, Result, TypeSetError};
pub use graph::{
    ArtifactInfo, ClassInfo, InMemoryGraph, LoaderInfo, MetadataGraph, MethodInfo, ModuleInfo,
    PackageInfo, ThreadInfo,
};
pub use leak::{LeakClassEntry, LeakLookup};
pub use record::{SegmentHeader, SegmentKind, TypeRecord};
pub use stats::{SerializeSummary, TypeSetStats};
pub use writer::{BufferedCheckpointWriter, CheckpointWriter, WriterError};
