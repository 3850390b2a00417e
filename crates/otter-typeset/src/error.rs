//! Type-set errors

use thiserror::Error;

use crate::artifact::{ArtifactRef, TraceId};
use crate::writer::WriterError;

/// Internal defects detected while walking the metadata graph.
///
/// These indicate a corrupted graph or corrupted side-state. The type set
/// refuses to serialize further once one has been reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// A tagged artifact or dependency edge points at an entity the graph
    /// provider no longer knows about
    #[error("dangling artifact {0}: not present in the metadata graph")]
    DanglingArtifact(ArtifactRef),

    /// A dependency edge leads back to an artifact still being emitted
    #[error("dependency cycle through {0}")]
    DependencyCycle(ArtifactRef),

    /// A dependency chain is deeper than the configured bound
    #[error("dependency chain below {root} exceeds depth {limit}")]
    DependencyTooDeep {
        /// Artifact whose resolution exceeded the bound
        root: ArtifactRef,
        /// Configured bound
        limit: usize,
    },

    /// An identifier was handed out twice
    #[error("identifier {id} already owned by {owner}, requested for {requested}")]
    IdCollision {
        /// Colliding identifier
        id: TraceId,
        /// Current owner
        owner: ArtifactRef,
        /// Artifact that requested it
        requested: ArtifactRef,
    },

    /// A forgotten artifact's identifier was looked up
    #[error("identifier {0} belongs to a forgotten artifact")]
    ForgottenId(TraceId),
}

/// Errors returned by type-set operations
#[derive(Debug, Error)]
pub enum TypeSetError {
    /// The checkpoint writer failed; nothing from this call was committed
    #[error("checkpoint writer failed: {0}")]
    Writer(#[from] WriterError),

    /// Internal defect; the type set is poisoned afterwards
    #[error("invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    /// A previous call reported an invariant violation
    #[error("type set poisoned by an earlier invariant violation")]
    Poisoned,

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TypeSetError {
    /// Whether a later call may succeed (writer failures only)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TypeSetError::Writer(_))
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config '{path}': {source}")]
    Read {
        /// Path that was read
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for `TypeSetConfig`
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for type-set operations
pub type Result<T> = std::result::Result<T, TypeSetError>;
