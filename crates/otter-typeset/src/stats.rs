//! Serialization statistics

use serde::Serialize;

use crate::artifact::ArtifactKind;
use crate::record::TypeRecord;

/// Outcome of one successful serialize pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SerializeSummary {
    /// Bytes committed to the main writer
    pub bytes: usize,
    /// Bytes committed to the leak-profiler writer
    pub leak_bytes: usize,
    /// Symbol records
    pub symbols: usize,
    /// Class loader records
    pub loaders: usize,
    /// Module records
    pub modules: usize,
    /// Package records
    pub packages: usize,
    /// Class records
    pub classes: usize,
    /// Method records
    pub methods: usize,
    /// Thread records
    pub threads: usize,
    /// Classes forgotten because they were unloading
    pub unloaded: usize,
    /// Records written to the leak-profiler stream
    pub leak_classes: usize,
    /// Pass ran at a flushpoint
    pub flushpoint: bool,
    /// Pass ran during class unloading
    pub class_unload: bool,
    /// Epoch generation of the pass
    pub generation: u64,
}

impl SerializeSummary {
    /// Count one main-stream record
    pub fn count(&mut self, record: &TypeRecord) {
        match record.kind() {
            ArtifactKind::Symbol => self.symbols += 1,
            ArtifactKind::ClassLoader => self.loaders += 1,
            ArtifactKind::Module => self.modules += 1,
            ArtifactKind::Package => self.packages += 1,
            ArtifactKind::Class => self.classes += 1,
            ArtifactKind::Method => self.methods += 1,
            ArtifactKind::Thread => self.threads += 1,
        }
    }

    /// Records written to the main stream
    pub fn total_records(&self) -> usize {
        self.symbols
            + self.loaders
            + self.modules
            + self.packages
            + self.classes
            + self.methods
            + self.threads
    }
}

/// Cumulative counters across the life of a type set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeSetStats {
    /// Completed serialize passes
    pub serializations: u64,
    /// Of those, how many were flushpoints
    pub flushpoints: u64,
    /// Total bytes committed to main writers
    pub bytes_written: u64,
    /// Total records committed to main writers
    pub records_written: u64,
    /// Records committed to leak-profiler writers
    pub leak_records_written: u64,
    /// Unload capture passes
    pub unload_captures: u64,
    /// Classes captured by unload passes
    pub classes_unloaded: u64,
    /// Calls aborted by a writer failure
    pub writer_failures: u64,
    /// Explicit clears
    pub clears: u64,
    /// Epoch rotations
    pub rotations: u64,
}

impl TypeSetStats {
    /// Fold a completed pass into the totals
    pub fn record_pass(&mut self, summary: &SerializeSummary) {
        self.serializations += 1;
        if summary.flushpoint {
            self.flushpoints += 1;
        }
        self.bytes_written += summary.bytes as u64;
        self.records_written += summary.total_records() as u64;
        self.leak_records_written += summary.leak_classes as u64;
    }
}
