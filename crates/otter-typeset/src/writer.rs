//! Checkpoint writer interface
//!
//! The type set writes through `CheckpointWriter`; buffer and segment
//! management belong to the recorder. `BufferedCheckpointWriter` is the
//! in-memory implementation used by the recorder's chunk buffers and by tests.
//!
//! ## Encoding
//!
//! Unsigned integers are LEB128 varints. Optional ids are written as `id + 1`
//! with `0` meaning absent; other optional values carry a presence byte.
//! Strings are a varint byte length followed by UTF-8. Each record starts
//! with its one-byte tag.

use serde::Serialize;
use thiserror::Error;

use crate::artifact::TraceId;
use crate::record::{SegmentHeader, TypeRecord};

/// Segment start marker
pub const SEGMENT_MAGIC: u8 = 0xC7;

/// Errors reported by a checkpoint writer
#[derive(Debug, Error)]
pub enum WriterError {
    /// The writer's buffer cannot hold the record
    #[error("checkpoint buffer full: need {requested} bytes, {remaining} remaining")]
    CapacityExceeded {
        /// Bytes needed
        requested: usize,
        /// Bytes left
        remaining: usize,
    },

    /// `write_record` or `end_checkpoint` without an open checkpoint
    #[error("no checkpoint is open")]
    NoOpenCheckpoint,

    /// `begin_checkpoint` while one is already open
    #[error("a checkpoint is already open")]
    CheckpointAlreadyOpen,

    /// IO error from the backing store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Segment-scoped sink for type records.
///
/// Records written between `begin_checkpoint` and `end_checkpoint` become
/// visible together; `cancel_checkpoint` discards them.
pub trait CheckpointWriter {
    /// Open a checkpoint segment
    fn begin_checkpoint(&mut self, header: SegmentHeader) -> Result<(), WriterError>;

    /// Append a record, returning the encoded size in bytes
    fn write_record(&mut self, record: &TypeRecord) -> Result<usize, WriterError>;

    /// Commit the open segment, returning its total size in bytes
    fn end_checkpoint(&mut self) -> Result<usize, WriterError>;

    /// Discard the open segment, if any
    fn cancel_checkpoint(&mut self);
}

impl<W: CheckpointWriter + ?Sized> CheckpointWriter for &mut W {
    fn begin_checkpoint(&mut self, header: SegmentHeader) -> Result<(), WriterError> {
        (**self).begin_checkpoint(header)
    }

    fn write_record(&mut self, record: &TypeRecord) -> Result<usize, WriterError> {
        (**self).write_record(record)
    }

    fn end_checkpoint(&mut self) -> Result<usize, WriterError> {
        (**self).end_checkpoint()
    }

    fn cancel_checkpoint(&mut self) {
        (**self).cancel_checkpoint()
    }
}

/// A committed checkpoint segment
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    /// Segment header
    pub header: SegmentHeader,
    /// Records in write order
    pub records: Vec<TypeRecord>,
    /// Encoded bytes (header included)
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// In-memory checkpoint writer with an optional byte capacity
#[derive(Debug, Default)]
pub struct BufferedCheckpointWriter {
    segments: Vec<Segment>,
    open: Option<Segment>,
    capacity: Option<usize>,
    committed_bytes: usize,
}

impl BufferedCheckpointWriter {
    /// Unbounded writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer that fails once `capacity` bytes (committed plus open) would be exceeded
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Change the capacity limit
    pub fn set_capacity_limit(&mut self, capacity: Option<usize>) {
        self.capacity = capacity;
    }

    /// Committed segments
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// All committed records, in order
    pub fn records(&self) -> impl Iterator<Item = &TypeRecord> {
        self.segments.iter().flat_map(|s| s.records.iter())
    }

    /// Total committed bytes
    pub fn committed_bytes(&self) -> usize {
        self.committed_bytes
    }

    /// Whether a segment is open
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Drop all committed segments
    pub fn clear(&mut self) {
        self.segments.clear();
        self.committed_bytes = 0;
    }

    /// Dump committed segments as JSON for inspection
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "committed_bytes": self.committed_bytes,
            "segments": self.segments,
        })
    }

    fn open_bytes(&self) -> usize {
        self.open.as_ref().map_or(0, |s| s.bytes.len())
    }

    fn reserve(&self, requested: usize) -> Result<(), WriterError> {
        if let Some(capacity) = self.capacity {
            let used = self.committed_bytes + self.open_bytes();
            let remaining = capacity.saturating_sub(used);
            if requested > remaining {
                return Err(WriterError::CapacityExceeded {
                    requested,
                    remaining,
                });
            }
        }
        Ok(())
    }
}

impl CheckpointWriter for BufferedCheckpointWriter {
    fn begin_checkpoint(&mut self, header: SegmentHeader) -> Result<(), WriterError> {
        if self.open.is_some() {
            return Err(WriterError::CheckpointAlreadyOpen);
        }
        let bytes = encode_header(&header);
        self.reserve(bytes.len())?;
        self.open = Some(Segment {
            header,
            records: Vec::new(),
            bytes,
        });
        Ok(())
    }

    fn write_record(&mut self, record: &TypeRecord) -> Result<usize, WriterError> {
        let encoded = encode_record(record);
        if self.open.is_none() {
            return Err(WriterError::NoOpenCheckpoint);
        }
        self.reserve(encoded.len())?;
        let Some(segment) = self.open.as_mut() else {
            return Err(WriterError::NoOpenCheckpoint);
        };
        segment.bytes.extend_from_slice(&encoded);
        segment.records.push(record.clone());
        Ok(encoded.len())
    }

    fn end_checkpoint(&mut self) -> Result<usize, WriterError> {
        let segment = self.open.take().ok_or(WriterError::NoOpenCheckpoint)?;
        let size = segment.bytes.len();
        self.committed_bytes += size;
        self.segments.push(segment);
        Ok(size)
    }

    fn cancel_checkpoint(&mut self) {
        self.open = None;
    }
}

/// Encode a segment header
pub fn encode_header(header: &SegmentHeader) -> Vec<u8> {
    let mut out = Vec::with_capacity(12);
    out.push(SEGMENT_MAGIC);
    out.push(header.kind as u8);
    put_varint(&mut out, header.generation);
    out.push(header.flushpoint as u8);
    out
}

/// Encode one record
pub fn encode_record(record: &TypeRecord) -> Vec<u8> {
    let mut out = Vec::with_capacity(16);
    out.push(record.tag());
    put_id(&mut out, record.id());
    match record {
        TypeRecord::Symbol { text, .. } => put_str(&mut out, text),
        TypeRecord::ClassLoader {
            name, type_name, ..
        } => {
            put_opt_id(&mut out, *name);
            put_id(&mut out, *type_name);
        }
        TypeRecord::Module {
            name,
            version,
            location,
            ..
        } => {
            put_id(&mut out, *name);
            put_opt_id(&mut out, *version);
            put_opt_id(&mut out, *location);
        }
        TypeRecord::Package {
            name,
            module,
            exported,
            ..
        } => {
            put_id(&mut out, *name);
            put_opt_id(&mut out, *module);
            out.push(*exported as u8);
        }
        TypeRecord::Class {
            name,
            loader,
            package,
            super_class,
            element,
            modifiers,
            hidden,
            unloading,
            ..
        } => {
            put_id(&mut out, *name);
            put_id(&mut out, *loader);
            put_opt_id(&mut out, *package);
            put_opt_id(&mut out, *super_class);
            put_opt_id(&mut out, *element);
            put_varint(&mut out, modifiers.bits() as u64);
            out.push((*hidden as u8) | ((*unloading as u8) << 1));
        }
        TypeRecord::Method {
            class,
            name,
            descriptor,
            modifiers,
            hidden,
            ..
        } => {
            put_id(&mut out, *class);
            put_id(&mut out, *name);
            put_id(&mut out, *descriptor);
            put_varint(&mut out, modifiers.bits() as u64);
            out.push(*hidden as u8);
        }
        TypeRecord::Thread {
            name,
            os_thread_id,
            managed_thread_id,
            ..
        } => {
            put_id(&mut out, *name);
            put_varint(&mut out, *os_thread_id);
            match managed_thread_id {
                Some(managed) => {
                    out.push(1);
                    put_varint(&mut out, *managed);
                }
                None => out.push(0),
            }
        }
        TypeRecord::ClassUnload {
            name,
            loader,
            loader_name,
            ..
        } => {
            put_str(&mut out, name);
            put_opt_id(&mut out, *loader);
            match loader_name {
                Some(loader_name) => {
                    out.push(1);
                    put_str(&mut out, loader_name);
                }
                None => out.push(0),
            }
        }
        TypeRecord::LeakClass {
            name, loader_name, ..
        } => {
            put_str(&mut out, name);
            put_str(&mut out, loader_name);
        }
    }
    out
}

/// Append an unsigned LEB128 varint
pub fn put_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

#[inline]
fn put_id(out: &mut Vec<u8>, id: TraceId) {
    put_varint(out, id.raw());
}

#[inline]
fn put_opt_id(out: &mut Vec<u8>, id: Option<TraceId>) {
    put_varint(out, id.map_or(0, |id| id.raw() + 1));
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    put_varint(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}
