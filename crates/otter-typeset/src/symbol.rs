//! Symbol interning
//!
//! Names read from the metadata graph arrive by value. Each distinct string
//! becomes one Symbol artifact with a synthetic handle, so two classes with
//! the same name share a single symbol record.

use rustc_hash::FxHashMap;

use crate::artifact::{ArtifactHandle, ArtifactKind, ArtifactRef};

/// Content-keyed symbol table
#[derive(Debug, Default)]
pub struct SymbolTable {
    by_text: FxHashMap<Box<str>, ArtifactHandle>,
    texts: Vec<Box<str>>,
}

impl SymbolTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `text`, returning its symbol artifact
    pub fn intern(&mut self, text: &str) -> ArtifactRef {
        if let Some(handle) = self.by_text.get(text) {
            return ArtifactRef::new(ArtifactKind::Symbol, *handle);
        }
        // Handles are 1-based slot numbers
        let handle = ArtifactHandle::new(self.texts.len() as u64 + 1);
        self.texts.push(text.into());
        self.by_text.insert(text.into(), handle);
        ArtifactRef::new(ArtifactKind::Symbol, handle)
    }

    /// Text of an interned symbol
    pub fn text(&self, handle: ArtifactHandle) -> Option<&str> {
        let slot = handle.raw().checked_sub(1)? as usize;
        self.texts.get(slot).map(|s| &**s)
    }

    /// Number of interned symbols
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    /// Whether no symbol is interned
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_dedups_by_content() {
        let mut table = SymbolTable::new();
        let a = table.intern("java/lang/String");
        let b = table.intern("java/lang/String");
        let c = table.intern("java/lang/Object");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.len(), 2);
        assert_eq!(table.text(c.handle), Some("java/lang/Object"));
        assert_eq!(table.text(ArtifactHandle::new(0)), None);
    }
}
