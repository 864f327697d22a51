//! The link-time symbol table.
//!
//! Indices are handed out in insertion order and never change, so they can be
//! embedded in bytecode before every referenced unit is compiled.

use indexmap::IndexMap;
use indexmap::map::Entry;
use stencil_core::{HeapHandle, Locator, SymbolIndex, SymbolKind};

use crate::errors::{BundleErrorKind, BundleResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolEntry {
    pub locator: Locator,
    pub kind: SymbolKind,
    /// Resolver-facing name.
    pub name: String,
    pub collection: Option<String>,
    /// Heap range, set for templates once they are emitted.
    pub handle: Option<HeapHandle>,
    pub builtin: bool,
}

impl SymbolEntry {
    pub fn new(locator: Locator, kind: SymbolKind, name: impl Into<String>) -> Self {
        Self {
            locator,
            kind,
            name: name.into(),
            collection: None,
            handle: None,
            builtin: false,
        }
    }

    pub fn with_collection(mut self, collection: Option<String>) -> Self {
        self.collection = collection;
        self
    }

    pub fn builtin(mut self, builtin: bool) -> Self {
        self.builtin = builtin;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolTable {
    entries: IndexMap<Locator, SymbolEntry>,
    entry_points: Vec<SymbolIndex>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: SymbolIndex) -> Option<&SymbolEntry> {
        self.entries.get_index(index.index()).map(|(_, entry)| entry)
    }

    pub fn lookup(&self, locator: &Locator) -> Option<(SymbolIndex, &SymbolEntry)> {
        self.entries
            .get_full(locator)
            .map(|(i, _, entry)| (SymbolIndex(i as u32), entry))
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolIndex, &SymbolEntry)> {
        self.entries
            .values()
            .enumerate()
            .map(|(i, entry)| (SymbolIndex(i as u32), entry))
    }

    pub fn entry_points(&self) -> &[SymbolIndex] {
        &self.entry_points
    }

    /// Returns the index for `entry.locator`, inserting the entry if it is
    /// new. A locator may only ever stand for one kind of symbol.
    pub(crate) fn intern(&mut self, entry: SymbolEntry) -> BundleResult<SymbolIndex> {
        let index = self.entries.len();
        match self.entries.entry(entry.locator.clone()) {
            Entry::Occupied(existing) => {
                if existing.get().kind != entry.kind {
                    return Err(BundleErrorKind::SymbolKindConflict {
                        locator: entry.locator,
                        first: existing.get().kind,
                        second: entry.kind,
                    }
                    .into());
                }
                Ok(SymbolIndex(existing.index() as u32))
            }
            Entry::Vacant(slot) => {
                tracing::trace!(locator = %entry.locator, kind = %entry.kind, index, "interned symbol");
                slot.insert(entry);
                Ok(SymbolIndex(index as u32))
            }
        }
    }

    pub(crate) fn set_handle(&mut self, index: SymbolIndex, handle: HeapHandle) {
        if let Some((_, entry)) = self.entries.get_index_mut(index.index()) {
            entry.handle = Some(handle);
        }
    }

    pub(crate) fn push_entry_point(&mut self, index: SymbolIndex) {
        if !self.entry_points.contains(&index) {
            self.entry_points.push(index);
        }
    }
}
