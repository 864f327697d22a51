//! Data-segment generation from a linked symbol table.

use stencil_core::{DataSegment, Descriptor, DescriptorMetadata};

use crate::symbols::SymbolTable;

/// Converts the symbol table into resolver-facing descriptors.
///
/// Only template descriptors carry a heap handle; the heap itself is never
/// embedded.
pub fn generate_data_segment(table: &SymbolTable) -> DataSegment {
    let descriptors = table
        .iter()
        .map(|(_, entry)| Descriptor {
            locator: entry.locator.clone(),
            kind: entry.kind,
            metadata: DescriptorMetadata {
                ty: entry.kind.resolver_type().to_owned(),
                collection: entry.collection.clone(),
                name: entry.name.clone(),
                handle: entry.handle,
                builtin: entry.builtin,
            },
        })
        .collect();
    let entry_points = table.entry_points().iter().map(|index| index.0).collect();
    let segment = DataSegment::new(descriptors, entry_points);
    tracing::debug!(
        descriptors = segment.table.len(),
        entry_points = segment.entry_points.len(),
        "generated data segment"
    );
    segment
}
