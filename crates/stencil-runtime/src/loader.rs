//! Bytecode loader
//!
//! Pairs a raw heap with a data segment after checking that every descriptor
//! addresses a valid, disjoint range and that the bytecode in each range is
//! well formed.

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;
use stencil_core::bytecode::decode_all;
use stencil_core::{
    DATA_SEGMENT_VERSION, DataSegment, Heap, HeapHandle, Instruction, Locator, NO_BLOCK,
    SymbolIndex, SymbolKind,
};

use crate::errors::LoadError;

/// A symbol as seen by the runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub locator: Locator,
    pub kind: SymbolKind,
    pub name: String,
    pub collection: Option<String>,
    pub handle: Option<HeapHandle>,
    pub builtin: bool,
}

/// An immutable, verified heap plus its symbols.
#[derive(Clone, Debug)]
pub struct Program {
    heap: Heap,
    symbols: Vec<Symbol>,
    entries: IndexMap<Locator, SymbolIndex>,
}

impl Program {
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn symbol(&self, index: SymbolIndex) -> Option<&Symbol> {
        self.symbols.get(index.index())
    }

    /// Entry-point symbol for `locator`.
    pub fn entry(&self, locator: &Locator) -> Option<SymbolIndex> {
        self.entries.get(locator).copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Locator, SymbolIndex)> {
        self.entries.iter().map(|(locator, index)| (locator, *index))
    }

    /// Bytecode of a template symbol.
    pub fn code(&self, index: SymbolIndex) -> Option<&[u8]> {
        let handle = self.symbol(index)?.handle?;
        self.heap.slice(handle)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BytecodeLoader;

impl BytecodeLoader {
    /// Loads a program that will be entered through exactly `entries`.
    pub fn load(
        &self,
        heap: Heap,
        data: &DataSegment,
        entries: &[Locator],
    ) -> Result<Program, LoadError> {
        if data.version != DATA_SEGMENT_VERSION {
            return Err(LoadError::UnsupportedVersion(data.version));
        }

        let mut symbols = Vec::with_capacity(data.table.len());
        let mut seen = HashSet::new();
        for (index, descriptor) in data.table.iter().enumerate() {
            let malformed = |reason: &str| LoadError::MalformedDescriptor {
                index,
                reason: reason.to_owned(),
            };
            let kind = descriptor.kind;
            let metadata = &descriptor.metadata;
            if metadata.ty != kind.resolver_type() {
                return Err(malformed(&format!(
                    "metadata type `{}` does not match kind `{}`",
                    metadata.ty, kind
                )));
            }
            if metadata.name.is_empty() {
                return Err(malformed("empty name"));
            }
            match (kind, metadata.handle) {
                (SymbolKind::Template, None) => return Err(malformed("template without a heap handle")),
                (SymbolKind::Template, Some(handle)) if handle.length == 0 => {
                    return Err(malformed("template with an empty heap range"));
                }
                (SymbolKind::Template, Some(_)) => {}
                (_, Some(_)) => return Err(malformed("only templates may carry a heap handle")),
                (_, None) => {}
            }
            if metadata.builtin && kind != SymbolKind::Helper {
                return Err(malformed("only helpers may be built in"));
            }
            if let Some(handle) = metadata.handle {
                if handle.end() > heap.len() as u64 {
                    return Err(LoadError::OffsetOutOfRange {
                        locator: descriptor.locator.clone(),
                        offset: handle.offset,
                        length: handle.length,
                        heap_len: heap.len(),
                    });
                }
            }
            if !seen.insert(&descriptor.locator) {
                return Err(LoadError::DuplicateLocator(descriptor.locator.clone()));
            }
            symbols.push(Symbol {
                locator: descriptor.locator.clone(),
                kind,
                name: metadata.name.clone(),
                collection: metadata.collection.clone(),
                handle: metadata.handle,
                builtin: metadata.builtin,
            });
        }

        check_overlaps(&symbols)?;
        let entries = check_entry_points(&symbols, data, entries)?;

        for symbol in &symbols {
            if let Some(handle) = symbol.handle {
                verify_template(&heap, &symbols, symbol, handle)?;
            }
        }

        tracing::debug!(
            symbols = symbols.len(),
            entries = entries.len(),
            heap_bytes = heap.len(),
            "loaded program"
        );
        Ok(Program {
            heap,
            symbols,
            entries,
        })
    }

    /// Loads from the JSON form of a data segment.
    pub fn load_json(
        &self,
        heap: Heap,
        json: &str,
        entries: &[Locator],
    ) -> Result<Program, LoadError> {
        let data = DataSegment::from_json(json)?;
        self.load(heap, &data, entries)
    }
}

fn check_overlaps(symbols: &[Symbol]) -> Result<(), LoadError> {
    let mut ranges: Vec<(HeapHandle, &Locator)> = symbols
        .iter()
        .filter_map(|s| s.handle.map(|h| (h, &s.locator)))
        .collect();
    ranges.sort_by_key(|(handle, _)| handle.offset);
    for pair in ranges.windows(2) {
        let (a, first) = pair[0];
        let (b, second) = pair[1];
        if a.overlaps(&b) {
            return Err(LoadError::OverlappingRanges {
                first: first.clone(),
                second: second.clone(),
            });
        }
    }
    Ok(())
}

fn check_entry_points(
    symbols: &[Symbol],
    data: &DataSegment,
    requested: &[Locator],
) -> Result<IndexMap<Locator, SymbolIndex>, LoadError> {
    let mut entries = IndexMap::new();
    for &index in &data.entry_points {
        match symbols.get(index as usize) {
            Some(symbol) if symbol.kind == SymbolKind::Template => {
                entries.insert(symbol.locator.clone(), SymbolIndex(index));
            }
            _ => return Err(LoadError::UnknownEntryPoint(format!("#{}", index))),
        }
    }
    if entries.len() != requested.len() {
        return Err(LoadError::EntryCountMismatch {
            expected: requested.len(),
            found: entries.len(),
        });
    }
    if let Some(missing) = requested.iter().find(|l| !entries.contains_key(*l)) {
        return Err(LoadError::UnknownEntryPoint(missing.to_string()));
    }
    Ok(entries)
}

fn verify_template(
    heap: &Heap,
    symbols: &[Symbol],
    symbol: &Symbol,
    handle: HeapHandle,
) -> Result<(), LoadError> {
    let malformed = |reason: String| LoadError::MalformedBytecode {
        locator: symbol.locator.clone(),
        reason,
    };
    let code = heap
        .slice(handle)
        .ok_or_else(|| malformed("range outside heap".to_owned()))?;
    let instructions = decode_all(code).map_err(|e| malformed(e.to_string()))?;
    if !matches!(instructions.last(), Some((_, Instruction::Return))) {
        return Err(malformed("template does not end in Return".to_owned()));
    }
    let boundaries: BTreeSet<u32> = instructions.iter().map(|(at, _)| *at as u32).collect();
    for (at, instruction) in &instructions {
        for target in instruction.block_targets() {
            if target != NO_BLOCK && !boundaries.contains(&target) {
                return Err(malformed(format!(
                    "block target {} of instruction at {} is not an instruction boundary",
                    target, at
                )));
            }
        }
        if let Some((starts, end)) = block_layout(instruction) {
            check_block_layout(*at as u32, &starts, end).map_err(malformed)?;
        }
        if matches!(instruction, Instruction::Let { body, .. } if *body == NO_BLOCK) {
            return Err(malformed(format!("let at {} has no body", at)));
        }
        for (index, expected) in instruction.symbol_operands() {
            match symbols.get(index.index()) {
                Some(target) if target.kind == expected => {}
                Some(target) => {
                    return Err(malformed(format!(
                        "operand {} at {} refers to a {}, expected a {}",
                        index, at, target.kind, expected
                    )));
                }
                None => {
                    return Err(malformed(format!(
                        "operand {} at {} is outside the symbol table",
                        index, at
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Block starts and continuation of a block-carrying instruction.
fn block_layout(instruction: &Instruction) -> Option<(Vec<u32>, u32)> {
    match instruction {
        Instruction::If {
            then,
            otherwise,
            end,
        } => Some((vec![*then, *otherwise], *end)),
        Instruction::Each {
            body,
            otherwise,
            end,
            ..
        } => Some((vec![*body, *otherwise], *end)),
        Instruction::Let { body, end, .. } => Some((vec![*body], *end)),
        Instruction::Invoke { block, end, .. } => Some((vec![*block], *end)),
        _ => None,
    }
}

/// Blocks and continuations point strictly forward of their instruction.
fn check_block_layout(at: u32, starts: &[u32], end: u32) -> Result<(), String> {
    if end == NO_BLOCK || end <= at {
        return Err(format!("instruction at {} continues at {}", at, end));
    }
    for &start in starts.iter().filter(|start| **start != NO_BLOCK) {
        if start <= at {
            return Err(format!("block {} of instruction at {} points backward", start, at));
        }
        if start > end {
            return Err(format!("block {} of instruction at {} starts after its end {}", start, at, end));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_core::bytecode::BytecodeWriter;
    use stencil_core::{Descriptor, DescriptorMetadata};

    fn template_descriptor(name: &str, handle: HeapHandle) -> Descriptor {
        Descriptor {
            locator: Locator::default_export(format!("./src/ui/components/{}/template.hbs", name)),
            kind: SymbolKind::Template,
            metadata: DescriptorMetadata {
                ty: "template".into(),
                collection: Some("components".into()),
                name: name.into(),
                handle: Some(handle),
                builtin: false,
            },
        }
    }

    fn text_template(text: &str) -> Vec<u8> {
        let mut writer = BytecodeWriter::new();
        writer.emit(&Instruction::Text(text.into()));
        writer.emit(&Instruction::Return);
        writer.into_bytes()
    }

    /// Two text templates laid out back to back.
    fn fixture() -> (Heap, DataSegment) {
        let a = text_template("a");
        let b = text_template("b");
        let a_handle = HeapHandle::new(0, a.len() as u32);
        let b_handle = HeapHandle::new(a.len() as u32, b.len() as u32);
        let heap = Heap::new([a, b].concat());
        let data = DataSegment::new(
            vec![
                template_descriptor("Main", a_handle),
                template_descriptor("Other", b_handle),
            ],
            vec![0],
        );
        (heap, data)
    }

    fn main() -> Locator {
        Locator::default_export("./src/ui/components/Main/template.hbs")
    }

    #[test]
    fn test_load_valid_program() {
        let (heap, data) = fixture();
        let program = BytecodeLoader.load(heap, &data, &[main()]).unwrap();
        assert_eq!(program.entry(&main()), Some(SymbolIndex(0)));
        assert_eq!(program.symbols().len(), 2);
        assert_eq!(program.code(SymbolIndex(1)).map(|c| c.len()), Some(7));
    }

    #[test]
    fn test_rejects_version() {
        let (heap, mut data) = fixture();
        data.version = 2;
        let err = BytecodeLoader.load(heap, &data, &[main()]).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedVersion(2)));
    }

    #[test]
    fn test_rejects_out_of_range() {
        let (heap, mut data) = fixture();
        data.table[1].metadata.handle = Some(HeapHandle::new(7, 100));
        let err = BytecodeLoader.load(heap, &data, &[main()]).unwrap_err();
        assert!(matches!(err, LoadError::OffsetOutOfRange { offset: 7, .. }));
    }

    #[test]
    fn test_rejects_overlap() {
        let (heap, mut data) = fixture();
        data.table[1].metadata.handle = Some(HeapHandle::new(0, 7));
        let err = BytecodeLoader.load(heap, &data, &[main()]).unwrap_err();
        assert!(matches!(err, LoadError::OverlappingRanges { .. }));
    }

    #[test]
    fn test_rejects_duplicate_locator() {
        let (heap, mut data) = fixture();
        data.table[1].locator = main();
        let err = BytecodeLoader.load(heap, &data, &[main()]).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateLocator(_)));
    }

    #[test]
    fn test_rejects_malformed_descriptor() {
        let (heap, mut data) = fixture();
        data.table[1].metadata.ty = "helper".into();
        let err = BytecodeLoader.load(heap.clone(), &data, &[main()]).unwrap_err();
        assert!(matches!(err, LoadError::MalformedDescriptor { index: 1, .. }));

        let (_, mut data) = fixture();
        data.table[1].metadata.handle = None;
        let err = BytecodeLoader.load(heap, &data, &[main()]).unwrap_err();
        assert!(matches!(err, LoadError::MalformedDescriptor { index: 1, .. }));
    }

    #[test]
    fn test_entry_count_must_match() {
        let (heap, data) = fixture();
        let other = Locator::default_export("./src/ui/components/Other/template.hbs");
        let err = BytecodeLoader
            .load(heap.clone(), &data, &[main(), other.clone()])
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::EntryCountMismatch {
                expected: 2,
                found: 1
            }
        ));

        let err = BytecodeLoader.load(heap, &data, &[other]).unwrap_err();
        assert!(matches!(err, LoadError::UnknownEntryPoint(_)));
    }

    #[test]
    fn test_rejects_truncated_bytecode() {
        let (heap, mut data) = fixture();
        data.table[1].metadata.handle = Some(HeapHandle::new(7, 3));
        let err = BytecodeLoader.load(heap, &data, &[main()]).unwrap_err();
        assert!(matches!(err, LoadError::MalformedBytecode { .. }));
    }

    #[test]
    fn test_rejects_wrong_symbol_kind() {
        let mut writer = BytecodeWriter::new();
        writer.emit(&Instruction::CallHelper {
            helper: SymbolIndex(0),
            positional: 0,
            named: vec![],
        });
        writer.emit(&Instruction::Append);
        writer.emit(&Instruction::Return);
        let code = writer.into_bytes();
        let data = DataSegment::new(
            vec![template_descriptor("Main", HeapHandle::new(0, code.len() as u32))],
            vec![0],
        );
        let err = BytecodeLoader
            .load(Heap::new(code), &data, &[main()])
            .unwrap_err();
        let LoadError::MalformedBytecode { reason, .. } = err else {
            panic!("unexpected error: {}", err);
        };
        assert_eq!(reason, "operand #0 at 0 refers to a template, expected a helper");
    }

    fn single_template(instructions: &[Instruction]) -> (Heap, DataSegment) {
        let mut writer = BytecodeWriter::new();
        for instruction in instructions {
            writer.emit(instruction);
        }
        let code = writer.into_bytes();
        let data = DataSegment::new(
            vec![template_descriptor("Main", HeapHandle::new(0, code.len() as u32))],
            vec![0],
        );
        (Heap::new(code), data)
    }

    #[test]
    fn test_rejects_backward_blocks() {
        let (heap, data) = single_template(&[
            Instruction::PushBool(true),
            Instruction::If {
                then: 0,
                otherwise: NO_BLOCK,
                end: 0,
            },
            Instruction::Return,
        ]);
        let err = BytecodeLoader.load(heap, &data, &[main()]).unwrap_err();
        let LoadError::MalformedBytecode { reason, .. } = err else {
            panic!("unexpected error: {}", err);
        };
        assert_eq!(reason, "instruction at 1 continues at 0");

        // `If` at 1 is 13 bytes long; its block points back at itself.
        let (heap, data) = single_template(&[
            Instruction::PushBool(true),
            Instruction::If {
                then: 1,
                otherwise: NO_BLOCK,
                end: 14,
            },
            Instruction::Return,
        ]);
        let err = BytecodeLoader.load(heap, &data, &[main()]).unwrap_err();
        let LoadError::MalformedBytecode { reason, .. } = err else {
            panic!("unexpected error: {}", err);
        };
        assert_eq!(reason, "block 1 of instruction at 1 points backward");
    }

    #[test]
    fn test_rejects_block_after_end() {
        // Offsets: PushBool 0, If 1, Text 14, Return 20, Return 21.
        let (heap, data) = single_template(&[
            Instruction::PushBool(true),
            Instruction::If {
                then: 21,
                otherwise: NO_BLOCK,
                end: 20,
            },
            Instruction::Text("x".into()),
            Instruction::Return,
            Instruction::Return,
        ]);
        let err = BytecodeLoader.load(heap, &data, &[main()]).unwrap_err();
        let LoadError::MalformedBytecode { reason, .. } = err else {
            panic!("unexpected error: {}", err);
        };
        assert_eq!(reason, "block 21 of instruction at 1 starts after its end 20");
    }

    #[test]
    fn test_load_json() {
        let (heap, data) = fixture();
        let json = data.to_json().unwrap();
        assert!(BytecodeLoader.load_json(heap.clone(), &json, &[main()]).is_ok());
        let err = BytecodeLoader.load_json(heap, "{", &[main()]).unwrap_err();
        assert!(matches!(err, LoadError::Json(_)));
    }
}
