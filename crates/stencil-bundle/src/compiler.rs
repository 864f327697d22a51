//! Main compiler interface
//!
//! `BundleCompiler` collects template sources keyed by locator and links them
//! into one bytecode heap plus a symbol table.

use indexmap::IndexMap;
use stencil_core::{CompilationPhase, Heap, HeapHandle, Locator, Span, SymbolKind};
use stencil_syntax::{Template, parse_template};

use crate::codegen::{CodeGenerator, UnresolvedReference};
use crate::delegate::CompilerDelegate;
use crate::errors::{BundleError, BundleErrorKind, BundleResult, CompileError, CompileErrors, Referrer};
use crate::symbols::{SymbolEntry, SymbolTable};

/// Output of one compilation: the immutable heap and its symbol table.
#[derive(Clone, Debug)]
pub struct CompiledBundle {
    pub heap: Heap,
    pub table: SymbolTable,
}

/// Single allocator for heap ranges. The cursor only moves forward.
#[derive(Debug, Default)]
struct HeapArena {
    bytes: Vec<u8>,
}

impl HeapArena {
    fn alloc(&mut self, code: &[u8]) -> HeapHandle {
        let handle = HeapHandle::new(self.bytes.len() as u32, code.len() as u32);
        self.bytes.extend_from_slice(code);
        handle
    }

    fn finish(self) -> Heap {
        Heap::new(self.bytes)
    }
}

pub struct BundleCompiler<D: CompilerDelegate> {
    delegate: D,
    pending: IndexMap<Locator, String>,
    entry_points: Vec<Locator>,
}

impl<D: CompilerDelegate> BundleCompiler<D> {
    pub fn new(delegate: D) -> Self {
        Self {
            delegate,
            pending: IndexMap::new(),
            entry_points: Vec::new(),
        }
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    /// Registers a template source. Adding a locator again replaces its
    /// source but keeps its original position.
    pub fn add(&mut self, locator: Locator, source: impl Into<String>) {
        tracing::debug!(locator = %locator, "added template");
        self.pending.insert(locator, source.into());
    }

    /// Designates a template to be rendered directly, in addition to the
    /// delegate's entry points.
    pub fn add_entry_point(&mut self, locator: Locator) {
        if !self.entry_points.contains(&locator) {
            self.entry_points.push(locator);
        }
    }

    /// Compiles every pending template.
    ///
    /// Compile errors are collected across all units and reported together;
    /// nothing is emitted unless every unit compiles and links.
    pub fn compile(self) -> BundleResult<CompiledBundle> {
        let BundleCompiler {
            delegate,
            pending,
            entry_points,
        } = self;

        let mut errors = Vec::new();
        let mut parsed: Vec<(&Locator, Option<Template>)> = Vec::with_capacity(pending.len());
        for (locator, source) in &pending {
            match parse_template(source) {
                Ok(template) => parsed.push((locator, Some(template))),
                Err(err) => {
                    errors.push(CompileError::new(
                        locator.clone(),
                        CompilationPhase::Parsing,
                        err.span,
                        err.message,
                    ));
                    parsed.push((locator, None));
                }
            }
        }

        let mut table = SymbolTable::new();
        for locator in pending.keys() {
            table.intern(
                SymbolEntry::new(
                    locator.clone(),
                    SymbolKind::Template,
                    delegate.template_name(locator),
                )
                .with_collection(delegate.collection_hint(SymbolKind::Template)),
            )?;
        }

        let mut unresolved: Vec<UnresolvedReference> = Vec::new();
        let mut link_failures: Vec<(&Locator, BundleErrorKind)> = Vec::new();
        let mut units = Vec::with_capacity(parsed.len());
        for (locator, template) in &parsed {
            let Some(template) = template else {
                continue;
            };
            let generator = CodeGenerator::new(&delegate, &mut table, &mut unresolved, locator);
            match generator.compile_template(template) {
                Ok(code) => units.push((*locator, code)),
                Err(err) => match err.into_kind() {
                    BundleErrorKind::Compile(unit_errors) => errors.extend(unit_errors.0),
                    link => link_failures.push((*locator, link)),
                },
            }
        }

        // Link failures only stand alone when every template compiled.
        if !errors.is_empty() {
            errors.extend(link_failures.into_iter().map(|(locator, link)| {
                CompileError::new(
                    locator.clone(),
                    CompilationPhase::Linking,
                    Span::default(),
                    link.to_string(),
                )
            }));
            tracing::debug!(count = errors.len(), "template compilation failed");
            return Err(CompileErrors(errors).into());
        }
        if let Some((_, link)) = link_failures.into_iter().next() {
            return Err(link.into());
        }
        if let Some(missing) = unresolved.into_iter().next() {
            return Err(BundleError::unresolved(missing.locator, missing.referrer));
        }

        let mut arena = HeapArena::default();
        for (locator, code) in &units {
            let handle = arena.alloc(code);
            if let Some(index) = table.lookup(locator).map(|(index, _)| index) {
                table.set_handle(index, handle);
            }
            tracing::debug!(
                locator = %locator,
                offset = handle.offset,
                length = handle.length,
                "emitted template"
            );
        }

        let mut requested = delegate.entry_points();
        for locator in entry_points {
            if !requested.contains(&locator) {
                requested.push(locator);
            }
        }
        for locator in requested {
            let index = match table.lookup(&locator) {
                Some((index, entry)) if entry.kind == SymbolKind::Template => index,
                _ => return Err(BundleError::unresolved(locator, Referrer::EntryPoint)),
            };
            table.push_entry_point(index);
        }

        let heap = arena.finish();
        tracing::info!(
            templates = units.len(),
            symbols = table.len(),
            heap_bytes = heap.len(),
            "compiled bundle"
        );
        Ok(CompiledBundle { heap, table })
    }
}
