//! Bundle compiler for stencil templates
//!
//! This crate links a set of template sources into a single bytecode heap
//! and a symbol table, and derives the portable data segment from it.

mod codegen;
pub mod compiler;
pub mod data_segment;
pub mod delegate;
pub mod errors;
pub mod symbols;


pub use compiler::{BundleCompiler, CompiledBundle};
pub use data_segment::generate_data_segment;
pub use delegate::{
    CompilerDelegate, ComponentReference, HelperReference, ModuleUnificationDelegate,
};
pub use errors::{
    BundleError, BundleErrorKind, BundleResult, CompileError, CompileErrors, Referrer,
};
pub use symbols::{SymbolEntry, SymbolTable};
