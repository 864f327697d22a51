//! Shared formats for the stencil template pipeline.
pub mod bytecode;
pub mod data_segment;
pub mod diagnostic;
pub mod html;
pub mod locator;
pub mod value;

pub use bytecode::{DecodeError, Heap, HeapHandle, Instruction, NO_BLOCK, SymbolIndex};
pub use data_segment::{DATA_SEGMENT_VERSION, DataSegment, Descriptor, DescriptorMetadata};
pub use diagnostic::{CompilationPhase, Diagnostic, Span};
pub use html::{VOID_ELEMENTS, is_void_element};
pub use locator::{BUILTIN_HELPERS, BUILTIN_HELPERS_MODULE, Locator, SymbolKind, is_builtin_helper};
pub use value::{NamedArgs, Value};
