//! Diagnostic messages emitted while compiling templates.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Byte range inside a template source.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// An error message with its source location.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Display)]
#[display("ERROR at {}..{}: {message}", span.start, span.end)]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
    pub phase: CompilationPhase,
}

impl Diagnostic {
    pub fn error(phase: CompilationPhase, span: Span, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span,
            phase,
        }
    }
}

/// Compilation phase where a diagnostic was emitted.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CompilationPhase {
    Parsing,
    Codegen,
    Linking,
}
