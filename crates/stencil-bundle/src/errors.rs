//! Error types for bundle compilation

use derive_more::{Display, From};
use stencil_core::{CompilationPhase, Diagnostic, Locator, Span, SymbolKind};

pub type BundleResult<T> = Result<T, BundleError>;

#[derive(Display, Debug, From)]
#[display("{kind}")]
pub struct BundleError {
    #[from]
    kind: Box<BundleErrorKind>,
}

impl<E> From<E> for BundleError
where
    BundleErrorKind: From<E>,
{
    fn from(error: E) -> Self {
        BundleError {
            kind: Box::new(BundleErrorKind::from(error)),
        }
    }
}

impl BundleError {
    pub fn kind(&self) -> &BundleErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> BundleErrorKind {
        *self.kind
    }

    pub(crate) fn unresolved(locator: Locator, referrer: Referrer) -> Self {
        BundleErrorKind::UnresolvedSymbol { locator, referrer }.into()
    }

    /// Compile errors collected across all units, if that is what failed.
    pub fn compile_errors(&self) -> Option<&[CompileError]> {
        match &*self.kind {
            BundleErrorKind::Compile(errors) => Some(&errors.0),
            _ => None,
        }
    }
}

#[derive(Display, Debug)]
pub enum BundleErrorKind {
    #[display("Template compilation failed:\n{_0}")]
    Compile(CompileErrors),

    #[display("Unresolved symbol: {locator} (referenced from {referrer})")]
    UnresolvedSymbol { locator: Locator, referrer: Referrer },

    #[display("Symbol kind conflict: {locator} is used as both {first} and {second}")]
    SymbolKindConflict {
        locator: Locator,
        first: SymbolKind,
        second: SymbolKind,
    },
}

impl From<CompileError> for BundleErrorKind {
    fn from(error: CompileError) -> Self {
        BundleErrorKind::Compile(CompileErrors(vec![error]))
    }
}

impl From<CompileErrors> for BundleErrorKind {
    fn from(errors: CompileErrors) -> Self {
        BundleErrorKind::Compile(errors)
    }
}

impl std::error::Error for BundleError {}

/// Where an unresolved reference came from.
#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum Referrer {
    #[display("the bundle entry points")]
    EntryPoint,
    #[display("{_0}")]
    Template(Locator),
}

/// A problem local to one template source.
#[derive(Clone, Debug, PartialEq, Eq, Display)]
#[display("{locator}: {diagnostic}")]
pub struct CompileError {
    pub locator: Locator,
    pub diagnostic: Diagnostic,
}

impl CompileError {
    pub fn new(
        locator: Locator,
        phase: CompilationPhase,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Self {
            locator,
            diagnostic: Diagnostic::error(phase, span, message),
        }
    }

    pub fn message(&self) -> &str {
        &self.diagnostic.message
    }

    pub fn span(&self) -> Span {
        self.diagnostic.span
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileErrors(pub Vec<CompileError>);

impl std::ops::Deref for CompileErrors {
    type Target = [CompileError];

    fn deref(&self) -> &[CompileError] {
        &self.0
    }
}

impl std::fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {}", error)?;
        }
        Ok(())
    }
}
