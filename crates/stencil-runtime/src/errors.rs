//! Error types for loading, resolving, rendering and booting

use derive_more::Display;
use stencil_core::Locator;

#[derive(Display, Debug)]
pub enum LoadError {
    #[display("Unsupported data segment version {_0}")]
    UnsupportedVersion(u32),

    #[display(
        "Heap range {offset}+{length} of {locator} is outside the {heap_len}-byte heap"
    )]
    OffsetOutOfRange {
        locator: Locator,
        offset: u32,
        length: u32,
        heap_len: usize,
    },

    #[display("Heap ranges of {first} and {second} overlap")]
    OverlappingRanges { first: Locator, second: Locator },

    #[display("Malformed descriptor #{index}: {reason}")]
    MalformedDescriptor { index: usize, reason: String },

    #[display("Duplicate locator {_0}")]
    DuplicateLocator(Locator),

    #[display("Data segment declares {found} entry points but {expected} were requested")]
    EntryCountMismatch { expected: usize, found: usize },

    #[display("Unknown entry point {_0}")]
    UnknownEntryPoint(String),

    #[display("Malformed bytecode in {locator}: {reason}")]
    MalformedBytecode { locator: Locator, reason: String },

    #[display("Invalid data segment JSON: {_0}")]
    Json(serde_json::Error),
}

impl From<serde_json::Error> for LoadError {
    fn from(error: serde_json::Error) -> Self {
        LoadError::Json(error)
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Json(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Display, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[display("Unknown type `{_0}` in resolver map")]
    UnknownType(String),

    #[display("Unknown collection `{_0}` in resolver map")]
    UnknownCollection(String),

    #[display("Type `{ty}` is not a member of collection `{collection}`")]
    TypeNotInCollection { ty: String, collection: String },

    #[display("Nothing registered for `{key}`")]
    Missing { key: String },

    #[display("`{key}` holds a {found}, expected a {expected}")]
    WrongImplementation {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl std::error::Error for ResolutionError {}

#[derive(Display, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[display("Malformed registry key `{_0}` (expected `type:/root/collection/name`)")]
    MalformedKey(String),

    #[display("Registry key `{key}` takes a {expected}, got a {found}")]
    KindMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl std::error::Error for RegistryError {}

#[derive(Display, Debug)]
pub enum RenderError {
    #[display("{_0} is not an entry point of the program")]
    UnknownEntry(Locator),

    #[display("Resolution failed: {_0}")]
    Resolution(ResolutionError),

    #[display("Recursion limit of {_0} nested invocations exceeded")]
    RecursionLimit(usize),

    #[display("Malformed program: {_0}")]
    Malformed(String),
}

impl From<ResolutionError> for RenderError {
    fn from(error: ResolutionError) -> Self {
        RenderError::Resolution(error)
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Resolution(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Display, Debug)]
pub enum BootError {
    #[display("Application has already booted")]
    AlreadyBooted,

    #[display("Initializer failed: {_0}")]
    Initializer(String),

    #[display("Registry error: {_0}")]
    Registry(RegistryError),

    #[display("Resolution error: {_0}")]
    Resolution(ResolutionError),

    #[display("Render error: {_0}")]
    Render(RenderError),
}

impl BootError {
    pub fn initializer(msg: impl std::fmt::Display) -> Self {
        BootError::Initializer(msg.to_string())
    }
}

impl From<RegistryError> for BootError {
    fn from(error: RegistryError) -> Self {
        BootError::Registry(error)
    }
}

impl From<ResolutionError> for BootError {
    fn from(error: ResolutionError) -> Self {
        BootError::Resolution(error)
    }
}

impl From<RenderError> for BootError {
    fn from(error: RenderError) -> Self {
        BootError::Render(error)
    }
}

impl std::error::Error for BootError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BootError::Registry(e) => Some(e),
            BootError::Resolution(e) => Some(e),
            BootError::Render(e) => Some(e),
            _ => None,
        }
    }
}
