//! stencil: compile component templates into a bytecode bundle and render
//! them against a registry of host implementations.

pub mod diagnostics;
pub mod error;
pub mod project;
pub mod render;

pub use error::{Error, Result};
pub use project::{Project, ProjectTemplate, parse_entry, read_dist, write_dist};
pub use render::{RenderOptions, render_dist};

pub use stencil_bundle;
pub use stencil_core;
pub use stencil_runtime;
pub use stencil_syntax;
