//! Runtime for stencil bundles
//!
//! Loads a compiled heap and its data segment into a verified [`Program`],
//! resolves external symbols through a [`Registry`] keyed by the
//! [`ResolverMap`], and renders templates synchronously into a
//! [`TreeBuilder`]. [`Application`] ties these together behind one `boot()`.

pub mod application;
pub mod builder;
pub mod builtins;
pub mod component;
pub mod dom;
pub mod errors;
pub mod loader;
pub mod registry;
pub mod renderer;
pub mod resolver;
pub mod resolver_map;

#[cfg(test)]
mod tests;

pub use application::{Application, ApplicationOptions, Initializer};
pub use builder::{Fragment, StringBuilder, TreeBuilder};
pub use component::{
    BasicComponentManager, Component, ComponentDefinition, ComponentManager, Helper, HelperArgs,
};
pub use dom::{Document, DomBuilder, serialize_children};
pub use errors::{BootError, LoadError, RegistryError, RenderError, ResolutionError};
pub use loader::{BytecodeLoader, Program, Symbol};
pub use registry::{Implementation, Registry, RegistryKey};
pub use renderer::{DEFAULT_RECURSION_LIMIT, Renderer, SyncRenderer};
pub use resolver::{Resolver, Specifier};
pub use resolver_map::{AppConfig, CollectionConfig, ResolverMap, TypeConfig};
