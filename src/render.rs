//! Server-side rendering of a compiled dist directory

use std::path::Path;

use stencil_core::{Locator, NamedArgs, Value};
use stencil_runtime::{
    Application, ApplicationOptions, BasicComponentManager, BytecodeLoader, Implementation,
    Registry, RegistryError, ResolverMap, Resolver, Specifier, StringBuilder,
};

use crate::error::Result;
use crate::project::read_dist;

pub struct RenderOptions {
    pub main: Locator,
    pub resolver_map: ResolverMap,
    /// `this` of the main template.
    pub state: Option<Value>,
}

impl RenderOptions {
    pub fn new(main: Locator) -> Self {
        Self {
            main,
            resolver_map: ResolverMap::module_unification("app"),
            state: None,
        }
    }
}

/// Loads `dist`, boots an application with the basic component manager and
/// returns the rendered HTML.
pub async fn render_dist(dist: &Path, options: RenderOptions) -> Result<String> {
    let (heap, data) = read_dist(dist)?;
    let program = BytecodeLoader.load(heap, &data, std::slice::from_ref(&options.main))?;
    options.resolver_map.validate().map_err(crate::Error::ResolverMap)?;

    let root = options.resolver_map.app.root_name.clone();
    let main_component = program
        .entry(&options.main)
        .and_then(|index| program.symbol(index))
        .map(|symbol| Specifier::new("component", symbol.name.as_str()))
        .map(|spec| spec.with_collection("components"));
    let state_key = match (&options.state, main_component) {
        (Some(_), Some(spec)) => {
            let empty = Registry::new();
            Resolver::new(&options.resolver_map, &empty)
                .key_for(&spec)
                .map_err(crate::Error::ResolverMap)?
        }
        _ => None,
    };

    let mut app = Application::new(ApplicationOptions {
        resolver_map: options.resolver_map,
        ..ApplicationOptions::new(program, options.main, StringBuilder::new())
    });

    let manager_key = format!("component-manager:/{}/component-managers/main", root);
    app.register_initializer(move |registry: &mut Registry| -> Result<(), RegistryError> {
        registry.register(manager_key.as_str(), Implementation::manager(BasicComponentManager))
    })?;
    if let (Some(state), Some(key)) = (options.state, state_key) {
        app.register_initializer(move |registry: &mut Registry| -> Result<(), RegistryError> {
            let state = state.clone();
            registry.register(
                key.as_str(),
                Implementation::component(move |_: &NamedArgs| state.clone()),
            )
        })?;
    }

    app.boot().await?;
    Ok(app.into_output().into_string())
}
