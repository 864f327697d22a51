//! Application: runs initializers, then renders the main template once

use std::sync::Arc;

use async_trait::async_trait;
use stencil_core::{Locator, NamedArgs, Value};

use crate::builder::TreeBuilder;
use crate::component::{BasicComponentManager, ComponentDefinition, ComponentManager};
use crate::errors::{BootError, RegistryError, RenderError};
use crate::loader::Program;
use crate::registry::Registry;
use crate::renderer::{Renderer, SyncRenderer};
use crate::resolver::{Resolver, Specifier};
use crate::resolver_map::ResolverMap;

/// Populates the registry before the first render.
#[async_trait]
pub trait Initializer: Send + Sync {
    async fn initialize(&self, registry: &mut Registry) -> Result<(), BootError>;
}

#[async_trait]
impl<F> Initializer for F
where
    F: Fn(&mut Registry) -> Result<(), RegistryError> + Send + Sync,
{
    async fn initialize(&self, registry: &mut Registry) -> Result<(), BootError> {
        self(registry)?;
        Ok(())
    }
}

pub struct ApplicationOptions<B> {
    /// Overrides the resolver map's `rootName` when set.
    pub root_name: Option<String>,
    pub program: Program,
    /// Main template; must be an entry point of `program`.
    pub main: Locator,
    pub builder: B,
    pub resolver_map: ResolverMap,
    /// Used unless the registry provides `renderer:main`.
    pub renderer: Option<Arc<dyn Renderer>>,
}

impl<B> ApplicationOptions<B> {
    pub fn new(program: Program, main: Locator, builder: B) -> Self {
        Self {
            root_name: None,
            program,
            main,
            builder,
            resolver_map: ResolverMap::module_unification("app"),
            renderer: None,
        }
    }
}

pub struct Application<B> {
    program: Program,
    main: Locator,
    builder: B,
    resolver_map: ResolverMap,
    registry: Registry,
    renderer: Arc<dyn Renderer>,
    initializers: Vec<Box<dyn Initializer>>,
    booted: bool,
}

impl<B: TreeBuilder> Application<B> {
    pub fn new(options: ApplicationOptions<B>) -> Self {
        let mut resolver_map = options.resolver_map;
        if let Some(root_name) = options.root_name {
            resolver_map.app.root_name = root_name;
        }
        Self {
            program: options.program,
            main: options.main,
            builder: options.builder,
            resolver_map,
            registry: Registry::new(),
            renderer: options
                .renderer
                .unwrap_or_else(|| Arc::new(SyncRenderer::default())),
            initializers: Vec::new(),
            booted: false,
        }
    }

    /// Root name used in registry keys.
    pub fn root_name(&self) -> &str {
        &self.resolver_map.app.root_name
    }

    pub fn is_booted(&self) -> bool {
        self.booted
    }

    pub fn register_initializer(
        &mut self,
        initializer: impl Initializer + 'static,
    ) -> Result<(), BootError> {
        if self.booted {
            return Err(BootError::AlreadyBooted);
        }
        self.initializers.push(Box::new(initializer));
        Ok(())
    }

    /// Runs every initializer in registration order, then renders the main
    /// template into the builder. Succeeds at most once per application.
    pub async fn boot(&mut self) -> Result<(), BootError> {
        if self.booted {
            return Err(BootError::AlreadyBooted);
        }
        self.booted = true;

        let initializers = std::mem::take(&mut self.initializers);
        tracing::debug!(count = initializers.len(), "running initializers");
        for initializer in &initializers {
            initializer.initialize(&mut self.registry).await?;
        }

        let resolver = Resolver::new(&self.resolver_map, &self.registry);
        let this = self.root_this(&resolver)?;
        let renderer = resolver
            .renderer(&Specifier::new("renderer", "main"))?
            .unwrap_or_else(|| self.renderer.clone());

        renderer.render(&self.program, &self.main, this, &resolver, &mut self.builder)?;
        tracing::info!(main = %self.main, registered = self.registry.len(), "booted");
        Ok(())
    }

    /// `this` for the main template: the root component's state, or `null`
    /// when the main component is template-only.
    fn root_this(&self, resolver: &Resolver<'_>) -> Result<Value, BootError> {
        let index = self
            .program
            .entry(&self.main)
            .ok_or_else(|| RenderError::UnknownEntry(self.main.clone()))?;
        let Some(symbol) = self.program.symbol(index) else {
            return Err(RenderError::UnknownEntry(self.main.clone()).into());
        };
        let mut specifier = Specifier::new("component", symbol.name.as_str());
        specifier.collection = symbol.collection.clone();

        let Some(component) = resolver.component(&specifier)? else {
            return Ok(Value::Null);
        };
        let manager: Arc<dyn ComponentManager> = resolver
            .manager(&Specifier::new("component-manager", "main"))?
            .unwrap_or_else(|| Arc::new(BasicComponentManager));
        let definition = ComponentDefinition {
            name: &symbol.name,
            locator: &symbol.locator,
            component: Some(component.as_ref()),
        };
        Ok(manager.create(&definition, &NamedArgs::new()))
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn output(&self) -> &B {
        &self.builder
    }

    pub fn into_output(self) -> B {
        self.builder
    }
}
