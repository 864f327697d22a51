//! Resolves `(type, name, collection?)` specifiers against the registry.

use std::fmt;
use std::sync::Arc;

use crate::component::{Component, ComponentManager, Helper};
use crate::errors::ResolutionError;
use crate::loader::Symbol;
use crate::registry::{Implementation, Registry};
use crate::renderer::Renderer;
use crate::resolver_map::ResolverMap;

/// Types whose absence is an error rather than a `None`.
const REQUIRED_TYPES: &[&str] = &["component-manager"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Specifier {
    pub ty: String,
    pub name: String,
    /// Preferred collection; ignored unless it lists `ty`.
    pub collection: Option<String>,
}

impl Specifier {
    pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            name: name.into(),
            collection: None,
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn for_symbol(symbol: &Symbol) -> Self {
        Self {
            ty: symbol.kind.resolver_type().to_owned(),
            name: symbol.name.clone(),
            collection: symbol.collection.clone(),
        }
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.collection {
            Some(collection) => write!(f, "{}:{}/{}", self.ty, collection, self.name),
            None => write!(f, "{}:{}", self.ty, self.name),
        }
    }
}

#[derive(Clone, Copy)]
pub struct Resolver<'r> {
    map: &'r ResolverMap,
    registry: &'r Registry,
}

impl<'r> Resolver<'r> {
    pub fn new(map: &'r ResolverMap, registry: &'r Registry) -> Self {
        Self { map, registry }
    }

    pub fn root_name(&self) -> &'r str {
        &self.map.app.root_name
    }

    /// Registry key for `specifier`, or `None` when its collection is
    /// unresolvable.
    pub fn key_for(&self, specifier: &Specifier) -> Result<Option<String>, ResolutionError> {
        let ty = &specifier.ty;
        let config = self
            .map
            .types
            .get(ty)
            .ok_or_else(|| ResolutionError::UnknownType(ty.clone()))?;
        let collection_name = specifier
            .collection
            .as_ref()
            .filter(|hint| {
                self.map
                    .collections
                    .get(*hint)
                    .is_some_and(|collection| collection.contains(ty))
            })
            .unwrap_or(&config.definitive_collection);
        let collection = self
            .map
            .collections
            .get(collection_name)
            .ok_or_else(|| ResolutionError::UnknownCollection(collection_name.clone()))?;
        if collection.unresolvable {
            return Ok(None);
        }
        if !collection.contains(ty) {
            return Err(ResolutionError::TypeNotInCollection {
                ty: ty.clone(),
                collection: collection_name.clone(),
            });
        }
        Ok(Some(format!(
            "{}:/{}/{}/{}",
            ty,
            self.root_name(),
            collection.key_segment(collection_name),
            specifier.name
        )))
    }

    pub fn resolve(
        &self,
        specifier: &Specifier,
    ) -> Result<Option<&'r Implementation>, ResolutionError> {
        let Some(key) = self.key_for(specifier)? else {
            tracing::trace!(specifier = %specifier, "unresolvable collection");
            return Ok(None);
        };
        match self.registry.get(&key) {
            Some(implementation) => {
                tracing::trace!(key = %key, "resolved");
                Ok(Some(implementation))
            }
            None if REQUIRED_TYPES.contains(&specifier.ty.as_str()) => {
                Err(ResolutionError::Missing { key })
            }
            None => Ok(None),
        }
    }

    /// Specifier for `name` in `collection`, typed by the collection's
    /// default type.
    pub fn identify(&self, collection: &str, name: &str) -> Result<Specifier, ResolutionError> {
        let config = self
            .map
            .collections
            .get(collection)
            .ok_or_else(|| ResolutionError::UnknownCollection(collection.to_owned()))?;
        let ty = config
            .default_type
            .as_ref()
            .ok_or_else(|| ResolutionError::TypeNotInCollection {
                ty: "<default>".to_owned(),
                collection: collection.to_owned(),
            })?;
        Ok(Specifier::new(ty.clone(), name).with_collection(collection))
    }

    pub fn component(
        &self,
        specifier: &Specifier,
    ) -> Result<Option<Arc<dyn Component>>, ResolutionError> {
        self.typed(specifier, "component", |implementation| match implementation {
            Implementation::Component(component) => Some(component.clone()),
            _ => None,
        })
    }

    pub fn helper(&self, specifier: &Specifier) -> Result<Option<Arc<dyn Helper>>, ResolutionError> {
        self.typed(specifier, "helper", |implementation| match implementation {
            Implementation::Helper(helper) => Some(helper.clone()),
            _ => None,
        })
    }

    pub fn manager(
        &self,
        specifier: &Specifier,
    ) -> Result<Option<Arc<dyn ComponentManager>>, ResolutionError> {
        self.typed(specifier, "component-manager", |implementation| match implementation {
            Implementation::ComponentManager(manager) => Some(manager.clone()),
            _ => None,
        })
    }

    pub fn renderer(
        &self,
        specifier: &Specifier,
    ) -> Result<Option<Arc<dyn Renderer>>, ResolutionError> {
        self.typed(specifier, "renderer", |implementation| match implementation {
            Implementation::Renderer(renderer) => Some(renderer.clone()),
            _ => None,
        })
    }

    fn typed<T>(
        &self,
        specifier: &Specifier,
        expected: &'static str,
        extract: impl FnOnce(&Implementation) -> Option<T>,
    ) -> Result<Option<T>, ResolutionError> {
        let Some(implementation) = self.resolve(specifier)? else {
            return Ok(None);
        };
        match extract(implementation) {
            Some(value) => Ok(Some(value)),
            None => Err(ResolutionError::WrongImplementation {
                key: self.key_for(specifier)?.unwrap_or_default(),
                expected,
                found: implementation.kind_name(),
            }),
        }
    }
}
