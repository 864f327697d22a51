//! Registry of host implementations keyed by `type:/root/collection/name`

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use stencil_core::Value;

use crate::component::{Component, ComponentManager, Helper};
use crate::errors::RegistryError;
use crate::renderer::Renderer;

#[derive(Clone)]
pub enum Implementation {
    Component(Arc<dyn Component>),
    Helper(Arc<dyn Helper>),
    ComponentManager(Arc<dyn ComponentManager>),
    Renderer(Arc<dyn Renderer>),
    Value(Value),
}

impl Implementation {
    pub fn component(component: impl Component + 'static) -> Self {
        Implementation::Component(Arc::new(component))
    }

    pub fn helper(helper: impl Helper + 'static) -> Self {
        Implementation::Helper(Arc::new(helper))
    }

    pub fn manager(manager: impl ComponentManager + 'static) -> Self {
        Implementation::ComponentManager(Arc::new(manager))
    }

    pub fn renderer(renderer: impl Renderer + 'static) -> Self {
        Implementation::Renderer(Arc::new(renderer))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Implementation::Component(_) => "component",
            Implementation::Helper(_) => "helper",
            Implementation::ComponentManager(_) => "component-manager",
            Implementation::Renderer(_) => "renderer",
            Implementation::Value(_) => "value",
        }
    }

    /// The implementation kind a registry type accepts.
    fn expected_for(ty: &str) -> &'static str {
        match ty {
            "component" => "component",
            "helper" => "helper",
            "component-manager" => "component-manager",
            "renderer" => "renderer",
            _ => "value",
        }
    }
}

impl From<Value> for Implementation {
    fn from(value: Value) -> Self {
        Implementation::Value(value)
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Implementation::Value(value) => f.debug_tuple("Value").field(value).finish(),
            other => write!(f, "{}(..)", other.kind_name()),
        }
    }
}

/// A parsed registry key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryKey<'a> {
    pub ty: &'a str,
    pub root: &'a str,
    pub collection: &'a str,
    pub name: &'a str,
}

impl<'a> RegistryKey<'a> {
    pub fn parse(key: &'a str) -> Result<Self, RegistryError> {
        let malformed = || RegistryError::MalformedKey(key.to_owned());
        let (ty, path) = key.split_once(":/").ok_or_else(malformed)?;
        let mut segments = path.splitn(3, '/');
        let (Some(root), Some(collection), Some(name)) =
            (segments.next(), segments.next(), segments.next())
        else {
            return Err(malformed());
        };
        if [ty, root, collection, name].iter().any(|s| s.is_empty()) {
            return Err(malformed());
        }
        Ok(RegistryKey {
            ty,
            root,
            collection,
            name,
        })
    }
}

impl fmt::Display for RegistryKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:/{}/{}/{}", self.ty, self.root, self.collection, self.name)
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: IndexMap<String, Implementation>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `implementation` under `key`, replacing any earlier entry.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        implementation: Implementation,
    ) -> Result<(), RegistryError> {
        let key = key.into();
        let expected = Implementation::expected_for(RegistryKey::parse(&key)?.ty);
        let found = implementation.kind_name();
        if expected != found {
            return Err(RegistryError::KindMismatch {
                key,
                expected,
                found,
            });
        }
        tracing::debug!(key = %key, kind = found, "registered");
        self.entries.insert(key, implementation);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Implementation> {
        self.entries.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{BasicComponentManager, HelperArgs};

    #[test]
    fn test_parse_key() {
        let key = RegistryKey::parse("component-manager:/smoke/component-managers/main").unwrap();
        assert_eq!(key.ty, "component-manager");
        assert_eq!(key.root, "smoke");
        assert_eq!(key.collection, "component-managers");
        assert_eq!(key.name, "main");
        assert_eq!(key.to_string(), "component-manager:/smoke/component-managers/main");

        for bad in ["helper", "helper:/smoke/ui", ":/smoke/ui/if", "helper:/smoke//if", "helper:smoke/ui/if"] {
            assert_eq!(
                RegistryKey::parse(bad),
                Err(RegistryError::MalformedKey(bad.to_owned())),
                "key: {}",
                bad
            );
        }
    }

    #[test]
    fn test_register_checks_kind() {
        let mut registry = Registry::new();
        registry
            .register(
                "helper:/smoke/ui/if",
                Implementation::helper(|_: &HelperArgs| Value::from("STUB")),
            )
            .unwrap();
        registry
            .register(
                "component-manager:/smoke/component-managers/main",
                Implementation::manager(BasicComponentManager),
            )
            .unwrap();
        registry
            .register("config:/smoke/main/env", Value::from("test").into())
            .unwrap();
        assert_eq!(registry.len(), 3);
        assert!(registry.has("helper:/smoke/ui/if"));

        let err = registry
            .register("helper:/smoke/ui/eq", Implementation::manager(BasicComponentManager))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::KindMismatch {
                key: "helper:/smoke/ui/eq".into(),
                expected: "helper",
                found: "component-manager",
            }
        );
        assert!(!registry.has("helper:/smoke/ui/eq"));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = Registry::new();
        registry.register("util:/app/utils/x", Value::from(1).into()).unwrap();
        registry.register("util:/app/utils/x", Value::from(2).into()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            registry.get("util:/app/utils/x"),
            Some(Implementation::Value(Value::Number(n))) if *n == 2.0
        ));
    }
}
