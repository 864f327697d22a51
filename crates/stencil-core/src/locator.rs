//! Identities of compilable and resolvable units.

use serde::{Deserialize, Serialize};

/// Module that hosts the built-in helpers shipped with the runtime.
pub const BUILTIN_HELPERS_MODULE: &str = "@stencil/helpers";

/// Names of the helpers the runtime provides without a registry entry.
pub const BUILTIN_HELPERS: &[&str] = &[
    "if", "unless", "concat", "eq", "not", "and", "or", "array", "hash",
];

pub fn is_builtin_helper(name: &str) -> bool {
    BUILTIN_HELPERS.contains(&name)
}

/// A module path plus an exported name.
///
/// Two locators are equal iff both fields match exactly.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Locator {
    pub module: String,
    pub name: String,
}

impl Locator {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    /// Locator of a module's `default` export.
    pub fn default_export(module: impl Into<String>) -> Self {
        Self::new(module, "default")
    }

    pub fn builtin_helper(name: impl Into<String>) -> Self {
        Self::new(BUILTIN_HELPERS_MODULE, name)
    }

    pub fn is_builtin(&self) -> bool {
        self.module == BUILTIN_HELPERS_MODULE
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.module, self.name)
    }
}

/// What a symbol-table entry stands for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolKind {
    /// A template compiled into the same heap.
    Template,
    /// A component implementation resolved at render time.
    Component,
    /// A helper resolved at render time.
    Helper,
    /// A component manager resolved at render time.
    ComponentManager,
}

impl SymbolKind {
    /// The resolver-map type this kind resolves as.
    pub fn resolver_type(self) -> &'static str {
        match self {
            SymbolKind::Template => "template",
            SymbolKind::Component => "component",
            SymbolKind::Helper => "helper",
            SymbolKind::ComponentManager => "component-manager",
        }
    }

    /// External kinds are recorded at compile time and resolved at run time.
    pub fn is_external(self) -> bool {
        !matches!(self, SymbolKind::Template)
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.resolver_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_equality_requires_both_fields() {
        let a = Locator::new("./src/ui/components/User/template.hbs", "default");
        let b = Locator::default_export("./src/ui/components/User/template.hbs");
        let c = Locator::new("./src/ui/components/User/template.hbs", "other");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_locator_display() {
        let locator = Locator::builtin_helper("if");
        assert_eq!(locator.to_string(), "@stencil/helpers#if");
        assert!(locator.is_builtin());
    }

    #[test]
    fn test_symbol_kind_serializes_as_resolver_type() {
        let json = serde_json::to_string(&SymbolKind::ComponentManager).unwrap();
        assert_eq!(json, "\"component-manager\"");
        for kind in [
            SymbolKind::Template,
            SymbolKind::Component,
            SymbolKind::Helper,
            SymbolKind::ComponentManager,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.resolver_type()));
        }
    }
}
