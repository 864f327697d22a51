//! Compiler delegates map the short names used inside templates to locators.

use stencil_core::{Locator, SymbolKind, is_builtin_helper};

/// Everything needed to invoke a component by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentReference {
    pub template: Locator,
    pub component: Locator,
    pub manager: Locator,
    /// Resolver name of the manager, e.g. `main`.
    pub manager_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelperReference {
    pub locator: Locator,
    /// Provided by the runtime when the registry has no override.
    pub builtin: bool,
}

pub trait CompilerDelegate {
    /// Maps `<Name>` inside `referrer` to its template, implementation and
    /// manager. `None` makes the invocation a compile error.
    fn resolve_component(&self, name: &str, referrer: &Locator) -> Option<ComponentReference>;

    fn resolve_helper(&self, name: &str, referrer: &Locator) -> Option<HelperReference>;

    /// Resolver-facing name of a compiled template.
    fn template_name(&self, locator: &Locator) -> String;

    /// Collection recorded in the data segment for symbols of `kind`.
    fn collection_hint(&self, kind: SymbolKind) -> Option<String>;

    /// Templates meant to be rendered directly.
    fn entry_points(&self) -> Vec<Locator>;
}

pub const DEFAULT_COMPONENTS_DIR: &str = "./src/ui/components";
pub const DEFAULT_MANAGER_MODULE: &str = "./src/ui/component-managers/main";

/// Module-unification project layout.
///
/// ```text
/// ./src/ui/components/<Name>/template.hbs   template
/// ./src/ui/components/<Name>/component      implementation
/// ./src/ui/components/<name>/helper         helper
/// ./src/ui/component-managers/main          shared manager
/// ```
#[derive(Clone, Debug)]
pub struct ModuleUnificationDelegate {
    main: String,
    components_dir: String,
}

fn is_component_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_uppercase())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_helper_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl ModuleUnificationDelegate {
    pub fn new(main: impl Into<String>) -> Self {
        Self {
            main: main.into(),
            components_dir: DEFAULT_COMPONENTS_DIR.to_owned(),
        }
    }

    pub fn with_components_dir(mut self, dir: impl Into<String>) -> Self {
        self.components_dir = dir.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn main(&self) -> &str {
        &self.main
    }

    pub fn template_locator(&self, name: &str) -> Locator {
        Locator::default_export(format!("{}/{}/template.hbs", self.components_dir, name))
    }

    pub fn component_locator(&self, name: &str) -> Locator {
        Locator::default_export(format!("{}/{}/component", self.components_dir, name))
    }

    pub fn helper_locator(&self, name: &str) -> Locator {
        Locator::default_export(format!("{}/{}/helper", self.components_dir, name))
    }

    pub fn manager_locator(&self) -> Locator {
        Locator::default_export(DEFAULT_MANAGER_MODULE)
    }
}

impl CompilerDelegate for ModuleUnificationDelegate {
    fn resolve_component(&self, name: &str, _referrer: &Locator) -> Option<ComponentReference> {
        if !is_component_name(name) {
            return None;
        }
        Some(ComponentReference {
            template: self.template_locator(name),
            component: self.component_locator(name),
            manager: self.manager_locator(),
            manager_name: "main".to_owned(),
        })
    }

    fn resolve_helper(&self, name: &str, _referrer: &Locator) -> Option<HelperReference> {
        if is_builtin_helper(name) {
            return Some(HelperReference {
                locator: Locator::builtin_helper(name),
                builtin: true,
            });
        }
        is_helper_name(name).then(|| HelperReference {
            locator: self.helper_locator(name),
            builtin: false,
        })
    }

    fn template_name(&self, locator: &Locator) -> String {
        locator
            .module
            .strip_prefix(self.components_dir.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .and_then(|rest| rest.strip_suffix("/template.hbs"))
            .unwrap_or(&locator.module)
            .to_owned()
    }

    fn collection_hint(&self, kind: SymbolKind) -> Option<String> {
        Some(
            match kind {
                SymbolKind::ComponentManager => "component-managers",
                SymbolKind::Template | SymbolKind::Component | SymbolKind::Helper => "components",
            }
            .to_owned(),
        )
    }

    fn entry_points(&self) -> Vec<Locator> {
        vec![self.template_locator(&self.main)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_resolution() {
        let delegate = ModuleUnificationDelegate::new("Main");
        let referrer = delegate.template_locator("Main");
        let reference = delegate.resolve_component("User", &referrer).unwrap();
        assert_eq!(
            reference.template,
            Locator::new("./src/ui/components/User/template.hbs", "default")
        );
        assert_eq!(
            reference.component,
            Locator::new("./src/ui/components/User/component", "default")
        );
        assert_eq!(
            reference.manager,
            Locator::new("./src/ui/component-managers/main", "default")
        );
        assert_eq!(reference.manager_name, "main");

        assert!(delegate.resolve_component("user", &referrer).is_none());
        assert!(delegate.resolve_component("Foo.Bar", &referrer).is_none());
    }

    #[test]
    fn test_helper_resolution() {
        let delegate = ModuleUnificationDelegate::new("Main");
        let referrer = delegate.template_locator("Main");

        let builtin = delegate.resolve_helper("concat", &referrer).unwrap();
        assert!(builtin.builtin);
        assert_eq!(builtin.locator.to_string(), "@stencil/helpers#concat");

        let custom = delegate.resolve_helper("format-date", &referrer).unwrap();
        assert!(!custom.builtin);
        assert_eq!(
            custom.locator.to_string(),
            "./src/ui/components/format-date/helper#default"
        );

        assert!(delegate.resolve_helper("Upper", &referrer).is_none());
    }

    #[test]
    fn test_template_name_and_entry_points() {
        let delegate = ModuleUnificationDelegate::new("My-Main");
        let main = delegate.template_locator("My-Main");
        assert_eq!(delegate.template_name(&main), "My-Main");
        assert_eq!(delegate.entry_points(), vec![main]);
        assert_eq!(
            delegate.template_name(&Locator::default_export("./elsewhere.hbs")),
            "./elsewhere.hbs"
        );
    }

    #[test]
    fn test_custom_components_dir() {
        let delegate = ModuleUnificationDelegate::new("Main").with_components_dir("./app/components/");
        let locator = delegate.template_locator("Main");
        assert_eq!(locator.module, "./app/components/Main/template.hbs");
        assert_eq!(delegate.template_name(&locator), "Main");
    }
}
