//! Host-side interfaces: helpers, components and component managers

use stencil_core::{Locator, NamedArgs, Value};

/// Evaluated arguments of a helper call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HelperArgs {
    pub positional: Vec<Value>,
    pub named: NamedArgs,
}

impl HelperArgs {
    pub fn positional(&self, index: usize) -> &Value {
        const NULL: &Value = &Value::Null;
        self.positional.get(index).unwrap_or(NULL)
    }

    pub fn named(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }
}

pub trait Helper: Send + Sync {
    fn compute(&self, args: &HelperArgs) -> Value;
}

impl<F> Helper for F
where
    F: Fn(&HelperArgs) -> Value + Send + Sync,
{
    fn compute(&self, args: &HelperArgs) -> Value {
        self(args)
    }
}

/// A component implementation. `create` returns the `this` of one invocation.
pub trait Component: Send + Sync {
    fn create(&self, args: &NamedArgs) -> Value;
}

impl<F> Component for F
where
    F: Fn(&NamedArgs) -> Value + Send + Sync,
{
    fn create(&self, args: &NamedArgs) -> Value {
        self(args)
    }
}

/// Everything a manager knows about the component being invoked.
pub struct ComponentDefinition<'a> {
    pub name: &'a str,
    pub locator: &'a Locator,
    /// `None` for template-only components.
    pub component: Option<&'a dyn Component>,
}

pub trait ComponentManager: Send + Sync {
    fn create(&self, definition: &ComponentDefinition<'_>, args: &NamedArgs) -> Value;
}

/// Delegates to the component's own `create`; template-only components get
/// a `null` receiver.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicComponentManager;

impl ComponentManager for BasicComponentManager {
    fn create(&self, definition: &ComponentDefinition<'_>, args: &NamedArgs) -> Value {
        definition
            .component
            .map_or(Value::Null, |component| component.create(args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closures_are_helpers() {
        let shout = |args: &HelperArgs| Value::from(args.positional(0).to_string().to_uppercase());
        let args = HelperArgs {
            positional: vec![Value::from("hi")],
            named: NamedArgs::new(),
        };
        assert_eq!(shout.compute(&args), Value::from("HI"));
        assert_eq!(args.positional(3), &Value::Null);
    }

    #[test]
    fn test_basic_manager() {
        let locator = Locator::default_export("./src/ui/components/User/component");
        let user = |args: &NamedArgs| Value::map([("greeting", args.get("name").cloned())]);
        let mut args = NamedArgs::new();
        args.insert("name".into(), Value::from("Chad"));

        let definition = ComponentDefinition {
            name: "User",
            locator: &locator,
            component: Some(&user),
        };
        assert_eq!(
            BasicComponentManager.create(&definition, &args),
            Value::map([("greeting", "Chad")])
        );

        let template_only = ComponentDefinition {
            name: "User",
            locator: &locator,
            component: None,
        };
        assert_eq!(BasicComponentManager.create(&template_only, &args), Value::Null);
    }
}
