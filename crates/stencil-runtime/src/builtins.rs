//! Helpers available to every template without registration

use stencil_core::Value;

use crate::component::HelperArgs;

pub type BuiltinHelper = fn(&HelperArgs) -> Value;

/// Looks up a built-in helper by name.
pub fn builtin_helper(name: &str) -> Option<BuiltinHelper> {
    let helper: BuiltinHelper = match name {
        "if" => if_helper,
        "unless" => unless_helper,
        "concat" => concat,
        "eq" => eq,
        "not" => not,
        "and" => and,
        "or" => or,
        "array" => array,
        "hash" => hash,
        _ => return None,
    };
    Some(helper)
}

fn if_helper(args: &HelperArgs) -> Value {
    if args.positional(0).is_truthy() {
        args.positional(1).clone()
    } else {
        args.positional(2).clone()
    }
}

fn unless_helper(args: &HelperArgs) -> Value {
    if args.positional(0).is_truthy() {
        args.positional(2).clone()
    } else {
        args.positional(1).clone()
    }
}

fn concat(args: &HelperArgs) -> Value {
    Value::String(args.positional.iter().map(Value::to_string).collect())
}

fn eq(args: &HelperArgs) -> Value {
    Value::Bool(args.positional(0) == args.positional(1))
}

fn not(args: &HelperArgs) -> Value {
    Value::Bool(!args.positional(0).is_truthy())
}

/// First falsy argument, or the last one.
fn and(args: &HelperArgs) -> Value {
    args.positional
        .iter()
        .find(|v| !v.is_truthy())
        .or(args.positional.last())
        .cloned()
        .unwrap_or(Value::Bool(true))
}

/// First truthy argument, or the last one.
fn or(args: &HelperArgs) -> Value {
    args.positional
        .iter()
        .find(|v| v.is_truthy())
        .or(args.positional.last())
        .cloned()
        .unwrap_or(Value::Bool(false))
}

fn array(args: &HelperArgs) -> Value {
    Value::List(args.positional.clone())
}

fn hash(args: &HelperArgs) -> Value {
    Value::Map(args.named.clone())
}
