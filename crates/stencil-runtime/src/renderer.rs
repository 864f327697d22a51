//! Synchronous bytecode renderer
//!
//! Executes a template from its entry offset until `Return`, evaluating
//! expressions on a value stack and writing into a detached [`Fragment`].
//! The fragment is replayed onto the caller's builder only when the whole
//! render succeeds, so a failed render leaves the builder untouched.

use std::rc::Rc;
use std::sync::Arc;

use stencil_core::bytecode::SPLAT_MARKER;
use stencil_core::{Instruction, Locator, NO_BLOCK, NamedArgs, SymbolIndex, SymbolKind, Value};

use crate::builder::{Fragment, TreeBuilder};
use crate::builtins::{BuiltinHelper, builtin_helper};
use crate::component::{
    BasicComponentManager, Component, ComponentDefinition, ComponentManager, Helper, HelperArgs,
};
use crate::errors::RenderError;
use crate::loader::{Program, Symbol};
use crate::resolver::{Resolver, Specifier};

pub const DEFAULT_RECURSION_LIMIT: usize = 256;

pub trait Renderer: Send + Sync {
    /// Renders `entry` with `this` as the root receiver.
    fn render(
        &self,
        program: &Program,
        entry: &Locator,
        this: Value,
        resolver: &Resolver<'_>,
        builder: &mut dyn TreeBuilder,
    ) -> Result<(), RenderError>;
}

#[derive(Clone, Copy, Debug)]
pub struct SyncRenderer {
    recursion_limit: usize,
}

impl Default for SyncRenderer {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

impl SyncRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum depth of nested component invocations.
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }
}

impl Renderer for SyncRenderer {
    fn render(
        &self,
        program: &Program,
        entry: &Locator,
        this: Value,
        resolver: &Resolver<'_>,
        builder: &mut dyn TreeBuilder,
    ) -> Result<(), RenderError> {
        let index = program
            .entry(entry)
            .ok_or_else(|| RenderError::UnknownEntry(entry.clone()))?;
        let mut interpreter = Interpreter::new(program, resolver, self.recursion_limit);
        let code = interpreter.template_code(index)?;
        let root = Rc::new(Scope {
            this: Rc::new(this),
            args: Rc::default(),
            attrs: Rc::default(),
            locals: Vec::new(),
            block: None,
        });
        interpreter.run(code, 0, &root)?;
        tracing::debug!(entry = %entry, "rendered");
        interpreter.out.replay(builder);
        Ok(())
    }
}

/// Lexical environment of one running block.
struct Scope<'a> {
    this: Rc<Value>,
    args: Rc<NamedArgs>,
    /// Attributes forwarded by the invoking element.
    attrs: Rc<Vec<(String, Value)>>,
    locals: Vec<Value>,
    /// The caller's block, rendered by `Yield`.
    block: Option<BlockRef<'a>>,
}

impl<'a> Scope<'a> {
    fn with_locals(&self, values: impl IntoIterator<Item = Value>) -> Scope<'a> {
        let mut locals = self.locals.clone();
        locals.extend(values);
        Scope {
            this: self.this.clone(),
            args: self.args.clone(),
            attrs: self.attrs.clone(),
            locals,
            block: self.block.clone(),
        }
    }
}

#[derive(Clone)]
struct BlockRef<'a> {
    code: &'a [u8],
    start: usize,
    params: usize,
    scope: Rc<Scope<'a>>,
}

/// Exactly `params` block arguments, padded with `null`.
fn bind(values: Vec<Value>, params: usize) -> impl Iterator<Item = Value> {
    values
        .into_iter()
        .chain(std::iter::repeat(Value::Null))
        .take(params)
}

#[derive(Clone)]
enum HelperImpl {
    Registered(Arc<dyn Helper>),
    Builtin(BuiltinHelper),
    Absent,
}

#[derive(Clone)]
enum Resolved {
    Helper(HelperImpl),
    Component(Option<Arc<dyn Component>>),
    Manager(Arc<dyn ComponentManager>),
}

struct PendingElement {
    tag: String,
    attrs: Vec<(String, String)>,
}

fn malformed(msg: impl Into<String>) -> RenderError {
    RenderError::Malformed(msg.into())
}

struct Interpreter<'a, 'r> {
    program: &'a Program,
    resolver: &'a Resolver<'r>,
    /// Resolutions by symbol index, filled on first use.
    cache: Vec<Option<Resolved>>,
    stack: Vec<Value>,
    element: Option<PendingElement>,
    out: Fragment,
    depth: usize,
    limit: usize,
}

impl<'a, 'r> Interpreter<'a, 'r> {
    fn new(program: &'a Program, resolver: &'a Resolver<'r>, limit: usize) -> Self {
        Self {
            program,
            resolver,
            cache: vec![None; program.symbols().len()],
            stack: Vec::new(),
            element: None,
            out: Fragment::new(),
            depth: 0,
            limit,
        }
    }

    fn run(&mut self, code: &'a [u8], start: usize, scope: &Rc<Scope<'a>>) -> Result<(), RenderError> {
        let mut pc = start;
        loop {
            let (instruction, next) =
                Instruction::decode(code, pc).map_err(|e| malformed(e.to_string()))?;
            pc = next;
            match instruction {
                Instruction::Text(text) => self.out.append_text(&text),
                Instruction::Comment(text) => self.out.append_comment(&text),
                Instruction::OpenElement(tag) => {
                    if let Some(pending) = &self.element {
                        return Err(malformed(format!(
                            "<{}> opened inside the unflushed <{}>",
                            tag, pending.tag
                        )));
                    }
                    self.element = Some(PendingElement {
                        tag,
                        attrs: Vec::new(),
                    });
                }
                Instruction::StaticAttr { name, value } => {
                    self.set_attribute(&name, &Value::String(value))?;
                }
                Instruction::DynamicAttr(name) => {
                    let value = self.pop()?;
                    self.set_attribute(&name, &value)?;
                }
                Instruction::Splattributes => {
                    for (name, value) in scope.attrs.iter() {
                        self.set_attribute(name, value)?;
                    }
                }
                Instruction::FlushElement => {
                    let element = self
                        .element
                        .take()
                        .ok_or_else(|| malformed("flush without an open element"))?;
                    self.out.open_element(&element.tag);
                    for (name, value) in &element.attrs {
                        self.out.set_attribute(name, value);
                    }
                    self.out.flush_element();
                }
                Instruction::CloseElement => self.out.close_element(),
                Instruction::Append => {
                    let text = self.pop()?.to_string();
                    if !text.is_empty() {
                        self.out.append_text(&text);
                    }
                }
                Instruction::AppendTrusted => {
                    let html = self.pop()?.to_string();
                    if !html.is_empty() {
                        self.out.append_html(&html);
                    }
                }
                Instruction::PushString(s) => self.stack.push(Value::String(s)),
                Instruction::PushNumber(n) => self.stack.push(Value::Number(n)),
                Instruction::PushBool(b) => self.stack.push(Value::Bool(b)),
                Instruction::PushNull => self.stack.push(Value::Null),
                Instruction::GetSelf { path } => self.stack.push(scope.this.get_path(&path)),
                Instruction::GetArg { name, path } => {
                    let value = scope
                        .args
                        .get(&name)
                        .map_or(Value::Null, |arg| arg.get_path(&path));
                    self.stack.push(value);
                }
                Instruction::GetLocal { slot, path } => {
                    let local = scope
                        .locals
                        .get(slot as usize)
                        .ok_or_else(|| malformed(format!("local slot {} is not bound", slot)))?;
                    self.stack.push(local.get_path(&path));
                }
                Instruction::Concat(count) => {
                    let parts = self.pop_n(count as usize)?;
                    let joined = parts.iter().map(Value::to_string).collect();
                    self.stack.push(Value::String(joined));
                }
                Instruction::CallHelper {
                    helper,
                    positional,
                    named,
                } => {
                    let result = self.call_helper(helper, positional as usize, named)?;
                    self.stack.push(result);
                }
                Instruction::If {
                    then,
                    otherwise,
                    end,
                } => {
                    let target = if self.pop()?.is_truthy() {
                        then
                    } else {
                        otherwise
                    };
                    if target != NO_BLOCK {
                        self.run(code, target as usize, scope)?;
                    }
                    pc = end as usize;
                }
                Instruction::Each {
                    body,
                    otherwise,
                    end,
                    params,
                } => {
                    let items = match self.pop()? {
                        Value::List(items) => items,
                        _ => Vec::new(),
                    };
                    if items.is_empty() {
                        if otherwise != NO_BLOCK {
                            self.run(code, otherwise as usize, scope)?;
                        }
                    } else {
                        for (index, item) in items.into_iter().enumerate() {
                            let bound = bind(vec![item, Value::from(index as f64)], params as usize);
                            let child = Rc::new(scope.with_locals(bound));
                            self.run(code, body as usize, &child)?;
                        }
                    }
                    pc = end as usize;
                }
                Instruction::Let {
                    values,
                    body,
                    end,
                    params,
                } => {
                    let bound = self.pop_n(values as usize)?;
                    let child = Rc::new(scope.with_locals(bind(bound, params as usize)));
                    self.run(code, body as usize, &child)?;
                    pc = end as usize;
                }
                Instruction::Invoke {
                    template,
                    component,
                    manager,
                    args,
                    attrs,
                    block,
                    block_params,
                    end,
                } => {
                    let arg_values = self.pop_n(args.len())?;
                    let attr_count = attrs.iter().filter(|name| *name != SPLAT_MARKER).count();
                    let mut attr_values = self.pop_n(attr_count)?.into_iter();

                    let mut forwarded = Vec::new();
                    for name in attrs {
                        if name == SPLAT_MARKER {
                            forwarded.extend(scope.attrs.iter().cloned());
                        } else if let Some(value) = attr_values.next() {
                            forwarded.push((name, value));
                        }
                    }
                    let named: NamedArgs = args.into_iter().zip(arg_values).collect();
                    let this = self.instantiate(component, manager, &named)?;

                    let callee = Rc::new(Scope {
                        this: Rc::new(this),
                        args: Rc::new(named),
                        attrs: Rc::new(forwarded),
                        locals: Vec::new(),
                        block: (block != NO_BLOCK).then(|| BlockRef {
                            code,
                            start: block as usize,
                            params: block_params as usize,
                            scope: scope.clone(),
                        }),
                    });
                    let callee_code = self.template_code(template)?;

                    if self.depth >= self.limit {
                        return Err(RenderError::RecursionLimit(self.limit));
                    }
                    self.depth += 1;
                    let result = self.run(callee_code, 0, &callee);
                    self.depth -= 1;
                    result?;
                    pc = end as usize;
                }
                Instruction::Yield(count) => {
                    let values = self.pop_n(count as usize)?;
                    if let Some(block) = &scope.block {
                        let child = Rc::new(block.scope.with_locals(bind(values, block.params)));
                        self.run(block.code, block.start, &child)?;
                    }
                }
                Instruction::Return => return Ok(()),
            }
        }
    }

    fn pop(&mut self) -> Result<Value, RenderError> {
        self.stack.pop().ok_or_else(|| malformed("stack underflow"))
    }

    fn pop_n(&mut self, count: usize) -> Result<Vec<Value>, RenderError> {
        let at = self
            .stack
            .len()
            .checked_sub(count)
            .ok_or_else(|| malformed("stack underflow"))?;
        Ok(self.stack.split_off(at))
    }

    /// `null` and `false` remove the attribute, `true` sets it empty; a
    /// later value for the same name replaces the earlier one.
    fn set_attribute(&mut self, name: &str, value: &Value) -> Result<(), RenderError> {
        let element = self
            .element
            .as_mut()
            .ok_or_else(|| malformed(format!("attribute `{}` outside an open element", name)))?;
        let rendered = match value {
            Value::Null | Value::Bool(false) => None,
            Value::Bool(true) => Some(String::new()),
            other => Some(other.to_string()),
        };
        let existing = element.attrs.iter().position(|(n, _)| n == name);
        match (existing, rendered) {
            (Some(at), Some(rendered)) => element.attrs[at].1 = rendered,
            (Some(at), None) => {
                element.attrs.remove(at);
            }
            (None, Some(rendered)) => element.attrs.push((name.to_owned(), rendered)),
            (None, None) => {}
        }
        Ok(())
    }

    fn symbol(&self, index: SymbolIndex) -> Result<&'a Symbol, RenderError> {
        self.program
            .symbol(index)
            .ok_or_else(|| malformed(format!("symbol {} is outside the table", index)))
    }

    fn template_code(&self, index: SymbolIndex) -> Result<&'a [u8], RenderError> {
        self.program
            .code(index)
            .ok_or_else(|| malformed(format!("symbol {} has no bytecode", index)))
    }

    fn resolve(&mut self, index: SymbolIndex) -> Result<Resolved, RenderError> {
        if let Some(Some(resolved)) = self.cache.get(index.index()) {
            return Ok(resolved.clone());
        }
        let symbol = self.symbol(index)?;
        let specifier = Specifier::for_symbol(symbol);
        let resolved = match symbol.kind {
            SymbolKind::Helper => Resolved::Helper(match self.resolver.helper(&specifier)? {
                Some(helper) => HelperImpl::Registered(helper),
                None if symbol.builtin => builtin_helper(&symbol.name)
                    .map_or(HelperImpl::Absent, HelperImpl::Builtin),
                None => HelperImpl::Absent,
            }),
            SymbolKind::Component => Resolved::Component(self.resolver.component(&specifier)?),
            SymbolKind::ComponentManager => Resolved::Manager(
                self.resolver
                    .manager(&specifier)?
                    .unwrap_or_else(|| Arc::new(BasicComponentManager)),
            ),
            SymbolKind::Template => {
                return Err(malformed(format!("{} is a template, not a runtime symbol", index)));
            }
        };
        tracing::trace!(symbol = %symbol.locator, "resolved symbol");
        if let Some(slot) = self.cache.get_mut(index.index()) {
            *slot = Some(resolved.clone());
        }
        Ok(resolved)
    }

    fn call_helper(
        &mut self,
        helper: SymbolIndex,
        positional: usize,
        named: Vec<String>,
    ) -> Result<Value, RenderError> {
        let mut values = self.pop_n(positional + named.len())?;
        let named_values = values.split_off(positional);
        let args = HelperArgs {
            positional: values,
            named: named.into_iter().zip(named_values).collect(),
        };
        match self.resolve(helper)? {
            Resolved::Helper(HelperImpl::Registered(helper)) => Ok(helper.compute(&args)),
            Resolved::Helper(HelperImpl::Builtin(helper)) => Ok(helper(&args)),
            Resolved::Helper(HelperImpl::Absent) => Ok(Value::Null),
            _ => Err(malformed(format!("symbol {} is not a helper", helper))),
        }
    }

    fn instantiate(
        &mut self,
        component: SymbolIndex,
        manager: SymbolIndex,
        args: &NamedArgs,
    ) -> Result<Value, RenderError> {
        let symbol = self.symbol(component)?;
        let Resolved::Component(implementation) = self.resolve(component)? else {
            return Err(malformed(format!("symbol {} is not a component", component)));
        };
        let Resolved::Manager(manager) = self.resolve(manager)? else {
            return Err(malformed(format!("symbol {} is not a component manager", manager)));
        };
        let definition = ComponentDefinition {
            name: &symbol.name,
            locator: &symbol.locator,
            component: implementation.as_deref(),
        };
        Ok(manager.create(&definition, args))
    }
}
