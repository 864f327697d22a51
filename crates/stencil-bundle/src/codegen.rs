//! Bytecode generation for one template
//!
//! Each template is emitted into its own buffer with template-relative block
//! targets. References to other units go through the shared symbol table.

use stencil_core::bytecode::{BytecodeWriter, SPLAT_MARKER};
use stencil_core::{CompilationPhase, Instruction, Locator, NO_BLOCK, Span, SymbolIndex, SymbolKind};
use stencil_syntax::{
    AttrNode, AttrPart, AttrValue, Block, BlockKind, Call, Element, Expr, Literal, Node, PathExpr,
    PathHead, Template,
};

use crate::delegate::CompilerDelegate;
use crate::errors::{BundleResult, CompileError, Referrer};
use crate::symbols::{SymbolEntry, SymbolTable};

/// Name reserved for `{{yield}}`.
const YIELD_KEYWORD: &str = "yield";

/// A same-bundle template reference that had no symbol-table entry.
#[derive(Clone, Debug)]
pub(crate) struct UnresolvedReference {
    pub locator: Locator,
    pub referrer: Referrer,
}

/// Code generator for a single template.
pub(crate) struct CodeGenerator<'a, D: CompilerDelegate> {
    delegate: &'a D,
    table: &'a mut SymbolTable,
    unresolved: &'a mut Vec<UnresolvedReference>,
    locator: &'a Locator,
    writer: BytecodeWriter,
    /// Block locals in scope; a local's slot is its position here.
    locals: Vec<String>,
}

impl<'a, D: CompilerDelegate> CodeGenerator<'a, D> {
    pub fn new(
        delegate: &'a D,
        table: &'a mut SymbolTable,
        unresolved: &'a mut Vec<UnresolvedReference>,
        locator: &'a Locator,
    ) -> Self {
        Self {
            delegate,
            table,
            unresolved,
            locator,
            writer: BytecodeWriter::new(),
            locals: Vec::new(),
        }
    }

    /// Compiles `template` and returns its bytecode, ending in `Return`.
    pub fn compile_template(mut self, template: &Template) -> BundleResult<Vec<u8>> {
        self.compile_nodes(&template.body)?;
        self.writer.emit(&Instruction::Return);
        Ok(self.writer.into_bytes())
    }

    fn error(&self, span: Span, message: impl Into<String>) -> CompileError {
        CompileError::new(self.locator.clone(), CompilationPhase::Codegen, span, message)
    }

    fn compile_nodes(&mut self, nodes: &[Node]) -> BundleResult<()> {
        for node in nodes {
            self.compile_node(node)?;
        }
        Ok(())
    }

    fn compile_node(&mut self, node: &Node) -> BundleResult<()> {
        match node {
            Node::Text(text) => {
                self.writer.emit(&Instruction::Text(text.value.clone()));
            }
            Node::Comment(comment) => {
                self.writer.emit(&Instruction::Comment(comment.value.clone()));
            }
            Node::Element(element) if element.is_component() => self.compile_component(element)?,
            Node::Element(element) => self.compile_element(element)?,
            Node::Mustache(mustache) => {
                self.compile_expr(&mustache.expr)?;
                let append = if mustache.trusted {
                    Instruction::AppendTrusted
                } else {
                    Instruction::Append
                };
                self.writer.emit(&append);
            }
            Node::Block(block) => self.compile_block(block)?,
            Node::Yield(node) => {
                for param in &node.params {
                    self.compile_expr(param)?;
                }
                self.writer
                    .emit(&Instruction::Yield(node.params.len() as u32));
            }
        }
        Ok(())
    }

    fn compile_element(&mut self, element: &Element) -> BundleResult<()> {
        self.writer
            .emit(&Instruction::OpenElement(element.tag.clone()));
        for attr in &element.attributes {
            match attr {
                AttrNode::Attribute(attribute) => match &attribute.value {
                    AttrValue::Static(value) => {
                        self.writer.emit(&Instruction::StaticAttr {
                            name: attribute.name.clone(),
                            value: value.clone(),
                        });
                    }
                    value => {
                        self.compile_attr_value(value)?;
                        self.writer
                            .emit(&Instruction::DynamicAttr(attribute.name.clone()));
                    }
                },
                AttrNode::Argument(argument) => {
                    return Err(self
                        .error(
                            argument.span,
                            format!(
                                "named argument `@{}` is only valid on components, not <{}>",
                                argument.name, element.tag
                            ),
                        )
                        .into());
                }
                AttrNode::Splattributes(_) => {
                    self.writer.emit(&Instruction::Splattributes);
                }
            }
        }
        self.writer.emit(&Instruction::FlushElement);
        self.compile_nodes(&element.children)?;
        self.writer.emit(&Instruction::CloseElement);
        Ok(())
    }

    fn compile_component(&mut self, element: &Element) -> BundleResult<()> {
        let Some(reference) = self.delegate.resolve_component(&element.tag, self.locator) else {
            return Err(self
                .error(
                    Span::new(element.span.start, element.span.start + element.tag.len() + 1),
                    format!("unknown component <{}>", element.tag),
                )
                .into());
        };

        let template = self.template_symbol(&reference.template);
        let component = self.table.intern(
            SymbolEntry::new(reference.component, SymbolKind::Component, element.tag.clone())
                .with_collection(self.delegate.collection_hint(SymbolKind::Component)),
        )?;
        let manager = self.table.intern(
            SymbolEntry::new(
                reference.manager,
                SymbolKind::ComponentManager,
                reference.manager_name,
            )
            .with_collection(self.delegate.collection_hint(SymbolKind::ComponentManager)),
        )?;

        // Attribute values are pushed before argument values.
        let mut attrs = Vec::new();
        for attr in &element.attributes {
            match attr {
                AttrNode::Attribute(attribute) => {
                    self.compile_attr_value(&attribute.value)?;
                    attrs.push(attribute.name.clone());
                }
                AttrNode::Splattributes(_) => attrs.push(SPLAT_MARKER.to_owned()),
                AttrNode::Argument(_) => {}
            }
        }
        let mut args = Vec::new();
        for attr in &element.attributes {
            if let AttrNode::Argument(argument) = attr {
                self.compile_attr_value(&argument.value)?;
                args.push(argument.name.clone());
            }
        }

        let has_block = !element.children.is_empty() || !element.block_params.is_empty();
        let mut invoke = Instruction::Invoke {
            template,
            component,
            manager,
            args,
            attrs,
            block: NO_BLOCK,
            block_params: element.block_params.len() as u32,
            end: NO_BLOCK,
        };
        let at = self.writer.emit(&invoke);
        let block_start = self.writer.position();
        if has_block {
            self.compile_scoped(&element.block_params, &element.children)?;
        }
        let end = self.writer.position();
        if let Instruction::Invoke {
            block: ref mut block_target,
            end: ref mut end_target,
            ..
        } = invoke
        {
            *block_target = if has_block { block_start } else { NO_BLOCK };
            *end_target = end;
        }
        self.writer.patch(at, &invoke);
        Ok(())
    }

    /// Symbol for a same-bundle template, recording it when it is missing.
    fn template_symbol(&mut self, locator: &Locator) -> SymbolIndex {
        match self.table.lookup(locator) {
            Some((index, entry)) if entry.kind == SymbolKind::Template => index,
            _ => {
                self.unresolved.push(UnresolvedReference {
                    locator: locator.clone(),
                    referrer: Referrer::Template(self.locator.clone()),
                });
                SymbolIndex(u32::MAX)
            }
        }
    }

    /// Emits a block body with `params` bound as locals, followed by `Return`.
    fn compile_scoped(&mut self, params: &[String], body: &[Node]) -> BundleResult<()> {
        let depth = self.locals.len();
        self.locals.extend(params.iter().cloned());
        let result = self.compile_nodes(body);
        self.locals.truncate(depth);
        result?;
        self.writer.emit(&Instruction::Return);
        Ok(())
    }

    fn compile_block(&mut self, block: &Block) -> BundleResult<()> {
        for param in &block.params {
            self.compile_expr(param)?;
        }
        match block.kind {
            BlockKind::If | BlockKind::Unless => {
                let at = self.writer.emit(&Instruction::If {
                    then: NO_BLOCK,
                    otherwise: NO_BLOCK,
                    end: NO_BLOCK,
                });
                let body_start = self.writer.position();
                self.compile_scoped(&[], &block.body)?;
                let inverse_start = match &block.inverse {
                    Some(inverse) => {
                        let start = self.writer.position();
                        self.compile_scoped(&[], inverse)?;
                        start
                    }
                    None => NO_BLOCK,
                };
                let end = self.writer.position();
                let (then, otherwise) = if block.kind == BlockKind::If {
                    (body_start, inverse_start)
                } else {
                    (inverse_start, body_start)
                };
                self.writer.patch(
                    at,
                    &Instruction::If {
                        then,
                        otherwise,
                        end,
                    },
                );
            }
            BlockKind::Each => {
                let params = block.block_params.len() as u32;
                let at = self.writer.emit(&Instruction::Each {
                    body: NO_BLOCK,
                    otherwise: NO_BLOCK,
                    end: NO_BLOCK,
                    params,
                });
                let body = self.writer.position();
                self.compile_scoped(&block.block_params, &block.body)?;
                let otherwise = match &block.inverse {
                    Some(inverse) => {
                        let start = self.writer.position();
                        self.compile_scoped(&[], inverse)?;
                        start
                    }
                    None => NO_BLOCK,
                };
                let end = self.writer.position();
                self.writer.patch(
                    at,
                    &Instruction::Each {
                        body,
                        otherwise,
                        end,
                        params,
                    },
                );
            }
            BlockKind::Let => {
                let values = block.params.len() as u32;
                let params = block.block_params.len() as u32;
                let at = self.writer.emit(&Instruction::Let {
                    values,
                    body: NO_BLOCK,
                    end: NO_BLOCK,
                    params,
                });
                let body = self.writer.position();
                self.compile_scoped(&block.block_params, &block.body)?;
                let end = self.writer.position();
                self.writer.patch(
                    at,
                    &Instruction::Let {
                        values,
                        body,
                        end,
                        params,
                    },
                );
            }
        }
        Ok(())
    }

    /// Pushes the value of a non-static attribute or argument.
    fn compile_attr_value(&mut self, value: &AttrValue) -> BundleResult<()> {
        match value {
            AttrValue::Static(text) => {
                self.writer.emit(&Instruction::PushString(text.clone()));
            }
            AttrValue::Mustache(expr) => self.compile_expr(expr)?,
            AttrValue::Interpolated(parts) => {
                for part in parts {
                    match part {
                        AttrPart::Text(text) => {
                            self.writer.emit(&Instruction::PushString(text.clone()));
                        }
                        AttrPart::Expr(expr) => self.compile_expr(expr)?,
                    }
                }
                self.writer.emit(&Instruction::Concat(parts.len() as u32));
            }
        }
        Ok(())
    }

    fn compile_expr(&mut self, expr: &Expr) -> BundleResult<()> {
        match expr {
            Expr::Literal(literal, _) => {
                self.writer.emit(&match literal {
                    Literal::String(s) => Instruction::PushString(s.clone()),
                    Literal::Number(n) => Instruction::PushNumber(*n),
                    Literal::Bool(b) => Instruction::PushBool(*b),
                    Literal::Null | Literal::Undefined => Instruction::PushNull,
                });
            }
            Expr::Path(path) => self.compile_path(path)?,
            Expr::Call(call) => self.compile_call(call)?,
        }
        Ok(())
    }

    fn local_slot(&self, name: &str) -> Option<u32> {
        self.locals
            .iter()
            .rposition(|local| local == name)
            .map(|slot| slot as u32)
    }

    fn compile_path(&mut self, path: &PathExpr) -> BundleResult<()> {
        let tail = path.tail.clone();
        let instruction = match &path.head {
            PathHead::This => Instruction::GetSelf { path: tail },
            PathHead::Arg(name) => Instruction::GetArg {
                name: name.clone(),
                path: tail,
            },
            PathHead::Var(name) => {
                if let Some(slot) = self.local_slot(name) {
                    Instruction::GetLocal { slot, path: tail }
                } else if name == YIELD_KEYWORD {
                    return Err(self
                        .error(path.span, "`yield` can only be used as `{{yield}}`")
                        .into());
                } else if tail.is_empty() && name.contains('-') {
                    return self.compile_helper_call(name, path.span, &[], &[]);
                } else {
                    let mut full = Vec::with_capacity(tail.len() + 1);
                    full.push(name.clone());
                    full.extend(tail);
                    Instruction::GetSelf { path: full }
                }
            }
        };
        self.writer.emit(&instruction);
        Ok(())
    }

    fn compile_call(&mut self, call: &Call) -> BundleResult<()> {
        let name = match call.callee.as_bare_name() {
            Some(name) if self.local_slot(name).is_none() => name,
            _ => {
                return Err(self
                    .error(
                        call.callee.span,
                        format!("`{}` cannot be called as a helper", call.callee),
                    )
                    .into());
            }
        };
        if name == YIELD_KEYWORD {
            return Err(self
                .error(call.callee.span, "`yield` can only be used as `{{yield}}`")
                .into());
        }
        self.compile_helper_call(name, call.callee.span, &call.params, &call.hash)
    }

    fn compile_helper_call(
        &mut self,
        name: &str,
        span: Span,
        params: &[Expr],
        hash: &[(String, Expr)],
    ) -> BundleResult<()> {
        let Some(reference) = self.delegate.resolve_helper(name, self.locator) else {
            return Err(self.error(span, format!("unknown helper `{}`", name)).into());
        };
        let collection = if reference.builtin {
            None
        } else {
            self.delegate.collection_hint(SymbolKind::Helper)
        };
        let helper = self.table.intern(
            SymbolEntry::new(reference.locator, SymbolKind::Helper, name)
                .with_collection(collection)
                .builtin(reference.builtin),
        )?;
        for param in params {
            self.compile_expr(param)?;
        }
        for (_, value) in hash {
            self.compile_expr(value)?;
        }
        self.writer.emit(&Instruction::CallHelper {
            helper,
            positional: params.len() as u32,
            named: hash.iter().map(|(key, _)| key.clone()).collect(),
        });
        Ok(())
    }
}
