//! Template parser.
//!
//! Lexemes are winnow combinators over `&mut &str`; the structural parser
//! drives them and tracks byte offsets against the original source so every
//! error carries a span.

use derive_more::Display;
use winnow::combinator::{delimited, opt, preceded, repeat, terminated};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_until, take_while};

use crate::ast::*;

/// Malformed template source.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("parse error at {}..{}: {message}", span.start, span.end)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl std::error::Error for ParseError {}

type PResult<T> = Result<T, ParseError>;

/// Parses one template source.
pub fn parse_template(source: &str) -> Result<Template, ParseError> {
    let mut parser = TemplateParser {
        source,
        input: source,
    };
    let body = parser.content()?;
    if !parser.input.is_empty() {
        return parser.stray_terminator();
    }
    Ok(Template {
        body,
        span: Span::new(0, source.len()),
    })
}

// ============================================================================
// Lexemes
// ============================================================================

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '-')
}

fn ident<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (one_of(is_ident_start), take_while(0.., is_ident_char))
        .take()
        .parse_next(input)
}

/// Path segment after a `.`; may start with a digit for list indices.
fn segment<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., is_ident_char).parse_next(input)
}

fn tag_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic()),
        take_while(0.., |c: char| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')
        }),
    )
        .take()
        .parse_next(input)
}

fn attr_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| {
        !c.is_ascii_whitespace() && !matches!(c, '=' | '>' | '/' | '"' | '\'' | '<' | '{' | '}')
    })
    .parse_next(input)
}

fn unquoted_value<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| {
        !c.is_ascii_whitespace() && !matches!(c, '>' | '"' | '\'' | '<' | '`' | '=')
    })
    .parse_next(input)
}

fn string_lit(input: &mut &str) -> ModalResult<String> {
    let quote = one_of(['"', '\'']).parse_next(input)?;
    let mut result = String::new();
    loop {
        let c = any.parse_next(input)?;
        match c {
            c if c == quote => break,
            '\\' => result.push(any.parse_next(input)?),
            _ => result.push(c),
        }
    }
    Ok(result)
}

fn number<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (
        opt('-'),
        take_while(1.., |c: char| c.is_ascii_digit()),
        opt(('.', take_while(1.., |c: char| c.is_ascii_digit()))),
    )
        .take()
        .parse_next(input)
}

fn block_params<'a>(input: &mut &'a str) -> ModalResult<Vec<&'a str>> {
    (
        "as",
        take_while(1.., |c: char| c.is_ascii_whitespace()),
        '|',
        take_while(0.., |c: char| c.is_ascii_whitespace()),
    )
        .void()
        .parse_next(input)?;
    terminated(
        repeat(
            1..,
            terminated(ident, take_while(0.., |c: char| c.is_ascii_whitespace())),
        ),
        '|',
    )
    .parse_next(input)
}

fn html_comment<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    delimited("<!--", take_until(0.., "-->"), "-->").parse_next(input)
}

fn mustache_comment(input: &mut &str) -> ModalResult<()> {
    if input.starts_with("{{!--") {
        ("{{!--", take_until(0.., "--}}"), "--}}")
            .void()
            .parse_next(input)
    } else {
        ("{{!", take_until(0.., "}}"), "}}").void().parse_next(input)
    }
}

fn hash_key<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    terminated(ident, '=').parse_next(input)
}

// ============================================================================
// Character references
// ============================================================================

/// Decodes HTML character references. Unknown references stay literal.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        match decode_reference(rest) {
            Some((ch, len)) => {
                out.push(ch);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(s: &str) -> Option<(char, usize)> {
    let end = s.find(';').filter(|end| *end <= 10)?;
    let body = &s[1..end];
    let ch = match body {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        _ => {
            let digits = body.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None if digits.bytes().all(|b| b.is_ascii_digit()) => digits.parse().ok()?,
                None => return None,
            };
            char::from_u32(code)?
        }
    };
    Some((ch, end + 1))
}

// ============================================================================
// Structure
// ============================================================================

struct TemplateParser<'s> {
    source: &'s str,
    input: &'s str,
}

impl<'s> TemplateParser<'s> {
    fn offset(&self) -> usize {
        self.source.len() - self.input.len()
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.offset())
    }

    fn error<T>(&self, span: Span, message: impl Into<String>) -> PResult<T> {
        Err(ParseError::new(span, message))
    }

    /// Error pointing at the current position.
    fn error_here<T>(&self, message: impl Into<String>) -> PResult<T> {
        let start = self.offset();
        let end = self
            .input
            .chars()
            .next()
            .map_or(start, |c| start + c.len_utf8());
        self.error(Span::new(start, end), message)
    }

    /// Runs a lexeme parser, reporting `expected {what}` on failure.
    fn lex<T>(
        &mut self,
        what: &str,
        mut parser: impl Parser<&'s str, T, ErrMode<ContextError>>,
    ) -> PResult<T> {
        let checkpoint = self.input;
        match parser.parse_next(&mut self.input) {
            Ok(value) => Ok(value),
            Err(_) => {
                self.input = checkpoint;
                self.error_here(format!("expected {}", what))
            }
        }
    }

    fn expect(&mut self, literal: &str) -> PResult<()> {
        if self.eat(literal) {
            Ok(())
        } else if self.input.is_empty() {
            self.error_here(format!("expected `{}` but reached end of template", literal))
        } else {
            self.error_here(format!("expected `{}`", literal))
        }
    }

    fn eat(&mut self, literal: &str) -> bool {
        match self.input.strip_prefix(literal) {
            Some(rest) => {
                self.input = rest;
                true
            }
            None => false,
        }
    }

    fn skip_ws(&mut self) {
        self.input = self.input.trim_start_matches(|c: char| c.is_ascii_whitespace());
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.input
            .strip_prefix(keyword)
            .is_some_and(|rest| !rest.starts_with(is_ident_char))
    }

    fn at_else(&self) -> bool {
        self.input.strip_prefix("{{").is_some_and(|rest| {
            let rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
            rest.strip_prefix("else")
                .is_some_and(|after| !after.starts_with(is_ident_char))
        })
    }

    fn at_block_params(&self) -> bool {
        self.input.strip_prefix("as").is_some_and(|rest| {
            rest.starts_with(|c: char| c.is_ascii_whitespace())
                && rest.trim_start().starts_with('|')
        })
    }

    fn stray_terminator<T>(&self) -> PResult<T> {
        if self.input.starts_with("</") {
            self.error_here("closing tag without a matching start tag")
        } else if self.at_else() {
            self.error_here("`{{else}}` outside of a block")
        } else {
            self.error_here("block close without a matching `{{#...}}`")
        }
    }

    /// Parses nodes until end of input, a closing tag, `{{/...}}` or `{{else}}`.
    fn content(&mut self) -> PResult<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            let rest = self.input;
            if rest.is_empty() || rest.starts_with("</") || rest.starts_with("{{/") || self.at_else()
            {
                break;
            }
            if rest.starts_with("{{!") {
                self.lex("end of comment", mustache_comment)?;
            } else if rest.starts_with("{{{") {
                nodes.push(self.trusted_mustache()?);
            } else if rest.starts_with("{{#") {
                nodes.push(Node::Block(self.block()?));
            } else if rest.starts_with("{{") {
                nodes.push(self.mustache()?);
            } else if rest.starts_with("<!--") {
                let start = self.offset();
                let value = self.lex("`-->`", html_comment)?.to_owned();
                nodes.push(Node::Comment(TextNode {
                    value,
                    span: self.span_from(start),
                }));
            } else if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic())
            {
                nodes.push(Node::Element(self.element()?));
            } else {
                self.text(&mut nodes);
            }
        }
        Ok(nodes)
    }

    fn text(&mut self, nodes: &mut Vec<Node>) {
        let start = self.offset();
        let rest = self.input;
        let len = rest
            .char_indices()
            .skip(1)
            .find(|(i, _)| rest[*i..].starts_with('<') || rest[*i..].starts_with("{{"))
            .map_or(rest.len(), |(i, _)| i);
        self.input = &rest[len..];
        let value = decode_entities(&rest[..len]);
        match nodes.last_mut() {
            Some(Node::Text(prev)) if prev.span.end == start => {
                prev.value.push_str(&value);
                prev.span.end = start + len;
            }
            _ => nodes.push(Node::Text(TextNode {
                value,
                span: Span::new(start, start + len),
            })),
        }
    }

    fn mustache(&mut self) -> PResult<Node> {
        let start = self.offset();
        self.expect("{{")?;
        self.skip_ws();
        if self.at_keyword("yield") {
            self.eat("yield");
            let (params, hash) = self.arguments()?;
            if let Some((name, expr)) = hash.first() {
                return self.error(
                    expr.span(),
                    format!("`{{{{yield}}}}` does not take named arguments (found `{}`)", name),
                );
            }
            self.skip_ws();
            self.expect("}}")?;
            return Ok(Node::Yield(YieldNode {
                params,
                span: self.span_from(start),
            }));
        }
        let expr = self.call_or_expr()?;
        self.skip_ws();
        self.expect("}}")?;
        Ok(Node::Mustache(Mustache {
            expr,
            trusted: false,
            span: self.span_from(start),
        }))
    }

    fn trusted_mustache(&mut self) -> PResult<Node> {
        let start = self.offset();
        self.expect("{{{")?;
        self.skip_ws();
        let expr = self.call_or_expr()?;
        self.skip_ws();
        self.expect("}}}")?;
        Ok(Node::Mustache(Mustache {
            expr,
            trusted: true,
            span: self.span_from(start),
        }))
    }

    /// `expr` alone, or `callee params... key=value...`.
    fn call_or_expr(&mut self) -> PResult<Expr> {
        let start = self.offset();
        let head = self.expr()?;
        let (params, hash) = self.arguments()?;
        if params.is_empty() && hash.is_empty() {
            return Ok(head);
        }
        match head {
            Expr::Path(callee) => Ok(Expr::Call(Call {
                callee,
                params,
                hash,
                span: self.span_from(start),
            })),
            other => self.error(other.span(), "only a helper name can take arguments"),
        }
    }

    /// Positional and named arguments up to a closing delimiter or `as |`.
    fn arguments(&mut self) -> PResult<(Vec<Expr>, Vec<(Identifier, Expr)>)> {
        let mut params = Vec::new();
        let mut hash = Vec::new();
        loop {
            self.skip_ws();
            let rest = self.input;
            if rest.is_empty() {
                return self.error_here("unterminated expression");
            }
            if rest.starts_with('}') || rest.starts_with(')') || self.at_block_params() {
                break;
            }
            if let Ok(Some(key)) = opt(hash_key).parse_next(&mut self.input) {
                let value = self.expr()?;
                hash.push((key.to_owned(), value));
                continue;
            }
            let param = self.expr()?;
            if !hash.is_empty() {
                return self.error(param.span(), "positional argument after named argument");
            }
            params.push(param);
        }
        Ok((params, hash))
    }

    fn expr(&mut self) -> PResult<Expr> {
        let start = self.offset();
        let rest = self.input;
        if rest.starts_with('(') {
            return self.sub_expr();
        }
        if rest.starts_with(['"', '\'']) {
            let value = self.lex("closing quote", string_lit)?;
            return Ok(Expr::Literal(Literal::String(value), self.span_from(start)));
        }
        let starts_number = rest.starts_with(|c: char| c.is_ascii_digit())
            || (rest.starts_with('-') && rest[1..].starts_with(|c: char| c.is_ascii_digit()));
        if starts_number {
            let text = self.lex("a number", number)?;
            if self.input.starts_with(is_ident_char) {
                return self.error_here("unexpected character after number");
            }
            let span = self.span_from(start);
            return match text.parse::<f64>() {
                Ok(n) => Ok(Expr::Literal(Literal::Number(n), span)),
                Err(_) => self.error(span, format!("invalid number `{}`", text)),
            };
        }
        let head = if rest.starts_with('@') {
            PathHead::Arg(self.lex("an argument name", preceded('@', ident))?.to_owned())
        } else {
            match self.lex("an expression", ident)? {
                "this" => PathHead::This,
                name => PathHead::Var(name.to_owned()),
            }
        };
        let tail: Vec<&str> = self.lex("a path segment", repeat(0.., preceded('.', segment)))?;
        let span = self.span_from(start);
        if tail.is_empty() {
            if let PathHead::Var(name) = &head {
                let literal = match name.as_str() {
                    "true" => Some(Literal::Bool(true)),
                    "false" => Some(Literal::Bool(false)),
                    "null" => Some(Literal::Null),
                    "undefined" => Some(Literal::Undefined),
                    _ => None,
                };
                if let Some(literal) = literal {
                    return Ok(Expr::Literal(literal, span));
                }
            }
        }
        Ok(Expr::Path(PathExpr {
            head,
            tail: tail.into_iter().map(str::to_owned).collect(),
            span,
        }))
    }

    fn sub_expr(&mut self) -> PResult<Expr> {
        let start = self.offset();
        self.expect("(")?;
        self.skip_ws();
        let callee = match self.expr()? {
            Expr::Path(path) => path,
            other => return self.error(other.span(), "expected a helper name"),
        };
        let (params, hash) = self.arguments()?;
        self.skip_ws();
        self.expect(")")?;
        Ok(Expr::Call(Call {
            callee,
            params,
            hash,
            span: self.span_from(start),
        }))
    }

    fn block(&mut self) -> PResult<Block> {
        let start = self.offset();
        self.expect("{{#")?;
        self.skip_ws();
        let keyword_start = self.offset();
        let keyword = self.lex("a block keyword", ident)?;
        let Some(kind) = BlockKind::from_keyword(keyword) else {
            return self.error(
                self.span_from(keyword_start),
                format!("unknown block `{{{{#{}}}}}`", keyword),
            );
        };
        let mut block = self.block_branches(kind)?;

        let close_start = self.offset();
        if !self.input.starts_with("{{/") {
            return self.error(
                Span::new(start, self.offset()),
                format!("unclosed block `{{{{#{}}}}}`", keyword),
            );
        }
        self.expect("{{/")?;
        self.skip_ws();
        let closing = self.lex("a block keyword", ident)?;
        self.skip_ws();
        self.expect("}}")?;
        if closing != keyword {
            return self.error(
                self.span_from(close_start),
                format!(
                    "expected `{{{{/{}}}}}` but found `{{{{/{}}}}}`",
                    keyword, closing
                ),
            );
        }
        block.span = self.span_from(start);
        Ok(block)
    }

    /// Parses the rest of an opening tag, the body and any `{{else}}` branch,
    /// stopping before the closing `{{/...}}`.
    fn block_branches(&mut self, kind: BlockKind) -> PResult<Block> {
        let start = self.offset();
        let (params, hash) = self.arguments()?;
        if let Some((_, expr)) = hash.first() {
            return self.error(
                expr.span(),
                format!("`{{{{#{}}}}}` does not take named arguments", kind.keyword()),
            );
        }
        self.skip_ws();
        let params_start = self.offset();
        let names = if self.at_block_params() {
            self.lex("block parameters", block_params)?
        } else {
            Vec::new()
        };
        let block_params: Vec<Identifier> = names.into_iter().map(str::to_owned).collect();
        let params_span = self.span_from(params_start);
        self.skip_ws();
        self.expect("}}")?;

        match kind {
            BlockKind::If | BlockKind::Unless | BlockKind::Each if params.len() != 1 => {
                return self.error(
                    self.span_from(start),
                    format!("`{{{{#{}}}}}` takes exactly one argument", kind.keyword()),
                );
            }
            BlockKind::Let if params.is_empty() => {
                return self.error(self.span_from(start), "`{{#let}}` needs at least one value");
            }
            BlockKind::If | BlockKind::Unless if !block_params.is_empty() => {
                return self.error(
                    params_span,
                    format!("`{{{{#{}}}}}` does not take block parameters", kind.keyword()),
                );
            }
            BlockKind::Each if block_params.len() > 2 => {
                return self.error(params_span, "`{{#each}}` takes at most two block parameters");
            }
            BlockKind::Let if block_params.len() > params.len() => {
                return self.error(params_span, "more block parameters than `{{#let}}` values");
            }
            _ => {}
        }

        let body = self.content()?;
        let inverse = if self.at_else() {
            let else_start = self.offset();
            self.expect("{{")?;
            self.skip_ws();
            self.eat("else");
            self.skip_ws();
            if self.eat("}}") {
                Some(self.content()?)
            } else if self.at_keyword("if") && matches!(kind, BlockKind::If | BlockKind::Unless) {
                self.eat("if");
                let mut nested = self.block_branches(BlockKind::If)?;
                nested.span.start = else_start;
                Some(vec![Node::Block(nested)])
            } else {
                return self.error_here("expected `}}` or `if` after `else`");
            }
        } else {
            None
        };
        if kind == BlockKind::Let && inverse.is_some() {
            return self.error(self.span_from(start), "`{{#let}}` has no `{{else}}` branch");
        }
        if self.at_else() {
            return self.error_here("unexpected `{{else}}`");
        }
        Ok(Block {
            kind,
            params,
            block_params,
            body,
            inverse,
            span: self.span_from(start),
        })
    }

    fn element(&mut self) -> PResult<Element> {
        let start = self.offset();
        self.expect("<")?;
        let tag = self.lex("a tag name", tag_name)?.to_owned();
        let mut attributes = Vec::new();
        let mut block_params_list = Vec::new();
        let self_closing = loop {
            self.skip_ws();
            if self.eat("/>") {
                break true;
            }
            if self.eat(">") {
                break false;
            }
            if self.input.is_empty() {
                return self.error(self.span_from(start), format!("unclosed start tag <{}>", tag));
            }
            let attr_start = self.offset();
            if self.eat("...attributes") {
                attributes.push(AttrNode::Splattributes(self.span_from(attr_start)));
                continue;
            }
            if self.at_block_params() {
                let names = self.lex("block parameters", block_params)?;
                if !tag.starts_with(|c: char| c.is_ascii_uppercase()) {
                    return self.error(
                        self.span_from(attr_start),
                        "block parameters are only allowed on components",
                    );
                }
                block_params_list = names.into_iter().map(str::to_owned).collect();
                continue;
            }
            let is_argument = self.eat("@");
            let name = self.lex("an attribute name", attr_name)?.to_owned();
            let value = if self.eat("=") {
                self.attr_value()?
            } else {
                AttrValue::Static(String::new())
            };
            let attribute = Attribute {
                name,
                value,
                span: self.span_from(attr_start),
            };
            attributes.push(if is_argument {
                AttrNode::Argument(attribute)
            } else {
                AttrNode::Attribute(attribute)
            });
        };

        let mut element = Element {
            tag,
            attributes,
            block_params: block_params_list,
            children: Vec::new(),
            self_closing,
            span: Span::new(start, start),
        };
        if self_closing || (!element.is_component() && is_void_element(&element.tag)) {
            element.span = self.span_from(start);
            return Ok(element);
        }

        element.children = self.content()?;
        let close_start = self.offset();
        if !self.input.starts_with("</") {
            return self.error(
                Span::new(start, start + element.tag.len() + 1),
                format!("unclosed element <{}>", element.tag),
            );
        }
        self.expect("</")?;
        let closing = self.lex("a tag name", tag_name)?;
        self.skip_ws();
        self.expect(">")?;
        if closing != element.tag {
            return self.error(
                self.span_from(close_start),
                format!("expected </{}> but found </{}>", element.tag, closing),
            );
        }
        element.span = self.span_from(start);
        Ok(element)
    }

    fn attr_value(&mut self) -> PResult<AttrValue> {
        if self.input.starts_with("{{") {
            self.expect("{{")?;
            self.skip_ws();
            let expr = self.call_or_expr()?;
            self.skip_ws();
            self.expect("}}")?;
            return Ok(AttrValue::Mustache(expr));
        }
        let Some(quote) = self.input.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            let raw = self.lex("an attribute value", unquoted_value)?;
            return Ok(AttrValue::Static(decode_entities(raw)));
        };
        let open = self.offset();
        self.input = &self.input[1..];

        let mut parts = Vec::new();
        let mut text = String::new();
        loop {
            let Some(c) = self.input.chars().next() else {
                return self.error(Span::new(open, self.offset()), "unterminated attribute value");
            };
            if c == quote {
                self.input = &self.input[1..];
                break;
            }
            if self.input.starts_with("{{") {
                if !text.is_empty() {
                    parts.push(AttrPart::Text(decode_entities(&std::mem::take(&mut text))));
                }
                self.expect("{{")?;
                self.skip_ws();
                let expr = self.call_or_expr()?;
                self.skip_ws();
                self.expect("}}")?;
                parts.push(AttrPart::Expr(expr));
                continue;
            }
            text.push(c);
            self.input = &self.input[c.len_utf8()..];
        }
        if !text.is_empty() {
            parts.push(AttrPart::Text(decode_entities(&text)));
        }
        Ok(match parts.as_slice() {
            [] => AttrValue::Static(String::new()),
            [AttrPart::Text(text)] => AttrValue::Static(text.clone()),
            _ => AttrValue::Interpolated(parts),
        })
    }
}
