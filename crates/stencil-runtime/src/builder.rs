//! Output builders
//!
//! The renderer drives a [`TreeBuilder`]. Attributes arrive between
//! `open_element` and `flush_element`, already resolved and deduplicated.

use std::fmt::Write as _;

pub use stencil_core::{VOID_ELEMENTS, is_void_element};

pub trait TreeBuilder {
    fn open_element(&mut self, tag: &str);
    fn set_attribute(&mut self, name: &str, value: &str);
    fn flush_element(&mut self);
    fn close_element(&mut self);
    fn append_text(&mut self, text: &str);
    fn append_comment(&mut self, text: &str);
    /// Appends markup verbatim.
    fn append_html(&mut self, html: &str);
}

impl<B: TreeBuilder + ?Sized> TreeBuilder for &mut B {
    fn open_element(&mut self, tag: &str) {
        (**self).open_element(tag)
    }
    fn set_attribute(&mut self, name: &str, value: &str) {
        (**self).set_attribute(name, value)
    }
    fn flush_element(&mut self) {
        (**self).flush_element()
    }
    fn close_element(&mut self) {
        (**self).close_element()
    }
    fn append_text(&mut self, text: &str) {
        (**self).append_text(text)
    }
    fn append_comment(&mut self, text: &str) {
        (**self).append_comment(text)
    }
    fn append_html(&mut self, html: &str) {
        (**self).append_html(html)
    }
}

pub fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

pub fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

/// Serializes straight into an HTML string.
#[derive(Debug, Default)]
pub struct StringBuilder {
    html: String,
    open: Vec<String>,
}

impl StringBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.html
    }

    pub fn into_string(self) -> String {
        self.html
    }
}

impl TreeBuilder for StringBuilder {
    fn open_element(&mut self, tag: &str) {
        self.html.push('<');
        self.html.push_str(tag);
        self.open.push(tag.to_owned());
    }

    fn set_attribute(&mut self, name: &str, value: &str) {
        let _ = write!(self.html, " {}=\"", name);
        escape_attribute(value, &mut self.html);
        self.html.push('"');
    }

    fn flush_element(&mut self) {
        self.html.push('>');
    }

    fn close_element(&mut self) {
        if let Some(tag) = self.open.pop() {
            if !is_void_element(&tag) {
                let _ = write!(self.html, "</{}>", tag);
            }
        }
    }

    fn append_text(&mut self, text: &str) {
        escape_text(text, &mut self.html);
    }

    fn append_comment(&mut self, text: &str) {
        let _ = write!(self.html, "<!--{}-->", text);
    }

    fn append_html(&mut self, html: &str) {
        self.html.push_str(html);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum BuildOp {
    Open(String),
    Attribute(String, String),
    Flush,
    Close,
    Text(String),
    Comment(String),
    Html(String),
}

/// Detached output, replayed onto the real builder only once rendering
/// has succeeded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fragment {
    ops: Vec<BuildOp>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn replay(&self, target: &mut dyn TreeBuilder) {
        for op in &self.ops {
            match op {
                BuildOp::Open(tag) => target.open_element(tag),
                BuildOp::Attribute(name, value) => target.set_attribute(name, value),
                BuildOp::Flush => target.flush_element(),
                BuildOp::Close => target.close_element(),
                BuildOp::Text(text) => target.append_text(text),
                BuildOp::Comment(text) => target.append_comment(text),
                BuildOp::Html(html) => target.append_html(html),
            }
        }
    }
}

impl TreeBuilder for Fragment {
    fn open_element(&mut self, tag: &str) {
        self.ops.push(BuildOp::Open(tag.to_owned()));
    }
    fn set_attribute(&mut self, name: &str, value: &str) {
        self.ops
            .push(BuildOp::Attribute(name.to_owned(), value.to_owned()));
    }
    fn flush_element(&mut self) {
        self.ops.push(BuildOp::Flush);
    }
    fn close_element(&mut self) {
        self.ops.push(BuildOp::Close);
    }
    fn append_text(&mut self, text: &str) {
        self.ops.push(BuildOp::Text(text.to_owned()));
    }
    fn append_comment(&mut self, text: &str) {
        self.ops.push(BuildOp::Comment(text.to_owned()));
    }
    fn append_html(&mut self, html: &str) {
        self.ops.push(BuildOp::Html(html.to_owned()));
    }
}
