//! A minimal in-memory document and the builder that appends to it

use crate::builder::{TreeBuilder, escape_attribute, escape_text, is_void_element};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    /// Trusted markup kept verbatim.
    Raw(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        collect_text(&self.children, &mut text);
        text
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => collect_text(&element.children, out),
            Node::Comment(_) | Node::Raw(_) => {}
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    pub body: Element,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            body: Element::new("body"),
        }
    }
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Appends rendered output to the end of a document's body.
#[derive(Debug, Default)]
pub struct DomBuilder {
    document: Document,
    open: Vec<Element>,
}

impl DomBuilder {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            open: Vec::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Closes anything still open and returns the document.
    pub fn into_document(mut self) -> Document {
        while !self.open.is_empty() {
            self.close_element();
        }
        self.document
    }

    fn append(&mut self, node: Node) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.document.body.children.push(node),
        }
    }
}

impl TreeBuilder for DomBuilder {
    fn open_element(&mut self, tag: &str) {
        self.open.push(Element::new(tag));
    }

    fn set_attribute(&mut self, name: &str, value: &str) {
        if let Some(element) = self.open.last_mut() {
            element.attributes.push((name.to_owned(), value.to_owned()));
        }
    }

    fn flush_element(&mut self) {}

    fn close_element(&mut self) {
        if let Some(element) = self.open.pop() {
            self.append(Node::Element(element));
        }
    }

    fn append_text(&mut self, text: &str) {
        // Merge with a preceding text node.
        let siblings = match self.open.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.document.body.children,
        };
        match siblings.last_mut() {
            Some(Node::Text(previous)) => previous.push_str(text),
            _ => siblings.push(Node::Text(text.to_owned())),
        }
    }

    fn append_comment(&mut self, text: &str) {
        self.append(Node::Comment(text.to_owned()));
    }

    fn append_html(&mut self, html: &str) {
        self.append(Node::Raw(html.to_owned()));
    }
}

/// Serializes an element's children as HTML.
pub fn serialize_children(element: &Element) -> String {
    let mut html = String::new();
    for node in &element.children {
        serialize_node(node, &mut html);
    }
    html
}

fn serialize_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => escape_text(text, out),
        Node::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        Node::Raw(html) => out.push_str(html),
        Node::Element(element) => {
            out.push('<');
            out.push_str(&element.tag);
            for (name, value) in &element.attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_attribute(value, out);
                out.push('"');
            }
            out.push('>');
            if is_void_element(&element.tag) {
                return;
            }
            for child in &element.children {
                serialize_node(child, out);
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
    }
}
