//! Owned element tree for rendered documents
//!
//! The renderer produces an [`Element`] tree rather than a string so that
//! interactive state (collapse flags, sort order, outline highlighting) can be
//! applied to the rendered output after the fact. Text nodes are escaped on
//! serialization; raw nodes hold markup that was already produced by the text
//! formatter or supplied by the document author.

use crate::text_format::{escape_html, strip_markup};

/// Elements that never have children or a closing tag
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "meta", "link", "wbr", "col"];

/// A node in the rendered tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A nested element
    Element(Element),
    /// Plain text, escaped when serialized
    Text(String),
    /// Markup emitted verbatim
    Raw(String),
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

/// An element with ordered attributes and children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// Tag name (lowercase)
    pub tag: String,
    /// Attributes in insertion order; an empty value serializes as a bare name
    pub attrs: Vec<(String, String)>,
    /// Child nodes
    pub children: Vec<Node>,
}

impl Element {
    /// Create an empty element
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder: set an attribute
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder: append a child
    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Builder: append a text node
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Builder: append raw markup
    pub fn with_raw(mut self, markup: impl Into<String>) -> Self {
        self.children.push(Node::Raw(markup.into()));
        self
    }

    /// Append a child
    pub fn push(&mut self, child: impl Into<Node>) {
        self.children.push(child.into());
    }

    /// Get an attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing any previous value in place
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    /// Remove an attribute, returning whether it was present
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|(key, _)| key != name);
        before != self.attrs.len()
    }

    /// Whether the attribute is present
    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// The `id` attribute
    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// Whether the `class` attribute contains `class_name`
    pub fn has_class(&self, class_name: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class_name))
    }

    /// Add a class if not already present
    pub fn add_class(&mut self, class_name: &str) {
        if self.has_class(class_name) {
            return;
        }
        let classes = match self.attr("class") {
            Some(existing) if !existing.is_empty() => format!("{} {}", existing, class_name),
            _ => class_name.to_string(),
        };
        self.set_attr("class", classes);
    }

    /// Remove a class if present
    pub fn remove_class(&mut self, class_name: &str) {
        let Some(existing) = self.attr("class") else {
            return;
        };
        let remaining: Vec<&str> = existing
            .split_whitespace()
            .filter(|c| *c != class_name)
            .collect();
        if remaining.is_empty() {
            self.remove_attr("class");
        } else {
            let joined = remaining.join(" ");
            self.set_attr("class", joined);
        }
    }

    /// Child elements (skipping text and raw nodes)
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Mutable child elements (skipping text and raw nodes)
    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// All elements of the subtree in document order, including `self`
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        self.collect_descendants(&mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, out: &mut Vec<&'a Element>) {
        out.push(self);
        for child in self.child_elements() {
            child.collect_descendants(out);
        }
    }

    /// First element in document order matching `predicate`
    pub fn find(&self, predicate: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        if predicate(self) {
            return Some(self);
        }
        self.child_elements().find_map(|child| child.find(predicate))
    }

    /// Mutable variant of [`Element::find`]
    pub fn find_mut(&mut self, predicate: &dyn Fn(&Element) -> bool) -> Option<&mut Element> {
        if predicate(self) {
            return Some(self);
        }
        self.child_elements_mut()
            .find_map(|child| child.find_mut(predicate))
    }

    /// Find the element carrying `id`
    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        self.find(&|element| element.id() == Some(id))
    }

    /// Find the element carrying `id`, mutably
    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.find_mut(&|element| element.id() == Some(id))
    }

    /// Ancestors of the element carrying `id`, outermost first, excluding the
    /// element itself. `None` when no such element exists.
    pub fn ancestors_of(&self, id: &str) -> Option<Vec<&Element>> {
        if self.id() == Some(id) {
            return Some(Vec::new());
        }
        for child in self.child_elements() {
            if let Some(mut chain) = child.ancestors_of(id) {
                chain.insert(0, self);
                return Some(chain);
            }
        }
        None
    }

    /// Concatenated text of the subtree
    ///
    /// Subtrees marked `aria-hidden="true"` are skipped, so decorative
    /// indicators do not leak into extracted text. Raw markup contributes its
    /// visible text.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if self.attr("aria-hidden") == Some("true") {
            return;
        }
        for child in &self.children {
            match child {
                Node::Element(element) => element.collect_text(out),
                Node::Text(text) => out.push_str(text),
                Node::Raw(markup) => out.push_str(&strip_markup(markup)),
            }
        }
    }

    /// Serialize the subtree to HTML
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    /// Serialize the subtree into `out`
    pub fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            if !value.is_empty() {
                out.push_str("=\"");
                out.push_str(&escape_html(value));
                out.push('"');
            }
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&self.tag.as_str()) {
            return;
        }

        for child in &self.children {
            match child {
                Node::Element(element) => element.write_html(out),
                Node::Text(text) => out.push_str(&escape_html(text)),
                Node::Raw(markup) => out.push_str(markup),
            }
        }

        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}
