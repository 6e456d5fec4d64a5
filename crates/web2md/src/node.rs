//! Parser-agnostic document tree consumed by the handlers.
//!
//! Any HTML parser can build this structure; [`crate::html`] does it for
//! `scraper`. The conversion engine only ever reads it.

use crate::utilities::is_inline_hidden;

/// Node kinds the converter distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Element node
    Element,
    /// Text node
    Text,
    /// Document or fragment root
    Document,
}

/// A node of the document tree: tag name, attributes, ordered children and text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Node type
    pub node_type: NodeType,

    /// Lowercase tag name for elements, `#text` / `#document` otherwise
    pub name: String,

    /// Text content for text nodes
    pub value: Option<String>,

    /// Attributes in source order
    pub attributes: Vec<(String, String)>,

    /// Child nodes
    pub children: Vec<Node>,
}

impl Node {
    /// Create a new element node
    pub fn element(tag_name: &str) -> Self {
        Self {
            node_type: NodeType::Element,
            name: tag_name.to_lowercase(),
            value: None,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create a new element node with attributes
    pub fn element_with_attrs(tag_name: &str, attrs: Vec<(&str, &str)>) -> Self {
        let mut node = Self::element(tag_name);
        node.attributes = attrs
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v.to_string()))
            .collect();
        node
    }

    /// Create a new text node
    pub fn text(content: &str) -> Self {
        Self {
            node_type: NodeType::Text,
            name: "#text".to_string(),
            value: Some(content.to_string()),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create a document root node
    pub fn document() -> Self {
        Self {
            node_type: NodeType::Document,
            name: "#document".to_string(),
            value: None,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style [`Node::add_child`]
    pub fn with_child(mut self, child: Node) -> Self {
        self.add_child(child);
        self
    }

    /// Builder-style text child
    pub fn with_text(self, content: &str) -> Self {
        self.with_child(Node::text(content))
    }

    /// Check if this is an element node
    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    /// Check if this is a text node
    pub fn is_text(&self) -> bool {
        self.node_type == NodeType::Text
    }

    /// Tag name (lowercase); empty for non-elements
    pub fn tag_name(&self) -> &str {
        if self.is_element() {
            &self.name
        } else {
            ""
        }
    }

    /// Whether this is an element with one of the given tag names
    pub fn is_tag(&self, names: &[&str]) -> bool {
        self.is_element() && names.contains(&self.name.as_str())
    }

    /// Get an attribute value by name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Check if an attribute exists
    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Whitespace separated tokens of the `class` attribute
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    /// Get all child nodes
    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.children.iter()
    }

    /// Get only element children
    pub fn element_children(&self) -> impl Iterator<Item = &Node> {
        self.children().filter(|n| n.is_element())
    }

    /// Element children with a given tag
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.element_children().filter(move |n| n.name == tag)
    }

    /// Add a child node
    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Text of a text node; for other nodes the concatenated text of all descendants
    pub fn text_content(&self) -> String {
        match self.node_type {
            NodeType::Text => self.value.clone().unwrap_or_default(),
            _ => {
                let mut out = String::new();
                self.collect_text(&mut out);
                out
            }
        }
    }

    fn collect_text(&self, out: &mut String) {
        match self.node_type {
            NodeType::Text => out.push_str(self.value.as_deref().unwrap_or("")),
            _ => self.children().for_each(|child| child.collect_text(out)),
        }
    }

    /// Whether the element is hidden by markup (`hidden` or inline `display: none`)
    pub fn is_hidden(&self) -> bool {
        self.is_element()
            && (self.has_attr("hidden") || self.attr("style").is_some_and(is_inline_hidden))
    }
}
