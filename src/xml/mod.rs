//! Read-only XML tree model shared by the WSDL index and the response
//! unmarshaller.
//!
//! The tree is built once from a text document and never mutated; all
//! traversal is top-down, either through the node itself or through the
//! search helpers in this module.

use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use std::io::BufRead;

use crate::error::Error;
use crate::wsdl::namespace::local_name;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    /// Tag name as written in the document, prefix included.
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: Option<String>,
}

impl XmlNode {
    fn new(name: String, attributes: Vec<(String, String)>) -> Self {
        Self {
            name,
            attributes,
            children: Vec::new(),
            text: None,
        }
    }

    /// Tag name with any namespace prefix stripped.
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Direct children whose raw (prefixed) tag name matches exactly.
    pub fn children_named<'a>(&'a self, name: &str) -> Vec<&'a XmlNode> {
        self.children
            .iter()
            .filter(|child| child.name == name)
            .collect()
    }
}

/// Parse a well-formed XML text into an owned tree.
pub fn parse(text: &str) -> Result<XmlNode, Error> {
    let mut reader = Reader::from_reader(text.as_bytes());
    reader.trim_text(true);

    let mut buffer = Vec::new();
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event(&mut buffer)? {
            Event::Start(start) => {
                let node = node_from_start(&reader, &start)?;
                stack.push(node);
            }

            Event::Empty(start) => {
                let node = node_from_start(&reader, &start)?;
                attach(&mut stack, &mut root, node)?;
            }

            Event::End(..) => {
                let node = stack
                    .pop()
                    .ok_or(Error::MalformedDocument("unexpected closing tag"))?;
                attach(&mut stack, &mut root, node)?;
            }

            Event::Text(text) => {
                let unescaped = text.unescaped()?;
                let value = reader.decode(unescaped.as_ref())?;
                append_text(&mut stack, value);
            }

            Event::CData(text) => {
                let value = reader.decode(&text)?;
                append_text(&mut stack, value);
            }

            Event::Eof => break,

            _ => (),
        }

        buffer.clear();
    }

    if !stack.is_empty() {
        return Err(Error::MalformedDocument("unclosed element at end of input"));
    }

    root.ok_or(Error::MalformedDocument("document has no root element"))
}

fn node_from_start<B: BufRead>(
    reader: &Reader<B>,
    start: &BytesStart<'_>,
) -> Result<XmlNode, Error> {
    let name = reader.decode(start.name())?.to_owned();

    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute?;
        let key = reader.decode(attribute.key)?.to_owned();
        let value = attribute.unescaped_value()?;
        let value = reader.decode(value.as_ref())?.to_owned();
        attributes.push((key, value));
    }

    Ok(XmlNode::new(name, attributes))
}

fn attach(
    stack: &mut Vec<XmlNode>,
    root: &mut Option<XmlNode>,
    node: XmlNode,
) -> Result<(), Error> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }

    if root.is_some() {
        return Err(Error::MalformedDocument("multiple root elements"));
    }

    *root = Some(node);
    Ok(())
}

fn append_text(stack: &mut [XmlNode], value: &str) {
    if value.is_empty() {
        return;
    }

    if let Some(node) = stack.last_mut() {
        match node.text {
            Some(ref mut text) => text.push_str(value),
            None => node.text = Some(value.to_owned()),
        }
    }
}

/// Find the first descendants matching a local name, ignoring namespace
/// prefixes.
///
/// Depth-first in document order; at the first level where a child's local
/// name matches, every sibling with that exact prefixed name is returned
/// together, so repeated elements (e.g. all `message` blocks) come back as
/// one group.
pub fn search_node<'a>(node: &'a XmlNode, name: &str) -> Option<Vec<&'a XmlNode>> {
    for child in &node.children {
        if local_name(&child.name) == name {
            return Some(node.children_named(&child.name));
        }

        if let Some(found) = search_node(child, name) {
            return Some(found);
        }
    }

    None
}

/// Find a direct child carrying the given attribute value.
pub fn search_node_by_attribute<'a>(
    node: &'a XmlNode,
    attribute: &str,
    value: &str,
) -> Option<&'a XmlNode> {
    node.children
        .iter()
        .find(|child| child.attribute(attribute) == Some(value))
}

/// Recursive search on the `name` attribute.
///
/// Strict first-match-wins: direct children are checked before descending,
/// and the first branch producing a match ends the search.
pub fn search_node_by_name_recursive<'a>(node: &'a XmlNode, name: &str) -> Option<&'a XmlNode> {
    if let Some(found) = search_node_by_attribute(node, "name", name) {
        return Some(found);
    }

    for child in &node.children {
        if let Some(found) = search_node_by_name_recursive(child, name) {
            return Some(found);
        }
    }

    None
}
