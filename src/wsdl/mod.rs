//! WSDL index: the parsed document plus name/attribute search over it.
//!
//! Construction is lenient (any well-formed XML is accepted); the required
//! sections are only enforced when an operation is actually resolved, so a
//! structurally poor WSDL fails at first method resolution rather than up
//! front.

use tracing::debug;

use crate::error::Error;
use crate::xml::{self, XmlNode};

pub mod namespace;

mod params;

pub use params::{MessageShape, MethodDescriptor, Parameter};

pub struct Wsdl {
    root: XmlNode,
}

impl Wsdl {
    /// Parse WSDL text. Fails only on malformed XML.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let root = xml::parse(text)?;
        debug!(root = %root.name, "parsed wsdl document");
        Ok(Self { root })
    }

    pub fn root(&self) -> &XmlNode {
        &self.root
    }

    /// Every `portType` block at the first matching depth.
    pub fn port_types(&self) -> Vec<&XmlNode> {
        xml::search_node(&self.root, "portType").unwrap_or_default()
    }

    /// Every `message` block, in document order.
    pub fn messages(&self) -> Vec<&XmlNode> {
        xml::search_node(&self.root, "message").unwrap_or_default()
    }

    /// Every `types` block.
    pub fn types(&self) -> Vec<&XmlNode> {
        xml::search_node(&self.root, "types").unwrap_or_default()
    }

    /// Operations under the first `portType`.
    pub fn operations(&self) -> Vec<&XmlNode> {
        self.port_types()
            .first()
            .and_then(|port_type| xml::search_node(port_type, "operation"))
            .unwrap_or_default()
    }

    /// First `schema` subtree under the first `types` block.
    pub fn schema(&self) -> Option<&XmlNode> {
        self.types()
            .first()
            .and_then(|types| xml::search_node(types, "schema"))
            .and_then(|found| found.into_iter().next())
    }

    pub(crate) fn first_port_type(&self) -> Result<&XmlNode, Error> {
        self.port_types()
            .into_iter()
            .next()
            .ok_or(Error::SchemaNotFound("portType"))
    }

    pub(crate) fn first_types(&self) -> Result<&XmlNode, Error> {
        self.types()
            .into_iter()
            .next()
            .ok_or(Error::SchemaNotFound("types"))
    }

    /// Name attribute of every `message` element, in document order.
    ///
    /// A convenience listing of callable functions; not deduplicated.
    pub fn all_functions(&self) -> Vec<String> {
        self.messages()
            .iter()
            .filter_map(|message| message.attribute("name"))
            .map(str::to_owned)
            .collect()
    }

    /// Resolve a namespace prefix against the WSDL root declarations.
    pub fn namespace_uri(&self, prefix: &str) -> Option<&str> {
        namespace::resolve_namespace(prefix, &self.root)
    }

    /// Resolve the request and response parameter trees for an operation.
    pub fn method_descriptor(&self, method: &str) -> Result<MethodDescriptor, Error> {
        params::method_descriptor(self, method)
    }
}
