//! SOAP response unmarshalling.
//!
//! The response body is flattened into a host value whose shape follows the
//! number of same-named sibling elements: one occurrence yields the value
//! itself, repeats yield a list in document order.
//!
//! Parse failures deliberately degrade to an empty text value instead of an
//! error: services answering with non-SOAP error pages must not break
//! callers.

use tracing::debug;

use crate::wsdl::namespace::local_name;
use crate::wsdl::MessageShape;
use crate::xml::{self, XmlNode};

/// Recursive host value mirroring the response XML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseValue {
    Text(String),
    /// Leaf (or subtree) carrying XML attributes.
    Attributed {
        attributes: Vec<(String, String)>,
        value: Box<ResponseValue>,
    },
    /// Ordered mapping of field name to value, keyed by local name.
    Object(Vec<(String, ResponseValue)>),
    List(Vec<ResponseValue>),
}

impl ResponseValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Field lookup on an object value.
    pub fn get(&self, name: &str) -> Option<&ResponseValue> {
        match self {
            ResponseValue::Object(fields) => fields
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }
}

/// Unmarshal a SOAP response body against the resolved response shape.
pub fn unmarshal(response: &MessageShape, text: &str) -> ResponseValue {
    let root = match xml::parse(text) {
        Ok(root) => root,
        Err(error) => {
            debug!(%error, "response is not parseable xml, degrading to empty value");
            return ResponseValue::Text(String::new());
        }
    };

    let body = match xml::search_node(&root, "Body").and_then(|found| found.into_iter().next()) {
        Some(body) => body,
        None => {
            debug!("response has no Body element, degrading to empty value");
            return ResponseValue::Text(String::new());
        }
    };

    // Unwrap the operation-name wrapper when the body holds exactly that.
    let mut target = body;
    let mut unwrapped = false;
    if body.children.len() == 1 && body.children[0].local_name() == response.name {
        target = &body.children[0];
        unwrapped = true;
    }

    // The located node's own attributes (typically xmlns declarations) are
    // not part of the payload.
    let data = if target.children.is_empty() {
        ResponseValue::Text(target.text.clone().unwrap_or_default())
    } else {
        flatten_fields(target)
    };

    if let ResponseValue::Object(fields) = &data {
        if let Some((_, value)) = fields.iter().find(|(key, _)| *key == response.name) {
            return collapse(value.clone());
        }

        // The wrapper is gone and a single result field remains: hand the
        // caller the field's value directly.
        if unwrapped && fields.len() == 1 {
            return collapse(fields[0].1.clone());
        }
    }

    data
}

/// Recursively flatten a node: leaves become text (attributed when they
/// carry attributes), inner nodes become ordered mappings where a repeated
/// local name retroactively promotes the slot to a list.
fn flatten(node: &XmlNode) -> ResponseValue {
    if node.children.is_empty() {
        return with_attributes(node, ResponseValue::Text(node.text.clone().unwrap_or_default()));
    }

    with_attributes(node, flatten_fields(node))
}

fn flatten_fields(node: &XmlNode) -> ResponseValue {
    let mut fields: Vec<(String, ResponseValue)> = Vec::new();

    for child in &node.children {
        let key = local_name(&child.name);
        let value = flatten(child);

        match fields.iter_mut().find(|(existing, _)| existing == key) {
            Some((_, slot)) => match slot {
                ResponseValue::List(items) => items.push(value),

                _ => {
                    let first = std::mem::replace(slot, ResponseValue::List(Vec::new()));
                    if let ResponseValue::List(items) = slot {
                        items.push(first);
                        items.push(value);
                    }
                }
            },

            None => fields.push((key.to_owned(), value)),
        }
    }

    ResponseValue::Object(fields)
}

fn with_attributes(node: &XmlNode, value: ResponseValue) -> ResponseValue {
    if node.attributes.is_empty() {
        value
    } else {
        ResponseValue::Attributed {
            attributes: node.attributes.clone(),
            value: Box::new(value),
        }
    }
}

fn collapse(value: ResponseValue) -> ResponseValue {
    match value {
        ResponseValue::List(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    }
}
