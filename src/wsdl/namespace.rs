//! Qualified-name handling and namespace prefix resolution.
//!
//! The crate-wide convention for unqualified names: prefix and local name
//! are both the original string, so callers never deal with a missing half.

use crate::xml::XmlNode;

/// Split a `prefix:local` qualified name on its first `:`.
pub fn split_qname(name: &str) -> (&str, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => (name, name),
    }
}

/// Local part of a qualified name.
pub fn local_name(name: &str) -> &str {
    split_qname(name).1
}

/// Prefix part of a qualified name.
pub fn prefix(name: &str) -> &str {
    split_qname(name).0
}

/// Resolve a namespace prefix to its URI by scanning the root element's
/// attributes for an `xmlns:`-style declaration whose local key matches.
///
/// Returns `None` when the prefix is not declared; whether that is fatal is
/// the caller's decision.
pub fn resolve_namespace<'a>(prefix: &str, root: &'a XmlNode) -> Option<&'a str> {
    root.attributes
        .iter()
        .find(|(key, _)| local_name(key) == prefix)
        .map(|(_, value)| value.as_str())
}
