//! Parameter resolution: walking the schema under `types` to derive the
//! ordered parameter descriptor trees for an operation's request and
//! response messages.

use tracing::debug;

use super::namespace::{local_name, prefix, split_qname};
use super::Wsdl;
use crate::error::Error;
use crate::xml::{self, XmlNode};

/// One resolved schema element: name, namespace alias, cardinality and the
/// nested parameters of its declared type, when that type decomposes
/// further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub namespace: Option<String>,
    pub mandatory: bool,
    pub ty: Option<String>,
    pub params: Vec<Parameter>,
}

/// Resolved shape of one side (request or response) of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageShape {
    pub namespace: String,
    pub name: String,
    pub params: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub request: MessageShape,
    pub response: MessageShape,
}

pub(super) fn method_descriptor(wsdl: &Wsdl, method: &str) -> Result<MethodDescriptor, Error> {
    let port_type = wsdl.first_port_type()?;
    let operation = xml::search_node_by_attribute(port_type, "name", method)
        .ok_or_else(|| Error::UnknownOperation(method.to_owned()))?;

    let types = wsdl.first_types()?;
    let messages = wsdl.messages();

    let request = message_shape(types, &messages, operation, method, "input")?;
    let response = message_shape(types, &messages, operation, method, "output")?;

    debug!(
        method,
        request = %request.name,
        response = %response.name,
        "resolved method descriptor"
    );

    Ok(MethodDescriptor { request, response })
}

/// Read the operation's `input`/`output` message reference and resolve its
/// parameter tree. No partial shape is ever returned: a missing side or a
/// side without a `message` attribute is an error.
fn message_shape(
    types: &XmlNode,
    messages: &[&XmlNode],
    operation: &XmlNode,
    method: &str,
    side: &'static str,
) -> Result<MessageShape, Error> {
    let reference = xml::search_node(operation, side)
        .and_then(|found| found.into_iter().next())
        .ok_or_else(|| Error::IncompleteSchema(method.to_owned(), side))?;

    let message = reference
        .attribute("message")
        .ok_or_else(|| Error::IncompleteSchema(method.to_owned(), side))?;

    let (namespace, name) = split_qname(message);

    Ok(MessageShape {
        namespace: namespace.to_owned(),
        name: name.to_owned(),
        params: resolve_params(types, messages, method, Some(name)),
    })
}

/// Recursively resolve the parameter tree for a schema name.
///
/// The schema is searched for an element definition of that name first;
/// when resolving a message side and the schema has no such element, the
/// named `message` block's direct parts are used instead. Recursion into a
/// declared type bottoms out when its local name resolves to nothing
/// further (a leaf scalar).
fn resolve_params(
    types: &XmlNode,
    messages: &[&XmlNode],
    name: &str,
    message_name: Option<&str>,
) -> Vec<Parameter> {
    let elements: Vec<&XmlNode> = match xml::search_node_by_name_recursive(types, name) {
        Some(node) => xml::search_node(node, "element").unwrap_or_default(),

        None => match message_name {
            Some(message_name) => messages
                .iter()
                .find(|message| message.attribute("name") == Some(message_name))
                .map(|message| message.children.iter().collect())
                .unwrap_or_default(),

            None => Vec::new(),
        },
    };

    elements
        .into_iter()
        .filter_map(|element| {
            let name = element.attribute("name")?.to_owned();
            let ty = element
                .attribute("type")
                .or_else(|| element.attribute("element"));

            let mandatory = element
                .attribute("minOccurs")
                .and_then(|value| value.parse::<u32>().ok())
                .map_or(false, |occurs| occurs > 0);

            let params = match ty {
                Some(ty) => resolve_params(types, messages, local_name(ty), None),
                None => Vec::new(),
            };

            Some(Parameter {
                name,
                namespace: ty.map(|ty| prefix(ty).to_owned()),
                mandatory,
                ty: ty.map(|ty| local_name(ty).to_owned()),
                params,
            })
        })
        .collect()
}

impl MessageShape {
    /// Find a parameter descriptor by name anywhere in the tree,
    /// depth-first.
    pub fn find_param(&self, name: &str) -> Option<&Parameter> {
        find_in(&self.params, name)
    }
}

fn find_in<'a>(params: &'a [Parameter], name: &str) -> Option<&'a Parameter> {
    for param in params {
        if param.name == name {
            return Some(param);
        }

        if let Some(found) = find_in(&param.params, name) {
            return Some(found);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const WSDL: &str = r#"<?xml version="1.0"?>
<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
    xmlns:xsd="http://www.w3.org/2001/XMLSchema"
    xmlns:tns="http://example.com/orders"
    targetNamespace="http://example.com/orders">
  <types>
    <xsd:schema targetNamespace="http://example.com/orders">
      <xsd:element name="PlaceOrder">
        <xsd:complexType>
          <xsd:sequence>
            <xsd:element name="orderId" type="xsd:string" minOccurs="1"/>
            <xsd:element name="shipping" type="tns:Address" minOccurs="0"/>
          </xsd:sequence>
        </xsd:complexType>
      </xsd:element>
      <xsd:complexType name="Address">
        <xsd:sequence>
          <xsd:element name="street" type="xsd:string" minOccurs="1"/>
          <xsd:element name="city" type="xsd:string"/>
        </xsd:sequence>
      </xsd:complexType>
    </xsd:schema>
  </types>
  <message name="PlaceOrderRequest">
    <part name="parameters" element="tns:PlaceOrder"/>
  </message>
  <message name="PlaceOrderResponse">
    <part name="parameters" element="tns:PlaceOrderResult"/>
  </message>
  <portType name="OrderPort">
    <operation name="PlaceOrder">
      <input message="tns:PlaceOrderRequest"/>
      <output message="tns:PlaceOrderResponse"/>
    </operation>
    <operation name="Broken">
      <input message="tns:Missing"/>
    </operation>
  </portType>
</definitions>"#;

    fn wsdl() -> Wsdl {
        Wsdl::parse(WSDL).unwrap()
    }

    #[test]
    fn resolves_request_and_response_message_names() {
        let descriptor = wsdl().method_descriptor("PlaceOrder").unwrap();

        assert_eq!(descriptor.request.namespace, "tns");
        assert_eq!(descriptor.request.name, "PlaceOrderRequest");
        assert_eq!(descriptor.response.name, "PlaceOrderResponse");
    }

    #[test]
    fn resolves_the_ordered_parameter_tree() {
        let descriptor = wsdl().method_descriptor("PlaceOrder").unwrap();
        let params = &descriptor.request.params;

        assert_eq!(params.len(), 2);

        assert_eq!(params[0].name, "orderId");
        assert_eq!(params[0].namespace.as_deref(), Some("xsd"));
        assert_eq!(params[0].ty.as_deref(), Some("string"));
        assert!(params[0].mandatory);
        assert!(params[0].params.is_empty());

        assert_eq!(params[1].name, "shipping");
        assert_eq!(params[1].namespace.as_deref(), Some("tns"));
        assert_eq!(params[1].ty.as_deref(), Some("Address"));
        assert!(!params[1].mandatory);
    }

    #[test]
    fn recurses_into_named_complex_types() {
        let descriptor = wsdl().method_descriptor("PlaceOrder").unwrap();
        let shipping = &descriptor.request.params[1];

        assert_eq!(shipping.params.len(), 2);
        assert_eq!(shipping.params[0].name, "street");
        assert!(shipping.params[0].mandatory);
        assert_eq!(shipping.params[1].name, "city");
        assert!(!shipping.params[1].mandatory);
    }

    #[test]
    fn unknown_operations_are_rejected() {
        assert!(matches!(
            wsdl().method_descriptor("Nope"),
            Err(Error::UnknownOperation(name)) if name == "Nope"
        ));
    }

    #[test]
    fn operations_without_an_output_are_incomplete() {
        assert!(matches!(
            wsdl().method_descriptor("Broken"),
            Err(Error::IncompleteSchema(name, "output")) if name == "Broken"
        ));
    }

    #[test]
    fn falls_back_to_message_parts_when_the_schema_lacks_the_element() {
        // No <element name="Lookup"> in the schema: the parts of the
        // message definition are used directly.
        let wsdl = Wsdl::parse(
            r#"<definitions xmlns:tns="http://example.com/svc">
  <types><schema/></types>
  <message name="LookupRequest">
    <part name="key" type="xsd:string"/>
  </message>
  <message name="LookupResponse">
    <part name="value" type="xsd:string"/>
  </message>
  <portType name="Port">
    <operation name="Lookup">
      <input message="tns:LookupRequest"/>
      <output message="tns:LookupResponse"/>
    </operation>
  </portType>
</definitions>"#,
        )
        .unwrap();

        let descriptor = wsdl.method_descriptor("Lookup").unwrap();

        assert_eq!(descriptor.request.params.len(), 1);
        assert_eq!(descriptor.request.params[0].name, "key");
        assert_eq!(descriptor.request.params[0].ty.as_deref(), Some("string"));
    }

    #[test]
    fn find_param_searches_the_whole_tree() {
        let descriptor = wsdl().method_descriptor("PlaceOrder").unwrap();

        assert!(descriptor.request.find_param("street").is_some());
        assert!(descriptor.request.find_param("missing").is_none());
    }
}
