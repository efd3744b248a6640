//! SOAP request envelope building.
//!
//! Caller-supplied parameters are validated and serialized against the
//! resolved parameter tree; the element tags are always the caller's keys,
//! the descriptor only supplies namespace and type context. All text and
//! attribute values are escaped through the writer.

use quick_xml::{
    events::{BytesDecl, BytesStart, BytesText, Event},
    Writer,
};
use std::io::Write;

use tracing::debug;

use crate::error::Error;
use crate::wsdl::namespace::local_name;
use crate::wsdl::{MessageShape, MethodDescriptor, Wsdl};

pub const DEFAULT_SOAP_ENV: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const DEFAULT_XML_SCHEMA: &str = "http://www.w3.org/2001/XMLSchema";

/// One value in a call's parameter mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Serializes to a self-closing element.
    Null,
    Scalar(String),
    /// The element is repeated once per item.
    List(Vec<ParamValue>),
    /// Nested mapping, serialized recursively in caller order.
    Object(Vec<(String, ParamValue)>),
    /// A value carrying XML attributes on its element.
    Attributed {
        attributes: Vec<(String, String)>,
        value: Box<ParamValue>,
    },
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Scalar(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Scalar(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderItem {
    pub name: String,
    pub namespace: String,
    pub value: String,
}

/// Overrides for the envelope's fixed namespace URIs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoapOptions {
    pub soap_env: Option<String>,
    pub xml_schema: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CallRequest {
    pub method: String,
    /// Wire name override for the method tag.
    pub method_alias: Option<String>,
    /// Parameters in serialization order.
    pub params: Vec<(String, ParamValue)>,
    pub header: Vec<HeaderItem>,
    pub soap: SoapOptions,
}

impl CallRequest {
    pub fn new<S: Into<String>>(method: S) -> Self {
        Self {
            method: method.into(),
            method_alias: None,
            params: Vec::new(),
            header: Vec::new(),
            soap: SoapOptions::default(),
        }
    }

    pub fn param<S: Into<String>, V: Into<ParamValue>>(mut self, name: S, value: V) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

/// Prefix to URI pair collected for the envelope's `xmlns:` declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NamespaceEntry {
    short: String,
    full: String,
}

/// Build the SOAP envelope for a call.
///
/// Mandatory parameters are checked first, before anything is serialized,
/// so an invalid request never reaches the transport.
pub fn build_envelope(
    wsdl: &Wsdl,
    descriptor: &MethodDescriptor,
    call: &CallRequest,
) -> Result<String, Error> {
    check_mandatory(&descriptor.request, &call.params)?;

    // First pass only collects the namespace aliases the body will use;
    // the declarations have to be known before the envelope tag is
    // written.
    let mut namespaces = Vec::new();
    write_items(
        &mut Writer::new(Vec::new()),
        &call.params,
        &descriptor.request,
        &mut namespaces,
        None,
    )?;

    let entries = namespace_entries(wsdl, &namespaces, call);

    let soap_env = call.soap.soap_env.as_deref().unwrap_or(DEFAULT_SOAP_ENV);
    let xml_schema = call
        .soap
        .xml_schema
        .as_deref()
        .unwrap_or(DEFAULT_XML_SCHEMA);

    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new(b"1.0", Some(b"UTF-8"), None)))?;

    let mut envelope = BytesStart::owned_name("soap_env:Envelope");
    envelope.push_attribute(("xmlns:soap_env", soap_env));
    envelope.push_attribute(("xmlns:xsd", xml_schema));
    for entry in &entries {
        let key = format!("xmlns:{}", entry.short);
        envelope.push_attribute((key.as_str(), entry.full.as_str()));
    }
    writer.write_event(Event::Start(envelope.to_borrowed()))?;

    write_header(&mut writer, &call.header)?;

    let body = BytesStart::owned_name("soap_env:Body");
    writer.write_event(Event::Start(body.to_borrowed()))?;

    let method_name = call.method_alias.as_deref().unwrap_or(&call.method);
    let method = BytesStart::owned_name(method_tag(&descriptor.request, method_name));
    writer.write_event(Event::Start(method.to_borrowed()))?;

    let mut replay = Vec::new();
    write_items(
        &mut writer,
        &call.params,
        &descriptor.request,
        &mut replay,
        None,
    )?;

    writer.write_event(Event::End(method.to_end()))?;
    writer.write_event(Event::End(body.to_end()))?;
    writer.write_event(Event::End(envelope.to_end()))?;

    debug!(method = %call.method, "built request envelope");

    String::from_utf8(writer.into_inner())
        .map_err(|_| Error::MalformedDocument("envelope is not valid utf-8"))
}

/// Every top-level parameter the schema marks mandatory must be present in
/// the caller's input, matched by local name.
fn check_mandatory(request: &MessageShape, params: &[(String, ParamValue)]) -> Result<(), Error> {
    for param in &request.params {
        if !param.mandatory {
            continue;
        }

        let wanted = local_name(&param.name);
        let given = params.iter().any(|(name, _)| local_name(name) == wanted);

        if !given {
            return Err(Error::MandatoryParamMissing(param.name.clone()));
        }
    }

    Ok(())
}

fn namespace_entries(wsdl: &Wsdl, namespaces: &[String], call: &CallRequest) -> Vec<NamespaceEntry> {
    let mut entries = Vec::new();

    if !namespaces.iter().any(|short| short == "tns") {
        if let Some(full) = wsdl.namespace_uri("tns") {
            entries.push(NamespaceEntry {
                short: "tns".to_owned(),
                full: full.to_owned(),
            });
        }
    }

    for short in namespaces {
        // xsd is already declared on the envelope itself.
        if short == "xsd" {
            continue;
        }

        if let Some(full) = wsdl.namespace_uri(short) {
            entries.push(NamespaceEntry {
                short: short.clone(),
                full: full.to_owned(),
            });
        }
    }

    for (index, item) in call.header.iter().enumerate() {
        entries.push(NamespaceEntry {
            short: format!("cns{}", index),
            full: item.namespace.clone(),
        });
    }

    entries
}

/// Header items use positional aliases; the whole section is omitted when
/// there are none.
fn write_header<W: Write>(writer: &mut Writer<W>, header: &[HeaderItem]) -> Result<(), Error> {
    if header.is_empty() {
        return Ok(());
    }

    let section = BytesStart::owned_name("soap_env:Header");
    writer.write_event(Event::Start(section.to_borrowed()))?;

    for (index, item) in header.iter().enumerate() {
        let tag = BytesStart::owned_name(format!("cns{}:{}", index, item.name));
        writer.write_event(Event::Start(tag.to_borrowed()))?;
        writer.write_event(Event::Text(BytesText::from_plain_str(&item.value)))?;
        writer.write_event(Event::End(tag.to_end()))?;
    }

    writer.write_event(Event::End(section.to_end()))?;
    Ok(())
}

fn method_tag(request: &MessageShape, method_name: &str) -> String {
    // An unqualified message reference leaves prefix == local; render the
    // method tag without a prefix in that case.
    if request.namespace == request.name {
        method_name.to_owned()
    } else {
        format!("{}:{}", request.namespace, method_name)
    }
}

fn collect(namespaces: &mut Vec<String>, short: &str) {
    if !namespaces.iter().any(|existing| existing == short) {
        namespaces.push(short.to_owned());
    }
}

/// Serialize one parameter list against the descriptor tree.
///
/// The namespace context is sticky: the first parameter whose descriptor
/// reports a namespace sets it for the following siblings, and nested
/// objects inherit it.
fn write_items<W: Write>(
    writer: &mut Writer<W>,
    items: &[(String, ParamValue)],
    request: &MessageShape,
    namespaces: &mut Vec<String>,
    mut namespace: Option<String>,
) -> Result<(), Error> {
    collect(namespaces, &request.namespace);

    for (name, value) in items {
        if namespace.is_none() {
            namespace = request
                .find_param(name)
                .and_then(|param| param.namespace.clone());
        }

        if let Some(short) = &namespace {
            collect(namespaces, short);
        }

        let tag = qualified_tag(namespace.as_deref(), name);
        write_element(
            writer,
            &tag,
            &[],
            value,
            request,
            namespaces,
            namespace.clone(),
        )?;
    }

    Ok(())
}

fn qualified_tag(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        // Primitive xsd types are rendered without a prefix.
        Some(short) if short != "xsd" => format!("{}:{}", short, name),
        _ => name.to_owned(),
    }
}

fn write_element<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    attributes: &[(String, String)],
    value: &ParamValue,
    request: &MessageShape,
    namespaces: &mut Vec<String>,
    namespace: Option<String>,
) -> Result<(), Error> {
    match value {
        ParamValue::Attributed {
            attributes: own,
            value,
        } => write_element(writer, tag, own, value, request, namespaces, namespace),

        ParamValue::Null => {
            let start = start_tag(tag, attributes);
            writer.write_event(Event::Empty(start))?;
            Ok(())
        }

        ParamValue::Scalar(text) => {
            let start = start_tag(tag, attributes);
            writer.write_event(Event::Start(start.to_borrowed()))?;
            writer.write_event(Event::Text(BytesText::from_plain_str(text)))?;
            writer.write_event(Event::End(start.to_end()))?;
            Ok(())
        }

        ParamValue::List(list) => {
            for item in list {
                write_element(
                    writer,
                    tag,
                    attributes,
                    item,
                    request,
                    namespaces,
                    namespace.clone(),
                )?;
            }
            Ok(())
        }

        ParamValue::Object(fields) => {
            let start = start_tag(tag, attributes);
            writer.write_event(Event::Start(start.to_borrowed()))?;
            write_items(writer, fields, request, namespaces, namespace)?;
            writer.write_event(Event::End(start.to_end()))?;
            Ok(())
        }
    }
}

fn start_tag(tag: &str, attributes: &[(String, String)]) -> BytesStart<'static> {
    let mut start = BytesStart::owned_name(tag);
    for (key, value) in attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wsdl::Wsdl;

    const WSDL: &str = r#"<?xml version="1.0"?>
<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
    xmlns:xsd="http://www.w3.org/2001/XMLSchema"
    xmlns:tns="http://example.com/pricing"
    targetNamespace="http://example.com/pricing">
  <types>
    <xsd:schema targetNamespace="http://example.com/pricing">
      <xsd:element name="GetPrice">
        <xsd:complexType>
          <xsd:sequence>
            <xsd:element name="itemId" type="xsd:string" minOccurs="1"/>
            <xsd:element name="note" type="xsd:string" minOccurs="0"/>
          </xsd:sequence>
        </xsd:complexType>
      </xsd:element>
      <xsd:element name="PlaceOrder">
        <xsd:complexType>
          <xsd:sequence>
            <xsd:element name="shipping" type="tns:Address" minOccurs="1"/>
          </xsd:sequence>
        </xsd:complexType>
      </xsd:element>
      <xsd:complexType name="Address">
        <xsd:sequence>
          <xsd:element name="street" type="xsd:string"/>
        </xsd:sequence>
      </xsd:complexType>
    </xsd:schema>
  </types>
  <message name="GetPriceRequest">
    <part name="parameters" element="tns:GetPrice"/>
  </message>
  <message name="GetPriceResponse">
    <part name="parameters" element="tns:GetPriceResponse"/>
  </message>
  <message name="PlaceOrderRequest">
    <part name="parameters" element="tns:PlaceOrder"/>
  </message>
  <message name="PlaceOrderResponse">
    <part name="parameters" element="tns:PlaceOrderResult"/>
  </message>
  <portType name="PricingPort">
    <operation name="GetPrice">
      <input message="tns:GetPriceRequest"/>
      <output message="tns:GetPriceResponse"/>
    </operation>
    <operation name="PlaceOrder">
      <input message="tns:PlaceOrderRequest"/>
      <output message="tns:PlaceOrderResponse"/>
    </operation>
  </portType>
</definitions>"#;

    fn envelope_for(call: &CallRequest) -> Result<String, Error> {
        let wsdl = Wsdl::parse(WSDL).unwrap();
        let descriptor = wsdl.method_descriptor(&call.method).unwrap();
        build_envelope(&wsdl, &descriptor, call)
    }

    #[test]
    fn builds_a_namespace_correct_envelope() {
        let call = CallRequest::new("GetPrice").param("itemId", "42");
        let envelope = envelope_for(&call).unwrap();

        assert!(envelope.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(envelope
            .contains("xmlns:soap_env=\"http://schemas.xmlsoap.org/soap/envelope/\""));
        assert!(envelope.contains("xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\""));
        assert!(envelope.contains("xmlns:tns=\"http://example.com/pricing\""));
        assert!(envelope.contains("<tns:GetPrice><itemId>42</itemId></tns:GetPrice>"));
    }

    #[test]
    fn missing_mandatory_params_fail_before_serialization() {
        let call = CallRequest::new("GetPrice").param("note", "only optional");

        assert!(matches!(
            envelope_for(&call),
            Err(Error::MandatoryParamMissing(name)) if name == "itemId"
        ));
    }

    #[test]
    fn method_alias_overrides_the_wire_name() {
        let call = CallRequest::new("GetPrice").param("itemId", "42");
        let call = CallRequest {
            method_alias: Some("getPrice".to_owned()),
            ..call
        };

        let envelope = envelope_for(&call).unwrap();
        assert!(envelope.contains("<tns:getPrice>"));
        assert!(envelope.contains("</tns:getPrice>"));
    }

    #[test]
    fn header_section_is_omitted_without_items() {
        let call = CallRequest::new("GetPrice").param("itemId", "42");
        let envelope = envelope_for(&call).unwrap();

        assert!(!envelope.contains("Header"));
    }

    #[test]
    fn header_items_use_positional_aliases() {
        let mut call = CallRequest::new("GetPrice").param("itemId", "42");
        call.header.push(HeaderItem {
            name: "Auth".to_owned(),
            namespace: "http://example.com/auth".to_owned(),
            value: "secret".to_owned(),
        });

        let envelope = envelope_for(&call).unwrap();
        assert!(envelope.contains("xmlns:cns0=\"http://example.com/auth\""));
        assert!(envelope.contains(
            "<soap_env:Header><cns0:Auth>secret</cns0:Auth></soap_env:Header>"
        ));
    }

    #[test]
    fn null_values_serialize_self_closing() {
        let call = CallRequest::new("GetPrice")
            .param("itemId", ParamValue::Null)
            .param(
                "note",
                ParamValue::Attributed {
                    attributes: vec![("a".to_owned(), "1".to_owned())],
                    value: Box::new(ParamValue::Null),
                },
            );

        let envelope = envelope_for(&call).unwrap();
        assert!(envelope.contains("<itemId/>"));
        assert!(envelope.contains("<note a=\"1\"/>"));
    }

    #[test]
    fn list_values_repeat_the_element() {
        let call = CallRequest::new("GetPrice").param(
            "itemId",
            ParamValue::List(vec!["1".into(), "2".into()]),
        );

        let envelope = envelope_for(&call).unwrap();
        assert!(envelope.contains("<itemId>1</itemId><itemId>2</itemId>"));
    }

    #[test]
    fn nested_objects_inherit_the_namespace_context() {
        let call = CallRequest::new("PlaceOrder").param(
            "shipping",
            ParamValue::Object(vec![("street".to_owned(), "Main St 1".into())]),
        );

        let envelope = envelope_for(&call).unwrap();
        assert!(envelope.contains(
            "<tns:shipping><tns:street>Main St 1</tns:street></tns:shipping>"
        ));
    }

    #[test]
    fn parameter_text_and_attributes_are_escaped() {
        let call = CallRequest::new("GetPrice")
            .param("itemId", "a & b <c>")
            .param(
                "note",
                ParamValue::Attributed {
                    attributes: vec![("q".to_owned(), "\"quoted\"".to_owned())],
                    value: Box::new("fine".into()),
                },
            );

        let envelope = envelope_for(&call).unwrap();
        assert!(envelope.contains("<itemId>a &amp; b &lt;c&gt;</itemId>"));
        assert!(envelope.contains("q=\"&quot;quoted&quot;\""));
        assert!(!envelope.contains("a & b"));
    }

    #[test]
    fn soap_overrides_replace_the_fixed_uris() {
        let mut call = CallRequest::new("GetPrice").param("itemId", "42");
        call.soap.soap_env = Some("http://www.w3.org/2003/05/soap-envelope".to_owned());

        let envelope = envelope_for(&call).unwrap();
        assert!(envelope
            .contains("xmlns:soap_env=\"http://www.w3.org/2003/05/soap-envelope\""));
    }
}
