use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Error parsing XML input")]
    XmlParseError(#[from] quick_xml::Error),

    #[error("Malformed XML document: {0}")]
    MalformedDocument(&'static str),

    #[error("WSDL has no usable {0} section")]
    SchemaNotFound(&'static str),

    #[error("Operation {0} is missing its {1} message")]
    IncompleteSchema(String, &'static str),

    #[error("Operation {0} is not defined in the WSDL portType")]
    UnknownOperation(String),

    #[error("Mandatory parameter {0} not given")]
    MandatoryParamMissing(String),

    #[error("Transport request failed")]
    TransportError(#[from] reqwest::Error),

    #[error("WSDL fetch returned status {0}")]
    NonSuccessStatus(u16),

    #[error("WSDL fetch failed")]
    FetchFailed(#[source] Arc<Error>),

    #[error("Unable to parse provided URL")]
    UrlParseError(#[from] url::ParseError),
}
