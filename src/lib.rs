//! `lather` is a dynamic SOAP 1.1 client: it interprets a WSDL 1.1 service
//! description at runtime, marshals calls into namespace-correct SOAP
//! envelopes and unmarshals responses back into structured values, without
//! any generated code.
//!
//! ```no_run
//! use lather::{CallRequest, Client, ClientOptions};
//!
//! let options = ClientOptions::new("example.com", "/pricing", "/pricing?wsdl");
//! let mut client = Client::new(options);
//!
//! let call = CallRequest::new("GetPrice").param("itemId", "42");
//! let response = client.call(&call)?;
//! println!("{:?}", response.data);
//! # Ok::<(), lather::Error>(())
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod request;
pub mod response;
pub mod transport;
pub mod wsdl;
pub mod xml;

pub use cache::WsdlCache;
pub use client::{CallResponse, Client, ClientOptions};
pub use error::Error;
pub use request::{CallRequest, HeaderItem, ParamValue, SoapOptions};
pub use response::ResponseValue;
pub use transport::{HttpTransport, Transport, TransportResponse};
pub use wsdl::Wsdl;
