//! Top-level SOAP client.
//!
//! Lifecycle is two-state: a client starts uninitialized and becomes ready
//! the first time a call fetches and parses the service's WSDL. The
//! transition is guarded by the fetch cache and is never partially
//! observable; afterwards the parsed index is reused for every call.

use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::cache::WsdlCache;
use crate::error::Error;
use crate::request::{self, CallRequest};
use crate::response::{self, ResponseValue};
use crate::transport::{HttpTransport, Transport};
use crate::wsdl::Wsdl;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Service host, scheme prefix allowed and stripped.
    pub host: String,
    /// Path of the service endpoint calls are posted to.
    pub path: String,
    /// Path of the WSDL document.
    pub wsdl: String,
    /// Selects https (default) or http.
    pub secure: bool,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
}

impl ClientOptions {
    pub fn new<S: Into<String>>(host: S, path: S, wsdl: S) -> Self {
        Self {
            host: strip_scheme(host.into()),
            path: path.into(),
            wsdl: wsdl.into(),
            secure: true,
            headers: Vec::new(),
        }
    }
}

fn strip_scheme(host: String) -> String {
    host.strip_prefix("http://")
        .or_else(|| host.strip_prefix("https://"))
        .map(str::to_owned)
        .unwrap_or(host)
}

/// Everything a call hands back: the unmarshalled data plus the raw
/// response it came from.
#[derive(Debug, Clone)]
pub struct CallResponse {
    pub data: ResponseValue,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

enum State {
    Uninitialized,
    Ready(Wsdl),
}

pub struct Client<T: Transport = HttpTransport> {
    options: ClientOptions,
    transport: T,
    cache: Arc<WsdlCache>,
    state: State,
}

impl Client<HttpTransport> {
    pub fn new(options: ClientOptions) -> Self {
        Self::with_transport(options, HttpTransport::new())
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(options: ClientOptions, transport: T) -> Self {
        Self {
            options,
            transport,
            cache: Arc::new(WsdlCache::new()),
            state: State::Uninitialized,
        }
    }

    /// Share a fetch cache between client instances.
    pub fn with_cache(mut self, cache: Arc<WsdlCache>) -> Self {
        self.cache = cache;
        self
    }

    fn protocol(&self) -> &'static str {
        if self.options.secure {
            "https://"
        } else {
            "http://"
        }
    }

    fn endpoint_url(&self) -> Result<String, Error> {
        let url = format!("{}{}{}", self.protocol(), self.options.host, self.options.path);
        Ok(Url::parse(&url)?.into())
    }

    fn wsdl_url(&self) -> Result<String, Error> {
        let url = format!("{}{}{}", self.protocol(), self.options.host, self.options.wsdl);
        Ok(Url::parse(&url)?.into())
    }

    /// Fetch and parse the WSDL on first use.
    fn ensure_ready(&mut self) -> Result<(), Error> {
        if let State::Ready(_) = self.state {
            return Ok(());
        }

        let url = self.wsdl_url()?;
        let key = WsdlCache::key(&self.options.host, &self.options.wsdl);

        let transport = &self.transport;
        let headers = &self.options.headers;
        let text = self.cache.fetch(&key, || {
            let response = transport.get(&url, headers)?;

            if !(200..300).contains(&response.status) {
                return Err(Error::NonSuccessStatus(response.status));
            }

            Ok(response.body)
        })?;

        debug!(host = %self.options.host, "wsdl fetched, parsing");
        self.state = State::Ready(Wsdl::parse(&text)?);
        Ok(())
    }

    fn wsdl(&self) -> Result<&Wsdl, Error> {
        match &self.state {
            State::Ready(wsdl) => Ok(wsdl),
            State::Uninitialized => Err(Error::SchemaNotFound("wsdl")),
        }
    }

    /// Issue a SOAP call: resolve the operation, validate and build the
    /// envelope, post it, unmarshal the response.
    pub fn call(&mut self, call: &CallRequest) -> Result<CallResponse, Error> {
        self.ensure_ready()?;

        let wsdl = self.wsdl()?;
        let descriptor = wsdl.method_descriptor(&call.method)?;
        let envelope = request::build_envelope(wsdl, &descriptor, call)?;

        let url = self.endpoint_url()?;
        let response = self
            .transport
            .post(&url, &self.options.headers, &envelope)?;

        debug!(method = %call.method, status = response.status, "soap call answered");

        let data = response::unmarshal(&descriptor.response, &response.body);

        Ok(CallResponse {
            data,
            status: response.status,
            headers: response.headers,
            body: response.body,
        })
    }

    /// All message names the WSDL declares, in document order.
    pub fn functions(&mut self) -> Result<Vec<String>, Error> {
        self.ensure_ready()?;
        Ok(self.wsdl()?.all_functions())
    }
}
