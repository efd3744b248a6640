//! HTTP transport boundary.
//!
//! The engine only ever sees this trait: one opaque request/response
//! operation with a success or failure outcome. Timeouts, TLS and the rest
//! of the HTTP surface belong to the implementation.

use reqwest::blocking::Client as Reqwest;
use tracing::debug;

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

pub trait Transport {
    fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &str,
    ) -> Result<TransportResponse, Error>;

    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<TransportResponse, Error>;
}

/// Bundled blocking HTTP transport.
pub struct HttpTransport {
    client: Reqwest,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: Reqwest::new(),
        }
    }

    /// Accept invalid TLS certificates, for services with self-signed
    /// certificates.
    pub fn insecure() -> Result<Self, Error> {
        let client = Reqwest::builder()
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self { client })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &str,
    ) -> Result<TransportResponse, Error> {
        debug!(url, "posting soap request");

        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(body.to_owned());

        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }

        into_response(request.send()?)
    }

    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<TransportResponse, Error> {
        debug!(url, "fetching document");

        let mut request = self.client.get(url);
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }

        into_response(request.send()?)
    }
}

fn into_response(response: reqwest::blocking::Response) -> Result<TransportResponse, Error> {
    let status = response.status().as_u16();

    let headers = response
        .headers()
        .iter()
        .map(|(key, value)| {
            (
                key.to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    let body = response.text()?;

    Ok(TransportResponse {
        status,
        headers,
        body,
    })
}
