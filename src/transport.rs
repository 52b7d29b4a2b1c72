//! transport layer
//!
//! the pipeline talks to the network through an injected [`Transport`]
//! capability (send a request, get status and body back), so tests can
//! substitute a scripted transport without touching process-wide state.
//! [`HttpTransport`] is the reqwest-backed default.

use crate::chain::BoxFuture;
use crate::error::Result;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// one transport-level request
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// absolute request url
    pub url: Url,
    /// http method name
    pub method: String,
    /// composed headers
    pub headers: HashMap<String, String>,
    /// encoded body, if any
    pub body: Option<String>,
    /// opaque per-call options from [`crate::FetchOptions`]
    pub options: HashMap<String, serde_json::Value>,
}

/// one transport-level reply
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// status code
    pub status: u16,
    /// raw body text
    pub body: String,
}

impl TransportResponse {
    /// true for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// opaque request/response channel
pub trait Transport: Send + Sync {
    /// send one request and return the raw status and body
    fn send(&self, request: TransportRequest) -> BoxFuture<Result<TransportResponse>>;
}

/// canonical description for a status code, for failure messages
///
/// codes without a canonical reason get a placeholder so the message
/// never ends up with an empty clause.
pub(crate) fn status_reason(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown")
        .to_string()
}

/// default http transport backed by reqwest
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// build the default transport
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_string())
            .build()?;
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: TransportRequest) -> BoxFuture<Result<TransportResponse>> {
        let http = self.http.clone();
        Box::pin(async move {
            let method = reqwest::Method::from_bytes(request.method.as_bytes())
                .map_err(|_| crate::Error::Config(format!("invalid method: {}", request.method)))?;

            let mut builder = http.request(method, request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let reply = builder.send().await?;
            let status = reply.status().as_u16();
            let body = reply.text().await?;
            Ok(TransportResponse { status, body })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_success() {
        let ok = TransportResponse {
            status: 200,
            body: String::new(),
        };
        assert!(ok.is_success());

        let redirect = TransportResponse {
            status: 301,
            body: String::new(),
        };
        assert!(!redirect.is_success());

        let server_error = TransportResponse {
            status: 500,
            body: String::new(),
        };
        assert!(!server_error.is_success());
    }

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(500), "Internal Server Error");
        assert_eq!(status_reason(599), "Unknown");
    }

    #[test]
    fn test_http_transport_builds() {
        let transport = HttpTransport::new(Duration::from_secs(5), "apibase-test");
        assert!(transport.is_ok());
    }
}
