//! client configuration
//!
//! build a [`ClientConfig`] with the workspace id and optional overrides
//! (headers, transform steps, error recovery, channel wiring), then pass
//! it to [`crate::Client::new`]. everything here is read-only once the
//! client is constructed.

use crate::chain::{step, Next, Step};
use crate::error::{Error, Result};
use crate::graphql::{Exchange, GraphQlRequest};
use crate::headers::HeaderSource;
use crate::recovery::{
    catch_all_fn, recovery_fn, CaughtError, GraphQlErrorPayload, Rerun, RecoveryFn,
};
use crate::subscription::{ChannelConnector, ChannelEvent, ChannelEventFn, ConnectionParams};
use crate::transport::Transport;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// production api endpoint
pub const API_ENDPOINT: &str = "https://api.apibase.com";

/// configuration for the workspace client
#[derive(Clone)]
pub struct ClientConfig {
    /// workspace this client talks to
    pub(crate) workspace_id: String,

    /// original endpoint input
    pub(crate) raw_endpoint: String,

    /// parsed endpoint base url
    pub(crate) endpoint: Url,

    /// whether the provided endpoint parsed successfully
    pub(crate) endpoint_valid: bool,

    /// constructor-level header source
    pub(crate) headers: Option<HeaderSource>,

    /// legacy single catch-all callback
    pub(crate) catch_all: Option<crate::recovery::CatchAllFn>,

    /// code-keyed recovery table (reserved key: "default")
    pub(crate) catch_errors: HashMap<String, RecoveryFn>,

    /// ordered request transform steps
    pub(crate) transform_request: Vec<Step<GraphQlRequest>>,

    /// ordered response transform steps
    pub(crate) transform_response: Vec<Step<Exchange>>,

    /// request timeout for the default transport
    pub(crate) timeout: Duration,

    /// user agent for the default transport
    pub(crate) user_agent: String,

    /// injected transport (replaces the reqwest default)
    pub(crate) transport: Option<Arc<dyn Transport>>,

    /// duplex channel collaborator for subscriptions
    pub(crate) channel: Option<Arc<dyn ChannelConnector>>,

    /// caller-supplied channel connection parameters
    pub(crate) connection_params: Option<ConnectionParams>,

    /// channel lifecycle observers
    pub(crate) channel_observers: Vec<ChannelEventFn>,
}

impl ClientConfig {
    /// create a configuration for a workspace
    ///
    /// # example
    ///
    /// ```
    /// use apibase::ClientConfig;
    ///
    /// let config = ClientConfig::new("my-workspace-id");
    /// ```
    pub fn new(workspace_id: impl Into<String>) -> Self {
        let (endpoint, endpoint_valid) = match Url::parse(API_ENDPOINT) {
            Ok(url) => (url, true),
            Err(_) => (Url::parse("https://invalid.invalid").unwrap(), false),
        };
        Self {
            workspace_id: workspace_id.into(),
            raw_endpoint: API_ENDPOINT.to_string(),
            endpoint,
            endpoint_valid,
            headers: None,
            catch_all: None,
            catch_errors: HashMap::new(),
            transform_request: Vec::new(),
            transform_response: Vec::new(),
            timeout: Duration::from_secs(30),
            user_agent: format!("apibase-rs/{} (Rust)", env!("CARGO_PKG_VERSION")),
            transport: None,
            channel: None,
            connection_params: None,
            channel_observers: Vec::new(),
        }
    }

    /// point the client at a different endpoint (with or without a
    /// trailing slash)
    pub fn with_endpoint(mut self, endpoint: impl AsRef<str>) -> Self {
        let raw = endpoint.as_ref();
        let normalized = raw.trim_end_matches('/');
        match Url::parse(normalized).or_else(|_| Url::parse(&format!("https://{normalized}"))) {
            Ok(url) => {
                self.endpoint = url;
                self.endpoint_valid = true;
            }
            Err(_) => {
                self.endpoint_valid = false;
            }
        }
        self.raw_endpoint = raw.to_string();
        self
    }

    /// set static constructor headers
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = Some(HeaderSource::from_map(headers));
        self
    }

    /// set a sync header producer evaluated per call
    pub fn with_header_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> HashMap<String, String> + Send + Sync + 'static,
    {
        self.headers = Some(HeaderSource::from_fn(f));
        self
    }

    /// set any header source directly (static, sync, or async)
    pub fn with_header_source(mut self, source: HeaderSource) -> Self {
        self.headers = Some(source);
        self
    }

    /// set the legacy single catch-all error callback
    ///
    /// mutually exclusive with [`Self::catch_error`].
    pub fn catch_errors_with<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CaughtError, Rerun) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<crate::GraphQlResponse>>> + Send + 'static,
    {
        self.catch_all = Some(catch_all_fn(f));
        self
    }

    /// register a recovery callback for one error code
    ///
    /// the reserved code `"default"` is dispatched when no other entry
    /// matches. mutually exclusive with [`Self::catch_errors_with`].
    pub fn catch_error<F, Fut>(mut self, code: impl Into<String>, f: F) -> Self
    where
        F: Fn(GraphQlErrorPayload, Rerun) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<crate::GraphQlResponse>>> + Send + 'static,
    {
        self.catch_errors.insert(code.into(), recovery_fn(f));
        self
    }

    /// append a request transform step
    pub fn transform_request<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Next<GraphQlRequest>, GraphQlRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<GraphQlRequest>> + Send + 'static,
    {
        self.transform_request.push(step(f));
        self
    }

    /// append a response transform step
    pub fn transform_response<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Next<Exchange>, Exchange) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Exchange>> + Send + 'static,
    {
        self.transform_response.push(step(f));
        self
    }

    /// set the request timeout for the default transport
    ///
    /// default: 30 seconds
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// set a custom user agent string for the default transport
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// inject a transport, replacing the reqwest default
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// wire the duplex channel collaborator used for subscriptions
    pub fn with_channel(mut self, channel: Arc<dyn ChannelConnector>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// set static channel connection parameters
    ///
    /// the workspace id is merged in last and always wins.
    pub fn with_connection_params(mut self, params: serde_json::Map<String, serde_json::Value>) -> Self {
        self.connection_params = Some(ConnectionParams::Static(params));
        self
    }

    /// set a connection-parameter producer evaluated at channel open
    pub fn with_connection_params_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> serde_json::Map<String, serde_json::Value> + Send + Sync + 'static,
    {
        self.connection_params = Some(ConnectionParams::Fn(Arc::new(f)));
        self
    }

    /// register a channel lifecycle observer
    pub fn on_channel_event<F>(mut self, f: F) -> Self
    where
        F: Fn(ChannelEvent) + Send + Sync + 'static,
    {
        self.channel_observers.push(Arc::new(f));
        self
    }

    /// validate the configuration
    pub(crate) fn validate(&self) -> Result<()> {
        if self.workspace_id.is_empty() {
            return Err(Error::Config("workspace id cannot be empty".to_string()));
        }

        if !self.endpoint_valid {
            return Err(Error::Config(format!(
                "invalid endpoint: {}",
                self.raw_endpoint
            )));
        }

        if self.endpoint.scheme() != "http" && self.endpoint.scheme() != "https" {
            return Err(Error::Config(format!(
                "invalid endpoint scheme: {}. must be http or https",
                self.endpoint.scheme()
            )));
        }

        if self.catch_all.is_some() && !self.catch_errors.is_empty() {
            return Err(Error::Config(
                "catch-all callback and error-code table are mutually exclusive".to_string(),
            ));
        }

        Ok(())
    }

    /// graphql url for this workspace: `<endpoint>/<workspace id>`
    pub(crate) fn graphql_url(&self) -> Result<Url> {
        let base = self.endpoint.as_str().trim_end_matches('/');
        Url::parse(&format!("{}/{}", base, self.workspace_id)).map_err(Error::from)
    }

    /// webhook url: `<endpoint>/webhook/<path or name>`
    pub(crate) fn webhook_url(&self, suffix: &str) -> Result<Url> {
        let base = self.endpoint.as_str().trim_end_matches('/');
        Url::parse(&format!("{}/webhook/{}", base, suffix)).map_err(Error::from)
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("workspace_id", &self.workspace_id)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("headers", &self.headers)
            .field("catch_all", &self.catch_all.is_some())
            .field("catch_errors", &self.catch_errors.len())
            .field("transform_request", &self.transform_request.len())
            .field("transform_response", &self.transform_response.len())
            .field("transport", &self.transport.is_some())
            .field("channel", &self.channel.is_some())
            .field("channel_observers", &self.channel_observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config_defaults() {
        let config = ClientConfig::new("workspace-1");
        assert_eq!(config.workspace_id, "workspace-1");
        assert_eq!(config.endpoint.as_str().trim_end_matches('/'), API_ENDPOINT);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_graphql_url() {
        let config = ClientConfig::new("W");
        let url = config.graphql_url().unwrap();
        assert_eq!(url.as_str(), "https://api.apibase.com/W");
    }

    #[test]
    fn test_webhook_url() {
        let config = ClientConfig::new("W");
        let url = config.webhook_url("hookName").unwrap();
        assert_eq!(url.as_str(), "https://api.apibase.com/webhook/hookName");

        let url = config.webhook_url("a/path/b/test").unwrap();
        assert_eq!(url.as_str(), "https://api.apibase.com/webhook/a/path/b/test");
    }

    #[test]
    fn test_with_endpoint() {
        let config = ClientConfig::new("W").with_endpoint("http://localhost:9000/");
        assert_eq!(config.graphql_url().unwrap().as_str(), "http://localhost:9000/W");

        let config = ClientConfig::new("W").with_endpoint("api.example.com");
        assert_eq!(config.endpoint.scheme(), "https");
    }

    #[test]
    fn test_validation_empty_workspace() {
        let err = ClientConfig::new("").validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validation_invalid_scheme() {
        let config = ClientConfig::new("W").with_endpoint("ftp://example.com");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validation_recovery_modes_exclusive() {
        let config = ClientConfig::new("W")
            .catch_errors_with(|_caught, _rerun| async { Ok(None) })
            .catch_error("SomeError", |_payload, _rerun| async { Ok(None) });
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_builder_helpers() {
        let mut headers = HashMap::new();
        headers.insert("auth".to_string(), "token".to_string());

        let config = ClientConfig::new("W")
            .with_headers(headers)
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("apibase-test")
            .transform_request(|next, request| next(request))
            .transform_response(|next, exchange| next(exchange))
            .catch_error("InvalidArgumentError", |_payload, _rerun| async { Ok(None) })
            .on_channel_event(|_event| {});

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "apibase-test");
        assert_eq!(config.transform_request.len(), 1);
        assert_eq!(config.transform_response.len(), 1);
        assert_eq!(config.catch_errors.len(), 1);
        assert_eq!(config.channel_observers.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_output() {
        let config = ClientConfig::new("W").catch_errors_with(|_caught, _rerun| async { Ok(None) });
        let debug = format!("{config:?}");
        assert!(debug.contains("catch_all: true"));
        assert!(debug.contains("workspace_id: \"W\""));
    }
}
