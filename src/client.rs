//! main client
//!
//! orchestrates one request end to end: classify the operation, run the
//! request chain, compose headers, send over the transport, then run the
//! response chain with error recovery spliced in first. also hosts the
//! webhook invoke side channel and delegates subscriptions to the
//! channel manager.

use crate::chain::{BoxFuture, HandlerChain, Step};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::graphql::{Exchange, FetchOptions, GraphQlRequest, GraphQlResponse};
use crate::headers::{self, HeaderSource};
use crate::operation::{self, OperationKind};
use crate::recovery::{
    ErrorRecovery, GraphQlErrorPayload, Rerun, RerunOverrides, TransportErrorPayload,
};
use crate::subscription::{SubscribeOptions, Subscription, SubscriptionManager};
use crate::transport::{
    status_reason, HttpTransport, Transport, TransportRequest, TransportResponse,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// options for a webhook invoke call
#[derive(Debug, Clone)]
pub struct InvokeOptions {
    /// http method name
    pub method: String,
    /// path appended to the webhook endpoint instead of the name
    pub path: Option<String>,
    /// payload serialized as a query string
    pub data: Option<serde_json::Value>,
}

impl InvokeOptions {
    /// invoke with the given method
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: None,
            data: None,
        }
    }

    /// use a path instead of the webhook name
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// attach a data payload
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    recovery: Option<ErrorRecovery>,
    request_chain: HandlerChain<GraphQlRequest>,
    response_steps: Vec<Step<Exchange>>,
    subscriptions: SubscriptionManager,
}

/// graphql client for one workspace
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// create a new client
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let transport: Arc<dyn Transport> = match &config.transport {
            Some(transport) => transport.clone(),
            None => Arc::new(HttpTransport::new(config.timeout, &config.user_agent)?),
        };

        let recovery = if let Some(catch_all) = &config.catch_all {
            Some(ErrorRecovery::CatchAll(catch_all.clone()))
        } else if !config.catch_errors.is_empty() {
            Some(ErrorRecovery::from_table(config.catch_errors.clone()))
        } else {
            None
        };

        let request_chain = HandlerChain::from_steps(config.transform_request.clone());
        let response_steps = config.transform_response.clone();
        let subscriptions = SubscriptionManager::new(&config);

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                recovery,
                request_chain,
                response_steps,
                subscriptions,
            }),
        })
    }

    /// access the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// run a graphql query or mutation
    ///
    /// application-level errors come back inside the response, never as
    /// an `Err`; classification and transport failures are raised.
    pub async fn request(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
        fetch_options: Option<FetchOptions>,
    ) -> Result<GraphQlResponse> {
        self.ensure_requestable(query)?;
        self.execute(GraphQlRequest {
            query: query.to_string(),
            variables,
            fetch_options: fetch_options.unwrap_or_default(),
        })
        .await
    }

    /// run a graphql query in one of the following forms:
    /// `{ someQuery { f } }`, `query { someQuery { f } }`,
    /// `query Name { someQuery { f } }`
    pub async fn query(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
        fetch_options: Option<FetchOptions>,
    ) -> Result<GraphQlResponse> {
        if operation::classify(query)? != OperationKind::Query {
            return Err(Error::Classify("Expected GraphQL query.".to_string()));
        }
        self.request(query, variables, fetch_options).await
    }

    /// run a graphql mutation in one of the following forms:
    /// `{ someMutation(data) { f } }`, `mutation { someMutation(data) { f } }`,
    /// `mutation Name { someMutation(data) { f } }`
    ///
    /// a bare document (no keyword) parses as a query and is promoted to
    /// a mutation by prefixing the keyword; documents that spell `query`
    /// out are rejected by the textual check in
    /// [`crate::starts_with_query_keyword`].
    pub async fn mutation(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
        fetch_options: Option<FetchOptions>,
    ) -> Result<GraphQlResponse> {
        if operation::starts_with_query_keyword(query) {
            return Err(Error::Classify("Expected GraphQL mutation.".to_string()));
        }

        let query = match operation::classify(query)? {
            OperationKind::Subscription => {
                return Err(Error::Classify("Expected GraphQL mutation.".to_string()));
            }
            OperationKind::Query => format!("mutation {query}"),
            OperationKind::Mutation => query.to_string(),
        };

        self.request(&query, variables, fetch_options).await
    }

    /// run a query or mutation and deserialize `data` into a typed value
    pub async fn request_typed<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
        fetch_options: Option<FetchOptions>,
    ) -> Result<GraphQlResponse<T>> {
        let response = self.request(query, variables, fetch_options).await?;
        let data = match response.data {
            Some(value) => Some(serde_json::from_value(value)?),
            None => None,
        };
        Ok(GraphQlResponse {
            data,
            errors: response.errors,
        })
    }

    /// invoke a webhook by name over the non-graphql side channel
    ///
    /// the url is `<endpoint>/webhook/<path or name>`; `data` is
    /// serialized as a query string when present. the raw transport
    /// status and body are returned undecoded.
    pub async fn invoke(
        &self,
        name: &str,
        options: InvokeOptions,
        fetch_options: Option<FetchOptions>,
    ) -> Result<TransportResponse> {
        let suffix = options.path.as_deref().unwrap_or(name);
        let mut url = self.inner.config.webhook_url(suffix)?;

        if let Some(data) = &options.data {
            let object = data.as_object().ok_or_else(|| {
                Error::Config("invoke data must be a json object".to_string())
            })?;
            let mut pairs = url.query_pairs_mut();
            for (key, value) in object {
                match value {
                    serde_json::Value::String(text) => pairs.append_pair(key, text),
                    other => pairs.append_pair(key, &other.to_string()),
                };
            }
            drop(pairs);
        }

        let fetch_options = fetch_options.unwrap_or_default();
        let headers = self.compose_headers(&fetch_options.headers).await?;

        self.inner
            .transport
            .send(TransportRequest {
                url,
                method: options.method.clone(),
                headers,
                body: None,
                options: fetch_options.options,
            })
            .await
    }

    /// start a subscription; the channel opens lazily on first use
    pub async fn subscribe(
        &self,
        query: &str,
        options: SubscribeOptions,
    ) -> Result<Subscription> {
        self.inner.subscriptions.subscribe(query, options).await
    }

    /// tear down the subscription channel entirely
    pub async fn close_channel(&self) -> Result<()> {
        self.inner.subscriptions.close().await
    }

    fn ensure_requestable(&self, query: &str) -> Result<()> {
        match operation::classify(query)? {
            OperationKind::Query | OperationKind::Mutation => Ok(()),
            OperationKind::Subscription => Err(Error::Classify(
                "Expected GraphQL query or mutation.".to_string(),
            )),
        }
    }

    async fn compose_headers(
        &self,
        per_call: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>> {
        let mut sources = Vec::with_capacity(2);
        if let Some(source) = &self.inner.config.headers {
            sources.push(source.clone());
        }
        sources.push(HeaderSource::from_map(per_call.clone()));
        headers::compose(&sources).await
    }

    /// one full pipeline pass; boxed because recovery reruns re-enter it
    fn execute(&self, request: GraphQlRequest) -> BoxFuture<Result<GraphQlResponse>> {
        let client = self.clone();
        Box::pin(async move {
            let request = client.inner.request_chain.run(request).await?;
            let headers = client.compose_headers(&request.fetch_options.headers).await?;
            let url = client.inner.config.graphql_url()?;
            let body = request.to_body().to_string();

            debug!(url = %url, "sending graphql request");
            let reply = client
                .inner
                .transport
                .send(TransportRequest {
                    url,
                    method: "POST".to_string(),
                    headers,
                    body: Some(body),
                    options: request.fetch_options.options.clone(),
                })
                .await?;

            if !reply.is_success() {
                let reason = status_reason(reply.status);
                if let Some(recovery) = &client.inner.recovery {
                    // legacy catchers observe transport failures; the
                    // error is raised regardless
                    recovery
                        .notify_transport(
                            TransportErrorPayload {
                                request: request.clone(),
                                status: reply.status,
                                reason: reason.clone(),
                            },
                            client.rerun_from(&request),
                        )
                        .await;
                }
                return Err(Error::Transport {
                    status: reply.status,
                    reason,
                    request,
                });
            }

            let response: GraphQlResponse = serde_json::from_str(&reply.body)?;

            let mut steps = Vec::with_capacity(client.inner.response_steps.len() + 1);
            if let Some(recovery) = &client.inner.recovery {
                steps.push(client.recovery_step(recovery.clone()));
            }
            steps.extend(client.inner.response_steps.iter().cloned());

            let exchange = HandlerChain::from_steps(steps)
                .run(Exchange { request, response })
                .await?;
            Ok(exchange.response)
        })
    }

    /// response-chain step that dispatches recovery before anything else
    /// sees the decoded response
    fn recovery_step(&self, recovery: ErrorRecovery) -> Step<Exchange> {
        let client = self.clone();
        Arc::new(move |next, exchange: Exchange| -> BoxFuture<Result<Exchange>> {
            let client = client.clone();
            let recovery = recovery.clone();
            Box::pin(async move {
                let exchange = if exchange.response.has_errors() {
                    let rerun = client.rerun_from(&exchange.request);
                    let payload = GraphQlErrorPayload {
                        request: exchange.request.clone(),
                        response: exchange.response.clone(),
                    };
                    match recovery.dispatch(payload, rerun).await? {
                        Some(response) => Exchange {
                            request: exchange.request,
                            response,
                        },
                        None => exchange,
                    }
                } else {
                    exchange
                };
                next(exchange).await
            })
        })
    }

    /// rerun capability bound to the attempt that just failed
    ///
    /// omitted override fields reuse that attempt's values, so chained
    /// recoveries compose. each invocation is a full new top-level pass,
    /// recursion included; bounding it is the recovery callback's job.
    fn rerun_from(&self, attempt: &GraphQlRequest) -> Rerun {
        let client = self.clone();
        let attempt = attempt.clone();
        Arc::new(move |overrides: RerunOverrides| -> BoxFuture<Result<GraphQlResponse>> {
            let client = client.clone();
            let attempt = attempt.clone();
            Box::pin(async move {
                let request = GraphQlRequest {
                    query: overrides.query.unwrap_or(attempt.query),
                    variables: overrides.variables.or(attempt.variables),
                    fetch_options: overrides.fetch_options.unwrap_or(attempt.fetch_options),
                };
                client.ensure_requestable(&request.query)?;
                client.execute(request).await
            })
        })
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("recovery", &self.inner.recovery)
            .finish()
    }
}
