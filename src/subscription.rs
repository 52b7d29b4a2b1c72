//! subscription channel management
//!
//! one duplex channel per client, opened lazily and shared by every
//! subscription. the socket itself is an injected collaborator
//! ([`ChannelConnector`]); this module owns the per-subscription
//! registry, frame routing, and lifecycle observer forwarding. reconnect
//! logic belongs to the collaborator, not here.

use crate::chain::BoxFuture;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::graphql::GraphQlResponse;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use tokio::sync::Mutex;
use tracing::debug;

/// lifecycle notification forwarded from the channel collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Connecting,
    Connected,
    Reconnecting,
    Reconnected,
    Disconnected,
    Error(String),
}

/// registered lifecycle observer
pub type ChannelEventFn = Arc<dyn Fn(ChannelEvent) + Send + Sync>;

/// channel connection parameters, static or produced at open time
#[derive(Clone)]
pub enum ConnectionParams {
    Static(serde_json::Map<String, serde_json::Value>),
    Fn(Arc<dyn Fn() -> serde_json::Map<String, serde_json::Value> + Send + Sync>),
}

impl ConnectionParams {
    fn produce(&self) -> serde_json::Map<String, serde_json::Value> {
        match self {
            Self::Static(map) => map.clone(),
            Self::Fn(f) => f(),
        }
    }
}

/// frame delivered by the channel collaborator for one subscription
#[derive(Debug, Clone)]
pub enum ChannelFrame {
    /// subscription result
    Data { id: u64, response: GraphQlResponse },
    /// per-subscription error payload
    Error { id: u64, error: serde_json::Value },
    /// server completed the subscription
    Complete { id: u64 },
}

/// an open duplex channel, as seen by the manager
pub trait SubscriptionChannel: Send + Sync {
    /// send a subscribe frame for one subscription
    fn start(
        &self,
        id: u64,
        query: String,
        variables: Option<serde_json::Value>,
    ) -> BoxFuture<Result<()>>;

    /// cancel one subscription
    fn stop(&self, id: u64) -> BoxFuture<Result<()>>;

    /// tear the channel down entirely
    fn close(&self) -> BoxFuture<Result<()>>;
}

/// opens the duplex channel
///
/// the collaborator receives the merged connection parameters and a
/// [`ChannelSink`] through which it delivers frames and lifecycle
/// events for the lifetime of the channel.
pub trait ChannelConnector: Send + Sync {
    fn connect(
        &self,
        params: serde_json::Map<String, serde_json::Value>,
        sink: ChannelSink,
    ) -> BoxFuture<Result<Arc<dyn SubscriptionChannel>>>;
}

struct Subscriber {
    on_data: Option<Arc<dyn Fn(GraphQlResponse) + Send + Sync>>,
    on_error: Option<Arc<dyn Fn(serde_json::Value) + Send + Sync>>,
}

type Registry = HashMap<u64, Subscriber>;

fn lock_registry(registry: &StdMutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// handed to the channel collaborator at connect time
#[derive(Clone)]
pub struct ChannelSink {
    registry: Arc<StdMutex<Registry>>,
    observers: Arc<[ChannelEventFn]>,
}

impl ChannelSink {
    /// route one frame to its subscription's callbacks
    pub fn deliver(&self, frame: ChannelFrame) {
        match frame {
            ChannelFrame::Data { id, response } => {
                let on_data = lock_registry(&self.registry)
                    .get(&id)
                    .and_then(|sub| sub.on_data.clone());
                if let Some(on_data) = on_data {
                    on_data(response);
                }
            }
            ChannelFrame::Error { id, error } => {
                let on_error = lock_registry(&self.registry)
                    .get(&id)
                    .and_then(|sub| sub.on_error.clone());
                if let Some(on_error) = on_error {
                    on_error(error);
                }
            }
            ChannelFrame::Complete { id } => {
                lock_registry(&self.registry).remove(&id);
            }
        }
    }

    /// forward a lifecycle event to every registered observer
    pub fn notify(&self, event: ChannelEvent) {
        for observer in self.observers.iter() {
            observer(event.clone());
        }
    }
}

/// per-subscription callbacks and variables
#[derive(Default)]
pub struct SubscribeOptions {
    /// operation variables sent with the subscribe frame
    pub variables: Option<serde_json::Value>,
    pub(crate) on_data: Option<Arc<dyn Fn(GraphQlResponse) + Send + Sync>>,
    pub(crate) on_error: Option<Arc<dyn Fn(serde_json::Value) + Send + Sync>>,
}

impl SubscribeOptions {
    /// attach variables
    pub fn with_variables(mut self, variables: serde_json::Value) -> Self {
        self.variables = Some(variables);
        self
    }

    /// callback invoked for each subscription result
    pub fn on_data<F>(mut self, f: F) -> Self
    where
        F: Fn(GraphQlResponse) + Send + Sync + 'static,
    {
        self.on_data = Some(Arc::new(f));
        self
    }

    /// callback invoked for per-subscription errors
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(serde_json::Value) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for SubscribeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscribeOptions")
            .field("variables", &self.variables)
            .field("on_data", &self.on_data.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// active subscription handle
///
/// dropping the handle does nothing; call [`Subscription::unsubscribe`]
/// to cancel callback delivery and send the stop frame. the underlying
/// channel stays open for other subscriptions.
pub struct Subscription {
    id: u64,
    registry: Arc<StdMutex<Registry>>,
    channel: Arc<dyn SubscriptionChannel>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Subscription {
    /// cancel this subscription only
    pub async fn unsubscribe(self) -> Result<()> {
        lock_registry(&self.registry).remove(&self.id);
        self.channel.stop(self.id).await
    }
}

/// owns the lazily-opened channel and the subscription registry
pub(crate) struct SubscriptionManager {
    connector: Option<Arc<dyn ChannelConnector>>,
    params: Option<ConnectionParams>,
    workspace_id: String,
    observers: Arc<[ChannelEventFn]>,
    registry: Arc<StdMutex<Registry>>,
    // memoized open: the lock is held across connect so concurrent first
    // subscriptions resolve to the same channel
    state: Mutex<Option<Arc<dyn SubscriptionChannel>>>,
    next_id: AtomicU64,
}

impl SubscriptionManager {
    pub(crate) fn new(config: &ClientConfig) -> Self {
        Self {
            connector: config.channel.clone(),
            params: config.connection_params.clone(),
            workspace_id: config.workspace_id.clone(),
            observers: config.channel_observers.clone().into(),
            registry: Arc::new(StdMutex::new(HashMap::new())),
            state: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// open the channel once and reuse it afterwards
    async fn ensure_open(&self) -> Result<Arc<dyn SubscriptionChannel>> {
        let mut state = self.state.lock().await;
        if let Some(channel) = state.as_ref() {
            return Ok(channel.clone());
        }

        let connector = self.connector.as_ref().ok_or_else(|| {
            Error::Config("no subscription channel configured".to_string())
        })?;

        // caller params first; the workspace id is merged last and wins
        let mut params = self
            .params
            .as_ref()
            .map(ConnectionParams::produce)
            .unwrap_or_default();
        params.insert(
            "workspaceId".to_string(),
            serde_json::Value::String(self.workspace_id.clone()),
        );

        debug!(workspace_id = %self.workspace_id, "opening subscription channel");
        let sink = ChannelSink {
            registry: self.registry.clone(),
            observers: self.observers.clone(),
        };
        let channel = connector.connect(params, sink).await?;
        *state = Some(channel.clone());
        Ok(channel)
    }

    pub(crate) async fn subscribe(
        &self,
        query: &str,
        options: SubscribeOptions,
    ) -> Result<Subscription> {
        let channel = self.ensure_open().await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        lock_registry(&self.registry).insert(
            id,
            Subscriber {
                on_data: options.on_data,
                on_error: options.on_error,
            },
        );

        if let Err(err) = channel.start(id, query.to_string(), options.variables).await {
            lock_registry(&self.registry).remove(&id);
            return Err(err);
        }

        Ok(Subscription {
            id,
            registry: self.registry.clone(),
            channel,
        })
    }

    /// tear down the channel; every subscription on it terminates
    pub(crate) async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(channel) = state.take() {
            lock_registry(&self.registry).clear();
            channel.close().await?;
        }
        Ok(())
    }
}
