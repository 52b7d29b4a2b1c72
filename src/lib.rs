//! apibase graphql client
//!
//! a client-side request pipeline for the apibase workspace api. start
//! with [`Client`] and [`ClientConfig`], then use [`Client::request`],
//! [`Client::query`], or [`Client::mutation`] for graphql calls. ordered
//! transform steps can be injected around the request and the response,
//! and recognized server error codes can be recovered by replaying the
//! failed call.
//!
//! ## quick start
//!
//! ```no_run
//! use apibase::{Client, ClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(ClientConfig::new("my-workspace-id"))?;
//! let response = client
//!     .request("{ itemsList { items { id } } }", None, None)
//!     .await?;
//! println!("{:?}", response.data);
//! # Ok(())
//! # }
//! ```
//!
//! ## error recovery
//!
//! register callbacks per server error code; a callback can replay the
//! failing call with overrides via its `rerun` capability:
//!
//! ```no_run
//! use apibase::{Client, ClientConfig, RerunOverrides};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("my-workspace-id").catch_error(
//!     "TokenExpiredError",
//!     |_error, rerun| async move {
//!         // refresh the credential here, then replay once
//!         Ok(Some(rerun(RerunOverrides::default()).await?))
//!     },
//! );
//! let client = Client::new(config)?;
//! # Ok(())
//! # }
//! ```

mod chain;
mod client;
mod config;
mod error;
mod graphql;
mod headers;
mod operation;
mod recovery;
mod subscription;
mod transport;

pub use chain::{step, BoxFuture, HandlerChain, Next, Step};
pub use client::{Client, InvokeOptions};
pub use config::{ClientConfig, API_ENDPOINT};
pub use error::{Error, Result};
pub use graphql::{ErrorDescriptor, Exchange, FetchOptions, GraphQlRequest, GraphQlResponse, Location};
pub use headers::{HeaderSource, CONTENT_TYPE, JSON_MEDIA_TYPE};
pub use operation::{classify, starts_with_query_keyword, OperationKind};
pub use recovery::{
    catch_all_fn, recovery_fn, CatchAllFn, CaughtError, ErrorRecovery, GraphQlErrorPayload,
    RecoveryFn, Rerun, RerunOverrides, TransportErrorPayload, DEFAULT_ERROR_KEY,
};
pub use subscription::{
    ChannelConnector, ChannelEvent, ChannelEventFn, ChannelFrame, ChannelSink, ConnectionParams,
    SubscribeOptions, Subscription, SubscriptionChannel,
};
pub use transport::{HttpTransport, Transport, TransportRequest, TransportResponse};
