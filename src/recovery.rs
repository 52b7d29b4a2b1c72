//! error recovery
//!
//! maps recognized application-level errors to caller-supplied recovery
//! callbacks, either a single catch-all or a code-keyed table with a
//! reserved default slot. callbacks receive a [`Rerun`] capability that
//! replays the failing call end-to-end.

use crate::chain::BoxFuture;
use crate::error::Result;
use crate::graphql::{FetchOptions, GraphQlRequest, GraphQlResponse};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// reserved table key dispatched when no error code matches
pub const DEFAULT_ERROR_KEY: &str = "default";

/// application-level failure handed to recovery callbacks
#[derive(Debug, Clone)]
pub struct GraphQlErrorPayload {
    /// the post-transform request that produced the errors
    pub request: GraphQlRequest,
    /// the full error-bearing response
    pub response: GraphQlResponse,
}

impl GraphQlErrorPayload {
    /// code of the first error, the dispatch discriminator
    pub fn code(&self) -> Option<&str> {
        self.response.errors.first().and_then(|err| err.code.as_deref())
    }
}

impl fmt::Display for GraphQlErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GraphQL Error.")?;
        if let Some(first) = self.response.errors.first() {
            if let Some(code) = &first.code {
                write!(f, " Code: {code}.")?;
            }
            if !first.message.is_empty() {
                write!(f, " Message: {}.", first.message)?;
            }
        }
        Ok(())
    }
}

/// transport-level failure reported to a legacy catch-all callback
///
/// catchers observe these; the failure is still raised to the caller.
#[derive(Debug, Clone)]
pub struct TransportErrorPayload {
    /// the post-transform request that was sent
    pub request: GraphQlRequest,
    /// transport status code
    pub status: u16,
    /// transport status description
    pub reason: String,
}

/// either failure shape a catch-all callback can observe
#[derive(Debug, Clone)]
pub enum CaughtError {
    /// application-level graphql errors (recoverable)
    GraphQl(GraphQlErrorPayload),
    /// transport failure (observe-only, raised regardless)
    Transport(TransportErrorPayload),
}

/// field overrides for a replayed call
///
/// omitted fields fall back to the attempt that produced the error being
/// recovered, so chained recoveries compose.
#[derive(Debug, Clone, Default)]
pub struct RerunOverrides {
    /// replacement document
    pub query: Option<String>,
    /// replacement variables
    pub variables: Option<serde_json::Value>,
    /// replacement fetch options
    pub fetch_options: Option<FetchOptions>,
}

impl RerunOverrides {
    /// override the variables only
    pub fn variables(variables: serde_json::Value) -> Self {
        Self {
            variables: Some(variables),
            ..Self::default()
        }
    }
}

/// replays the original call end-to-end with optional overrides
///
/// each invocation is a full new pass through the public request
/// pipeline: header recomposition, transport send, and a fresh response
/// recovery phase. recursion is unbounded by design; a callback that
/// unconditionally reruns on the same error code will never terminate.
/// keeping callbacks idempotent-aware (refresh credential, rerun once)
/// is the caller's responsibility.
pub type Rerun = Arc<dyn Fn(RerunOverrides) -> BoxFuture<Result<GraphQlResponse>> + Send + Sync>;

/// code-keyed recovery callback; `None` means no replacement produced
pub type RecoveryFn =
    Arc<dyn Fn(GraphQlErrorPayload, Rerun) -> BoxFuture<Result<Option<GraphQlResponse>>> + Send + Sync>;

/// legacy catch-all callback invoked for every failure
pub type CatchAllFn =
    Arc<dyn Fn(CaughtError, Rerun) -> BoxFuture<Result<Option<GraphQlResponse>>> + Send + Sync>;

/// wrap an async closure as a [`RecoveryFn`]
pub fn recovery_fn<F, Fut>(f: F) -> RecoveryFn
where
    F: Fn(GraphQlErrorPayload, Rerun) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Option<GraphQlResponse>>> + Send + 'static,
{
    Arc::new(move |payload, rerun| -> BoxFuture<Result<Option<GraphQlResponse>>> {
        Box::pin(f(payload, rerun))
    })
}

/// wrap an async closure as a [`CatchAllFn`]
pub fn catch_all_fn<F, Fut>(f: F) -> CatchAllFn
where
    F: Fn(CaughtError, Rerun) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Option<GraphQlResponse>>> + Send + 'static,
{
    Arc::new(move |caught, rerun| -> BoxFuture<Result<Option<GraphQlResponse>>> {
        Box::pin(f(caught, rerun))
    })
}

/// configured recovery mode, fixed at client construction
#[derive(Clone)]
pub enum ErrorRecovery {
    /// single catch-all callback
    CatchAll(CatchAllFn),
    /// code-keyed table with an optional default fallback
    Table {
        entries: HashMap<String, RecoveryFn>,
        fallback: Option<RecoveryFn>,
    },
}

impl ErrorRecovery {
    /// build table mode from a code-keyed map, splitting out the
    /// reserved default key
    pub fn from_table(mut table: HashMap<String, RecoveryFn>) -> Self {
        let fallback = table.remove(DEFAULT_ERROR_KEY);
        Self::Table {
            entries: table,
            fallback,
        }
    }

    /// dispatch an application-level error
    ///
    /// catch-all mode always invokes the callback. table mode looks up
    /// the first error's code, falls through to the default entry on a
    /// miss, and recovers nothing when neither exists.
    pub async fn dispatch(
        &self,
        payload: GraphQlErrorPayload,
        rerun: Rerun,
    ) -> Result<Option<GraphQlResponse>> {
        match self {
            Self::CatchAll(callback) => callback(CaughtError::GraphQl(payload), rerun).await,
            Self::Table { entries, fallback } => {
                let matched = payload
                    .code()
                    .and_then(|code| entries.get(code))
                    .or(fallback.as_ref());
                match matched {
                    Some(callback) => {
                        tracing::debug!(code = ?payload.code(), "dispatching error recovery");
                        callback(payload, rerun).await
                    }
                    None => Ok(None),
                }
            }
        }
    }

    /// report a transport failure to a catch-all callback
    ///
    /// table mode ignores transport failures entirely; in catch-all mode
    /// the callback's result is discarded and the failure is raised
    /// regardless.
    pub async fn notify_transport(&self, payload: TransportErrorPayload, rerun: Rerun) {
        if let Self::CatchAll(callback) = self {
            let _ = callback(CaughtError::Transport(payload), rerun).await;
        }
    }
}

impl fmt::Debug for ErrorRecovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CatchAll(_) => f.write_str("CatchAll"),
            Self::Table { entries, fallback } => f
                .debug_struct("Table")
                .field("entries", &entries.len())
                .field("fallback", &fallback.is_some())
                .finish(),
        }
    }
}
