//! header composition
//!
//! merges header sources (static map, sync or async producer, per-call
//! override) left-to-right, then pins the content type. nothing a caller
//! supplies can override the body encoding.

use crate::chain::BoxFuture;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// header name forced on every composed request
pub const CONTENT_TYPE: &str = "content-type";

/// media type forced on every composed request
pub const JSON_MEDIA_TYPE: &str = "application/json";

type HeaderMap = HashMap<String, String>;

/// one source of headers
#[derive(Clone)]
pub enum HeaderSource {
    /// fixed header map
    Static(HeaderMap),
    /// produced per call
    Fn(Arc<dyn Fn() -> HeaderMap + Send + Sync>),
    /// produced per call, possibly suspending
    AsyncFn(Arc<dyn Fn() -> BoxFuture<Result<HeaderMap>> + Send + Sync>),
}

impl HeaderSource {
    /// source from a fixed map
    pub fn from_map(map: HeaderMap) -> Self {
        Self::Static(map)
    }

    /// source from a sync producer
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> HeaderMap + Send + Sync + 'static,
    {
        Self::Fn(Arc::new(f))
    }

    /// source from an async producer
    pub fn from_async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<HeaderMap>> + Send + 'static,
    {
        Self::AsyncFn(Arc::new(move || -> BoxFuture<Result<HeaderMap>> { Box::pin(f()) }))
    }

    async fn produce(&self) -> Result<HeaderMap> {
        match self {
            Self::Static(map) => Ok(map.clone()),
            Self::Fn(f) => Ok(f()),
            Self::AsyncFn(f) => f().await,
        }
    }
}

impl std::fmt::Debug for HeaderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(map) => f.debug_tuple("Static").field(&map.len()).finish(),
            Self::Fn(_) => f.write_str("Fn"),
            Self::AsyncFn(_) => f.write_str("AsyncFn"),
        }
    }
}

/// evaluate sources in order and shallow-merge left-to-right
///
/// later sources override earlier keys; the content type is applied
/// last, unconditionally.
pub async fn compose(sources: &[HeaderSource]) -> Result<HeaderMap> {
    let mut merged = HeaderMap::new();
    for source in sources {
        merged.extend(source.produce().await?);
    }
    merged.insert(CONTENT_TYPE.to_string(), JSON_MEDIA_TYPE.to_string());
    Ok(merged)
}
