//! graphql types
//!
//! wire types for requests, responses, and error descriptors, plus the
//! request/response pair carried through the response transform chain.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// options forwarded with a single call
///
/// `headers` are merged over constructor headers during header
/// composition; `options` are opaque to the pipeline and handed to the
/// transport collaborator unchanged.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// per-call headers (later wins over constructor headers)
    pub headers: HashMap<String, String>,
    /// opaque transport options
    pub options: HashMap<String, serde_json::Value>,
}

impl FetchOptions {
    /// add a per-call header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// one graphql request attempt
///
/// immutable per attempt: transform steps receive it by value and return
/// a full replacement, never mutating a shared copy.
#[derive(Debug, Clone)]
pub struct GraphQlRequest {
    /// graphql document text
    pub query: String,
    /// operation variables
    pub variables: Option<serde_json::Value>,
    /// per-call transport options
    pub fetch_options: FetchOptions,
}

impl GraphQlRequest {
    /// create a request with no variables or fetch options
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
            fetch_options: FetchOptions::default(),
        }
    }

    /// attach variables
    pub fn with_variables(mut self, variables: serde_json::Value) -> Self {
        self.variables = Some(variables);
        self
    }

    /// json body sent to the transport: `{query, variables?}`
    pub fn to_body(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert("query".to_string(), serde_json::Value::String(self.query.clone()));
        if let Some(variables) = &self.variables {
            body.insert("variables".to_string(), variables.clone());
        }
        serde_json::Value::Object(body)
    }
}

/// graphql response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQlResponse<T = serde_json::Value> {
    /// response data or null on failure
    #[serde(default)]
    pub data: Option<T>,
    /// graphql errors array
    #[serde(default)]
    pub errors: Vec<ErrorDescriptor>,
}

impl<T> GraphQlResponse<T> {
    /// true if the response contains graphql errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// graphql error entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    /// error message
    #[serde(default)]
    pub message: String,
    /// server error code, the discriminator for recovery dispatch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// response path (strings and indices; servers may send a bare
    /// scalar instead of a sequence)
    #[serde(
        default,
        deserialize_with = "scalar_or_sequence",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub path: Vec<serde_json::Value>,
    /// error locations in the query
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    /// opaque details payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// normalizes a scalar path entry to a one-element sequence
fn scalar_or_sequence<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Array(entries) => entries,
        serde_json::Value::Null => Vec::new(),
        scalar => vec![scalar],
    })
}

/// graphql error location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    /// line number (1-based)
    pub line: i64,
    /// column number (1-based)
    pub column: i64,
}

/// request/response pair carried through the response transform chain
#[derive(Debug, Clone)]
pub struct Exchange {
    /// the post-transform request that produced the response
    pub request: GraphQlRequest,
    /// the decoded (possibly recovered) response
    pub response: GraphQlResponse,
}
