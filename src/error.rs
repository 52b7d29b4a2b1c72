//! error types
//!
//! structured errors for config, transport, and operation classification.
//! application-level graphql errors are never raised as [`Error`]; they
//! come back inside [`crate::GraphQlResponse`] `errors`.

use crate::graphql::GraphQlRequest;

/// library result type
pub type Result<T> = std::result::Result<T, Error>;

/// error type for the client pipeline
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// the document did not parse, or the entrypoint disagreed with the
    /// classified operation kind. raised before any network activity.
    #[error("{0}")]
    Classify(String),

    /// non-success at the transport layer. always raised; never eligible
    /// for the response chain or recovery dispatch.
    #[error("HTTP Error. Code: {status}. Message: {reason}.")]
    Transport {
        /// transport-level status code
        status: u16,
        /// transport-level status description
        reason: String,
        /// the post-transform request that was sent
        request: GraphQlRequest,
    },
}

impl Error {
    /// true if the error is a transport-level failure
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    /// true if the error is a classification failure
    pub fn is_classify_error(&self) -> bool {
        matches!(self, Error::Classify(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_message() {
        let err = Error::Transport {
            status: 500,
            reason: "Internal Server Error".to_string(),
            request: GraphQlRequest::new("{ ok }"),
        };
        assert_eq!(
            err.to_string(),
            "HTTP Error. Code: 500. Message: Internal Server Error."
        );
        assert!(err.is_transport_error());
        assert!(!err.is_classify_error());
    }

    #[test]
    fn test_classify_error_message() {
        let err = Error::Classify("Expected GraphQL query.".to_string());
        assert_eq!(err.to_string(), "Expected GraphQL query.");
        assert!(err.is_classify_error());
    }
}
