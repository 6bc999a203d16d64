//! Error taxonomy for the API
//!
//! Every failure that crosses the GraphQL boundary is one of these four
//! variants. Conversion into [async_graphql::Error] attaches a `code`
//! extension so clients can branch on the kind without parsing messages.

use async_graphql::ErrorExtensions;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad or duplicate input, local to a single operation.
    #[error("{0}")]
    Validation(String),

    /// Missing/invalid/expired identity, or wrong credentials.
    #[error("{0}")]
    Authentication(String),

    /// A referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Unexpected store failure. The message may carry internal detail;
    /// resolvers replace it with a generic one before it reaches a client.
    #[error("{0}")]
    Operation(String),
}

impl ApiError {
    /// Error code exposed in GraphQL error extensions.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "BAD_USER_INPUT",
            ApiError::Authentication(_) => "UNAUTHENTICATED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Operation(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> async_graphql::Error {
        let code = self.code();
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", code))
    }
}
