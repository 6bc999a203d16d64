//! GraphQL authentication context
//!
//! The transport layer extracts a bearer token, verifies it with
//! [verify_token], and injects the resulting [AuthUser] into the request's
//! GraphQL data. Resolvers only ever see presence or absence of an
//! identity, so missing, malformed, and expired tokens are
//! indistinguishable from "unauthenticated".

use async_graphql::{Context, ErrorExtensions};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::error::{ApiError, ApiResult};
use crate::services::auth::TokenClaims;

/// Request-scoped identity decoded from a verified token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub username: String,
    pub email: String,
}

/// Verify a JWT and extract the identity it carries. Pure computation over
/// the signing secret; never consults the store.
pub fn verify_token(token: &str, secret: &str) -> ApiResult<AuthUser> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let token_data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| ApiError::Authentication(format!("Invalid token: {e}")))?;

    Ok(AuthUser {
        user_id: token_data.claims.sub,
        username: token_data.claims.username,
        email: token_data.claims.email,
    })
}

/// Extension trait to get the authenticated user from a GraphQL context
pub trait AuthExt {
    /// Get the authenticated user, or fail with an authentication error
    fn auth_user(&self) -> async_graphql::Result<&AuthUser>;
}

impl AuthExt for Context<'_> {
    fn auth_user(&self) -> async_graphql::Result<&AuthUser> {
        self.data_opt::<AuthUser>().ok_or_else(|| {
            ApiError::Authentication("You need to be logged in".to_string()).extend()
        })
    }
}
