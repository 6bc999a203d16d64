//! Authentication service for user management and JWT handling
//!
//! Provides:
//! - User registration and login
//! - Password hashing with bcrypt
//! - JWT token generation
//!
//! Token verification lives in [crate::graphql::auth] next to the
//! request-context plumbing that consumes it.

use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::db::{CreateUser, Database, UserRecord};
use crate::error::{ApiError, ApiResult};

// ============================================================================
// JWT Claims
// ============================================================================

/// Claim set embedded in a signed token. Reflects the user's state at sign
/// time; verification never consults the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User ID (subject)
    pub sub: String,
    /// Username
    pub username: String,
    /// Email
    pub email: String,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

// ============================================================================
// Auth Types
// ============================================================================

/// Result of registration or login: a signed token and the user it names
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub token: String,
    pub user: UserRecord,
}

// ============================================================================
// Configuration
// ============================================================================

/// Auth service configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT signing secret
    pub jwt_secret: String,
    /// Token lifetime in seconds
    pub token_lifetime: i64,
    /// Bcrypt cost factor
    pub bcrypt_cost: u32,
}

impl From<&Config> for AuthConfig {
    fn from(config: &Config) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            token_lifetime: config.token_lifetime,
            bcrypt_cost: config.bcrypt_cost,
        }
    }
}

// ============================================================================
// Auth Service
// ============================================================================

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: Database,
    config: AuthConfig,
}

impl AuthService {
    /// Create a new auth service
    pub fn new(db: Database, config: AuthConfig) -> Self {
        Self { db, config }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a new user and sign a token for them
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> ApiResult<LoginResult> {
        if username.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(ApiError::Validation(
                "Username, email and password are all required".to_string(),
            ));
        }

        let users = self.db.users();

        // Friendlier message up front; the unique constraint is the backstop
        if users.get_by_username(username).await?.is_some() {
            return Err(ApiError::Validation(
                "Username is already in use".to_string(),
            ));
        }
        if users.get_by_email(email).await?.is_some() {
            return Err(ApiError::Validation("Email is already in use".to_string()));
        }

        let password_hash = self.hash_password(password)?;

        let user = users
            .create(CreateUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await?;

        tracing::info!(user_id = %user.id, "Registered new user");

        let token = self.sign_token(&user)?;
        Ok(LoginResult { token, user })
    }

    // ========================================================================
    // Login
    // ========================================================================

    /// Login with username or email and password. Unknown identifier and
    /// wrong password produce the same error so callers cannot tell which
    /// case occurred.
    pub async fn login(&self, username_or_email: &str, password: &str) -> ApiResult<LoginResult> {
        let users = self.db.users();

        let user = match users.get_by_username(username_or_email).await? {
            Some(u) => Some(u),
            None => users.get_by_email(username_or_email).await?,
        };

        let user = match user {
            Some(u) => u,
            None => {
                return Err(ApiError::Authentication(
                    "Incorrect username or password".to_string(),
                ));
            }
        };

        if !self.verify_password(password, &user.password_hash)? {
            return Err(ApiError::Authentication(
                "Incorrect username or password".to_string(),
            ));
        }

        let token = self.sign_token(&user)?;
        Ok(LoginResult { token, user })
    }

    // ========================================================================
    // Tokens and passwords
    // ========================================================================

    /// Sign a token carrying the user's identity claims
    pub fn sign_token(&self, user: &UserRecord) -> ApiResult<String> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            exp: (now + Duration::seconds(self.config.token_lifetime)).timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| ApiError::Operation(format!("Failed to sign token: {e}")))
    }

    /// Hash a password with bcrypt
    fn hash_password(&self, password: &str) -> ApiResult<String> {
        hash(password, self.config.bcrypt_cost)
            .map_err(|e| ApiError::Operation(format!("Failed to hash password: {e}")))
    }

    /// Verify a password against a stored hash
    fn verify_password(&self, password: &str, password_hash: &str) -> ApiResult<bool> {
        verify(password, password_hash)
            .map_err(|e| ApiError::Operation(format!("Failed to verify password: {e}")))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::graphql::auth::verify_token;

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_lifetime: 2 * 60 * 60,
            // Minimum bcrypt cost keeps the tests fast
            bcrypt_cost: 4,
        }
    }

    async fn service() -> AuthService {
        let db = Database::connect_in_memory().await.expect("database");
        AuthService::new(db, test_config())
    }

    #[tokio::test]
    async fn register_then_login_round_trip() {
        let auth = service().await;

        let registered = auth
            .register("ada", "ada@example.com", "pw123")
            .await
            .unwrap();

        let by_username = auth.login("ada", "pw123").await.unwrap();
        assert_eq!(by_username.user.id, registered.user.id);

        let by_email = auth.login("ada@example.com", "pw123").await.unwrap();
        assert_eq!(by_email.user.id, registered.user.id);

        let claims = verify_token(&by_email.token, "test-secret").unwrap();
        assert_eq!(claims.user_id, registered.user.id);
        assert_eq!(claims.username, "ada");
        assert_eq!(claims.email, "ada@example.com");
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_fail_alike() {
        let auth = service().await;
        auth.register("ada", "ada@example.com", "pw123")
            .await
            .unwrap();

        let unknown = auth.login("nobody", "pw123").await.unwrap_err();
        let wrong_pw = auth.login("ada", "wrong").await.unwrap_err();

        assert_matches!(&unknown, ApiError::Authentication(_));
        assert_matches!(&wrong_pw, ApiError::Authentication(_));
        assert_eq!(unknown.to_string(), wrong_pw.to_string());
    }

    #[tokio::test]
    async fn register_rejects_empty_fields_and_duplicates() {
        let auth = service().await;

        assert_matches!(
            auth.register("", "a@example.com", "pw").await,
            Err(ApiError::Validation(_))
        );
        assert_matches!(
            auth.register("a", "a@example.com", "").await,
            Err(ApiError::Validation(_))
        );

        auth.register("ada", "ada@example.com", "pw123")
            .await
            .unwrap();
        assert_matches!(
            auth.register("ada", "other@example.com", "pw123").await,
            Err(ApiError::Validation(_))
        );
        assert_matches!(
            auth.register("other", "ada@example.com", "pw123").await,
            Err(ApiError::Validation(_))
        );
    }

    #[tokio::test]
    async fn expired_token_fails_verification() {
        let db = Database::connect_in_memory().await.expect("database");
        let auth = AuthService::new(
            db,
            AuthConfig {
                // Well past the decoder's expiry leeway
                token_lifetime: -300,
                ..test_config()
            },
        );

        let result = auth
            .register("ada", "ada@example.com", "pw123")
            .await
            .unwrap();

        assert_matches!(
            verify_token(&result.token, "test-secret"),
            Err(ApiError::Authentication(_))
        );
    }

    #[tokio::test]
    async fn token_rejects_wrong_secret() {
        let auth = service().await;
        let result = auth
            .register("ada", "ada@example.com", "pw123")
            .await
            .unwrap();

        assert_matches!(
            verify_token(&result.token, "some-other-secret"),
            Err(ApiError::Authentication(_))
        );
    }
}
