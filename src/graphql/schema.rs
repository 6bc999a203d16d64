//! GraphQL schema: queries and mutations for the book-tracking API
//!
//! Operation semantics:
//! - `me`, `saveBook`, `deleteBook` require an authenticated identity.
//! - `saveBook`/`deleteBook` delegate the set mutation to the repository's
//!   atomic conditional updates; the resolvers never check-then-write.
//! - Store failures during the two mutations are logged and re-raised with
//!   a generic message so internal detail never reaches a client.

use async_graphql::{Context, EmptySubscription, Object, Result, ResultExt, Schema};

use crate::db::Database;
use crate::error::ApiError;
use crate::services::AuthService;

use super::auth::AuthExt;
use super::types::{AuthPayload, BookInput, User};

/// The GraphQL schema type
pub type BookshelfSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the GraphQL schema with all resolvers
pub fn build_schema(db: Database, auth: AuthService) -> BookshelfSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(db)
        .data(auth)
        .finish()
}

// ============================================================================
// Query Root
// ============================================================================

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Get the current authenticated user with their saved books
    async fn me(&self, ctx: &Context<'_>) -> Result<User> {
        let identity = ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();

        let user = db
            .users()
            .get_with_books(&identity.user_id)
            .await
            .extend()?
            .ok_or_else(|| ApiError::NotFound("Cannot find a user with this id".to_string()))
            .extend()?;

        Ok(user.into())
    }

    /// Look up a user by id or username (either one matches)
    async fn get_single_user(
        &self,
        ctx: &Context<'_>,
        id: Option<String>,
        username: Option<String>,
    ) -> Result<User> {
        let db = ctx.data_unchecked::<Database>();
        let users = db.users();

        let user = users
            .find_by_id_or_username(id.as_deref(), username.as_deref())
            .await
            .extend()?
            .ok_or_else(|| {
                ApiError::NotFound("Cannot find a user with this id or username".to_string())
            })
            .extend()?;

        let saved_books = users.saved_books(&user.id).await.extend()?;
        Ok(crate::db::UserWithBooks { user, saved_books }.into())
    }
}

// ============================================================================
// Mutation Root
// ============================================================================

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Register a new user and return a signed token for them
    async fn create_user(
        &self,
        ctx: &Context<'_>,
        username: String,
        email: String,
        password: String,
    ) -> Result<AuthPayload> {
        let auth = ctx.data_unchecked::<AuthService>();
        let result = auth.register(&username, &email, &password).await.extend()?;

        Ok(AuthPayload {
            token: result.token,
            user: result.user.into(),
        })
    }

    /// Login with username or email. Unknown identifier and wrong password
    /// are reported identically.
    async fn login(
        &self,
        ctx: &Context<'_>,
        username_or_email: String,
        password: String,
    ) -> Result<AuthPayload> {
        let auth = ctx.data_unchecked::<AuthService>();
        let db = ctx.data_unchecked::<Database>();

        let result = auth.login(&username_or_email, &password).await.extend()?;
        let saved_books = db.users().saved_books(&result.user.id).await.extend()?;

        Ok(AuthPayload {
            token: result.token,
            user: crate::db::UserWithBooks {
                user: result.user,
                saved_books,
            }
            .into(),
        })
    }

    /// Add a book to the current user's collection unless an entry with the
    /// same bookId already exists
    async fn save_book(&self, ctx: &Context<'_>, book_input: BookInput) -> Result<User> {
        let identity = ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();

        let updated = db
            .users()
            .save_book(&identity.user_id, &book_input.into())
            .await
            .map_err(|e| match e {
                ApiError::Operation(detail) => {
                    tracing::error!(error = %detail, "saveBook store operation failed");
                    ApiError::Operation("Failed to save the book".to_string())
                }
                other => other,
            })
            .extend()?;

        Ok(updated.into())
    }

    /// Remove a book from the current user's collection. Removing an absent
    /// bookId succeeds and leaves the collection unchanged.
    async fn delete_book(&self, ctx: &Context<'_>, book_id: String) -> Result<User> {
        let identity = ctx.auth_user()?;
        let db = ctx.data_unchecked::<Database>();

        let updated = db
            .users()
            .delete_book(&identity.user_id, &book_id)
            .await
            .map_err(|e| match e {
                ApiError::Operation(detail) => {
                    tracing::error!(error = %detail, "deleteBook store operation failed");
                    ApiError::Operation("Failed to delete the book".to_string())
                }
                other => other,
            })
            .extend()?;

        Ok(updated.into())
    }
}

// ============================================================================
// Tests
// ============================================================================
