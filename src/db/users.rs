//! Users repository: lookup, creation, and set-semantics mutation of a
//! user's saved-book collection.
//!
//! `save_book` and `delete_book` are single conditional statements, never
//! read-then-write, so two concurrent requests for the same user cannot
//! race into a duplicate entry or a lost delete.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

use super::sqlite_helpers::{json_to_vec, now_iso8601, vec_to_json};

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// A book embedded in a user's collection, value-equal by `book_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookRecord {
    pub book_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub description: String,
    pub image: Option<String>,
    pub link: Option<String>,
}

/// A user with their saved books fully materialized
#[derive(Debug, Clone)]
pub struct UserWithBooks {
    pub user: UserRecord,
    pub saved_books: Vec<BookRecord>,
}

type UserRow = (String, String, String, String, String, String);
type BookRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
);

fn row_to_user(r: UserRow) -> UserRecord {
    UserRecord {
        id: r.0,
        username: r.1,
        email: r.2,
        password_hash: r.3,
        created_at: r.4,
        updated_at: r.5,
    }
}

fn row_to_book(r: BookRow) -> BookRecord {
    BookRecord {
        book_id: r.0,
        title: r.1,
        authors: json_to_vec(&r.2),
        description: r.3,
        image: r.4,
        link: r.5,
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at, updated_at";

fn store_error(e: sqlx::Error) -> ApiError {
    ApiError::Operation(e.to_string())
}

// ============================================================================
// Repository
// ============================================================================

pub struct UsersRepository {
    pool: SqlitePool,
}

impl UsersRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Get user by ID
    pub async fn get_by_id(&self, id: &str) -> ApiResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(row_to_user))
    }

    /// Get user by username (case-insensitive)
    pub async fn get_by_username(&self, username: &str) -> ApiResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ? COLLATE NOCASE"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(row_to_user))
    }

    /// Get user by email (case-insensitive)
    pub async fn get_by_email(&self, email: &str) -> ApiResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(row_to_user))
    }

    /// Find a user matching either identifier (OR semantics, single query).
    /// NULL binds match nothing, so calling with both `None` is a miss.
    pub async fn find_by_id_or_username(
        &self,
        id: Option<&str>,
        username: Option<&str>,
    ) -> ApiResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ? OR username = ? COLLATE NOCASE"
        ))
        .bind(id)
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(row_to_user))
    }

    /// Saved books for a user, in insertion order
    pub async fn saved_books(&self, user_id: &str) -> ApiResult<Vec<BookRecord>> {
        let rows = sqlx::query_as::<_, BookRow>(
            "SELECT book_id, title, authors, description, image, link
             FROM saved_books WHERE user_id = ? ORDER BY position",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(row_to_book).collect())
    }

    /// Get user by ID with their saved books materialized
    pub async fn get_with_books(&self, id: &str) -> ApiResult<Option<UserWithBooks>> {
        let user = match self.get_by_id(id).await? {
            Some(u) => u,
            None => return Ok(None),
        };
        let saved_books = self.saved_books(&user.id).await?;
        Ok(Some(UserWithBooks { user, saved_books }))
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Create a new user with zero saved books. Uniqueness violations on
    /// username or email surface as [ApiError::Validation].
    pub async fn create(&self, user: CreateUser) -> ApiResult<UserRecord> {
        let id = Uuid::new_v4().to_string();
        let now = now_iso8601();

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::Validation("Username or email is already in use".to_string())
            }
            _ => store_error(e),
        })?;

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| ApiError::Operation("Failed to create user".to_string()))
    }

    // ========================================================================
    // Saved-book set mutations
    // ========================================================================

    /// Atomically add a book to the user's collection unless an entry with
    /// the same `book_id` already exists. Returns the user's resulting
    /// state; [ApiError::NotFound] if the user does not exist.
    pub async fn save_book(&self, user_id: &str, book: &BookRecord) -> ApiResult<UserWithBooks> {
        sqlx::query(
            r#"
            INSERT INTO saved_books (user_id, book_id, title, authors, description, image, link, position)
            VALUES (?, ?, ?, ?, ?, ?, ?,
                    COALESCE((SELECT MAX(position) + 1 FROM saved_books WHERE user_id = ?), 0))
            ON CONFLICT (user_id, book_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(&book.book_id)
        .bind(&book.title)
        .bind(vec_to_json(&book.authors))
        .bind(&book.description)
        .bind(&book.image)
        .bind(&book.link)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                ApiError::NotFound(format!("No user found with id {user_id}"))
            }
            _ => store_error(e),
        })?;

        self.get_with_books(user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("No user found with id {user_id}")))
    }

    /// Atomically remove every saved book matching `book_id`. Removing an
    /// absent book is a success no-op; [ApiError::NotFound] only if the
    /// user itself does not exist.
    pub async fn delete_book(&self, user_id: &str, book_id: &str) -> ApiResult<UserWithBooks> {
        sqlx::query("DELETE FROM saved_books WHERE user_id = ? AND book_id = ?")
            .bind(user_id)
            .bind(book_id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        self.get_with_books(user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("No user found with id {user_id}")))
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
    use crate::db::Database;

    async fn setup() -> Database {
        Database::connect_in_memory()
            .await
            .expect("in-memory database")
    }

    fn book(book_id: &str, title: &str) -> BookRecord {
        BookRecord {
            book_id: book_id.to_string(),
            title: title.to_string(),
            authors: vec!["Author".to_string()],
            description: "A description".to_string(),
            image: None,
            link: None,
        }
    }

    async fn create_user(db: &Database, username: &str, email: &str) -> UserRecord {
        db.users()
            .create(CreateUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash: "$2b$04$fakehashfakehashfakehash".to_string(),
            })
            .await
            .expect("create user")
    }

    #[tokio::test]
    async fn create_rejects_duplicate_username_and_email() {
        let db = setup().await;
        create_user(&db, "ada", "ada@example.com").await;

        let dup_username = db
            .users()
            .create(CreateUser {
                username: "Ada".to_string(),
                email: "other@example.com".to_string(),
                password_hash: "h".to_string(),
            })
            .await;
        assert_matches!(dup_username, Err(ApiError::Validation(_)));

        let dup_email = db
            .users()
            .create(CreateUser {
                username: "grace".to_string(),
                email: "ADA@example.com".to_string(),
                password_hash: "h".to_string(),
            })
            .await;
        assert_matches!(dup_email, Err(ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn find_by_id_or_username_matches_either() {
        let db = setup().await;
        let user = create_user(&db, "ada", "ada@example.com").await;
        let users = db.users();

        let by_id = users
            .find_by_id_or_username(Some(&user.id), None)
            .await
            .unwrap();
        assert_eq!(by_id.map(|u| u.id), Some(user.id.clone()));

        let by_name = users
            .find_by_id_or_username(None, Some("ada"))
            .await
            .unwrap();
        assert_eq!(by_name.map(|u| u.id), Some(user.id));

        let neither = users.find_by_id_or_username(None, None).await.unwrap();
        assert!(neither.is_none());
    }

    #[tokio::test]
    async fn save_book_is_add_if_absent() {
        let db = setup().await;
        let user = create_user(&db, "ada", "ada@example.com").await;
        let users = db.users();

        let after_first = users.save_book(&user.id, &book("B1", "X")).await.unwrap();
        assert_eq!(after_first.saved_books.len(), 1);

        // Same bookId again, different payload: set is unchanged
        let after_second = users
            .save_book(&user.id, &book("B1", "Renamed"))
            .await
            .unwrap();
        assert_eq!(after_second.saved_books.len(), 1);
        assert_eq!(after_second.saved_books[0].title, "X");
    }

    #[tokio::test]
    async fn save_book_preserves_insertion_order() {
        let db = setup().await;
        let user = create_user(&db, "ada", "ada@example.com").await;
        let users = db.users();

        users.save_book(&user.id, &book("B1", "First")).await.unwrap();
        users.save_book(&user.id, &book("B2", "Second")).await.unwrap();
        let state = users.save_book(&user.id, &book("B3", "Third")).await.unwrap();

        let ids: Vec<_> = state.saved_books.iter().map(|b| b.book_id.as_str()).collect();
        assert_eq!(ids, vec!["B1", "B2", "B3"]);
    }

    #[tokio::test]
    async fn save_book_for_missing_user_is_not_found() {
        let db = setup().await;
        let result = db.users().save_book("no-such-user", &book("B1", "X")).await;
        assert_matches!(result, Err(ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_book_is_idempotent() {
        let db = setup().await;
        let user = create_user(&db, "ada", "ada@example.com").await;
        let users = db.users();

        users.save_book(&user.id, &book("B1", "X")).await.unwrap();

        let once = users.delete_book(&user.id, "B1").await.unwrap();
        assert!(once.saved_books.is_empty());

        // Absent bookId still succeeds and leaves the set unchanged
        let twice = users.delete_book(&user.id, "B1").await.unwrap();
        assert!(twice.saved_books.is_empty());

        let never_there = users.delete_book(&user.id, "B9").await.unwrap();
        assert!(never_there.saved_books.is_empty());
    }

    #[tokio::test]
    async fn delete_book_for_missing_user_is_not_found() {
        let db = setup().await;
        let result = db.users().delete_book("no-such-user", "B1").await;
        assert_matches!(result, Err(ApiError::NotFound(_)));
    }
}
