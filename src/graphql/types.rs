//! GraphQL object and input types
//!
//! Field names follow the original client-facing schema: `_id` on User,
//! camelCase everywhere else. `password_hash` never crosses this boundary.

use async_graphql::{InputObject, Object, SimpleObject};

use crate::db::{BookRecord, UserRecord, UserWithBooks};

/// A user and their saved-book collection
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub saved_books: Vec<Book>,
}

#[Object]
impl User {
    #[graphql(name = "_id")]
    async fn id(&self) -> &str {
        &self.id
    }

    async fn username(&self) -> &str {
        &self.username
    }

    async fn email(&self) -> &str {
        &self.email
    }

    /// Number of saved books
    async fn book_count(&self) -> i64 {
        self.saved_books.len() as i64
    }

    async fn saved_books(&self) -> &[Book] {
        &self.saved_books
    }
}

/// A book in a user's collection, unique per `bookId`
#[derive(Debug, Clone, SimpleObject)]
pub struct Book {
    pub book_id: String,
    pub authors: Vec<String>,
    pub description: String,
    pub title: String,
    pub image: Option<String>,
    pub link: Option<String>,
}

/// Book payload for `saveBook`
#[derive(Debug, Clone, InputObject)]
pub struct BookInput {
    pub book_id: String,
    pub authors: Vec<String>,
    pub description: String,
    pub title: String,
    pub image: Option<String>,
    pub link: Option<String>,
}

/// Result of `createUser`/`login`: a signed token plus the user it names
#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "Auth")]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

impl From<BookRecord> for Book {
    fn from(b: BookRecord) -> Self {
        Self {
            book_id: b.book_id,
            authors: b.authors,
            description: b.description,
            title: b.title,
            image: b.image,
            link: b.link,
        }
    }
}

impl From<BookInput> for BookRecord {
    fn from(b: BookInput) -> Self {
        Self {
            book_id: b.book_id,
            title: b.title,
            authors: b.authors,
            description: b.description,
            image: b.image,
            link: b.link,
        }
    }
}

impl From<UserWithBooks> for User {
    fn from(u: UserWithBooks) -> Self {
        Self {
            id: u.user.id,
            username: u.user.username,
            email: u.user.email,
            saved_books: u.saved_books.into_iter().map(Book::from).collect(),
        }
    }
}

/// A bare record maps to a user with no books materialized (fresh
/// registrations and login responses)
impl From<UserRecord> for User {
    fn from(u: UserRecord) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            saved_books: Vec::new(),
        }
    }
}
