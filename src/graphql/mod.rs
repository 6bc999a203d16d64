pub mod auth;
mod schema;
pub mod types;

pub use auth::{verify_token, AuthUser};
pub use schema::{build_schema, BookshelfSchema, MutationRoot, QueryRoot};
