//! SQLite content store.
//!
//! A [`Database`] is constructed explicitly and shared by handle; there is
//! no global connection. Opening a database applies any pending migrations
//! from [`schema`].
//!
//! ## Tables
//!
//! - `authors`, `categories`, `articles`, `article_tags`, `images`
//! - `redirections` - mirrored to the JSON redirection cache
//! - `admin_users` - a single row
//! - `subscribers` - newsletter sign-ups
//! - `schema_version` - applied migrations

pub mod admin;
pub mod articles;
pub mod authors;
pub mod categories;
pub mod redirections;
pub mod schema;
pub mod seed;
pub mod subscribers;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use rusqlite::Row;
use rusqlite::types::Type;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid JSON column: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Invalid(String),

    #[error("Cannot change article status from {from} to {to}")]
    InvalidTransition {
        from: articles::ArticleStatus,
        to: articles::ArticleStatus,
    },
}

/// Handle to the SQLite database
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database file and bring its schema up to date
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), "Opening SQLite database");
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, DbError> {
        debug!("Opening in-memory SQLite database");
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let applied = schema::migrate(&mut conn)?;
        if applied > 0 {
            info!(applied, "Applied database migrations");
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        f(&conn)
    }

    pub fn schema_version(&self) -> Result<u32, DbError> {
        self.with_conn(|conn| schema::current_version(conn))
    }
}

/// Current UTC time in the format stored in timestamp columns
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Reads a JSON column, treating NULL and blank as empty
pub(crate) fn json_column<T: serde::de::DeserializeOwned + Default>(
    row: &Row,
    column: &str,
) -> Result<T, rusqlite::Error> {
    let raw: Option<String> = row.get(column)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(T::default()),
        Some(text) => serde_json::from_str(text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
        }),
    }
}

/// Lowercase, ASCII alphanumerics separated by single hyphens
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slugify(slug) == slug
}
