//! Versioned schema migrations.
//!
//! Each migration runs exactly once, inside a transaction, and is recorded
//! in `schema_version`. A failing migration rolls back and its error is
//! returned to the caller.

use rusqlite::{Connection, params};
use tracing::info;

use super::DbError;

pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "base tables",
        sql: r#"
CREATE TABLE authors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    email TEXT UNIQUE,
    bio TEXT,
    avatar TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    excerpt TEXT,
    content TEXT,
    featured_image TEXT,
    featured_image_alt TEXT,
    meta_title TEXT,
    meta_description TEXT,
    author_id INTEGER NOT NULL REFERENCES authors(id) ON DELETE CASCADE,
    category_id INTEGER REFERENCES categories(id) ON DELETE CASCADE,
    status TEXT NOT NULL DEFAULT 'draft'
        CHECK (status IN ('draft', 'published', 'archived')),
    published_at TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_articles_status ON articles(status, published_at);
CREATE INDEX idx_articles_author ON articles(author_id);
CREATE INDEX idx_articles_category ON articles(category_id);

CREATE TABLE article_tags (
    article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
    tag TEXT NOT NULL,
    PRIMARY KEY (article_id, tag)
);

CREATE TABLE images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,
    url TEXT NOT NULL,
    alt_text TEXT,
    uploaded_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE redirections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_path TEXT NOT NULL UNIQUE,
    to_path TEXT NOT NULL,
    status_code INTEGER NOT NULL DEFAULT 301,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE admin_users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
    },
    Migration {
        version: 2,
        description: "author profile columns",
        sql: r#"
ALTER TABLE authors ADD COLUMN job_title TEXT;
ALTER TABLE authors ADD COLUMN location TEXT;
ALTER TABLE authors ADD COLUMN website TEXT;
ALTER TABLE authors ADD COLUMN twitter TEXT;
ALTER TABLE authors ADD COLUMN linkedin TEXT;
ALTER TABLE authors ADD COLUMN github TEXT;
ALTER TABLE authors ADD COLUMN expertise TEXT NOT NULL DEFAULT '[]';
ALTER TABLE authors ADD COLUMN career_highlights TEXT NOT NULL DEFAULT '[]';
"#,
    },
    Migration {
        version: 3,
        description: "seo columns on authors and categories",
        sql: r#"
ALTER TABLE authors ADD COLUMN meta_title TEXT;
ALTER TABLE authors ADD COLUMN meta_description TEXT;
ALTER TABLE authors ADD COLUMN custom_schema TEXT;
ALTER TABLE authors ADD COLUMN noindex INTEGER NOT NULL DEFAULT 0;
ALTER TABLE authors ADD COLUMN nofollow INTEGER NOT NULL DEFAULT 0;
ALTER TABLE categories ADD COLUMN meta_title TEXT;
ALTER TABLE categories ADD COLUMN meta_description TEXT;
ALTER TABLE categories ADD COLUMN noindex INTEGER NOT NULL DEFAULT 0;
ALTER TABLE categories ADD COLUMN nofollow INTEGER NOT NULL DEFAULT 0;
"#,
    },
    Migration {
        version: 4,
        description: "newsletter subscribers and article views",
        sql: r#"
CREATE TABLE subscribers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

ALTER TABLE articles ADD COLUMN view_count INTEGER NOT NULL DEFAULT 0;
"#,
    },
];

pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

fn ensure_version_table(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;
    Ok(())
}

/// Highest applied migration, 0 for a fresh database
pub fn current_version(conn: &Connection) -> Result<u32, DbError> {
    ensure_version_table(conn)?;
    let version: Option<u32> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}

/// Applies every pending migration in order. Returns how many ran.
pub fn migrate(conn: &mut Connection) -> Result<usize, DbError> {
    let current = current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        info!(
            version = migration.version,
            description = migration.description,
            "Applying migration"
        );

        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql).map_err(|e| {
            DbError::Invalid(format!(
                "Migration {} ({}) failed: {}",
                migration.version, migration.description, e
            ))
        })?;
        tx.execute(
            "INSERT INTO schema_version (version, description) VALUES (?1, ?2)",
            params![migration.version, migration.description],
        )?;
        tx.commit()?;

        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_names(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_migrations_are_ordered() {
        let versions: Vec<u32> = MIGRATIONS.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(versions, sorted);
        assert_eq!(latest_version(), 4);
    }

    #[test]
    fn test_fresh_database_gets_every_migration_once() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(migrate(&mut conn).unwrap(), MIGRATIONS.len());
        assert_eq!(current_version(&conn).unwrap(), latest_version());
        assert_eq!(migrate(&mut conn).unwrap(), 0);

        let recorded: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(recorded, MIGRATIONS.len() as i64);

        let author_columns = column_names(&conn, "authors");
        for column in ["job_title", "expertise", "career_highlights", "custom_schema", "noindex"] {
            assert!(author_columns.iter().any(|c| c == column), "missing {}", column);
        }
        assert!(column_names(&conn, "articles").iter().any(|c| c == "view_count"));
    }

    #[test]
    fn test_older_schema_is_upgraded() {
        let mut conn = Connection::open_in_memory().unwrap();
        ensure_version_table(&conn).unwrap();
        conn.execute_batch(MIGRATIONS[0].sql).unwrap();
        conn.execute(
            "INSERT INTO schema_version (version, description) VALUES (1, 'base tables')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO authors (name, slug) VALUES ('Legacy', 'legacy')",
            [],
        )
        .unwrap();

        assert_eq!(migrate(&mut conn).unwrap(), 3);

        let expertise: String = conn
            .query_row("SELECT expertise FROM authors WHERE slug = 'legacy'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(expertise, "[]");
    }

    #[test]
    fn test_failing_migration_is_reported_and_rolled_back() {
        let mut conn = Connection::open_in_memory().unwrap();
        ensure_version_table(&conn).unwrap();
        conn.execute_batch(MIGRATIONS[0].sql).unwrap();
        conn.execute(
            "INSERT INTO schema_version (version, description) VALUES (1, 'base tables')",
            [],
        )
        .unwrap();
        // column added out of band, so migration 2 collides with it
        conn.execute_batch("ALTER TABLE authors ADD COLUMN job_title TEXT;")
            .unwrap();

        let err = migrate(&mut conn).unwrap_err();
        assert!(err.to_string().contains("Migration 2"));
        assert_eq!(current_version(&conn).unwrap(), 1);
        assert!(!column_names(&conn, "authors").iter().any(|c| c == "location"));
    }
}
