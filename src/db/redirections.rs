//! Path redirections managed from the admin panel

use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DbError, now_timestamp};

pub const ALLOWED_STATUS_CODES: [u16; 4] = [301, 302, 307, 308];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Redirection {
    pub id: i64,
    pub from_path: String,
    pub to_path: String,
    pub status_code: u16,
    pub created_at: String,
}

impl Redirection {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            from_path: row.get("from_path")?,
            to_path: row.get("to_path")?,
            status_code: row.get("status_code")?,
            created_at: row.get("created_at")?,
        })
    }
}

fn default_status_code() -> u16 {
    301
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRedirection {
    pub from_path: String,
    pub to_path: String,
    #[serde(default = "default_status_code")]
    pub status_code: u16,
}

impl NewRedirection {
    pub fn new(from_path: &str, to_path: &str, status_code: u16) -> Self {
        Self {
            from_path: from_path.to_string(),
            to_path: to_path.to_string(),
            status_code,
        }
    }

    fn validate(&self) -> Result<(String, String), DbError> {
        let from = normalize_path(&self.from_path);
        let to = self.to_path.trim();

        if !from.starts_with('/') {
            return Err(DbError::Invalid(format!(
                "Redirect source '{}' must start with '/'",
                self.from_path
            )));
        }
        if to.is_empty() {
            return Err(DbError::Invalid("Redirect target is required".to_string()));
        }
        if from == normalize_path(to) {
            return Err(DbError::Invalid(format!("'{}' redirects to itself", from)));
        }
        if !ALLOWED_STATUS_CODES.contains(&self.status_code) {
            return Err(DbError::Invalid(format!(
                "Unsupported redirect status {}",
                self.status_code
            )));
        }
        Ok((from, to.to_string()))
    }
}

/// Trims whitespace and a trailing slash; the root path stays `/`
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.len() > 1 {
        trimmed.trim_end_matches('/').to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn list_redirections(conn: &Connection) -> Result<Vec<Redirection>, DbError> {
    let mut stmt = conn.prepare("SELECT * FROM redirections ORDER BY from_path")?;
    let redirections = stmt
        .query_map([], Redirection::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(redirections)
}

/// Inserts a redirection, replacing the target and status of an existing
/// one with the same source path
pub fn upsert_redirection(
    conn: &Connection,
    input: &NewRedirection,
) -> Result<Redirection, DbError> {
    let (from, to) = input.validate()?;

    let redirection = conn.query_row(
        "INSERT INTO redirections (from_path, to_path, status_code, created_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(from_path) DO UPDATE SET
            to_path = excluded.to_path,
            status_code = excluded.status_code
         RETURNING *",
        params![from, to, input.status_code, now_timestamp()],
        Redirection::from_row,
    )?;

    debug!(
        from = %redirection.from_path,
        to = %redirection.to_path,
        status = redirection.status_code,
        "Saved redirection"
    );
    Ok(redirection)
}

/// Returns false when no redirection has that id
pub fn delete_redirection(conn: &Connection, id: i64) -> Result<bool, DbError> {
    let deleted = conn.execute("DELETE FROM redirections WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}
