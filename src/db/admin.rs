//! The admin account. The site has exactly one.

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;

use super::{DbError, now_timestamp};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

impl AdminUser {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            email: row.get("email")?,
            name: row.get("name")?,
            password_hash: row.get("password_hash")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Email match is case-insensitive and ignores surrounding whitespace
pub fn get_admin_by_email(conn: &Connection, email: &str) -> Result<Option<AdminUser>, DbError> {
    let admin = conn
        .query_row(
            "SELECT * FROM admin_users WHERE lower(email) = lower(?1)",
            params![email.trim()],
            AdminUser::from_row,
        )
        .optional()?;
    Ok(admin)
}

pub fn get_admin_by_id(conn: &Connection, id: i64) -> Result<Option<AdminUser>, DbError> {
    let admin = conn
        .query_row(
            "SELECT * FROM admin_users WHERE id = ?1",
            params![id],
            AdminUser::from_row,
        )
        .optional()?;
    Ok(admin)
}

pub fn count_admins(conn: &Connection) -> Result<i64, DbError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM admin_users", [], |row| row.get(0))?)
}

pub fn create_admin(
    conn: &Connection,
    email: &str,
    name: &str,
    password_hash: &str,
) -> Result<AdminUser, DbError> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO admin_users (email, password_hash, name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![email.trim(), password_hash, name, now],
    )?;
    let id = conn.last_insert_rowid();
    get_admin_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("Admin {}", id)))
}

pub fn update_password_hash(
    conn: &Connection,
    id: i64,
    password_hash: &str,
) -> Result<(), DbError> {
    let changed = conn.execute(
        "UPDATE admin_users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
        params![password_hash, now_timestamp(), id],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("Admin {}", id)));
    }
    Ok(())
}
