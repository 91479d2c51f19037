//! Newsletter subscribers

use rusqlite::{Connection, params};

use super::{DbError, now_timestamp};

/// Adds an email to the list. Returns false when it was already
/// subscribed; that is not an error.
pub fn subscribe(conn: &Connection, email: &str) -> Result<bool, DbError> {
    let inserted = conn.execute(
        "INSERT INTO subscribers (email, created_at) VALUES (lower(?1), ?2)
         ON CONFLICT(email) DO NOTHING",
        params![email.trim(), now_timestamp()],
    )?;
    Ok(inserted > 0)
}

pub fn count_subscribers(conn: &Connection) -> Result<i64, DbError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM subscribers", [], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_subscribe_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.with_conn(|conn| subscribe(conn, "reader@example.com")).unwrap());
        assert!(!db.with_conn(|conn| subscribe(conn, " Reader@Example.com ")).unwrap());
        assert_eq!(db.with_conn(count_subscribers).unwrap(), 1);
    }
}
