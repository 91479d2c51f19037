//! Blog categories

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DbError, is_valid_slug, now_timestamp, slugify};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub noindex: bool,
    pub nofollow: bool,
    pub created_at: String,
}

impl Category {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            slug: row.get("slug")?,
            description: row.get("description")?,
            meta_title: row.get("meta_title")?,
            meta_description: row.get("meta_description")?,
            noindex: row.get("noindex")?,
            nofollow: row.get("nofollow")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub noindex: bool,
    #[serde(default)]
    pub nofollow: bool,
}

impl NewCategory {
    pub fn named(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            ..Default::default()
        }
    }
}

pub fn list_categories(conn: &Connection) -> Result<Vec<Category>, DbError> {
    let mut stmt = conn.prepare("SELECT * FROM categories ORDER BY name")?;
    let categories = stmt
        .query_map([], Category::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

pub fn get_category_by_slug(conn: &Connection, slug: &str) -> Result<Option<Category>, DbError> {
    let category = conn
        .query_row(
            "SELECT * FROM categories WHERE slug = ?1",
            params![slug],
            Category::from_row,
        )
        .optional()?;
    Ok(category)
}

pub fn get_category_by_id(conn: &Connection, id: i64) -> Result<Option<Category>, DbError> {
    let category = conn
        .query_row(
            "SELECT * FROM categories WHERE id = ?1",
            params![id],
            Category::from_row,
        )
        .optional()?;
    Ok(category)
}

pub fn count_categories(conn: &Connection) -> Result<i64, DbError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?)
}

pub fn create_category(conn: &Connection, input: &NewCategory) -> Result<Category, DbError> {
    if input.name.trim().is_empty() {
        return Err(DbError::Invalid("Category name is required".to_string()));
    }
    let slug = if input.slug.trim().is_empty() {
        slugify(&input.name)
    } else {
        input.slug.trim().to_string()
    };
    if !is_valid_slug(&slug) {
        return Err(DbError::Invalid(format!("Invalid category slug '{}'", slug)));
    }

    conn.execute(
        "INSERT INTO categories (
            name, slug, description, meta_title, meta_description, noindex, nofollow, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            input.name.trim(),
            slug,
            input.description,
            input.meta_title,
            input.meta_description,
            input.noindex,
            input.nofollow,
            now_timestamp(),
        ],
    )?;

    let id = conn.last_insert_rowid();
    debug!(id, slug = %slug, "Created category");
    get_category_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("Category {}", id)))
}
