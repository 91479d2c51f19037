//! Articles, their tags and their publication lifecycle

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{DbError, is_valid_slug, now_timestamp, slugify};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl ArticleStatus {
    pub const ALL: [ArticleStatus; 3] = [Self::Draft, Self::Published, Self::Archived];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }

    /// Allowed moves: draft to published or archived, published to archived
    /// or back to draft, archived back to draft
    pub fn can_transition_to(&self, next: ArticleStatus) -> bool {
        use ArticleStatus::*;
        matches!(
            (self, next),
            (Draft, Published)
                | (Draft, Archived)
                | (Published, Archived)
                | (Published, Draft)
                | (Archived, Draft)
        )
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleStatus {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            other => Err(DbError::Invalid(format!("Unknown article status '{}'", other))),
        }
    }
}

impl ToSql for ArticleStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ArticleStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: DbError| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    /// HTML body
    pub content: Option<String>,
    pub featured_image: Option<String>,
    pub featured_image_alt: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub status: ArticleStatus,
    pub published_at: Option<String>,
    pub view_count: i64,
    pub created_at: String,
    pub updated_at: String,
    pub tags: Vec<String>,
}

impl Article {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            slug: row.get("slug")?,
            excerpt: row.get("excerpt")?,
            content: row.get("content")?,
            featured_image: row.get("featured_image")?,
            featured_image_alt: row.get("featured_image_alt")?,
            meta_title: row.get("meta_title")?,
            meta_description: row.get("meta_description")?,
            author_id: row.get("author_id")?,
            category_id: row.get("category_id")?,
            status: row.get("status")?,
            published_at: row.get("published_at")?,
            view_count: row.get("view_count")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            tags: vec![], // Loaded separately
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewArticle {
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub featured_image_alt: Option<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    pub author_id: i64,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub status: ArticleStatus,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Filter for published listings
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    pub limit: Option<u32>,
}

fn load_tags(conn: &Connection, article: &mut Article) -> Result<(), DbError> {
    let mut stmt = conn.prepare("SELECT tag FROM article_tags WHERE article_id = ?1 ORDER BY tag")?;
    article.tags = stmt
        .query_map(params![article.id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(())
}

fn with_tags(conn: &Connection, article: Option<Article>) -> Result<Option<Article>, DbError> {
    match article {
        Some(mut article) => {
            load_tags(conn, &mut article)?;
            Ok(Some(article))
        }
        None => Ok(None),
    }
}

pub fn get_article_by_id(conn: &Connection, id: i64) -> Result<Option<Article>, DbError> {
    let article = conn
        .query_row("SELECT * FROM articles WHERE id = ?1", params![id], Article::from_row)
        .optional()?;
    with_tags(conn, article)
}

pub fn get_published_article_by_slug(
    conn: &Connection,
    slug: &str,
) -> Result<Option<Article>, DbError> {
    let article = conn
        .query_row(
            "SELECT * FROM articles WHERE slug = ?1 AND status = 'published'",
            params![slug],
            Article::from_row,
        )
        .optional()?;
    with_tags(conn, article)
}

/// Published articles, newest first
pub fn list_published_articles(
    conn: &Connection,
    filter: &ArticleFilter,
) -> Result<Vec<Article>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM articles
         WHERE status = 'published'
           AND (?1 IS NULL OR category_id = ?1)
           AND (?2 IS NULL OR author_id = ?2)
         ORDER BY COALESCE(published_at, created_at) DESC, id DESC
         LIMIT ?3",
    )?;
    let limit = filter.limit.map(i64::from).unwrap_or(-1);
    let mut articles = stmt
        .query_map(
            params![filter.category_id, filter.author_id, limit],
            Article::from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    for article in &mut articles {
        load_tags(conn, article)?;
    }
    Ok(articles)
}

/// Replaces an article's tags. Blank and repeated tags are dropped.
pub fn set_tags(conn: &Connection, article_id: i64, tags: &[String]) -> Result<(), DbError> {
    conn.execute("DELETE FROM article_tags WHERE article_id = ?1", params![article_id])?;
    let mut stmt =
        conn.prepare("INSERT OR IGNORE INTO article_tags (article_id, tag) VALUES (?1, ?2)")?;
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        stmt.execute(params![article_id, tag])?;
    }
    Ok(())
}

fn validated_slug(input: &NewArticle) -> Result<String, DbError> {
    if input.title.trim().is_empty() {
        return Err(DbError::Invalid("Article title is required".to_string()));
    }
    let slug = if input.slug.trim().is_empty() {
        slugify(&input.title)
    } else {
        input.slug.trim().to_string()
    };
    if !is_valid_slug(&slug) {
        return Err(DbError::Invalid(format!("Invalid article slug '{}'", slug)));
    }
    Ok(slug)
}

pub fn create_article(conn: &Connection, input: &NewArticle) -> Result<Article, DbError> {
    let slug = validated_slug(input)?;
    let now = now_timestamp();
    let published_at = (input.status == ArticleStatus::Published).then(|| now.clone());

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO articles (
            title, slug, excerpt, content, featured_image, featured_image_alt,
            meta_title, meta_description, author_id, category_id, status,
            published_at, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
        params![
            input.title.trim(),
            slug,
            input.excerpt,
            input.content,
            input.featured_image,
            input.featured_image_alt,
            input.meta_title,
            input.meta_description,
            input.author_id,
            input.category_id,
            input.status,
            published_at,
            now,
        ],
    )?;
    let id = tx.last_insert_rowid();
    set_tags(&tx, id, &input.tags)?;
    tx.commit()?;

    debug!(id, slug = %slug, status = %input.status, "Created article");
    get_article_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("Article {}", id)))
}

/// Updates content fields and tags. Status changes go through
/// [`transition_status`].
pub fn update_article(conn: &Connection, id: i64, input: &NewArticle) -> Result<Article, DbError> {
    let slug = validated_slug(input)?;

    let tx = conn.unchecked_transaction()?;
    let changed = tx.execute(
        "UPDATE articles SET
            title = ?1, slug = ?2, excerpt = ?3, content = ?4, featured_image = ?5,
            featured_image_alt = ?6, meta_title = ?7, meta_description = ?8,
            author_id = ?9, category_id = ?10, updated_at = ?11
         WHERE id = ?12",
        params![
            input.title.trim(),
            slug,
            input.excerpt,
            input.content,
            input.featured_image,
            input.featured_image_alt,
            input.meta_title,
            input.meta_description,
            input.author_id,
            input.category_id,
            now_timestamp(),
            id,
        ],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("Article {}", id)));
    }
    set_tags(&tx, id, &input.tags)?;
    tx.commit()?;

    get_article_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("Article {}", id)))
}

/// Moves an article to a new status. `published_at` is stamped the first
/// time an article is published and kept afterwards.
pub fn transition_status(
    conn: &Connection,
    id: i64,
    next: ArticleStatus,
) -> Result<Article, DbError> {
    let current = get_article_by_id(conn, id)?
        .ok_or_else(|| DbError::NotFound(format!("Article {}", id)))?;

    if !current.status.can_transition_to(next) {
        return Err(DbError::InvalidTransition {
            from: current.status,
            to: next,
        });
    }

    let now = now_timestamp();
    conn.execute(
        "UPDATE articles SET
            status = ?1,
            published_at = CASE WHEN ?1 = 'published' THEN COALESCE(published_at, ?2) ELSE published_at END,
            updated_at = ?2
         WHERE id = ?3",
        params![next, now, id],
    )?;

    info!(id, from = %current.status, to = %next, "Article status changed");
    get_article_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("Article {}", id)))
}

/// Counts a view of a published article. Returns the new count, or `None`
/// when no published article has that slug.
pub fn increment_view_count(conn: &Connection, slug: &str) -> Result<Option<i64>, DbError> {
    let count = conn
        .query_row(
            "UPDATE articles SET view_count = view_count + 1
             WHERE slug = ?1 AND status = 'published'
             RETURNING view_count",
            params![slug],
            |row| row.get(0),
        )
        .optional()?;
    Ok(count)
}
