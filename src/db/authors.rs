//! Author profiles

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DbError, is_valid_slug, json_column, now_timestamp, slugify};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareerHighlight {
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub job_title: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub expertise: Vec<String>,
    pub career_highlights: Vec<CareerHighlight>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    /// Raw JSON-LD that replaces the generated `Person` schema
    pub custom_schema: Option<String>,
    pub noindex: bool,
    pub nofollow: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Author {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            slug: row.get("slug")?,
            email: row.get("email")?,
            bio: row.get("bio")?,
            avatar: row.get("avatar")?,
            job_title: row.get("job_title")?,
            location: row.get("location")?,
            website: row.get("website")?,
            twitter: row.get("twitter")?,
            linkedin: row.get("linkedin")?,
            github: row.get("github")?,
            expertise: json_column(row, "expertise")?,
            career_highlights: json_column(row, "career_highlights")?,
            meta_title: row.get("meta_title")?,
            meta_description: row.get("meta_description")?,
            custom_schema: row.get("custom_schema")?,
            noindex: row.get("noindex")?,
            nofollow: row.get("nofollow")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Links to the author's profiles elsewhere, for `sameAs`
    pub fn profile_links(&self) -> Vec<&str> {
        [&self.website, &self.twitter, &self.linkedin, &self.github]
            .into_iter()
            .filter_map(|link| link.as_deref())
            .filter(|link| !link.trim().is_empty())
            .collect()
    }
}

/// Input for creating or updating an author. An empty slug is derived
/// from the name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAuthor {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
    #[serde(default)]
    pub expertise: Vec<String>,
    #[serde(default)]
    pub career_highlights: Vec<CareerHighlight>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub custom_schema: Option<String>,
    #[serde(default)]
    pub noindex: bool,
    #[serde(default)]
    pub nofollow: bool,
}

impl NewAuthor {
    fn validated_slug(&self) -> Result<String, DbError> {
        if self.name.trim().is_empty() {
            return Err(DbError::Invalid("Author name is required".to_string()));
        }
        let slug = if self.slug.trim().is_empty() {
            slugify(&self.name)
        } else {
            self.slug.trim().to_string()
        };
        if !is_valid_slug(&slug) {
            return Err(DbError::Invalid(format!("Invalid author slug '{}'", slug)));
        }
        Ok(slug)
    }
}

pub fn get_author_by_slug(conn: &Connection, slug: &str) -> Result<Option<Author>, DbError> {
    let author = conn
        .query_row(
            "SELECT * FROM authors WHERE slug = ?1",
            params![slug],
            Author::from_row,
        )
        .optional()?;
    Ok(author)
}

pub fn get_author_by_id(conn: &Connection, id: i64) -> Result<Option<Author>, DbError> {
    let author = conn
        .query_row("SELECT * FROM authors WHERE id = ?1", params![id], Author::from_row)
        .optional()?;
    Ok(author)
}

pub fn list_authors(conn: &Connection) -> Result<Vec<Author>, DbError> {
    let mut stmt = conn.prepare("SELECT * FROM authors ORDER BY name")?;
    let authors = stmt
        .query_map([], Author::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(authors)
}

pub fn count_authors(conn: &Connection) -> Result<i64, DbError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM authors", [], |row| row.get(0))?)
}

pub fn create_author(conn: &Connection, input: &NewAuthor) -> Result<Author, DbError> {
    let slug = input.validated_slug()?;
    let now = now_timestamp();

    conn.execute(
        "INSERT INTO authors (
            name, slug, email, bio, avatar, job_title, location, website, twitter,
            linkedin, github, expertise, career_highlights, meta_title,
            meta_description, custom_schema, noindex, nofollow, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?19)",
        params![
            input.name.trim(),
            slug,
            input.email,
            input.bio,
            input.avatar,
            input.job_title,
            input.location,
            input.website,
            input.twitter,
            input.linkedin,
            input.github,
            serde_json::to_string(&input.expertise)?,
            serde_json::to_string(&input.career_highlights)?,
            input.meta_title,
            input.meta_description,
            input.custom_schema,
            input.noindex,
            input.nofollow,
            now,
        ],
    )?;

    let id = conn.last_insert_rowid();
    debug!(id, slug = %slug, "Created author");
    get_author_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("Author {}", id)))
}

pub fn update_author(conn: &Connection, id: i64, input: &NewAuthor) -> Result<Author, DbError> {
    let slug = input.validated_slug()?;

    let changed = conn.execute(
        "UPDATE authors SET
            name = ?1, slug = ?2, email = ?3, bio = ?4, avatar = ?5, job_title = ?6,
            location = ?7, website = ?8, twitter = ?9, linkedin = ?10, github = ?11,
            expertise = ?12, career_highlights = ?13, meta_title = ?14,
            meta_description = ?15, custom_schema = ?16, noindex = ?17, nofollow = ?18,
            updated_at = ?19
        WHERE id = ?20",
        params![
            input.name.trim(),
            slug,
            input.email,
            input.bio,
            input.avatar,
            input.job_title,
            input.location,
            input.website,
            input.twitter,
            input.linkedin,
            input.github,
            serde_json::to_string(&input.expertise)?,
            serde_json::to_string(&input.career_highlights)?,
            input.meta_title,
            input.meta_description,
            input.custom_schema,
            input.noindex,
            input.nofollow,
            now_timestamp(),
            id,
        ],
    )?;

    if changed == 0 {
        return Err(DbError::NotFound(format!("Author {}", id)));
    }
    get_author_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("Author {}", id)))
}
